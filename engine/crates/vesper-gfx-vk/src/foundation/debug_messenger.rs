use std::ffi::CStr;

use ash::vk;
use vesper_graphics::GraphicsResult;

use crate::foundation::VkResultExt;

/// 可以通过 debug utils 命名的 native 对象
pub trait DebugType {
    fn debug_type_name() -> &'static str;
    fn vk_handle(&self) -> impl vk::Handle;
}

pub struct VkDebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl VkDebugMessenger {
    pub fn new(entry: &ash::Entry, instance: &ash::Instance) -> GraphicsResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);

        let create_info = Self::debug_utils_messenger_ci();
        let handle = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
            .vk_fatal("vkCreateDebugUtilsMessengerEXT")?;

        Ok(Self { loader, handle })
    }

    /// 用于创建 debug messenger 的结构体，也会挂在 instance 的创建参数上
    pub fn debug_utils_messenger_ci() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vk_debug_callback))
    }
}

impl Drop for VkDebugMessenger {
    fn drop(&mut self) {
        log::info!("destroying debug messenger");
        unsafe {
            self.loader.destroy_debug_utils_messenger(self.handle, None);
        }
    }
}

/// 整理 validation layer 的消息
///
/// 新版本的 layer 输出 json，其中 MainMessage 字段带有换行符，需要单独输出
pub fn format_validation_message(message_type: vk::DebugUtilsMessageTypeFlagsEXT, msg: &str) -> String {
    let mut json_value = serde_json::from_str::<serde_json::Value>(msg);
    let mut json_obj = json_value.as_mut().ok().and_then(|v| v.as_object_mut());
    let main_msg_value = json_obj.as_mut().and_then(|obj| obj.remove("MainMessage"));
    let main_msg_str = main_msg_value.as_ref().and_then(|value| value.as_str()).unwrap_or_default();
    let total_msg_str =
        json_obj.and_then(|obj| serde_json::to_string_pretty(&obj).ok()).unwrap_or_else(|| msg.to_string());

    format!("[{message_type:?}]\n{total_msg_str}\n{main_msg_str}\n")
}

/// debug messenger 的回调函数
/// # Safety
/// 由驱动调用，`p_callback_data` 在回调期间有效
unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let callback_data = unsafe { *p_callback_data };

    let msg = if callback_data.p_message.is_null() {
        std::borrow::Cow::from("")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };
    let format_msg = format_validation_message(message_type, msg.as_ref());

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("{}", format_msg),
        _ => log::info!("{}", format_msg),
    };

    // 只有 layer developer 才需要返回 True
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_message_split() {
        let msg = r#"{"MessageID": 7, "MainMessage": "line one\nline two"}"#;
        let formatted = format_validation_message(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION, msg);
        assert!(formatted.ends_with("line one\nline two\n"));
        assert!(formatted.contains("\"MessageID\": 7"));
        assert!(!formatted.contains("MainMessage"));
    }

    #[test]
    fn test_plain_message_kept() {
        let formatted =
            format_validation_message(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL, "vkCreateDevice: plain text");
        assert!(formatted.contains("vkCreateDevice: plain text"));
    }
}
