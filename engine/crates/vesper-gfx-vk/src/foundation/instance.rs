use std::ffi::{CStr, CString, c_char};

use ash::vk;
use itertools::Itertools;
use raw_window_handle::RawDisplayHandle;
use vesper_graphics::{GraphicsError, GraphicsResult};

use crate::foundation::VkResultExt;
use crate::foundation::debug_messenger::VkDebugMessenger;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// 去掉版本号中的 patch 部分
#[inline]
pub fn clear_patch_version(version: u32) -> u32 {
    vk::make_api_version(vk::api_version_variant(version), vk::api_version_major(version), vk::api_version_minor(version), 0)
}

/// entry、instance 以及可选的 debug messenger
///
/// 被 device 与 surface 以 Rc 共享，最后一个持有者释放时销毁
pub struct VkInstance {
    entry: ash::Entry,
    instance: ash::Instance,
    surface_loader: ash::khr::surface::Instance,
    debug_messenger: Option<VkDebugMessenger>,
    api_version: u32,
    validation: bool,
}

// new & init
impl VkInstance {
    /// 设置所需的 layers 和 extensions，创建 vk instance
    pub fn new(app_name: &str, display_handle: RawDisplayHandle, validation: bool) -> GraphicsResult<Self> {
        let _span = tracy_client::span!("VkInstance::new");

        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GraphicsError::Unsupported(format!("vulkan loader: {e}")).fatal())?;

        // 请求设备支持的最高版本，patch 置零
        let api_version = unsafe { entry.try_enumerate_instance_version() }
            .vk_fatal("vkEnumerateInstanceVersion")?
            .map(clear_patch_version)
            .unwrap_or(vk::API_VERSION_1_0);
        log::info!(
            "instance api version: {}.{}",
            vk::api_version_major(api_version),
            vk::api_version_minor(api_version)
        );

        let app_name = CString::new(app_name).map_err(|e| GraphicsError::InvalidArgument(e.to_string()))?;
        let app_info = vk::ApplicationInfo::default()
            .api_version(api_version)
            .application_name(app_name.as_c_str())
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"vesper")
            .engine_version(vk::make_api_version(0, 1, 0, 0));

        let enabled_extensions = Self::get_extensions(display_handle, validation)?;
        log::info!(
            "instance extensions: {}",
            enabled_extensions.iter().map(|ext| format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) })).join("")
        );

        let enabled_layers = Self::get_layers(&entry, validation)?;
        let validation = validation && !enabled_layers.is_empty();

        let mut instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&enabled_extensions)
            .enabled_layer_names(&enabled_layers)
            .flags(Self::instance_create_flags());

        // 让 instance 的创建与销毁过程也能输出 validation 信息
        let mut debug_utils_messenger_ci = VkDebugMessenger::debug_utils_messenger_ci();
        if validation {
            instance_ci = instance_ci.push_next(&mut debug_utils_messenger_ci);
        }

        let instance = unsafe { entry.create_instance(&instance_ci, None) }.vk_fatal("vkCreateInstance")?;

        let debug_messenger = if validation {
            match VkDebugMessenger::new(&entry, &instance) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        Ok(Self {
            entry,
            instance,
            surface_loader,
            debug_messenger,
            api_version,
            validation,
        })
    }

    /// instance 所需的所有 extension
    fn get_extensions(display_handle: RawDisplayHandle, validation: bool) -> GraphicsResult<Vec<*const c_char>> {
        let mut exts = ash_window::enumerate_required_extensions(display_handle)
            .vk_fatal("ash_window::enumerate_required_extensions")?
            .to_vec();
        if validation {
            exts.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        if cfg!(target_os = "macos") {
            exts.push(ash::khr::portability_enumeration::NAME.as_ptr());
            exts.push(ash::khr::get_physical_device_properties2::NAME.as_ptr());
        }
        Ok(exts)
    }

    /// validation layer 不存在时只给出警告，继续运行
    fn get_layers(entry: &ash::Entry, validation: bool) -> GraphicsResult<Vec<*const c_char>> {
        if !validation {
            return Ok(vec![]);
        }
        let layer_props =
            unsafe { entry.enumerate_instance_layer_properties() }.vk_fatal("vkEnumerateInstanceLayerProperties")?;
        let supported = layer_props
            .iter()
            .any(|prop| prop.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER));
        if supported {
            log::info!("instance layers: \n\t{VALIDATION_LAYER:?}");
            Ok(vec![VALIDATION_LAYER.as_ptr()])
        } else {
            log::warn!("{VALIDATION_LAYER:?} is not available, validation disabled");
            Ok(vec![])
        }
    }

    fn instance_create_flags() -> vk::InstanceCreateFlags {
        if cfg!(target_os = "macos") {
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        }
    }
}

// getters
impl VkInstance {
    #[inline]
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.instance
    }

    #[inline]
    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    #[inline]
    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    /// validation layer 与 debug utils 是否启用
    #[inline]
    pub fn validation(&self) -> bool {
        self.validation
    }
}

impl Drop for VkInstance {
    fn drop(&mut self) {
        // messenger 必须先于 instance 销毁
        self.debug_messenger.take();
        log::info!("destroying instance");
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_patch_version() {
        let version = vk::make_api_version(0, 1, 3, 275);
        assert_eq!(clear_patch_version(version), vk::API_VERSION_1_3);
        assert_eq!(clear_patch_version(vk::API_VERSION_1_2), vk::API_VERSION_1_2);
    }
}
