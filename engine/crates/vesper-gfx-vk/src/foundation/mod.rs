pub mod debug_messenger;
pub mod device;
pub mod instance;
pub mod physical_device;

use ash::vk;
use vesper_graphics::{GraphicsError, GraphicsResult};

/// 把 `VkResult` 转换为 [`GraphicsError::Vulkan`]
pub trait VkResultExt<T> {
    fn vk_context(self, call: &'static str) -> GraphicsResult<T>;

    /// 构造期使用：额外写一条 `[fatal]` 日志
    fn vk_fatal(self, call: &'static str) -> GraphicsResult<T>;
}

impl<T> VkResultExt<T> for Result<T, vk::Result> {
    #[inline]
    fn vk_context(self, call: &'static str) -> GraphicsResult<T> {
        self.map_err(|result| GraphicsError::Vulkan {
            call,
            result: format!("{result:?}"),
        })
    }

    #[inline]
    fn vk_fatal(self, call: &'static str) -> GraphicsResult<T> {
        self.vk_context(call).map_err(GraphicsError::fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vk_context() {
        let result: Result<(), vk::Result> = Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        let err = result.vk_context("vkAllocateMemory").unwrap_err();
        assert_eq!(err.to_string(), "vkAllocateMemory failed: ERROR_OUT_OF_DEVICE_MEMORY");

        let ok: Result<u32, vk::Result> = Ok(3);
        assert_eq!(ok.vk_fatal("vkCreateFence").unwrap(), 3);
    }
}
