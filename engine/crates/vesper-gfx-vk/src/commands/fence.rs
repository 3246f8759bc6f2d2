use std::rc::Rc;

use ash::vk;
use vesper_graphics::GraphicsResult;

use crate::foundation::VkResultExt;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::VkDevice;

/// 每个 command buffer 槽位一个，标记该槽位上一次提交是否已经执行完毕
pub struct VkFence {
    device: Rc<VkDevice>,
    fence: vk::Fence,
}

impl DebugType for VkFence {
    fn debug_type_name() -> &'static str {
        "VkFence"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.fence
    }
}

// new & init
impl VkFence {
    /// # param
    /// * signaled - 是否创建时就 signaled，第一次 wait 不会阻塞
    pub fn new(device: &Rc<VkDevice>, signaled: bool, debug_name: &str) -> GraphicsResult<Self> {
        let fence_flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { device.create_fence(&vk::FenceCreateInfo::default().flags(fence_flags), None) }
            .vk_fatal("vkCreateFence")?;

        let fence = Self {
            device: device.clone(),
            fence,
        };
        device.set_debug_name(&fence, debug_name);
        Ok(fence)
    }
}

// getters
impl VkFence {
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

// tools
impl VkFence {
    /// 阻塞等待 fence
    #[inline]
    pub fn wait(&self) -> GraphicsResult<()> {
        unsafe { self.device.wait_for_fences(std::slice::from_ref(&self.fence), true, u64::MAX) }
            .vk_context("vkWaitForFences")
    }

    #[inline]
    pub fn reset(&self) -> GraphicsResult<()> {
        unsafe { self.device.reset_fences(std::slice::from_ref(&self.fence)) }.vk_context("vkResetFences")
    }
}

impl Drop for VkFence {
    fn drop(&mut self) {
        // 持有者在 device idle 之后才会释放 fence
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}
