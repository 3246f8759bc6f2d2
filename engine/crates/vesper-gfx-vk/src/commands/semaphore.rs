use std::rc::Rc;

use ash::vk;
use vesper_graphics::GraphicsResult;

use crate::foundation::VkResultExt;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::VkDevice;

/// binary semaphore，用于 acquire / submit / present 之间的同步
pub struct VkSemaphore {
    device: Rc<VkDevice>,
    semaphore: vk::Semaphore,
}

impl DebugType for VkSemaphore {
    fn debug_type_name() -> &'static str {
        "VkSemaphore"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.semaphore
    }
}

impl VkSemaphore {
    pub fn new(device: &Rc<VkDevice>, debug_name: &str) -> GraphicsResult<Self> {
        let semaphore = unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .vk_fatal("vkCreateSemaphore")?;

        let semaphore = Self {
            device: device.clone(),
            semaphore,
        };
        device.set_debug_name(&semaphore, debug_name);
        Ok(semaphore)
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for VkSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}
