use std::rc::Rc;

use ash::vk;
use vesper_graphics::GraphicsResult;

use crate::foundation::VkResultExt;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::VkDevice;

/// pool 中 descriptor set 的最大数量
pub const MAX_DESCRIPTOR_SETS: u32 = 16;
/// 每种 descriptor 类型的最大数量
pub const MAX_DESCRIPTORS_PER_TYPE: u32 = 16;

pub fn pool_sizes() -> [vk::DescriptorPoolSize; 3] {
    [
        vk::DescriptorType::UNIFORM_BUFFER,
        vk::DescriptorType::STORAGE_BUFFER,
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    ]
    .map(|ty| vk::DescriptorPoolSize {
        ty,
        descriptor_count: MAX_DESCRIPTORS_PER_TYPE,
    })
}

/// context 唯一的 descriptor pool
///
/// 带有 FREE_DESCRIPTOR_SET，每个 shader resources 可以单独释放自己的 set
pub struct VkDescriptorPool {
    device: Rc<VkDevice>,
    handle: vk::DescriptorPool,
}

impl DebugType for VkDescriptorPool {
    fn debug_type_name() -> &'static str {
        "VkDescriptorPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl VkDescriptorPool {
    pub fn new(device: &Rc<VkDevice>, name: &str) -> GraphicsResult<Self> {
        let sizes = pool_sizes();
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(MAX_DESCRIPTOR_SETS)
            .pool_sizes(&sizes);
        let handle =
            unsafe { device.create_descriptor_pool(&create_info, None) }.vk_context("vkCreateDescriptorPool")?;

        let pool = Self {
            device: device.clone(),
            handle,
        };
        device.set_debug_name(&pool, name);
        Ok(pool)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.handle
    }

    /// 分配一个 set，pool 耗尽时返回 Vulkan 错误
    pub fn allocate(&self, layout: vk::DescriptorSetLayout) -> GraphicsResult<vk::DescriptorSet> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.handle)
            .set_layouts(std::slice::from_ref(&layout));
        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.vk_context("vkAllocateDescriptorSets")?;
        Ok(sets[0])
    }

    /// 延迟归还一个 set
    pub fn free(&self, set: vk::DescriptorSet) {
        let pool = self.handle;
        self.device.defer_destroy(move |device| unsafe {
            if let Err(e) = device.free_descriptor_sets(pool, std::slice::from_ref(&set)) {
                log::error!("failed to free descriptor set: {e:?}");
            }
        });
    }
}

impl Drop for VkDescriptorPool {
    fn drop(&mut self) {
        log::info!("destroying descriptor pool");
        let handle = self.handle;
        self.device.defer_destroy(move |device| unsafe {
            device.destroy_descriptor_pool(handle, None);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_sizes() {
        let sizes = pool_sizes();
        assert_eq!(sizes.len(), 3);
        assert!(sizes.iter().all(|s| s.descriptor_count == MAX_DESCRIPTORS_PER_TYPE));
        assert_eq!(sizes[2].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
    }
}
