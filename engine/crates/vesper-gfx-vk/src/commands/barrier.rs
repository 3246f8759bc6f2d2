use ash::vk;

use crate::foundation::device::VkDevice;

/// barrier 使用的 src 和 dst 访问 mask
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VkBarrierMask {
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
}

/// 资源上传与 mipmap 生成过程中 layout 转换使用的 mask
///
/// 不在列表中的转换使用 ALL_COMMANDS，保证正确但不精确
pub fn transition_masks(old: vk::ImageLayout, new: vk::ImageLayout) -> VkBarrierMask {
    use vk::AccessFlags as A;
    use vk::ImageLayout as L;
    use vk::PipelineStageFlags as S;

    let (src_stage, dst_stage, src_access, dst_access) = match (old, new) {
        (L::UNDEFINED | L::PREINITIALIZED, L::TRANSFER_DST_OPTIMAL) => {
            (S::TOP_OF_PIPE, S::TRANSFER, A::empty(), A::TRANSFER_WRITE)
        }
        (L::TRANSFER_DST_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => {
            (S::TRANSFER, S::TRANSFER, A::TRANSFER_WRITE, A::TRANSFER_READ)
        }
        (L::TRANSFER_SRC_OPTIMAL, _) => (S::TRANSFER, S::ALL_COMMANDS, A::TRANSFER_READ, A::empty()),
        (L::TRANSFER_DST_OPTIMAL, _) => (S::TRANSFER, S::ALL_COMMANDS, A::TRANSFER_WRITE, A::MEMORY_READ),
        _ => (
            S::ALL_COMMANDS,
            S::ALL_COMMANDS,
            A::MEMORY_READ | A::MEMORY_WRITE,
            A::MEMORY_READ | A::MEMORY_WRITE,
        ),
    };
    VkBarrierMask {
        src_stage,
        dst_stage,
        src_access,
        dst_access,
    }
}

/// 便捷创建 image memory barrier 的结构体
#[derive(Clone, Copy)]
pub struct VkImageBarrier {
    inner: vk::ImageMemoryBarrier<'static>,
    src_stage: vk::PipelineStageFlags,
    dst_stage: vk::PipelineStageFlags,
}

impl Default for VkImageBarrier {
    fn default() -> Self {
        Self {
            inner: vk::ImageMemoryBarrier {
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::UNDEFINED,
                src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_array_layer: 0,
                    layer_count: 1,
                    base_mip_level: 0,
                    level_count: 1,
                },
                ..Default::default()
            },
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        }
    }
}

impl VkImageBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inner(&self) -> &vk::ImageMemoryBarrier<'static> {
        &self.inner
    }

    /// builder
    #[inline]
    pub fn image(mut self, image: vk::Image) -> Self {
        self.inner.image = image;
        self
    }

    /// builder
    #[inline]
    pub fn image_aspect_flag(mut self, aspect_mask: vk::ImageAspectFlags) -> Self {
        self.inner.subresource_range.aspect_mask = aspect_mask;
        self
    }

    /// builder
    ///
    /// 同时根据 [`transition_masks`] 设置 stage 与 access
    #[inline]
    pub fn layout_transfer(self, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Self {
        self.layout_transfer_with_mask(old_layout, new_layout, transition_masks(old_layout, new_layout))
    }

    /// builder
    #[inline]
    pub fn layout_transfer_with_mask(
        mut self,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        mask: VkBarrierMask,
    ) -> Self {
        self.inner.old_layout = old_layout;
        self.inner.new_layout = new_layout;
        self.inner.src_access_mask = mask.src_access;
        self.inner.dst_access_mask = mask.dst_access;
        self.src_stage = mask.src_stage;
        self.dst_stage = mask.dst_stage;
        self
    }

    /// builder
    #[inline]
    pub fn mip_range(mut self, base_mip_level: u32, level_count: u32) -> Self {
        self.inner.subresource_range.base_mip_level = base_mip_level;
        self.inner.subresource_range.level_count = level_count;
        self
    }

    /// builder
    #[inline]
    pub fn layer_range(mut self, base_array_layer: u32, layer_count: u32) -> Self {
        self.inner.subresource_range.base_array_layer = base_array_layer;
        self.inner.subresource_range.layer_count = layer_count;
        self
    }

    /// 立即录制到 command buffer
    pub fn record(&self, device: &VkDevice, cmd: vk::CommandBuffer) {
        unsafe {
            device.cmd_pipeline_barrier(
                cmd,
                self.src_stage,
                self.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                std::slice::from_ref(&self.inner),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_transitions() {
        let mask = transition_masks(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(mask.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(mask.dst_access, vk::AccessFlags::TRANSFER_WRITE);

        let mask = transition_masks(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(mask.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(mask.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(mask.dst_stage, vk::PipelineStageFlags::ALL_COMMANDS);
    }

    #[test]
    fn test_mip_chain_transitions() {
        let mask = transition_masks(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        assert_eq!(mask.dst_access, vk::AccessFlags::TRANSFER_READ);

        let mask = transition_masks(vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(mask.src_access, vk::AccessFlags::TRANSFER_READ);
        assert!(mask.dst_access.is_empty());
    }

    #[test]
    fn test_fallback_is_full_barrier() {
        let mask = transition_masks(vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(mask.src_stage, vk::PipelineStageFlags::ALL_COMMANDS);
        assert_eq!(mask.dst_stage, vk::PipelineStageFlags::ALL_COMMANDS);
    }

    #[test]
    fn test_barrier_builder() {
        let barrier = VkImageBarrier::new()
            .image_aspect_flag(vk::ImageAspectFlags::DEPTH)
            .layer_range(0, 6)
            .mip_range(2, 1)
            .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        let range = barrier.inner().subresource_range;
        assert_eq!((range.layer_count, range.base_mip_level), (6, 2));
        assert_eq!(barrier.inner().new_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    }
}
