use std::rc::Rc;

use ash::vk;
use itertools::Itertools;
use vesper_graphics::GraphicsResult;
use vesper_graphics::basic::graphics_type::PushConstantRange;
use vesper_graphics::basic::shared_ref::SharedRef;
use vesper_graphics::interface::shader_resources::ShaderResourcesLayout;

use crate::conversion::convert_to_vk_shader_stage;
use crate::descriptors::shader_resources::VkShaderResourcesLayout;
use crate::foundation::VkResultExt;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::VkDevice;
use crate::vk_cast;

pub fn convert_push_constant_ranges(ranges: &[PushConstantRange]) -> Vec<vk::PushConstantRange> {
    ranges
        .iter()
        .map(|r| vk::PushConstantRange {
            stage_flags: convert_to_vk_shader_stage(r.stage),
            offset: r.offset,
            size: r.size,
        })
        .collect_vec()
}

/// 多个版本的 native pipeline 可以共用同一个 pipeline layout，所以使用 Rc
pub struct VkPipelineLayout {
    device: Rc<VkDevice>,
    handle: vk::PipelineLayout,
}

impl DebugType for VkPipelineLayout {
    fn debug_type_name() -> &'static str {
        "VkPipelineLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl VkPipelineLayout {
    /// set 的编号等于 layout 被添加的顺序
    pub fn new(
        device: &Rc<VkDevice>,
        shader_resources_layouts: &[SharedRef<dyn ShaderResourcesLayout>],
        push_constant_ranges: &[PushConstantRange],
        debug_name: &str,
    ) -> GraphicsResult<Rc<Self>> {
        let set_layouts = shader_resources_layouts
            .iter()
            .map(|layout| vk_cast::<VkShaderResourcesLayout, _>(layout.rc().as_ref()).handle())
            .collect_vec();
        let ranges = convert_push_constant_ranges(push_constant_ranges);

        let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts).push_constant_ranges(&ranges);
        let handle =
            unsafe { device.create_pipeline_layout(&create_info, None) }.vk_context("vkCreatePipelineLayout")?;
        let layout = Self {
            device: device.clone(),
            handle,
        };
        device.set_debug_name(&layout, debug_name);
        Ok(Rc::new(layout))
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }
}

impl Drop for VkPipelineLayout {
    fn drop(&mut self) {
        let handle = self.handle;
        self.device.defer_destroy(move |device| unsafe {
            device.destroy_pipeline_layout(handle, None);
        });
    }
}

/// 某一版本的 native pipeline
pub struct VkNativePipeline {
    device: Rc<VkDevice>,
    handle: vk::Pipeline,
    layout: Rc<VkPipelineLayout>,
}

impl DebugType for VkNativePipeline {
    fn debug_type_name() -> &'static str {
        "VkPipeline"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl VkNativePipeline {
    pub fn new(device: &Rc<VkDevice>, handle: vk::Pipeline, layout: Rc<VkPipelineLayout>, debug_name: &str) -> Self {
        let pipeline = Self {
            device: device.clone(),
            handle,
            layout,
        };
        device.set_debug_name(&pipeline, debug_name);
        pipeline
    }

    /// layout 未失效时复用旧版本的 layout
    pub fn reuse_layout(old: Option<&Self>, layout_dirty: bool) -> Option<Rc<VkPipelineLayout>> {
        match old {
            Some(old) if !layout_dirty => Some(old.layout.clone()),
            _ => None,
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }

    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout.handle()
    }
}

impl Drop for VkNativePipeline {
    fn drop(&mut self) {
        let handle = self.handle;
        self.device.defer_destroy(move |device| unsafe {
            device.destroy_pipeline(handle, None);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_graphics::basic::graphics_type::ShaderStage;

    #[test]
    fn test_push_constant_ranges() {
        let ranges = convert_push_constant_ranges(&[
            PushConstantRange {
                stage: ShaderStage::ALL_GRAPHICS,
                offset: 0,
                size: 64,
            },
            PushConstantRange {
                stage: ShaderStage::COMPUTE,
                offset: 64,
                size: 16,
            },
        ]);
        assert_eq!(ranges[0].stage_flags, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);
        assert_eq!((ranges[1].offset, ranges[1].size), (64, 16));
    }
}
