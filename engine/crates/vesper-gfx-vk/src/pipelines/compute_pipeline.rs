use std::any::Any;
use std::cell::RefCell;
use std::ffi::CString;
use std::rc::Rc;

use ash::vk;
use vesper_graphics::basic::graphics_type::{ComputePipelineDesc, GraphicsBackend, PushConstantRange};
use vesper_graphics::basic::shared_ref::SharedRef;
use vesper_graphics::interface::pipeline::ComputePipeline;
use vesper_graphics::interface::resource::GraphicsResource;
use vesper_graphics::interface::shader::ComputeShader;
use vesper_graphics::interface::shader_resources::ShaderResourcesLayout;
use vesper_graphics::lazy_pipeline::LazyPipeline;
use vesper_graphics::{GraphicsError, GraphicsResult};

use crate::foundation::VkResultExt;
use crate::foundation::device::VkDevice;
use crate::pipelines::pipeline_layout::{VkNativePipeline, VkPipelineLayout};
use crate::pipelines::shader::VkComputeShader;
use crate::vk_cast;

fn build_native(
    device: &Rc<VkDevice>,
    desc: &ComputePipelineDesc,
    old: Option<&VkNativePipeline>,
    layout_dirty: bool,
) -> GraphicsResult<VkNativePipeline> {
    let _span = tracy_client::span!("VkComputePipeline::build");
    let Some(shader) = &desc.shader else {
        return Err(GraphicsError::InvalidOperation("compute pipeline has no shader".to_string()));
    };
    let shader: &VkComputeShader = vk_cast(shader.rc().as_ref());

    let pipeline_layout = match VkNativePipeline::reuse_layout(old, layout_dirty) {
        Some(layout) => layout,
        None => VkPipelineLayout::new(
            device,
            &desc.shader_resources_layouts,
            &desc.push_constant_ranges,
            "compute-pipeline-layout",
        )?,
    };

    let entry =
        CString::new(shader.entry()).map_err(|_| GraphicsError::InvalidArgument("compute entry contains NUL".to_string()))?;
    let stage = vk::PipelineShaderStageCreateInfo::default()
        .stage(vk::ShaderStageFlags::COMPUTE)
        .module(shader.module())
        .name(&entry);
    let pipeline_info = vk::ComputePipelineCreateInfo::default().stage(stage).layout(pipeline_layout.handle());

    let handle = unsafe {
        device.create_compute_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_info), None)
    }
    .map_err(|(_, e)| e)
    .vk_context("vkCreateComputePipelines")?[0];

    Ok(VkNativePipeline::new(device, handle, pipeline_layout, "compute-pipeline"))
}

pub struct VkComputePipeline {
    device: Rc<VkDevice>,
    state: RefCell<LazyPipeline<ComputePipelineDesc, VkNativePipeline>>,
}

impl VkComputePipeline {
    pub fn new(device: &Rc<VkDevice>) -> Self {
        Self {
            device: device.clone(),
            state: RefCell::new(LazyPipeline::new(ComputePipelineDesc::default())),
        }
    }

    /// 返回最新的 native (pipeline, layout)，必要时重建
    pub fn native(&self) -> GraphicsResult<(vk::Pipeline, vk::PipelineLayout)> {
        let mut state = self.state.borrow_mut();
        let native = state.get_or_rebuild(|desc, old, layout_dirty| build_native(&self.device, desc, old, layout_dirty))?;
        Ok((native.handle(), native.layout()))
    }
}

impl GraphicsResource for VkComputePipeline {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Vulkan
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ComputePipeline for VkComputePipeline {
    fn set_shader(&self, shader: Rc<dyn ComputeShader>) {
        self.state.borrow_mut().update(|d| &mut d.shader, Some(SharedRef::new(shader)));
    }

    fn add_shader_resources_layout(&self, layout: Rc<dyn ShaderResourcesLayout>) {
        self.state
            .borrow_mut()
            .update_layout(|d| d.shader_resources_layouts.push(SharedRef::new(layout)));
    }

    fn add_push_constant_range(&self, range: PushConstantRange) {
        self.state.borrow_mut().update_layout(|d| d.push_constant_ranges.push(range));
    }

    fn desc(&self) -> ComputePipelineDesc {
        self.state.borrow().desc().clone()
    }

    fn is_dirty(&self) -> bool {
        self.state.borrow().need_recreate()
    }

    fn rebuild_count(&self) -> u32 {
        self.state.borrow().rebuild_count()
    }
}
