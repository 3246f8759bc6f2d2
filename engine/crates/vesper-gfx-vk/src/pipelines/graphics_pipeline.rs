use std::any::Any;
use std::cell::RefCell;
use std::ffi::CString;
use std::rc::Rc;

use ash::vk;
use itertools::Itertools;
use vesper_graphics::basic::graphics_type::{
    BlendState, CompareOp, CullMode, FrontFace, GraphicsBackend, GraphicsPipelineDesc, PipelineBehaviorFlags,
    PolygonMode, PrimitiveTopology, PushConstantRange, Rect2D, Viewport,
};
use vesper_graphics::basic::shared_ref::SharedRef;
use vesper_graphics::interface::pipeline::{GraphicsPipeline, VertexInputLayout};
use vesper_graphics::interface::render_pass::RenderPassLayout;
use vesper_graphics::interface::resource::GraphicsResource;
use vesper_graphics::interface::shader::GraphicsShader;
use vesper_graphics::interface::shader_resources::ShaderResourcesLayout;
use vesper_graphics::lazy_pipeline::LazyPipeline;
use vesper_graphics::{GraphicsError, GraphicsResult};

use crate::conversion::{
    convert_to_vk_blend_attachment, convert_to_vk_compare_op, convert_to_vk_cull_mode, convert_to_vk_front_face,
    convert_to_vk_polygon_mode, convert_to_vk_rect, convert_to_vk_sample_count, convert_to_vk_topology,
    convert_to_vk_viewport,
};
use crate::foundation::VkResultExt;
use crate::foundation::device::VkDevice;
use crate::pipelines::pipeline_layout::{VkNativePipeline, VkPipelineLayout};
use crate::pipelines::shader::VkGraphicsShader;
use crate::pipelines::vertex_input::VkVertexInputLayout;
use crate::render_pass::VkRenderPassLayout;
use crate::vk_cast;

/// 由 behavior flags 决定的 dynamic state
///
/// 未声明为 dynamic 的 viewport/scissor 使用描述中的固定值
pub fn dynamic_states(behavior: PipelineBehaviorFlags) -> Vec<vk::DynamicState> {
    let mut states = Vec::with_capacity(2);
    if behavior.contains(PipelineBehaviorFlags::AUTO_RESIZE_VIEWPORT) {
        states.push(vk::DynamicState::VIEWPORT);
    }
    if behavior.contains(PipelineBehaviorFlags::AUTO_RESIZE_SCISSOR) {
        states.push(vk::DynamicState::SCISSOR);
    }
    states
}

/// 根据 device 已开启的 feature 修正光栅化参数
pub fn rasterization_state(
    desc: &GraphicsPipelineDesc,
    features: &vk::PhysicalDeviceFeatures,
) -> GraphicsResult<vk::PipelineRasterizationStateCreateInfo<'static>> {
    if desc.polygon_mode != PolygonMode::Fill && features.fill_mode_non_solid != vk::TRUE {
        return Err(GraphicsError::Unsupported(format!("polygon mode {:?}", desc.polygon_mode)));
    }
    let line_width = if desc.line_width != 1.0 && features.wide_lines != vk::TRUE {
        log::warn!("wide lines are not supported, line width {} is ignored", desc.line_width);
        1.0
    } else {
        desc.line_width
    };

    Ok(vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(convert_to_vk_polygon_mode(desc.polygon_mode))
        .line_width(line_width)
        .cull_mode(convert_to_vk_cull_mode(desc.cull_mode))
        .front_face(convert_to_vk_front_face(desc.front_face))
        .depth_bias_enable(false))
}

fn build_native(
    device: &Rc<VkDevice>,
    desc: &GraphicsPipelineDesc,
    old: Option<&VkNativePipeline>,
    layout_dirty: bool,
) -> GraphicsResult<VkNativePipeline> {
    let _span = tracy_client::span!("VkGraphicsPipeline::build");
    let Some(shader) = &desc.shader else {
        return Err(GraphicsError::InvalidOperation("graphics pipeline has no shader".to_string()));
    };
    let Some(render_pass_layout) = &desc.render_pass_layout else {
        return Err(GraphicsError::InvalidOperation("graphics pipeline has no render pass layout".to_string()));
    };
    let shader: &VkGraphicsShader = vk_cast(shader.rc().as_ref());
    let render_pass_layout: &VkRenderPassLayout = vk_cast(render_pass_layout.rc().as_ref());
    let rp_desc = render_pass_layout.desc();

    let pipeline_layout = match VkNativePipeline::reuse_layout(old, layout_dirty) {
        Some(layout) => layout,
        None => VkPipelineLayout::new(
            device,
            &desc.shader_resources_layouts,
            &desc.push_constant_ranges,
            "graphics-pipeline-layout",
        )?,
    };

    let vertex_entry = CString::new(shader.vertex_entry())
        .map_err(|_| GraphicsError::InvalidArgument("vertex entry contains NUL".to_string()))?;
    let fragment_entry = CString::new(shader.fragment_entry())
        .map_err(|_| GraphicsError::InvalidArgument("fragment entry contains NUL".to_string()))?;
    let stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(shader.vertex_module())
            .name(&vertex_entry),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(shader.fragment_module())
            .name(&fragment_entry),
    ];

    // 顶点和 index
    let vertex_input = desc.vertex_input_layout.as_ref().map(|l| vk_cast::<VkVertexInputLayout, _>(l.rc().as_ref()));
    let vertex_input_info = match vertex_input {
        Some(layout) => vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(layout.vk_bindings())
            .vertex_attribute_descriptions(layout.vk_attributes()),
        None => vk::PipelineVertexInputStateCreateInfo::default(),
    };
    let input_assembly_info = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(convert_to_vk_topology(desc.topology))
        .primitive_restart_enable(false);

    // dynamic 时这里的值会被忽略，但是数量由该 create info 决定
    let viewport = convert_to_vk_viewport(&desc.viewport);
    let scissor = convert_to_vk_rect(&desc.scissor);
    let viewport_info = vk::PipelineViewportStateCreateInfo::default()
        .viewports(std::slice::from_ref(&viewport))
        .scissors(std::slice::from_ref(&scissor));

    let rasterize_info = rasterization_state(desc, device.enabled_features())?;
    let msaa_info = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(convert_to_vk_sample_count(rp_desc.samples));

    let depth_stencil_info = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(desc.depth_test)
        .depth_write_enable(desc.depth_write)
        .depth_compare_op(convert_to_vk_compare_op(desc.depth_compare_op))
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    // 需要为每个 color attachment 分别指定
    let blend_attachments =
        rp_desc.color_formats.iter().map(|_| convert_to_vk_blend_attachment(&desc.blend)).collect_vec();
    let color_blend_info = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&blend_attachments)
        .blend_constants([0.0, 0.0, 0.0, 0.0]);

    let states = dynamic_states(desc.behavior);
    let dynamic_state_info = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&states);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input_info)
        .input_assembly_state(&input_assembly_info)
        .viewport_state(&viewport_info)
        .rasterization_state(&rasterize_info)
        .multisample_state(&msaa_info)
        .depth_stencil_state(&depth_stencil_info)
        .color_blend_state(&color_blend_info)
        .dynamic_state(&dynamic_state_info)
        .layout(pipeline_layout.handle())
        .render_pass(render_pass_layout.compat_handle())
        .subpass(0);

    let handle = unsafe {
        device.create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_info), None)
    }
    .map_err(|(_, e)| e)
    .vk_context("vkCreateGraphicsPipelines")?[0];

    Ok(VkNativePipeline::new(device, handle, pipeline_layout, "graphics-pipeline"))
}

pub struct VkGraphicsPipeline {
    device: Rc<VkDevice>,
    state: RefCell<LazyPipeline<GraphicsPipelineDesc, VkNativePipeline>>,
}

impl VkGraphicsPipeline {
    pub fn new(device: &Rc<VkDevice>) -> Self {
        Self {
            device: device.clone(),
            state: RefCell::new(LazyPipeline::new(GraphicsPipelineDesc::default())),
        }
    }

    /// 返回最新的 native (pipeline, layout)，必要时重建
    pub fn native(&self) -> GraphicsResult<(vk::Pipeline, vk::PipelineLayout)> {
        let mut state = self.state.borrow_mut();
        let native = state.get_or_rebuild(|desc, old, layout_dirty| build_native(&self.device, desc, old, layout_dirty))?;
        Ok((native.handle(), native.layout()))
    }

    fn update<T: PartialEq>(&self, field: impl FnOnce(&mut GraphicsPipelineDesc) -> &mut T, value: T) {
        self.state.borrow_mut().update(field, value);
    }
}

impl GraphicsResource for VkGraphicsPipeline {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Vulkan
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl GraphicsPipeline for VkGraphicsPipeline {
    fn set_shader(&self, shader: Rc<dyn GraphicsShader>) {
        self.update(|d| &mut d.shader, Some(SharedRef::new(shader)));
    }

    fn set_vertex_input_layout(&self, layout: Rc<dyn VertexInputLayout>) {
        self.update(|d| &mut d.vertex_input_layout, Some(SharedRef::new(layout)));
    }

    fn set_render_pass_layout(&self, layout: Rc<dyn RenderPassLayout>) {
        self.update(|d| &mut d.render_pass_layout, Some(SharedRef::new(layout)));
    }

    fn set_primitive_topology(&self, topology: PrimitiveTopology) {
        self.update(|d| &mut d.topology, topology);
    }

    fn set_cull_mode(&self, cull_mode: CullMode) {
        self.update(|d| &mut d.cull_mode, cull_mode);
    }

    fn set_front_face(&self, front_face: FrontFace) {
        self.update(|d| &mut d.front_face, front_face);
    }

    fn set_polygon_mode(&self, polygon_mode: PolygonMode) {
        self.update(|d| &mut d.polygon_mode, polygon_mode);
    }

    fn set_line_width(&self, line_width: f32) {
        self.update(|d| &mut d.line_width, line_width);
    }

    fn set_depth_test(&self, enabled: bool) {
        self.update(|d| &mut d.depth_test, enabled);
    }

    fn set_depth_write(&self, enabled: bool) {
        self.update(|d| &mut d.depth_write, enabled);
    }

    fn set_depth_compare_op(&self, op: CompareOp) {
        self.update(|d| &mut d.depth_compare_op, op);
    }

    fn set_blend_state(&self, blend: BlendState) {
        self.update(|d| &mut d.blend, blend);
    }

    fn set_behavior_flags(&self, flags: PipelineBehaviorFlags) {
        self.update(|d| &mut d.behavior, flags);
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.update(|d| &mut d.viewport, viewport);
    }

    fn set_scissor(&self, scissor: Rect2D) {
        self.update(|d| &mut d.scissor, scissor);
    }

    fn add_shader_resources_layout(&self, layout: Rc<dyn ShaderResourcesLayout>) {
        self.state
            .borrow_mut()
            .update_layout(|d| d.shader_resources_layouts.push(SharedRef::new(layout)));
    }

    fn add_push_constant_range(&self, range: PushConstantRange) {
        self.state.borrow_mut().update_layout(|d| d.push_constant_ranges.push(range));
    }

    fn desc(&self) -> GraphicsPipelineDesc {
        self.state.borrow().desc().clone()
    }

    fn behavior_flags(&self) -> PipelineBehaviorFlags {
        self.state.borrow().desc().behavior
    }

    fn render_pass_layout(&self) -> Option<Rc<dyn RenderPassLayout>> {
        self.state.borrow().desc().render_pass_layout.as_ref().map(|layout| layout.rc().clone())
    }

    fn is_dirty(&self) -> bool {
        self.state.borrow().need_recreate()
    }

    fn rebuild_count(&self) -> u32 {
        self.state.borrow().rebuild_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_states_follow_flags() {
        assert_eq!(
            dynamic_states(PipelineBehaviorFlags::default()),
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        );
        assert_eq!(dynamic_states(PipelineBehaviorFlags::AUTO_RESIZE_SCISSOR), vec![vk::DynamicState::SCISSOR]);
        assert!(dynamic_states(PipelineBehaviorFlags::empty()).is_empty());
    }

    #[test]
    fn test_rasterization_respects_features() {
        let mut desc = GraphicsPipelineDesc::default();
        let no_features = vk::PhysicalDeviceFeatures::default();

        let info = rasterization_state(&desc, &no_features).unwrap();
        assert_eq!(info.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(info.front_face, vk::FrontFace::COUNTER_CLOCKWISE);

        desc.line_width = 3.0;
        assert_eq!(rasterization_state(&desc, &no_features).unwrap().line_width, 1.0);

        desc.polygon_mode = PolygonMode::Line;
        assert!(matches!(rasterization_state(&desc, &no_features), Err(GraphicsError::Unsupported(_))));

        let features = vk::PhysicalDeviceFeatures {
            fill_mode_non_solid: vk::TRUE,
            wide_lines: vk::TRUE,
            ..Default::default()
        };
        let info = rasterization_state(&desc, &features).unwrap();
        assert_eq!(info.polygon_mode, vk::PolygonMode::LINE);
        assert_eq!(info.line_width, 3.0);
    }
}
