use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::basic::error::{GraphicsError, GraphicsResult};
use crate::basic::graphics_type::{
    BlendState, CompareOp, ComputePipelineDesc, CullMode, FrontFace, GraphicsBackend, GraphicsPipelineDesc,
    PipelineBehaviorFlags, PolygonMode, PrimitiveTopology, PushConstantRange, Rect2D, VertexInputLayoutDesc, Viewport,
};
use crate::basic::shared_ref::SharedRef;
use crate::interface::pipeline::{ComputePipeline, GraphicsPipeline, VertexInputLayout};
use crate::interface::render_pass::RenderPassLayout;
use crate::interface::resource::GraphicsResource;
use crate::interface::shader::{ComputeShader, GraphicsShader};
use crate::interface::shader_resources::ShaderResourcesLayout;
use crate::lazy_pipeline::LazyPipeline;
use crate::null::NullResourceId;
use crate::null::device::NullDevice;

/// 模拟 native 的 pipeline layout
pub struct NullNativePipelineLayout {
    device: Rc<NullDevice>,
    pub id: u64,
}

impl Drop for NullNativePipelineLayout {
    fn drop(&mut self) {
        self.device.defer_destroy("pipeline_layout", self.id);
    }
}

/// 模拟 native 的 pipeline，每次重建得到一个新的 id
pub struct NullNativePipeline {
    device: Rc<NullDevice>,
    pub id: u64,
    pub layout: Rc<NullNativePipelineLayout>,
}

impl NullNativePipeline {
    fn build(device: &Rc<NullDevice>, old: Option<&NullNativePipeline>, layout_dirty: bool) -> Self {
        let layout = match old {
            Some(old) if !layout_dirty => old.layout.clone(),
            _ => Rc::new(NullNativePipelineLayout {
                device: device.clone(),
                id: device.alloc_id(),
            }),
        };
        Self {
            device: device.clone(),
            id: device.alloc_id(),
            layout,
        }
    }
}

impl Drop for NullNativePipeline {
    fn drop(&mut self) {
        self.device.defer_destroy("pipeline", self.id);
    }
}

pub struct NullVertexInputLayout {
    desc: VertexInputLayoutDesc,
}

impl NullVertexInputLayout {
    pub fn new(desc: &VertexInputLayoutDesc) -> Self {
        Self { desc: desc.clone() }
    }
}

impl GraphicsResource for NullVertexInputLayout {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Null
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl VertexInputLayout for NullVertexInputLayout {
    fn desc(&self) -> &VertexInputLayoutDesc {
        &self.desc
    }
}

pub struct NullGraphicsPipeline {
    device: Rc<NullDevice>,
    id: u64,
    state: RefCell<LazyPipeline<GraphicsPipelineDesc, NullNativePipeline>>,
}

impl NullGraphicsPipeline {
    pub fn new(device: &Rc<NullDevice>) -> Self {
        Self {
            device: device.clone(),
            id: device.alloc_id(),
            state: RefCell::new(LazyPipeline::new(GraphicsPipelineDesc::default())),
        }
    }

    /// 返回最新的 native (pipeline id, layout id)，必要时重建
    pub fn native_ids(&self) -> GraphicsResult<(u64, u64)> {
        let mut state = self.state.borrow_mut();
        let native = state.get_or_rebuild(|desc, old, layout_dirty| {
            if desc.shader.is_none() {
                return Err(GraphicsError::InvalidOperation("graphics pipeline has no shader".to_string()));
            }
            if desc.render_pass_layout.is_none() {
                return Err(GraphicsError::InvalidOperation("graphics pipeline has no render pass layout".to_string()));
            }
            Ok(NullNativePipeline::build(&self.device, old, layout_dirty))
        })?;
        Ok((native.id, native.layout.id))
    }

    fn update<T: PartialEq>(&self, field: impl FnOnce(&mut GraphicsPipelineDesc) -> &mut T, value: T) {
        self.state.borrow_mut().update(field, value);
    }
}

impl GraphicsResource for NullGraphicsPipeline {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Null
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl NullResourceId for NullGraphicsPipeline {
    fn resource_id(&self) -> u64 {
        self.id
    }
}

impl GraphicsPipeline for NullGraphicsPipeline {
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

pub struct NullComputePipeline {
    device: Rc<NullDevice>,
    id: u64,
    state: RefCell<LazyPipeline<ComputePipelineDesc, NullNativePipeline>>,
}

impl NullComputePipeline {
    pub fn new(device: &Rc<NullDevice>) -> Self {
        Self {
            device: device.clone(),
            id: device.alloc_id(),
            state: RefCell::new(LazyPipeline::new(ComputePipelineDesc::default())),
        }
    }

    pub fn native_ids(&self) -> GraphicsResult<(u64, u64)> {
        let mut state = self.state.borrow_mut();
        let native = state.get_or_rebuild(|desc, old, layout_dirty| {
            if desc.shader.is_none() {
                return Err(GraphicsError::InvalidOperation("compute pipeline has no shader".to_string()));
            }
            Ok(NullNativePipeline::build(&self.device, old, layout_dirty))
        })?;
        Ok((native.id, native.layout.id))
    }
}

impl GraphicsResource for NullComputePipeline {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Null
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl NullResourceId for NullComputePipeline {
    fn resource_id(&self) -> u64 {
        self.id
    }
}

impl ComputePipeline for NullComputePipeline {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::graphics_type::{PixelFormat, RenderPassLayoutDesc, SampleCount, ShaderStage};
    use crate::null::render_pass::NullRenderPassLayout;
    use crate::null::shader::NullGraphicsShader;

    fn ready_pipeline(device: &Rc<NullDevice>) -> NullGraphicsPipeline {
        let pipeline = NullGraphicsPipeline::new(device);
        pipeline.set_shader(Rc::new(NullGraphicsShader::new(device, &[1; 4], &[2; 4]).unwrap()));
        pipeline.set_render_pass_layout(Rc::new(NullRenderPassLayout::new(&RenderPassLayoutDesc {
            color_formats: vec![PixelFormat::B8G8R8A8Unorm],
            depth_format: None,
            samples: SampleCount::X1,
            resolve: false,
        })));
        pipeline
    }

    #[test]
    fn test_needs_shader() {
        let device = Rc::new(NullDevice::new());
        let pipeline = NullGraphicsPipeline::new(&device);
        assert!(matches!(pipeline.native_ids(), Err(GraphicsError::InvalidOperation(_))));
    }

    #[test]
    fn test_rebuild_minimality() {
        let device = Rc::new(NullDevice::new());
        let pipeline = ready_pipeline(&device);
        let (first, _) = pipeline.native_ids().unwrap();
        assert_eq!(pipeline.rebuild_count(), 1);

        // 与当前值相同
        pipeline.set_cull_mode(CullMode::Back);
        pipeline.set_depth_test(true);
        assert!(!pipeline.is_dirty());
        assert_eq!(pipeline.native_ids().unwrap().0, first);
        assert_eq!(pipeline.rebuild_count(), 1);

        pipeline.set_cull_mode(CullMode::None);
        pipeline.set_depth_test(false);
        pipeline.set_blend_state(BlendState::alpha_blend());
        assert!(pipeline.is_dirty());
        let (second, _) = pipeline.native_ids().unwrap();
        assert_ne!(first, second);
        pipeline.native_ids().unwrap();
        assert_eq!(pipeline.rebuild_count(), 2);
    }

    #[test]
    fn test_push_constant_rebuilds_layout() {
        let device = Rc::new(NullDevice::new());
        let pipeline = ready_pipeline(&device);
        let (_, layout) = pipeline.native_ids().unwrap();

        pipeline.set_front_face(FrontFace::Clockwise);
        let (_, same_layout) = pipeline.native_ids().unwrap();
        assert_eq!(layout, same_layout);

        pipeline.add_push_constant_range(PushConstantRange {
            stage: ShaderStage::VERTEX,
            offset: 0,
            size: 64,
        });
        let (_, new_layout) = pipeline.native_ids().unwrap();
        assert_ne!(layout, new_layout);
    }

    #[test]
    fn test_old_native_deferred() {
        let device = Rc::new(NullDevice::new());
        let pipeline = ready_pipeline(&device);
        let (first, _) = pipeline.native_ids().unwrap();
        pipeline.set_polygon_mode(PolygonMode::Line);
        pipeline.native_ids().unwrap();

        // 旧的 native pipeline 进入了延迟删除，而不是立即销毁
        assert!(device.deleted().is_empty());
        device.advance_deletions();
        device.advance_deletions();
        assert_eq!(device.deleted(), vec![format!("pipeline#{first}")]);
    }

    #[test]
    fn test_draw_time_getters() {
        let device = Rc::new(NullDevice::new());
        let pipeline = NullGraphicsPipeline::new(&device);
        assert!(pipeline.render_pass_layout().is_none());
        assert_eq!(pipeline.behavior_flags(), PipelineBehaviorFlags::default());

        let layout: Rc<dyn RenderPassLayout> = Rc::new(NullRenderPassLayout::new(&RenderPassLayoutDesc {
            color_formats: vec![PixelFormat::B8G8R8A8Unorm],
            depth_format: None,
            samples: SampleCount::X1,
            resolve: false,
        }));
        pipeline.set_render_pass_layout(layout.clone());
        pipeline.set_behavior_flags(PipelineBehaviorFlags::AUTO_RESIZE_SCISSOR);
        assert!(pipeline.render_pass_layout().is_some_and(|l| Rc::ptr_eq(&l, &layout)));
        assert_eq!(pipeline.behavior_flags(), PipelineBehaviorFlags::AUTO_RESIZE_SCISSOR);
        assert_eq!(pipeline.behavior_flags(), pipeline.desc().behavior);
    }
}
