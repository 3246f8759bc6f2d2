use std::rc::Rc;

use crate::basic::graphics_type::{
    BlendState, CompareOp, ComputePipelineDesc, CullMode, FrontFace, GraphicsPipelineDesc, PipelineBehaviorFlags,
    PolygonMode, PrimitiveTopology, PushConstantRange, Rect2D, VertexInputLayoutDesc, Viewport,
};
use crate::interface::render_pass::RenderPassLayout;
use crate::interface::resource::GraphicsResource;
use crate::interface::shader::{ComputeShader, GraphicsShader};
use crate::interface::shader_resources::ShaderResourcesLayout;

/// 顶点输入的 binding 与 attribute
pub trait VertexInputLayout: GraphicsResource {
    fn desc(&self) -> &VertexInputLayoutDesc;
}

/// 可变的 graphics pipeline
///
/// 每个 setter 先和当前值比较：相同则什么也不做，不同则修改描述并标记需要重建。
/// native pipeline 在下一次被 command queue 使用时才会重建，多次修改只触发一次重建。
/// 添加 shader resources layout 或 push constant range 会让 pipeline layout 一起重建。
pub trait GraphicsPipeline: GraphicsResource {
    fn set_shader(&self, shader: Rc<dyn GraphicsShader>);
    fn set_vertex_input_layout(&self, layout: Rc<dyn VertexInputLayout>);
    fn set_render_pass_layout(&self, layout: Rc<dyn RenderPassLayout>);

    fn set_primitive_topology(&self, topology: PrimitiveTopology);
    fn set_cull_mode(&self, cull_mode: CullMode);
    fn set_front_face(&self, front_face: FrontFace);
    fn set_polygon_mode(&self, polygon_mode: PolygonMode);
    fn set_line_width(&self, line_width: f32);
    fn set_depth_test(&self, enabled: bool);
    fn set_depth_write(&self, enabled: bool);
    fn set_depth_compare_op(&self, op: CompareOp);
    fn set_blend_state(&self, blend: BlendState);

    fn set_behavior_flags(&self, flags: PipelineBehaviorFlags);
    fn set_viewport(&self, viewport: Viewport);
    fn set_scissor(&self, scissor: Rect2D);

    fn add_shader_resources_layout(&self, layout: Rc<dyn ShaderResourcesLayout>);
    fn add_push_constant_range(&self, range: PushConstantRange);

    /// 当前描述的拷贝
    fn desc(&self) -> GraphicsPipelineDesc;

    /// draw 时只需要这两项，不必拷贝整个描述
    fn behavior_flags(&self) -> PipelineBehaviorFlags;

    fn render_pass_layout(&self) -> Option<Rc<dyn RenderPassLayout>>;

    /// 是否有尚未应用到 native pipeline 的修改
    fn is_dirty(&self) -> bool;

    /// native pipeline 被构建的次数
    fn rebuild_count(&self) -> u32;
}

pub trait ComputePipeline: GraphicsResource {
    fn set_shader(&self, shader: Rc<dyn ComputeShader>);

    fn add_shader_resources_layout(&self, layout: Rc<dyn ShaderResourcesLayout>);
    fn add_push_constant_range(&self, range: PushConstantRange);

    fn desc(&self) -> ComputePipelineDesc;

    fn is_dirty(&self) -> bool;

    fn rebuild_count(&self) -> u32;
}
