use std::rc::Rc;

use crate::basic::error::GraphicsResult;
use crate::basic::graphics_type::ShaderStage;
use crate::interface::buffer::{IndexBuffer, VertexBuffer};
use crate::interface::pipeline::{ComputePipeline, GraphicsPipeline};
use crate::interface::render_pass::{Framebuffer, RenderPass};
use crate::interface::shader_resources::ShaderResources;

/// 一帧命令的录制接口
///
/// 只能在 `GraphicsContext::prepare` 返回 true 之后、`GraphicsContext::present` 之前使用。
/// `set_*` 只记录状态，真正的绑定在 `draw*` 时进行，使用最近一次设置的值。
pub trait GraphicsCommandQueue {
    /// 当前的 command buffer 槽位，范围是 `[0, frame_count)`
    fn current_frame_index(&self) -> usize;

    /// 本帧 acquire 到的 swapchain image
    fn current_image_index(&self) -> usize;

    /// 是否处于 prepare 与 present 之间
    fn is_recording(&self) -> bool;

    fn set_pipeline(&mut self, pipeline: Rc<dyn GraphicsPipeline>);

    fn set_compute_pipeline(&mut self, pipeline: Rc<dyn ComputePipeline>);

    fn set_shader_resources(&mut self, set: u32, resources: Rc<dyn ShaderResources>);

    /// 移除 set 上的绑定，之后的 draw/dispatch 不再绑定这个 set
    fn clear_shader_resources(&mut self, set: u32);

    fn set_vertex_buffer(&mut self, binding: u32, buffer: Rc<dyn VertexBuffer>);

    fn set_index_buffer(&mut self, buffer: Rc<dyn IndexBuffer>);

    /// 在下一次 draw/dispatch 时写入 push constant
    fn set_push_constants(&mut self, stage: ShaderStage, offset: u32, data: &[u8]);

    /// 结束当前 render pass，以给定的 render pass 与 framebuffer 开始新的 render pass
    fn set_framebuffers(&mut self, render_pass: Rc<dyn RenderPass>, framebuffer: Rc<dyn Framebuffer>) -> GraphicsResult<()>;

    /// 结束当前 render pass，以 load pass 回到本帧的主 framebuffer
    fn reset_framebuffers(&mut self) -> GraphicsResult<()>;

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> GraphicsResult<()>;

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> GraphicsResult<()>;

    /// 结束当前 render pass（如果有）并 dispatch，之后需要重新 set_framebuffers/reset_framebuffers 才能 draw
    fn dispatch(&mut self, group_x: u32, group_y: u32, group_z: u32) -> GraphicsResult<()>;
}
