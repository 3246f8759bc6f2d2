use std::rc::Rc;

use crate::basic::error::GraphicsResult;
use crate::basic::graphics_type::{
    Extent2D, FramebufferDesc, GraphicsBackend, IndexFormat, MemoryProperty, RenderPassDesc, RenderPassLayoutDesc,
    SampleCount, ShaderResourceBinding, TextureDesc, VertexInputLayoutDesc,
};
use crate::interface::buffer::{ConstantBuffer, IndexBuffer, StructuredBuffer, VertexBuffer};
use crate::interface::command_queue::GraphicsCommandQueue;
use crate::interface::pipeline::{ComputePipeline, GraphicsPipeline, VertexInputLayout};
use crate::interface::render_pass::{Framebuffer, RenderPass, RenderPassLayout};
use crate::interface::shader::{ComputeShader, GraphicsShader};
use crate::interface::shader_resources::{ShaderResources, ShaderResourcesLayout};
use crate::interface::texture::{Texture2D, Texture2DArray, TextureCube};

/// 图形 API 的入口：资源工厂与帧生命周期的拥有者
///
/// 每个应用创建一个，以引用的方式传给所有依赖它的组件。
///
/// 一帧的流程：
/// ```ignore
/// if ctx.prepare()? {
///     let queue = ctx.command_queue();
///     queue.set_pipeline(pipeline.clone());
///     queue.draw(3, 1, 0, 0)?;
///     ctx.present()?;
/// }
/// ```
pub trait GraphicsContext {
    fn backend(&self) -> GraphicsBackend;

    // region factory

    /// `data` 为 None 时内容未定义，提供时长度必须等于 buffer 的大小
    fn create_vertex_buffer(
        &self,
        property: MemoryProperty,
        element_size: u32,
        element_count: u32,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Rc<dyn VertexBuffer>>;

    fn create_index_buffer(
        &self,
        property: MemoryProperty,
        format: IndexFormat,
        index_count: u32,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Rc<dyn IndexBuffer>>;

    fn create_constant_buffer(
        &self,
        property: MemoryProperty,
        size: u64,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Rc<dyn ConstantBuffer>>;

    fn create_structured_buffer(
        &self,
        property: MemoryProperty,
        element_size: u32,
        element_count: u32,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Rc<dyn StructuredBuffer>>;

    /// `data` 为 level 0 的像素，按 layer 依次排列
    fn create_texture_2d(&self, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Rc<dyn Texture2D>>;

    fn create_texture_2d_array(&self, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Rc<dyn Texture2DArray>>;

    /// `desc.layers` 会被忽略，固定为 6
    fn create_texture_cube(&self, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Rc<dyn TextureCube>>;

    fn create_graphics_shader(&self, vertex_code: &[u8], fragment_code: &[u8]) -> GraphicsResult<Rc<dyn GraphicsShader>>;

    fn create_compute_shader(&self, code: &[u8]) -> GraphicsResult<Rc<dyn ComputeShader>>;

    fn create_graphics_pipeline(&self) -> GraphicsResult<Rc<dyn GraphicsPipeline>>;

    fn create_compute_pipeline(&self) -> GraphicsResult<Rc<dyn ComputePipeline>>;

    fn create_shader_resources_layout(
        &self,
        bindings: &[ShaderResourceBinding],
    ) -> GraphicsResult<Rc<dyn ShaderResourcesLayout>>;

    fn create_shader_resources(
        &self,
        layout: Rc<dyn ShaderResourcesLayout>,
    ) -> GraphicsResult<Rc<dyn ShaderResources>>;

    fn create_render_pass_layout(&self, desc: &RenderPassLayoutDesc) -> GraphicsResult<Rc<dyn RenderPassLayout>>;

    fn create_render_pass(
        &self,
        layout: Rc<dyn RenderPassLayout>,
        desc: &RenderPassDesc,
    ) -> GraphicsResult<Rc<dyn RenderPass>>;

    fn create_framebuffer(&self, desc: FramebufferDesc) -> GraphicsResult<Rc<dyn Framebuffer>>;

    fn create_vertex_input_layout(&self, desc: &VertexInputLayoutDesc) -> GraphicsResult<Rc<dyn VertexInputLayout>>;

    // endregion

    // region frame

    fn command_queue(&mut self) -> &mut dyn GraphicsCommandQueue;

    /// 当前 command buffer 槽位，GraphicsResourcesPool 以它区分帧
    fn current_frame_index(&self) -> usize;

    /// command buffer 槽位的数量，等于 swapchain image 的数量
    fn frame_count(&self) -> usize;

    /// 开始一帧：等待槽位的 fence、acquire image、开始 clear pass，然后推进延迟删除队列
    ///
    /// 返回 false 表示 swapchain 已经过期，本帧应当跳过，调用方随后应当 resize
    fn prepare(&mut self) -> GraphicsResult<bool>;

    /// 提交并 present 当前帧，返回 false 表示 swapchain 已经过期
    fn present(&mut self) -> GraphicsResult<bool>;

    /// 等待 device idle，然后重建 swapchain 及其所有 attachment
    fn resize(&mut self, width: u32, height: u32) -> GraphicsResult<()>;

    fn size(&self) -> Extent2D;

    /// 开关 MSAA，同样会重建 swapchain
    fn set_msaa_state(&mut self, enabled: bool) -> GraphicsResult<()>;

    fn msaa_state(&self) -> bool;

    /// 设备支持的最大采样数，MSAA 开启时使用
    fn max_msaa_samples(&self) -> SampleCount;

    fn main_framebuffer(&self, index: usize) -> Option<Rc<dyn Framebuffer>>;

    fn main_render_pass_layout(&self) -> Rc<dyn RenderPassLayout>;

    fn wait_idle(&self) -> GraphicsResult<()>;

    // endregion
}
