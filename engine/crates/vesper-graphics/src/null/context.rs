use std::rc::Rc;

use crate::basic::error::{GraphicsError, GraphicsResult};
use crate::basic::graphics_type::{
    Extent2D, FramebufferDesc, GraphicsBackend, IndexFormat, MemoryProperty, RenderPassDesc, RenderPassLayoutDesc,
    SampleCount, ShaderResourceBinding, TextureDesc, VertexInputLayoutDesc,
};
use crate::config::GraphicsConfig;
use crate::interface::buffer::{ConstantBuffer, IndexBuffer, StructuredBuffer, VertexBuffer};
use crate::interface::command_queue::GraphicsCommandQueue;
use crate::interface::context::GraphicsContext;
use crate::interface::pipeline::{ComputePipeline, GraphicsPipeline, VertexInputLayout};
use crate::interface::platform::PlatformContext;
use crate::interface::render_pass::{Framebuffer, RenderPass, RenderPassLayout};
use crate::interface::shader::{ComputeShader, GraphicsShader};
use crate::interface::shader_resources::{ShaderResources, ShaderResourcesLayout};
use crate::interface::texture::{Texture2D, Texture2DArray, TextureCube};
use crate::null::buffer::{NullConstantBuffer, NullIndexBuffer, NullStructuredBuffer, NullVertexBuffer};
use crate::null::command_queue::NullCommandQueue;
use crate::null::device::NullDevice;
use crate::null::pipeline::{NullComputePipeline, NullGraphicsPipeline, NullVertexInputLayout};
use crate::null::render_pass::{NullFramebuffer, NullRenderPass, NullRenderPassLayout};
use crate::null::shader::{NullComputeShader, NullGraphicsShader};
use crate::null::shader_resources::{NullShaderResources, NullShaderResourcesLayout};
use crate::null::swapchain::{NULL_IMAGE_COUNT, NULL_MAX_SAMPLES, NullSwapchain};
use crate::null::texture::{NullTexture2D, NullTexture2DArray, NullTextureCube};

pub struct NullContext {
    device: Rc<NullDevice>,
    msaa: bool,
    /// 窗口最小化时为 true，此时 prepare 直接返回 false
    suspended: bool,
    swapchain: NullSwapchain,
    command_queue: NullCommandQueue,
}

// new & init
impl NullContext {
    pub fn new(config: &GraphicsConfig, platform: &dyn PlatformContext) -> GraphicsResult<Self> {
        let device = Rc::new(NullDevice::new());
        let extent = platform.window_size();
        let suspended = extent.width == 0 || extent.height == 0;
        let initial_extent = if suspended { config.extent() } else { extent };

        let swapchain = NullSwapchain::new(&device, initial_extent, Self::samples_for(config.msaa), None)?;
        log::info!(
            "null context created: {}x{}, msaa: {}",
            initial_extent.width,
            initial_extent.height,
            config.msaa
        );
        Ok(Self {
            device,
            msaa: config.msaa,
            suspended,
            swapchain,
            command_queue: NullCommandQueue::new(NULL_IMAGE_COUNT),
        })
    }

    fn samples_for(msaa: bool) -> SampleCount {
        if msaa { NULL_MAX_SAMPLES } else { SampleCount::X1 }
    }

    fn rebuild_swapchain(&mut self, extent: Extent2D) -> GraphicsResult<()> {
        if self.command_queue.is_recording() {
            return Err(GraphicsError::InvalidOperation("swapchain rebuilt while recording a frame".to_string()));
        }
        let old_layout = self.swapchain.layout().clone();
        self.swapchain = NullSwapchain::new(&self.device, extent, Self::samples_for(self.msaa), Some(old_layout))?;

        // 与 Vulkan 后端一致：重建时没有 frame 在飞，积压的删除任务全部执行
        self.device.drain_deletions();
        Ok(())
    }
}

// getters
impl NullContext {
    #[inline]
    pub fn device(&self) -> &Rc<NullDevice> {
        &self.device
    }

    #[inline]
    pub fn null_command_queue(&self) -> &NullCommandQueue {
        &self.command_queue
    }

    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }
}

impl GraphicsContext for NullContext {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Null
    }

    fn create_vertex_buffer(
        &self,
        property: MemoryProperty,
        element_size: u32,
        element_count: u32,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Rc<dyn VertexBuffer>> {
        Ok(Rc::new(NullVertexBuffer::new(&self.device, property, element_size, element_count, data)?))
    }

    fn create_index_buffer(
        &self,
        property: MemoryProperty,
        format: IndexFormat,
        index_count: u32,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Rc<dyn IndexBuffer>> {
        Ok(Rc::new(NullIndexBuffer::new(&self.device, property, format, index_count, data)?))
    }

    fn create_constant_buffer(
        &self,
        property: MemoryProperty,
        size: u64,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Rc<dyn ConstantBuffer>> {
        Ok(Rc::new(NullConstantBuffer::new(&self.device, property, size, data)?))
    }

    fn create_structured_buffer(
        &self,
        property: MemoryProperty,
        element_size: u32,
        element_count: u32,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Rc<dyn StructuredBuffer>> {
        Ok(Rc::new(NullStructuredBuffer::new(&self.device, property, element_size, element_count, data)?))
    }

    fn create_texture_2d(&self, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Rc<dyn Texture2D>> {
        Ok(Rc::new(NullTexture2D::new(&self.device, desc, data)?))
    }

    fn create_texture_2d_array(&self, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Rc<dyn Texture2DArray>> {
        Ok(Rc::new(NullTexture2DArray::new(&self.device, desc, data)?))
    }

    fn create_texture_cube(&self, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Rc<dyn TextureCube>> {
        Ok(Rc::new(NullTextureCube::new(&self.device, desc, data)?))
    }

    fn create_graphics_shader(&self, vertex_code: &[u8], fragment_code: &[u8]) -> GraphicsResult<Rc<dyn GraphicsShader>> {
        Ok(Rc::new(NullGraphicsShader::new(&self.device, vertex_code, fragment_code)?))
    }

    fn create_compute_shader(&self, code: &[u8]) -> GraphicsResult<Rc<dyn ComputeShader>> {
        Ok(Rc::new(NullComputeShader::new(&self.device, code)?))
    }

    fn create_graphics_pipeline(&self) -> GraphicsResult<Rc<dyn GraphicsPipeline>> {
        Ok(Rc::new(NullGraphicsPipeline::new(&self.device)))
    }

    fn create_compute_pipeline(&self) -> GraphicsResult<Rc<dyn ComputePipeline>> {
        Ok(Rc::new(NullComputePipeline::new(&self.device)))
    }

    fn create_shader_resources_layout(
        &self,
        bindings: &[ShaderResourceBinding],
    ) -> GraphicsResult<Rc<dyn ShaderResourcesLayout>> {
        Ok(Rc::new(NullShaderResourcesLayout::new(bindings)))
    }

    fn create_shader_resources(
        &self,
        layout: Rc<dyn ShaderResourcesLayout>,
    ) -> GraphicsResult<Rc<dyn ShaderResources>> {
        Ok(Rc::new(NullShaderResources::new(&self.device, layout)))
    }

    fn create_render_pass_layout(&self, desc: &RenderPassLayoutDesc) -> GraphicsResult<Rc<dyn RenderPassLayout>> {
        Ok(Rc::new(NullRenderPassLayout::new(desc)))
    }

    fn create_render_pass(
        &self,
        layout: Rc<dyn RenderPassLayout>,
        desc: &RenderPassDesc,
    ) -> GraphicsResult<Rc<dyn RenderPass>> {
        Ok(Rc::new(NullRenderPass::new(layout, desc)))
    }

    fn create_framebuffer(&self, desc: FramebufferDesc) -> GraphicsResult<Rc<dyn Framebuffer>> {
        Ok(Rc::new(NullFramebuffer::new(self.device.alloc_id(), desc)?))
    }

    fn create_vertex_input_layout(&self, desc: &VertexInputLayoutDesc) -> GraphicsResult<Rc<dyn VertexInputLayout>> {
        Ok(Rc::new(NullVertexInputLayout::new(desc)))
    }

    fn command_queue(&mut self) -> &mut dyn GraphicsCommandQueue {
        &mut self.command_queue
    }

    fn current_frame_index(&self) -> usize {
        self.command_queue.current_frame_index()
    }

    fn frame_count(&self) -> usize {
        NULL_IMAGE_COUNT
    }

    fn prepare(&mut self) -> GraphicsResult<bool> {
        let _span = tracy_client::span!("NullContext::prepare");
        if self.suspended {
            return Ok(false);
        }
        self.command_queue.prepare(&mut self.swapchain)?;
        self.device.advance_deletions();
        Ok(true)
    }

    fn present(&mut self) -> GraphicsResult<bool> {
        let _span = tracy_client::span!("NullContext::present");
        self.command_queue.present()?;
        Ok(true)
    }

    fn resize(&mut self, width: u32, height: u32) -> GraphicsResult<()> {
        if width == 0 || height == 0 {
            log::info!("window minimized, rendering suspended");
            self.suspended = true;
            return Ok(());
        }
        self.rebuild_swapchain(Extent2D::new(width, height))?;
        self.suspended = false;
        log::info!("null swapchain resized to {width}x{height}");
        Ok(())
    }

    fn size(&self) -> Extent2D {
        self.swapchain.extent()
    }

    fn set_msaa_state(&mut self, enabled: bool) -> GraphicsResult<()> {
        if self.msaa == enabled {
            return Ok(());
        }
        let previous = self.msaa;
        self.msaa = enabled;
        if let Err(e) = self.rebuild_swapchain(self.swapchain.extent()) {
            self.msaa = previous;
            return Err(e);
        }
        log::info!("msaa {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    fn msaa_state(&self) -> bool {
        self.msaa
    }

    fn max_msaa_samples(&self) -> SampleCount {
        NULL_MAX_SAMPLES
    }

    fn main_framebuffer(&self, index: usize) -> Option<Rc<dyn Framebuffer>> {
        self.swapchain.framebuffers().get(index).cloned()
    }

    fn main_render_pass_layout(&self) -> Rc<dyn RenderPassLayout> {
        self.swapchain.layout().clone()
    }

    fn wait_idle(&self) -> GraphicsResult<()> {
        Ok(())
    }
}

impl Drop for NullContext {
    fn drop(&mut self) {
        self.device.drain_deletions();
        log::info!("null context destroyed, {} resources released", self.device.deleted().len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::graphics_func::{GeometryVertex, generate_quad};
    use crate::basic::graphics_type::{AttachmentLoadOp, ImageLayout, PixelFormat, ShaderStage};
    use crate::interface::buffer::Buffer;
    use crate::interface::platform::HeadlessPlatform;
    use crate::null::command_queue::NullCommand;
    use crate::resources_pool::GraphicsResourcesPool;

    fn context(width: u32, height: u32) -> NullContext {
        NullContext::new(&GraphicsConfig::default(), &HeadlessPlatform::new(width, height)).unwrap()
    }

    fn triangle_pipeline(ctx: &NullContext) -> Rc<dyn GraphicsPipeline> {
        let pipeline = ctx.create_graphics_pipeline().unwrap();
        pipeline.set_shader(ctx.create_graphics_shader(&[1; 4], &[2; 4]).unwrap());
        pipeline
    }

    #[test]
    fn test_create_and_resize() {
        let mut ctx = context(800, 600);
        assert_eq!(ctx.size(), Extent2D::new(800, 600));
        assert!(!ctx.msaa_state());

        let vertices = [<GeometryVertex as bytemuck::Zeroable>::zeroed(); 3];
        let vb = ctx
            .create_vertex_buffer(
                MemoryProperty::Static,
                GeometryVertex::STRIDE,
                3,
                Some(bytemuck::cast_slice(&vertices)),
            )
            .unwrap();
        assert_eq!(vb.size(), 3 * GeometryVertex::STRIDE as u64);

        ctx.resize(1920, 1080).unwrap();
        assert_eq!(ctx.size(), Extent2D::new(1920, 1080));
        for i in 0..ctx.frame_count() {
            let fb = ctx.main_framebuffer(i).unwrap();
            assert_eq!((fb.width(), fb.height()), (1920, 1080));
        }
        assert!(ctx.main_framebuffer(ctx.frame_count()).is_none());
    }

    #[test]
    fn test_resize_rebuilds_attachments_keeps_layout() {
        let mut ctx = context(64, 64);
        let layout = ctx.main_render_pass_layout();
        let fb = ctx.main_framebuffer(0).unwrap();

        ctx.resize(128, 64).unwrap();
        let new_fb = ctx.main_framebuffer(0).unwrap();
        assert!(!Rc::ptr_eq(fb.depth_attachment().unwrap(), new_fb.depth_attachment().unwrap()));
        assert!(Rc::ptr_eq(&layout, &ctx.main_render_pass_layout()));

        ctx.set_msaa_state(true).unwrap();
        assert!(ctx.msaa_state());
        assert_eq!(ctx.main_render_pass_layout().desc().samples, NULL_MAX_SAMPLES);
        assert_eq!(ctx.size(), Extent2D::new(128, 64));
    }

    #[test]
    fn test_zero_size_suspends() {
        let mut ctx = context(64, 64);
        ctx.resize(0, 0).unwrap();
        assert!(!ctx.prepare().unwrap());
        assert_eq!(ctx.size(), Extent2D::new(64, 64));

        ctx.resize(32, 32).unwrap();
        assert!(ctx.prepare().unwrap());
        ctx.present().unwrap();
    }

    #[test]
    fn test_frame_state_machine() {
        let mut ctx = context(64, 64);
        assert!(ctx.present().is_err());
        assert!(ctx.command_queue().draw(3, 1, 0, 0).is_err());

        assert!(ctx.prepare().unwrap());
        assert!(ctx.prepare().is_err());
        assert!(ctx.resize(32, 32).is_err());

        // 没有 pipeline
        assert!(ctx.command_queue().draw(3, 1, 0, 0).is_err());

        let pipeline = triangle_pipeline(&ctx);
        ctx.command_queue().set_pipeline(pipeline.clone());
        ctx.command_queue().draw(3, 1, 0, 0).unwrap();
        // pipeline 自动使用当前 framebuffer 的 layout
        assert!(pipeline.desc().render_pass_layout.is_some());
        ctx.present().unwrap();

        let commands = ctx.null_command_queue().commands();
        assert!(matches!(
            commands.first(),
            Some(NullCommand::BeginRenderPass {
                load_op: AttachmentLoadOp::Clear,
                ..
            })
        ));
        assert!(matches!(commands[commands.len() - 2], NullCommand::EndRenderPass));
        assert!(matches!(commands.last(), Some(NullCommand::Present { image_index: 0 })));
        assert_eq!(ctx.current_frame_index(), 1);
    }

    #[test]
    fn test_render_passes_never_overlap() {
        let mut ctx = context(64, 64);
        ctx.prepare().unwrap();

        let layout = ctx
            .create_render_pass_layout(&RenderPassLayoutDesc {
                color_formats: vec![PixelFormat::R8G8B8A8Unorm],
                depth_format: None,
                samples: SampleCount::X1,
                resolve: false,
            })
            .unwrap();
        let target = ctx
            .create_texture_2d(
                &TextureDesc::attachment(32, 32, PixelFormat::R8G8B8A8Unorm, SampleCount::X1),
                None,
            )
            .unwrap();
        let fb = ctx
            .create_framebuffer(FramebufferDesc {
                layout: layout.clone(),
                color_attachments: vec![target],
                depth_attachment: None,
                resolve_attachments: vec![],
                width: 32,
                height: 32,
            })
            .unwrap();
        let pass = ctx
            .create_render_pass(layout, &RenderPassDesc::clear(ImageLayout::ShaderReadOnly))
            .unwrap();

        ctx.command_queue().set_framebuffers(pass, fb).unwrap();
        ctx.command_queue().reset_framebuffers().unwrap();
        ctx.present().unwrap();

        let mut depth = 0i32;
        for command in ctx.null_command_queue().commands() {
            match command {
                NullCommand::BeginRenderPass { .. } => depth += 1,
                NullCommand::EndRenderPass => depth -= 1,
                _ => {}
            }
            assert!((0..=1).contains(&depth));
        }
        assert_eq!(depth, 0);
        let begins: Vec<_> = ctx
            .null_command_queue()
            .commands()
            .iter()
            .filter_map(|c| match c {
                NullCommand::BeginRenderPass { load_op, extent, .. } => Some((*load_op, *extent)),
                _ => None,
            })
            .collect();
        assert_eq!(
            begins,
            vec![
                (AttachmentLoadOp::Clear, Extent2D::new(64, 64)),
                (AttachmentLoadOp::Clear, Extent2D::new(32, 32)),
                (AttachmentLoadOp::Load, Extent2D::new(64, 64)),
            ]
        );
    }

    #[test]
    fn test_incompatible_pipeline_layout() {
        let mut ctx = context(64, 64);
        let pipeline = triangle_pipeline(&ctx);
        pipeline.set_render_pass_layout(
            ctx.create_render_pass_layout(&RenderPassLayoutDesc {
                color_formats: vec![PixelFormat::R16G16B16A16Float],
                depth_format: None,
                samples: SampleCount::X1,
                resolve: false,
            })
            .unwrap(),
        );
        ctx.prepare().unwrap();
        ctx.command_queue().set_pipeline(pipeline);
        assert!(matches!(ctx.command_queue().draw(3, 1, 0, 0), Err(GraphicsError::InvalidOperation(_))));
        ctx.present().unwrap();
    }

    #[test]
    fn test_draw_indexed_binds_everything() {
        let mut ctx = context(64, 64);
        let quad = generate_quad();
        let vb = ctx
            .create_vertex_buffer(
                MemoryProperty::Static,
                GeometryVertex::STRIDE,
                quad.vertices.len() as u32,
                Some(quad.vertex_bytes()),
            )
            .unwrap();
        let ib = ctx
            .create_index_buffer(
                MemoryProperty::Static,
                IndexFormat::U32,
                quad.indices.len() as u32,
                Some(quad.index_bytes()),
            )
            .unwrap();
        let pipeline = triangle_pipeline(&ctx);

        ctx.prepare().unwrap();
        let queue = ctx.command_queue();
        assert!(queue.draw_indexed(6, 1, 0, 0, 0).is_err());
        queue.set_pipeline(pipeline);
        queue.set_vertex_buffer(0, vb);
        queue.set_index_buffer(ib);
        queue.set_push_constants(ShaderStage::VERTEX, 0, &[0; 64]);
        queue.draw_indexed(6, 1, 0, 0, 0).unwrap();
        ctx.present().unwrap();

        let commands = ctx.null_command_queue().commands();
        let kinds = |pred: fn(&NullCommand) -> bool| commands.iter().filter(|c| pred(c)).count();
        assert_eq!(kinds(|c| matches!(c, NullCommand::BindPipeline { .. })), 1);
        assert_eq!(kinds(|c| matches!(c, NullCommand::SetViewport(_))), 1);
        assert_eq!(kinds(|c| matches!(c, NullCommand::BindVertexBuffer { binding: 0, .. })), 1);
        assert_eq!(kinds(|c| matches!(c, NullCommand::PushConstants { size: 64, .. })), 1);
        assert_eq!(kinds(|c| matches!(c, NullCommand::DrawIndexed { index_count: 6, .. })), 1);
    }

    #[test]
    fn test_dispatch_ends_render_pass() {
        let mut ctx = context(64, 64);
        let pipeline = ctx.create_compute_pipeline().unwrap();
        pipeline.set_shader(ctx.create_compute_shader(&[3; 4]).unwrap());

        ctx.prepare().unwrap();
        assert!(ctx.command_queue().dispatch(1, 1, 1).is_err());
        ctx.command_queue().set_compute_pipeline(pipeline);
        ctx.command_queue().dispatch(8, 8, 1).unwrap();
        assert!(!ctx.null_command_queue().in_render_pass());
        ctx.present().unwrap();

        let commands = ctx.null_command_queue().commands();
        assert!(matches!(commands[1], NullCommand::EndRenderPass));
        assert!(commands.contains(&NullCommand::Dispatch { x: 8, y: 8, z: 1 }));
    }

    #[test]
    fn test_deletion_delayed_by_frames() {
        let mut ctx = context(64, 64);
        let buffer = ctx.create_constant_buffer(MemoryProperty::Dynamic, 16, None).unwrap();
        drop(buffer);
        assert_eq!(ctx.device().pending_deletions(), 1);

        ctx.prepare().unwrap();
        ctx.present().unwrap();
        assert!(ctx.device().deleted().is_empty());

        ctx.prepare().unwrap();
        ctx.present().unwrap();
        assert_eq!(ctx.device().deleted().len(), 1);
        assert!(ctx.device().deleted()[0].starts_with("buffer#"));
    }

    #[test]
    fn test_rebuild_releases_pending_deletions() {
        let mut ctx = context(64, 64);
        ctx.resize(0, 0).unwrap();
        assert!(!ctx.prepare().unwrap());

        // 最小化期间没有 frame，删除任务不会推进
        let buffer = ctx.create_constant_buffer(MemoryProperty::Dynamic, 16, None).unwrap();
        drop(buffer);
        assert!(!ctx.prepare().unwrap());
        assert_eq!(ctx.device().pending_deletions(), 1);

        ctx.resize(64, 64).unwrap();
        assert_eq!(ctx.device().pending_deletions(), 0);
        assert!(ctx.device().deleted().iter().any(|name| name.starts_with("buffer#")));
    }

    #[test]
    fn test_pool_follows_frame_index() {
        let mut ctx = context(64, 64);
        let mut pool: GraphicsResourcesPool<Rc<dyn ConstantBuffer>> = GraphicsResourcesPool::new();
        let mut seen = Vec::new();

        for _ in 0..4 {
            ctx.prepare().unwrap();
            pool.reset();
            let cb = pool
                .get_current(&ctx, |ctx| ctx.create_constant_buffer(MemoryProperty::Dynamic, 64, None))
                .unwrap();
            seen.push(cb);
            ctx.present().unwrap();
        }

        // 两个槽位各自持有一个 buffer，之后的帧复用
        assert!(!Rc::ptr_eq(&seen[0], &seen[1]));
        assert!(Rc::ptr_eq(&seen[0], &seen[2]));
        assert!(Rc::ptr_eq(&seen[1], &seen[3]));
        assert_eq!(pool.capacity(0), 1);
        assert_eq!(pool.capacity(1), 1);
    }
}
