use std::rc::Rc;

use vesper_graphics::basic::graphics_type::{
    Extent2D, FramebufferDesc, GraphicsBackend, IndexFormat, MemoryProperty, PixelFormat, RenderPassDesc,
    RenderPassLayoutDesc, SampleCount, ShaderResourceBinding, TextureDesc, VertexInputLayoutDesc,
};
use vesper_graphics::config::GraphicsConfig;
use vesper_graphics::interface::buffer::{ConstantBuffer, IndexBuffer, StructuredBuffer, VertexBuffer};
use vesper_graphics::interface::command_queue::GraphicsCommandQueue;
use vesper_graphics::interface::context::GraphicsContext;
use vesper_graphics::interface::pipeline::{ComputePipeline, GraphicsPipeline, VertexInputLayout};
use vesper_graphics::interface::platform::PlatformContext;
use vesper_graphics::interface::render_pass::{Framebuffer, RenderPass, RenderPassLayout};
use vesper_graphics::interface::shader::{ComputeShader, GraphicsShader};
use vesper_graphics::interface::shader_resources::{ShaderResources, ShaderResourcesLayout};
use vesper_graphics::interface::texture::{Texture2D, Texture2DArray, TextureCube};
use vesper_graphics::{GraphicsError, GraphicsResult};

use crate::command_queue::VkCommandQueue;
use crate::descriptors::descriptor_pool::VkDescriptorPool;
use crate::descriptors::shader_resources::{VkShaderResources, VkShaderResourcesLayout};
use crate::foundation::device::VkDevice;
use crate::foundation::instance::VkInstance;
use crate::foundation::physical_device::VkPhysicalDevice;
use crate::pipelines::compute_pipeline::VkComputePipeline;
use crate::pipelines::graphics_pipeline::VkGraphicsPipeline;
use crate::pipelines::shader::{VkComputeShader, VkGraphicsShader};
use crate::pipelines::vertex_input::VkVertexInputLayout;
use crate::render_pass::{VkFramebuffer, VkRenderPass, VkRenderPassLayout};
use crate::resources::buffer::{VkConstantBuffer, VkIndexBuffer, VkStructuredBuffer, VkVertexBuffer};
use crate::resources::texture::{VkTexture2D, VkTexture2DArray, VkTextureCube};
use crate::swapchain::surface::VkSurface;
use crate::swapchain::swapchain::{SwapchainParams, VkSwapchain, choose_depth_format};

/// Vulkan 后端的 GraphicsContext
///
/// 字段的声明顺序就是析构顺序：command queue、swapchain、descriptor pool、surface、device
pub struct VkContext {
    command_queue: VkCommandQueue,
    swapchain: VkSwapchain,
    descriptor_pool: Rc<VkDescriptorPool>,
    surface: Rc<VkSurface>,
    device: Rc<VkDevice>,

    depth_format: PixelFormat,
    msaa: bool,
    prefer_mailbox: bool,
    /// 窗口最小化时为 true，此时 prepare 直接返回 false
    suspended: bool,
}

// new & init
impl VkContext {
    /// 依次创建 instance、surface、device、swapchain、descriptor pool 与 command queue
    ///
    /// 任何一步失败都是 fatal 错误
    pub fn new(config: &GraphicsConfig, platform: &dyn PlatformContext) -> GraphicsResult<Self> {
        let _span = tracy_client::span!("VkContext::new");
        let display_handle = platform.raw_display_handle().map_err(GraphicsError::fatal)?;
        let window_handle = platform.raw_window_handle().map_err(GraphicsError::fatal)?;

        let instance = Rc::new(VkInstance::new(&config.app_name, display_handle, config.validation)?);
        let surface = Rc::new(VkSurface::new(&instance, display_handle, window_handle)?);
        let pdevice = VkPhysicalDevice::select(&instance)?;
        let queue_families = pdevice.resolve_queue_families(&instance, &surface)?;
        let device = VkDevice::new(instance, pdevice, queue_families)?;
        let depth_format = choose_depth_format(&device).map_err(GraphicsError::fatal)?;

        let extent = platform.window_size();
        let suspended = extent.width == 0 || extent.height == 0;
        let initial_extent = if suspended { config.extent() } else { extent };
        let params = SwapchainParams {
            extent: initial_extent,
            samples: Self::samples_for(&device, config.msaa),
            depth_format,
            prefer_mailbox: config.prefer_mailbox,
        };
        let swapchain = VkSwapchain::new(&device, &surface, &params, None).map_err(GraphicsError::fatal)?;
        let descriptor_pool =
            Rc::new(VkDescriptorPool::new(&device, "main-descriptor-pool").map_err(GraphicsError::fatal)?);
        let command_queue = VkCommandQueue::new(&device, swapchain.image_count())?;

        log::info!(
            "vulkan context created: {}x{}, msaa: {}, depth: {:?}",
            swapchain.extent().width,
            swapchain.extent().height,
            config.msaa,
            depth_format
        );
        Ok(Self {
            command_queue,
            swapchain,
            descriptor_pool,
            surface,
            device,
            depth_format,
            msaa: config.msaa,
            prefer_mailbox: config.prefer_mailbox,
            suspended,
        })
    }

    fn samples_for(device: &VkDevice, msaa: bool) -> SampleCount {
        if msaa { device.pdevice().max_usable_sample_count() } else { SampleCount::X1 }
    }

    /// 等待 device idle 后重建 swapchain，随后重建 command queue
    ///
    /// acquire 返回 suboptimal 时 semaphore 已经 signaled 却没有被等待，重建 command queue 会换掉这些 semaphore
    fn rebuild_swapchain(&mut self, extent: Extent2D) -> GraphicsResult<()> {
        let _span = tracy_client::span!("VkContext::rebuild_swapchain");
        if self.command_queue.is_recording() {
            return Err(GraphicsError::InvalidOperation("swapchain rebuilt while recording a frame".to_string()));
        }
        self.device.wait_idle()?;

        let params = SwapchainParams {
            extent,
            samples: Self::samples_for(&self.device, self.msaa),
            depth_format: self.depth_format,
            prefer_mailbox: self.prefer_mailbox,
        };
        self.swapchain = VkSwapchain::new(&self.device, &self.surface, &params, Some(&self.swapchain))?;
        self.command_queue = VkCommandQueue::new(&self.device, self.swapchain.image_count())?;

        // device 已经 idle，旧 swapchain 以及最小化期间积压的删除任务都可以立即执行
        self.device.drain_deletions();
        Ok(())
    }
}

// getters
impl VkContext {
    #[inline]
    pub fn device(&self) -> &Rc<VkDevice> {
        &self.device
    }

    #[inline]
    pub fn swapchain(&self) -> &VkSwapchain {
        &self.swapchain
    }

    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }
}

impl GraphicsContext for VkContext {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Vulkan
    }

    fn create_vertex_buffer(
        &self,
        property: MemoryProperty,
        element_size: u32,
        element_count: u32,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Rc<dyn VertexBuffer>> {
        Ok(Rc::new(VkVertexBuffer::new(&self.device, property, element_size, element_count, data)?))
    }

    fn create_index_buffer(
        &self,
        property: MemoryProperty,
        format: IndexFormat,
        index_count: u32,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Rc<dyn IndexBuffer>> {
        Ok(Rc::new(VkIndexBuffer::new(&self.device, property, format, index_count, data)?))
    }

    fn create_constant_buffer(
        &self,
        property: MemoryProperty,
        size: u64,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Rc<dyn ConstantBuffer>> {
        Ok(Rc::new(VkConstantBuffer::new(&self.device, property, size, data)?))
    }

    fn create_structured_buffer(
        &self,
        property: MemoryProperty,
        element_size: u32,
        element_count: u32,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Rc<dyn StructuredBuffer>> {
        Ok(Rc::new(VkStructuredBuffer::new(&self.device, property, element_size, element_count, data)?))
    }

    fn create_texture_2d(&self, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Rc<dyn Texture2D>> {
        Ok(Rc::new(VkTexture2D::new(&self.device, desc, data)?))
    }

    fn create_texture_2d_array(&self, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Rc<dyn Texture2DArray>> {
        Ok(Rc::new(VkTexture2DArray::new(&self.device, desc, data)?))
    }

    fn create_texture_cube(&self, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Rc<dyn TextureCube>> {
        Ok(Rc::new(VkTextureCube::new(&self.device, desc, data)?))
    }

    fn create_graphics_shader(&self, vertex_code: &[u8], fragment_code: &[u8]) -> GraphicsResult<Rc<dyn GraphicsShader>> {
        Ok(Rc::new(VkGraphicsShader::new(&self.device, vertex_code, fragment_code)?))
    }

    fn create_compute_shader(&self, code: &[u8]) -> GraphicsResult<Rc<dyn ComputeShader>> {
        Ok(Rc::new(VkComputeShader::new(&self.device, code)?))
    }

    fn create_graphics_pipeline(&self) -> GraphicsResult<Rc<dyn GraphicsPipeline>> {
        Ok(Rc::new(VkGraphicsPipeline::new(&self.device)))
    }

    fn create_compute_pipeline(&self) -> GraphicsResult<Rc<dyn ComputePipeline>> {
        Ok(Rc::new(VkComputePipeline::new(&self.device)))
    }

    fn create_shader_resources_layout(
        &self,
        bindings: &[ShaderResourceBinding],
    ) -> GraphicsResult<Rc<dyn ShaderResourcesLayout>> {
        Ok(Rc::new(VkShaderResourcesLayout::new(&self.device, bindings)?))
    }

    fn create_shader_resources(
        &self,
        layout: Rc<dyn ShaderResourcesLayout>,
    ) -> GraphicsResult<Rc<dyn ShaderResources>> {
        Ok(Rc::new(VkShaderResources::new(&self.device, &self.descriptor_pool, layout)?))
    }

    fn create_render_pass_layout(&self, desc: &RenderPassLayoutDesc) -> GraphicsResult<Rc<dyn RenderPassLayout>> {
        Ok(Rc::new(VkRenderPassLayout::new(&self.device, desc)?))
    }

    fn create_render_pass(
        &self,
        layout: Rc<dyn RenderPassLayout>,
        desc: &RenderPassDesc,
    ) -> GraphicsResult<Rc<dyn RenderPass>> {
        Ok(Rc::new(VkRenderPass::new(&self.device, layout, desc, "user-render-pass")?))
    }

    fn create_framebuffer(&self, desc: FramebufferDesc) -> GraphicsResult<Rc<dyn Framebuffer>> {
        Ok(Rc::new(VkFramebuffer::new(&self.device, desc, "user-framebuffer")?))
    }

    fn create_vertex_input_layout(&self, desc: &VertexInputLayoutDesc) -> GraphicsResult<Rc<dyn VertexInputLayout>> {
        Ok(Rc::new(VkVertexInputLayout::new(desc)?))
    }

    fn command_queue(&mut self) -> &mut dyn GraphicsCommandQueue {
        &mut self.command_queue
    }

    fn current_frame_index(&self) -> usize {
        self.command_queue.current_frame_index()
    }

    fn frame_count(&self) -> usize {
        self.command_queue.frame_count()
    }

    fn prepare(&mut self) -> GraphicsResult<bool> {
        let _span = tracy_client::span!("VkContext::prepare");
        if self.suspended {
            return Ok(false);
        }
        if !self.command_queue.prepare(&self.swapchain)? {
            return Ok(false);
        }
        self.device.advance_deletions();
        Ok(true)
    }

    fn present(&mut self) -> GraphicsResult<bool> {
        let _span = tracy_client::span!("VkContext::present");
        self.command_queue.present(&self.swapchain)
    }

    fn resize(&mut self, width: u32, height: u32) -> GraphicsResult<()> {
        if width == 0 || height == 0 {
            log::info!("window minimized, rendering suspended");
            self.suspended = true;
            return Ok(());
        }
        self.rebuild_swapchain(Extent2D::new(width, height))?;
        self.suspended = false;
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
        self.device.pdevice().max_usable_sample_count()
    }

    fn main_framebuffer(&self, index: usize) -> Option<Rc<dyn Framebuffer>> {
        self.swapchain.framebuffers().get(index).cloned()
    }

    fn main_render_pass_layout(&self) -> Rc<dyn RenderPassLayout> {
        self.swapchain.layout().clone()
    }

    fn wait_idle(&self) -> GraphicsResult<()> {
        self.device.wait_idle()
    }
}

impl Drop for VkContext {
    fn drop(&mut self) {
        // 之后字段按声明顺序析构，native 对象进入延迟删除队列，最终由 device 统一执行
        if let Err(e) = self.device.wait_idle() {
            log::error!("{e}");
        }
        log::info!("vulkan context destroyed, {} deletions pending", self.device.pending_deletions());
    }
}
