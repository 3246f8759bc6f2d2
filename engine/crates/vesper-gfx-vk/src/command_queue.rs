use std::collections::BTreeMap;
use std::rc::Rc;

use ash::vk;
use itertools::Itertools;
use vesper_graphics::basic::graphics_type::{PipelineBehaviorFlags, Rect2D, ShaderStage, Viewport};
use vesper_graphics::interface::buffer::{IndexBuffer, VertexBuffer};
use vesper_graphics::interface::command_queue::GraphicsCommandQueue;
use vesper_graphics::interface::pipeline::{ComputePipeline, GraphicsPipeline};
use vesper_graphics::interface::render_pass::{Framebuffer, RenderPass};
use vesper_graphics::interface::shader_resources::ShaderResources;
use vesper_graphics::{GraphicsError, GraphicsResult};

use crate::commands::fence::VkFence;
use crate::commands::semaphore::VkSemaphore;
use crate::conversion::{convert_to_vk_index_type, convert_to_vk_rect, convert_to_vk_shader_stage, convert_to_vk_viewport};
use crate::descriptors::shader_resources::VkShaderResources;
use crate::foundation::VkResultExt;
use crate::foundation::device::VkDevice;
use crate::pipelines::compute_pipeline::VkComputePipeline;
use crate::pipelines::graphics_pipeline::VkGraphicsPipeline;
use crate::render_pass::{VkFramebuffer, VkRenderPass};
use crate::resources::buffer::{VkIndexBuffer, VkVertexBuffer};
use crate::swapchain::swapchain::VkSwapchain;
use crate::vk_cast;

/// 一个 command buffer 槽位及其同步对象
struct FrameSlot {
    cmd: vk::CommandBuffer,
    /// 创建时 signaled，第一次 prepare 不会阻塞
    in_flight: VkFence,
    image_available: VkSemaphore,
    render_finished: VkSemaphore,
}

/// 本帧的主 framebuffer 与 load pass，在 prepare 时从 swapchain 取得
struct MainTarget {
    framebuffer: Rc<dyn Framebuffer>,
    load_pass: Rc<dyn RenderPass>,
}

/// 状态机：Idle -prepare-> Recording -present-> Idle
///
/// `set_*` 只记录状态，`draw*` / `dispatch` 时才真正录制绑定命令
pub struct VkCommandQueue {
    device: Rc<VkDevice>,
    pool: vk::CommandPool,
    slots: Vec<FrameSlot>,

    frame_index: usize,
    image_index: usize,
    recording: bool,

    main_target: Option<MainTarget>,
    active_framebuffer: Option<Rc<dyn Framebuffer>>,

    pipeline: Option<Rc<dyn GraphicsPipeline>>,
    compute_pipeline: Option<Rc<dyn ComputePipeline>>,
    shader_resources: BTreeMap<u32, Rc<dyn ShaderResources>>,
    vertex_buffers: BTreeMap<u32, Rc<dyn VertexBuffer>>,
    index_buffer: Option<Rc<dyn IndexBuffer>>,
    push_constants: Vec<(ShaderStage, u32, Vec<u8>)>,
}

// new & init
impl VkCommandQueue {
    /// # param
    /// * frame_count - 槽位数量，与 swapchain image 数量一致
    pub fn new(device: &Rc<VkDevice>, frame_count: usize) -> GraphicsResult<Self> {
        let _span = tracy_client::span!("VkCommandQueue::new");
        let pool_ci = vk::CommandPoolCreateInfo::default()
            .queue_family_index(device.graphics_family())
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { device.create_command_pool(&pool_ci, None) }.vk_fatal("vkCreateCommandPool")?;
        device.set_object_debug_name(pool, "frame-command-pool");

        // 先构造出 Self，后续失败时由 Drop 销毁 pool
        let mut queue = Self {
            device: device.clone(),
            pool,
            slots: Vec::with_capacity(frame_count),
            frame_index: 0,
            image_index: 0,
            recording: false,
            main_target: None,
            active_framebuffer: None,
            pipeline: None,
            compute_pipeline: None,
            shader_resources: BTreeMap::new(),
            vertex_buffers: BTreeMap::new(),
            index_buffer: None,
            push_constants: Vec::new(),
        };

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(frame_count as u32);
        let cmds = unsafe { device.allocate_command_buffers(&alloc_info) }.vk_fatal("vkAllocateCommandBuffers")?;

        for (i, cmd) in cmds.into_iter().enumerate() {
            device.set_object_debug_name(cmd, format!("frame-{i}-cmd"));
            queue.slots.push(FrameSlot {
                cmd,
                in_flight: VkFence::new(device, true, &format!("frame-{i}-in-flight"))?,
                image_available: VkSemaphore::new(device, &format!("frame-{i}-image-available"))?,
                render_finished: VkSemaphore::new(device, &format!("frame-{i}-render-finished"))?,
            });
        }
        Ok(queue)
    }
}

// getters
impl VkCommandQueue {
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn in_render_pass(&self) -> bool {
        self.active_framebuffer.is_some()
    }

    #[inline]
    fn cmd(&self) -> vk::CommandBuffer {
        self.slots[self.frame_index].cmd
    }
}

// frame
impl VkCommandQueue {
    /// 等待槽位空闲，acquire image 并开始 clear pass
    ///
    /// swapchain 过期时返回 false，此时没有开始录制
    pub fn prepare(&mut self, swapchain: &VkSwapchain) -> GraphicsResult<bool> {
        let _span = tracy_client::span!("VkCommandQueue::prepare");
        if self.recording {
            return Err(GraphicsError::InvalidOperation("prepare called twice without present".to_string()));
        }

        let slot = &self.slots[self.frame_index];
        slot.in_flight.wait()?;
        let Some(image_index) = swapchain.acquire_next_image(slot.image_available.handle())? else {
            return Ok(false);
        };
        // acquire 成功之后才 reset，否则下一次 wait 会永远阻塞
        slot.in_flight.reset()?;

        let cmd = slot.cmd;
        unsafe {
            self.device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .vk_context("vkResetCommandBuffer")?;
            self.device
                .begin_command_buffer(
                    cmd,
                    &vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
                )
                .vk_context("vkBeginCommandBuffer")?;
        }
        self.device.cmd_begin_label(cmd, &format!("frame-{}", self.frame_index), [0.2, 0.6, 0.2, 1.0]);

        self.image_index = image_index;
        self.clear_bindings();
        self.recording = true;

        let framebuffer = swapchain.framebuffers()[image_index].clone();
        self.main_target = Some(MainTarget {
            framebuffer: framebuffer.clone(),
            load_pass: swapchain.load_pass().clone(),
        });
        self.begin_render_pass(swapchain.clear_pass().clone(), framebuffer)?;
        Ok(true)
    }

    /// 结束录制、提交并 present
    ///
    /// 返回 false 表示 swapchain 已经过期，帧仍然被提交，槽位照常推进
    pub fn present(&mut self, swapchain: &VkSwapchain) -> GraphicsResult<bool> {
        let _span = tracy_client::span!("VkCommandQueue::present");
        self.check_recording("present")?;
        self.end_render_pass();

        let slot = &self.slots[self.frame_index];
        let (cmd, fence) = (slot.cmd, slot.in_flight.handle());
        let (image_available, render_finished) = (slot.image_available.handle(), slot.render_finished.handle());
        self.device.cmd_end_label(cmd);
        unsafe { self.device.end_command_buffer(cmd) }.vk_context("vkEndCommandBuffer")?;

        let wait_semaphores = [image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [render_finished];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(std::slice::from_ref(&cmd))
            .signal_semaphores(&signal_semaphores);

        // 无论提交是否成功，都回到 Idle
        self.recording = false;
        self.main_target = None;
        self.clear_bindings();

        unsafe {
            self.device.queue_submit(
                self.device.graphics_queue(),
                std::slice::from_ref(&submit_info),
                fence,
            )
        }
        .vk_context("vkQueueSubmit")?;

        let presented = swapchain.present(render_finished, self.image_index)?;
        self.frame_index = (self.frame_index + 1) % self.slots.len();
        Ok(presented)
    }
}

// tools
impl VkCommandQueue {
    fn check_recording(&self, what: &str) -> GraphicsResult<()> {
        if self.recording {
            Ok(())
        } else {
            Err(GraphicsError::InvalidOperation(format!("{what} outside of prepare/present")))
        }
    }

    fn clear_bindings(&mut self) {
        self.pipeline = None;
        self.compute_pipeline = None;
        self.shader_resources.clear();
        self.vertex_buffers.clear();
        self.index_buffer = None;
        self.push_constants.clear();
    }

    fn end_render_pass(&mut self) {
        if self.active_framebuffer.take().is_some() {
            unsafe { self.device.cmd_end_render_pass(self.cmd()) };
        }
    }

    /// 从不重叠两个 render pass：先结束当前的，再开始新的
    fn begin_render_pass(&mut self, render_pass: Rc<dyn RenderPass>, framebuffer: Rc<dyn Framebuffer>) -> GraphicsResult<()> {
        if render_pass.layout().desc() != framebuffer.layout().desc() {
            return Err(GraphicsError::InvalidArgument(
                "render pass and framebuffer have incompatible layouts".to_string(),
            ));
        }
        self.end_render_pass();

        let vk_pass: &VkRenderPass = vk_cast(render_pass.as_ref());
        let vk_framebuffer: &VkFramebuffer = vk_cast(framebuffer.as_ref());
        let extent = framebuffer.extent();
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_pass.handle())
            .framebuffer(vk_framebuffer.handle())
            .render_area(convert_to_vk_rect(&Rect2D::from_extent(extent)))
            .clear_values(vk_pass.clear_values());
        unsafe {
            self.device.cmd_begin_render_pass(self.cmd(), &begin_info, vk::SubpassContents::INLINE);
        }
        self.active_framebuffer = Some(framebuffer);
        Ok(())
    }

    fn flush_shader_resources_and_constants(&self, bind_point: vk::PipelineBindPoint, layout: vk::PipelineLayout) {
        let cmd = self.cmd();
        for (set, resources) in &self.shader_resources {
            let handle = vk_cast::<VkShaderResources, _>(resources.as_ref()).handle();
            unsafe {
                self.device.cmd_bind_descriptor_sets(cmd, bind_point, layout, *set, std::slice::from_ref(&handle), &[]);
            }
        }
        for (stage, offset, data) in &self.push_constants {
            unsafe {
                self.device.cmd_push_constants(cmd, layout, convert_to_vk_shader_stage(*stage), *offset, data);
            }
        }
    }

    /// draw 之前把最近一次设置的状态全部绑定
    fn flush_graphics_state(&mut self) -> GraphicsResult<()> {
        let Some(framebuffer) = self.active_framebuffer.clone() else {
            return Err(GraphicsError::InvalidOperation("draw outside of a render pass".to_string()));
        };
        let Some(pipeline) = self.pipeline.clone() else {
            return Err(GraphicsError::InvalidOperation("draw without a pipeline".to_string()));
        };

        let behavior = pipeline.behavior_flags();
        match pipeline.render_pass_layout() {
            None => pipeline.set_render_pass_layout(framebuffer.layout()),
            Some(layout) if layout.desc() != framebuffer.layout().desc() => {
                return Err(GraphicsError::InvalidOperation(
                    "pipeline was built for an incompatible render pass layout".to_string(),
                ));
            }
            Some(_) => {}
        }

        let cmd = self.cmd();
        let (native, layout) = vk_cast::<VkGraphicsPipeline, _>(pipeline.as_ref()).native()?;
        unsafe {
            self.device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, native);
        }
        if behavior.contains(PipelineBehaviorFlags::AUTO_RESIZE_VIEWPORT) {
            let viewport = convert_to_vk_viewport(&Viewport::from_extent(framebuffer.extent()));
            unsafe { self.device.cmd_set_viewport(cmd, 0, std::slice::from_ref(&viewport)) };
        }
        if behavior.contains(PipelineBehaviorFlags::AUTO_RESIZE_SCISSOR) {
            let scissor = convert_to_vk_rect(&Rect2D::from_extent(framebuffer.extent()));
            unsafe { self.device.cmd_set_scissor(cmd, 0, std::slice::from_ref(&scissor)) };
        }

        self.flush_shader_resources_and_constants(vk::PipelineBindPoint::GRAPHICS, layout);
        for (binding, buffer) in &self.vertex_buffers {
            let handle = vk_cast::<VkVertexBuffer, _>(buffer.as_ref()).handle();
            unsafe {
                self.device.cmd_bind_vertex_buffers(cmd, *binding, std::slice::from_ref(&handle), &[0]);
            }
        }
        Ok(())
    }
}

impl Drop for VkCommandQueue {
    fn drop(&mut self) {
        // 持有者保证 device 已经 idle；command buffer 随 pool 一起释放
        let cmds = self.slots.iter().map(|slot| slot.cmd).collect_vec();
        self.slots.clear();
        unsafe {
            if !cmds.is_empty() {
                self.device.free_command_buffers(self.pool, &cmds);
            }
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}

impl GraphicsCommandQueue for VkCommandQueue {
    fn current_frame_index(&self) -> usize {
        self.frame_index
    }

    fn current_image_index(&self) -> usize {
        self.image_index
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn set_pipeline(&mut self, pipeline: Rc<dyn GraphicsPipeline>) {
        self.pipeline = Some(pipeline);
    }

    fn set_compute_pipeline(&mut self, pipeline: Rc<dyn ComputePipeline>) {
        self.compute_pipeline = Some(pipeline);
    }

    fn set_shader_resources(&mut self, set: u32, resources: Rc<dyn ShaderResources>) {
        self.shader_resources.insert(set, resources);
    }

    fn clear_shader_resources(&mut self, set: u32) {
        self.shader_resources.remove(&set);
    }

    fn set_vertex_buffer(&mut self, binding: u32, buffer: Rc<dyn VertexBuffer>) {
        self.vertex_buffers.insert(binding, buffer);
    }

    fn set_index_buffer(&mut self, buffer: Rc<dyn IndexBuffer>) {
        self.index_buffer = Some(buffer);
    }

    fn set_push_constants(&mut self, stage: ShaderStage, offset: u32, data: &[u8]) {
        self.push_constants.retain(|(s, o, _)| !(*s == stage && *o == offset));
        self.push_constants.push((stage, offset, data.to_vec()));
    }

    fn set_framebuffers(&mut self, render_pass: Rc<dyn RenderPass>, framebuffer: Rc<dyn Framebuffer>) -> GraphicsResult<()> {
        self.check_recording("set_framebuffers")?;
        self.begin_render_pass(render_pass, framebuffer)
    }

    fn reset_framebuffers(&mut self) -> GraphicsResult<()> {
        self.check_recording("reset_framebuffers")?;
        let Some(main) = &self.main_target else {
            return Err(GraphicsError::InvalidOperation("no main framebuffer for this frame".to_string()));
        };
        let (load_pass, framebuffer) = (main.load_pass.clone(), main.framebuffer.clone());
        self.begin_render_pass(load_pass, framebuffer)
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> GraphicsResult<()> {
        self.check_recording("draw")?;
        self.flush_graphics_state()?;
        unsafe {
            self.device.cmd_draw(self.cmd(), vertex_count, instance_count, first_vertex, first_instance);
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> GraphicsResult<()> {
        self.check_recording("draw_indexed")?;
        let Some(index_buffer) = self.index_buffer.clone() else {
            return Err(GraphicsError::InvalidOperation("draw_indexed without an index buffer".to_string()));
        };
        if first_index as u64 + index_count as u64 > index_buffer.index_count() as u64 {
            return Err(GraphicsError::InvalidArgument(format!(
                "draw_indexed reads {index_count} indices from {first_index}, buffer holds {}",
                index_buffer.index_count()
            )));
        }
        self.flush_graphics_state()?;

        let cmd = self.cmd();
        let handle = vk_cast::<VkIndexBuffer, _>(index_buffer.as_ref()).handle();
        unsafe {
            self.device
                .cmd_bind_index_buffer(cmd, handle, 0, convert_to_vk_index_type(index_buffer.index_format()));
            self.device.cmd_draw_indexed(cmd, index_count, instance_count, first_index, vertex_offset, first_instance);
        }
        Ok(())
    }

    fn dispatch(&mut self, group_x: u32, group_y: u32, group_z: u32) -> GraphicsResult<()> {
        self.check_recording("dispatch")?;
        let Some(pipeline) = self.compute_pipeline.clone() else {
            return Err(GraphicsError::InvalidOperation("dispatch without a compute pipeline".to_string()));
        };
        self.end_render_pass();

        let cmd = self.cmd();
        let (native, layout) = vk_cast::<VkComputePipeline, _>(pipeline.as_ref()).native()?;
        unsafe {
            self.device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::COMPUTE, native);
        }
        self.flush_shader_resources_and_constants(vk::PipelineBindPoint::COMPUTE, layout);
        unsafe {
            self.device.cmd_dispatch(cmd, group_x, group_y, group_z);
        }
        Ok(())
    }
}
