use std::collections::BTreeMap;
use std::rc::Rc;

use crate::basic::error::{GraphicsError, GraphicsResult};
use crate::basic::graphics_type::{AttachmentLoadOp, Extent2D, PipelineBehaviorFlags, Rect2D, ShaderStage, Viewport};
use crate::interface::buffer::{IndexBuffer, VertexBuffer};
use crate::interface::command_queue::GraphicsCommandQueue;
use crate::interface::pipeline::{ComputePipeline, GraphicsPipeline};
use crate::interface::render_pass::{Framebuffer, RenderPass};
use crate::interface::shader_resources::ShaderResources;
use crate::null::buffer::{NullIndexBuffer, NullVertexBuffer};
use crate::null::pipeline::{NullComputePipeline, NullGraphicsPipeline};
use crate::null::render_pass::NullFramebuffer;
use crate::null::shader_resources::NullShaderResources;
use crate::null::swapchain::NullSwapchain;
use crate::null::{NullResourceId, null_cast};

/// null command queue 记录下来的命令
#[derive(Debug, Clone, PartialEq)]
pub enum NullCommand {
    BeginRenderPass {
        framebuffer: u64,
        load_op: AttachmentLoadOp,
        extent: Extent2D,
    },
    EndRenderPass,
    BindPipeline {
        pipeline: u64,
    },
    BindComputePipeline {
        pipeline: u64,
    },
    SetViewport(Viewport),
    SetScissor(Rect2D),
    BindShaderResources {
        set: u32,
        resources: u64,
    },
    BindVertexBuffer {
        binding: u32,
        buffer: u64,
    },
    BindIndexBuffer {
        buffer: u64,
    },
    PushConstants {
        stage: ShaderStage,
        offset: u32,
        size: u32,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    Present {
        image_index: usize,
    },
}

/// 本帧的主 framebuffer 与 load pass，在 prepare 时从 swapchain 取得
struct MainTarget {
    framebuffer: Rc<dyn Framebuffer>,
    load_pass: Rc<dyn RenderPass>,
}

/// 与 Vulkan command queue 相同的状态机：Idle -prepare-> Recording -present-> Idle
pub struct NullCommandQueue {
    frame_count: usize,
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

    commands: Vec<NullCommand>,
    presented_frames: u64,
}

// new & init
impl NullCommandQueue {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frame_count,
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
            commands: Vec::new(),
            presented_frames: 0,
        }
    }
}

// getters
impl NullCommandQueue {
    /// 当前（或最近一次）录制的命令
    #[inline]
    pub fn commands(&self) -> &[NullCommand] {
        &self.commands
    }

    #[inline]
    pub fn presented_frames(&self) -> u64 {
        self.presented_frames
    }

    #[inline]
    pub fn in_render_pass(&self) -> bool {
        self.active_framebuffer.is_some()
    }
}

// frame
impl NullCommandQueue {
    pub fn prepare(&mut self, swapchain: &mut NullSwapchain) -> GraphicsResult<()> {
        if self.recording {
            return Err(GraphicsError::InvalidOperation("prepare called twice without present".to_string()));
        }
        self.image_index = swapchain.acquire_next_image();
        self.commands.clear();
        self.clear_bindings();
        self.recording = true;

        let framebuffer = swapchain.framebuffers()[self.image_index].clone();
        self.main_target = Some(MainTarget {
            framebuffer: framebuffer.clone(),
            load_pass: swapchain.load_pass().clone(),
        });
        self.begin_render_pass(swapchain.clear_pass().clone(), framebuffer)
    }

    pub fn present(&mut self) -> GraphicsResult<()> {
        self.check_recording("present")?;
        self.end_render_pass();
        self.commands.push(NullCommand::Present {
            image_index: self.image_index,
        });

        self.recording = false;
        self.main_target = None;
        self.clear_bindings();
        self.frame_index = (self.frame_index + 1) % self.frame_count;
        self.presented_frames += 1;
        Ok(())
    }
}

// tools
impl NullCommandQueue {
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
            self.commands.push(NullCommand::EndRenderPass);
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
        self.commands.push(NullCommand::BeginRenderPass {
            framebuffer: null_cast::<NullFramebuffer, _>(framebuffer.as_ref()).resource_id(),
            load_op: render_pass.desc().color_load_op,
            extent: framebuffer.extent(),
        });
        self.active_framebuffer = Some(framebuffer);
        Ok(())
    }

    fn flush_shader_resources_and_constants(&mut self) {
        for (set, resources) in &self.shader_resources {
            self.commands.push(NullCommand::BindShaderResources {
                set: *set,
                resources: null_cast::<NullShaderResources, _>(resources.as_ref()).resource_id(),
            });
        }
        for (stage, offset, data) in &self.push_constants {
            self.commands.push(NullCommand::PushConstants {
                stage: *stage,
                offset: *offset,
                size: data.len() as u32,
            });
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

        let (native, _) = null_cast::<NullGraphicsPipeline, _>(pipeline.as_ref()).native_ids()?;
        self.commands.push(NullCommand::BindPipeline { pipeline: native });
        if behavior.contains(PipelineBehaviorFlags::AUTO_RESIZE_VIEWPORT) {
            self.commands.push(NullCommand::SetViewport(Viewport::from_extent(framebuffer.extent())));
        }
        if behavior.contains(PipelineBehaviorFlags::AUTO_RESIZE_SCISSOR) {
            self.commands.push(NullCommand::SetScissor(Rect2D::from_extent(framebuffer.extent())));
        }

        self.flush_shader_resources_and_constants();
        for (binding, buffer) in &self.vertex_buffers {
            self.commands.push(NullCommand::BindVertexBuffer {
                binding: *binding,
                buffer: null_cast::<NullVertexBuffer, _>(buffer.as_ref()).resource_id(),
            });
        }
        Ok(())
    }
}

impl GraphicsCommandQueue for NullCommandQueue {
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
        self.commands.push(NullCommand::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
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
        self.flush_graphics_state()?;
        self.commands.push(NullCommand::BindIndexBuffer {
            buffer: null_cast::<NullIndexBuffer, _>(index_buffer.as_ref()).resource_id(),
        });
        self.commands.push(NullCommand::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        });
        Ok(())
    }

    fn dispatch(&mut self, group_x: u32, group_y: u32, group_z: u32) -> GraphicsResult<()> {
        self.check_recording("dispatch")?;
        let Some(pipeline) = self.compute_pipeline.clone() else {
            return Err(GraphicsError::InvalidOperation("dispatch without a compute pipeline".to_string()));
        };
        self.end_render_pass();

        let (native, _) = null_cast::<NullComputePipeline, _>(pipeline.as_ref()).native_ids()?;
        self.commands.push(NullCommand::BindComputePipeline { pipeline: native });
        self.flush_shader_resources_and_constants();
        self.commands.push(NullCommand::Dispatch {
            x: group_x,
            y: group_y,
            z: group_z,
        });
        Ok(())
    }
}
