use std::path::Path;
use std::rc::Rc;

use glam::{Mat4, Quat, Vec3};
use vesper_crate_tools::resource::VesperPath;
use vesper_graphics::basic::graphics_type::{PushConstantRange, ShaderStage};
use vesper_graphics::config::GraphicsConfig;
use vesper_graphics::interface::context::GraphicsContext;
use vesper_graphics::interface::platform::PlatformContext;
use vesper_graphics::{GraphicsError, GraphicsResult};
use vesper_render::create_graphics_context;
use vesper_render::material::Material;
use vesper_render::mesh::Mesh;
use vesper_render::render_queue::{InstanceData, RenderQueue};

/// 相机矩阵通过 push constant 传给 vertex shader
const CAMERA_PUSH_CONSTANT: PushConstantRange = PushConstantRange {
    stage: ShaderStage::VERTEX,
    offset: 0,
    size: 64,
};

/// 一排旋转的立方体
struct Scene {
    material: Rc<Material>,
    cube: Rc<Mesh>,
}

impl Scene {
    fn load(ctx: &dyn GraphicsContext) -> GraphicsResult<Self> {
        let read = |name: &str| {
            let path = VesperPath::shader_path(name);
            std::fs::read(&path).map_err(|source| GraphicsError::Io { path, source })
        };
        let shader = ctx.create_graphics_shader(&read("mesh.vert")?, &read("mesh.frag")?)?;

        let pipeline = ctx.create_graphics_pipeline()?;
        pipeline.set_shader(shader);
        pipeline.set_vertex_input_layout(ctx.create_vertex_input_layout(&InstanceData::instanced_vertex_input_layout_desc())?);
        pipeline.set_depth_test(true);
        pipeline.set_depth_write(true);
        pipeline.add_push_constant_range(CAMERA_PUSH_CONSTANT);

        Ok(Self {
            material: Rc::new(Material::new("lambert", pipeline)),
            cube: Rc::new(Mesh::cube(ctx)?),
        })
    }
}

/// 持有 GraphicsContext，驱动每一帧
pub struct Renderer {
    ctx: Box<dyn GraphicsContext>,
    queue: RenderQueue,
    /// shader 不存在时只清屏
    scene: Option<Scene>,
    frame: u64,
}

// new & init
impl Renderer {
    pub fn new(config: &GraphicsConfig, platform: &dyn PlatformContext) -> GraphicsResult<Self> {
        let ctx = create_graphics_context(config, platform)?;
        let scene = if Path::new(&VesperPath::shader_path("mesh.vert")).exists() {
            Some(Scene::load(ctx.as_ref())?)
        } else {
            log::warn!("compiled shaders not found under {:?}, only clearing the screen", VesperPath::shader_root_path());
            None
        };

        Ok(Self {
            ctx,
            queue: RenderQueue::new(),
            scene,
            frame: 0,
        })
    }
}

// tools
impl Renderer {
    pub fn resize(&mut self, width: u32, height: u32) -> GraphicsResult<()> {
        self.ctx.resize(width, height)?;
        self.sync_render_pass_layout();
        Ok(())
    }

    pub fn toggle_msaa(&mut self) -> GraphicsResult<()> {
        let enabled = !self.ctx.msaa_state();
        self.ctx.set_msaa_state(enabled)?;
        if enabled {
            log::info!("msaa samples: {:?}", self.ctx.max_msaa_samples());
        }
        self.sync_render_pass_layout();
        Ok(())
    }

    /// MSAA 切换之后主 framebuffer 的 layout 变了，pipeline 需要跟着重建
    fn sync_render_pass_layout(&self) {
        if let Some(scene) = &self.scene {
            scene.material.pipeline().set_render_pass_layout(self.ctx.main_render_pass_layout());
        }
    }

    pub fn wait_idle(&self) -> GraphicsResult<()> {
        self.ctx.wait_idle()
    }

    /// 返回 false 表示 swapchain 需要重建
    pub fn render_frame(&mut self) -> GraphicsResult<bool> {
        let _span = tracy_client::span!("Renderer::render_frame");
        if !self.ctx.prepare()? {
            return Ok(false);
        }

        if let Some(scene) = &self.scene {
            let extent = self.ctx.size();
            let aspect = extent.width as f32 / extent.height.max(1) as f32;
            let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 6.0), Vec3::ZERO, Vec3::Y);
            let view_proj = Mat4::perspective_rh(60f32.to_radians(), aspect, 0.1, 100.0) * view;

            let angle = self.frame as f32 * 0.01;
            self.queue.open();
            for i in -2..=2 {
                let model = Mat4::from_rotation_translation(Quat::from_rotation_y(angle), Vec3::new(i as f32 * 1.5, 0.0, 0.0));
                self.queue.push(&scene.material, &scene.cube, 0, model)?;
            }
            self.queue.close()?;

            self.ctx.command_queue().set_push_constants(
                CAMERA_PUSH_CONSTANT.stage,
                CAMERA_PUSH_CONSTANT.offset,
                bytemuck::cast_slice(&view_proj.to_cols_array()),
            );
            self.queue.render(self.ctx.as_mut())?;
        }

        self.frame += 1;
        self.ctx.present()
    }
}
