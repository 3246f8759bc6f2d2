use vesper_graphics::GraphicsResult;
use vesper_graphics::config::GraphicsConfig;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::platform::WinitPlatform;
use crate::renderer::Renderer;

pub struct VesperApp {
    config: GraphicsConfig,

    // renderer 必须先于 window 析构
    renderer: Option<Renderer>,
    window: Option<Window>,
}

// new & init
impl VesperApp {
    pub fn new(config: GraphicsConfig) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
        }
    }

    /// 在 window 创建之后调用，初始化 Renderer
    fn init_after_window(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attr = Window::default_attributes()
            .with_title(self.config.app_name.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(self.config.width, self.config.height));
        let window = event_loop.create_window(window_attr)?;

        let renderer = Renderer::new(&self.config, &WinitPlatform::new(&window))?;
        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }
}

// frame
impl VesperApp {
    fn redraw(&mut self) -> GraphicsResult<()> {
        let (Some(renderer), Some(window)) = (self.renderer.as_mut(), self.window.as_ref()) else {
            return Ok(());
        };
        if !renderer.render_frame()? {
            // swapchain 过期，按窗口当前大小重建
            let size = window.inner_size();
            renderer.resize(size.width, size.height)?;
        }
        Ok(())
    }

    fn on_key(&mut self, event: &KeyEvent) -> GraphicsResult<()> {
        if event.state != ElementState::Pressed || event.repeat {
            return Ok(());
        }
        match (event.physical_key, self.renderer.as_mut()) {
            (PhysicalKey::Code(KeyCode::KeyM), Some(renderer)) => renderer.toggle_msaa(),
            _ => Ok(()),
        }
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(renderer) = &self.renderer {
            if let Err(e) = renderer.wait_idle() {
                log::error!("wait idle before exit: {e}");
            }
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for VesperApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        log::info!("winit event: resumed");
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init_after_window(event_loop) {
            log::error!("failed to init renderer: {e:#}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let result = match event {
            WindowEvent::CloseRequested => {
                self.exit(event_loop);
                Ok(())
            }
            WindowEvent::Resized(size) => match self.renderer.as_mut() {
                Some(renderer) => renderer.resize(size.width, size.height),
                None => Ok(()),
            },
            WindowEvent::KeyboardInput { event, .. } => self.on_key(&event),
            WindowEvent::RedrawRequested => self.redraw(),
            _ => Ok(()),
        };

        if let Err(e) = result {
            log::error!("{e}");
            self.exit(event_loop);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        log::warn!("winit event: suspended");
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("loop exiting");
    }
}
