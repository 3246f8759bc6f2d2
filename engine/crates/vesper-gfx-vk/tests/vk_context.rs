//! 需要真实的窗口和 GPU，使用 `cargo test -- --ignored` 运行

use std::time::{Duration, Instant};

use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use vesper_graphics::GraphicsResult;
use vesper_graphics::basic::graphics_func::{Geometry, GeometryVertex};
use vesper_graphics::basic::graphics_type::{Extent2D, MemoryProperty};
use vesper_graphics::config::GraphicsConfig;
use vesper_graphics::interface::buffer::Buffer;
use vesper_graphics::interface::context::GraphicsContext;
use vesper_graphics::interface::platform::PlatformContext;
use vesper_gfx_vk::VkContext;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

struct TestPlatform<'a>(&'a Window);

impl PlatformContext for TestPlatform<'_> {
    fn window_size(&self) -> Extent2D {
        let size = self.0.inner_size();
        Extent2D::new(size.width, size.height)
    }

    fn raw_display_handle(&self) -> GraphicsResult<RawDisplayHandle> {
        Ok(self.0.display_handle()?.as_raw())
    }

    fn raw_window_handle(&self) -> GraphicsResult<RawWindowHandle> {
        Ok(self.0.window_handle()?.as_raw())
    }
}

/// 在 resumed 中执行一次 body，然后退出
struct OneShot<F: FnMut(&Window)> {
    body: F,
    done: bool,
}

impl<F: FnMut(&Window)> ApplicationHandler for OneShot<F> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.done {
            return;
        }
        let attr = Window::default_attributes()
            .with_title("vesper-gfx-vk test")
            .with_inner_size(winit::dpi::PhysicalSize::new(800, 600));
        let window = event_loop.create_window(attr).unwrap();
        (self.body)(&window);
        self.done = true;
        event_loop.exit();
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _window_id: WindowId, _event: WindowEvent) {}
}

fn build_event_loop() -> EventLoop<()> {
    vesper_crate_tools::init_log::init_log();

    let mut builder = EventLoop::builder();
    #[cfg(target_os = "linux")]
    winit::platform::x11::EventLoopBuilderExtX11::with_any_thread(&mut builder, true);
    #[cfg(target_os = "windows")]
    winit::platform::windows::EventLoopBuilderExtWindows::with_any_thread(&mut builder, true);
    builder.build().unwrap()
}

fn run_with_window(body: impl FnMut(&Window)) {
    let mut app = OneShot { body, done: false };
    build_event_loop().run_app(&mut app).unwrap();
    assert!(app.done);
}

fn test_config() -> GraphicsConfig {
    GraphicsConfig {
        width: 800,
        height: 600,
        msaa: false,
        ..Default::default()
    }
}

const RESIZE_TARGET: PhysicalSize<u32> = PhysicalSize::new(1920, 1080);
/// window manager 可能不接受请求的尺寸，超时后以窗口实际尺寸为准
const RESIZE_TIMEOUT: Duration = Duration::from_secs(3);

/// 800x600 创建 context 和 buffer，然后把窗口调整到 1920x1080，等窗口尺寸生效后再 resize context
///
/// surface 的 current_extent 跟随窗口，所以 context 的尺寸以窗口实际尺寸为准
#[derive(Default)]
struct ResizeScenario {
    // ctx 必须先于 window 析构
    ctx: Option<VkContext>,
    window: Option<Window>,
    deadline: Option<Instant>,
    checked: Option<PhysicalSize<u32>>,
}

impl ResizeScenario {
    fn create(&mut self, event_loop: &ActiveEventLoop) {
        let attr = Window::default_attributes()
            .with_title("vesper-gfx-vk resize")
            .with_inner_size(PhysicalSize::new(800, 600));
        let window = event_loop.create_window(attr).unwrap();

        let ctx = VkContext::new(&test_config(), &TestPlatform(&window)).unwrap();
        assert!(!ctx.msaa_state());
        assert!(ctx.frame_count() >= 2);

        let vertex = GeometryVertex {
            position: [0.0, 0.5, 0.0],
            normal: [0.0, 0.0, 1.0],
            uv: [0.5, 0.0],
        };
        let triangle = Geometry {
            vertices: vec![vertex; 3],
            indices: vec![0, 1, 2],
        };
        let vb = ctx
            .create_vertex_buffer(MemoryProperty::Static, GeometryVertex::STRIDE, 3, Some(triangle.vertex_bytes()))
            .unwrap();
        assert_eq!(vb.size(), 3 * GeometryVertex::STRIDE as u64);

        let applied = window.request_inner_size(RESIZE_TARGET);
        self.ctx = Some(ctx);
        self.window = Some(window);
        self.deadline = Some(Instant::now() + RESIZE_TIMEOUT);
        if let Some(size) = applied {
            self.check_resize(event_loop, size);
        }
    }

    fn check_resize(&mut self, event_loop: &ActiveEventLoop, size: PhysicalSize<u32>) {
        let ctx = self.ctx.as_mut().unwrap();
        ctx.resize(size.width, size.height).unwrap();

        let extent = Extent2D::new(size.width, size.height);
        assert_eq!(ctx.size(), extent);
        for index in 0..ctx.frame_count() {
            let fb = ctx.main_framebuffer(index).unwrap();
            assert_eq!((fb.width(), fb.height()), (extent.width, extent.height));
        }
        ctx.wait_idle().unwrap();

        self.checked = Some(size);
        event_loop.exit();
    }
}

impl ApplicationHandler for ResizeScenario {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            event_loop.set_control_flow(ControlFlow::Poll);
            self.create(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if let WindowEvent::Resized(size) = event {
            if self.checked.is_none() && size == RESIZE_TARGET {
                self.check_resize(event_loop, size);
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let timed_out = self.deadline.is_some_and(|deadline| Instant::now() >= deadline);
        if self.checked.is_none() && timed_out {
            let size = self.window.as_ref().unwrap().inner_size();
            log::warn!("window manager kept the window at {size:?}");
            self.check_resize(event_loop, size);
        }
    }
}

#[test]
#[ignore]
fn test_context_buffer_and_resize() {
    let mut scenario = ResizeScenario::default();
    build_event_loop().run_app(&mut scenario).unwrap();
    assert!(scenario.checked.is_some());
}

#[test]
#[ignore]
fn test_clear_frames() {
    run_with_window(|window| {
        let mut ctx = VkContext::new(&test_config(), &TestPlatform(window)).unwrap();
        let mut presented = 0;
        for _ in 0..8 {
            if ctx.prepare().unwrap() && ctx.present().unwrap() {
                presented += 1;
            }
        }
        assert!(presented > 0);
        ctx.wait_idle().unwrap();
    });
}
