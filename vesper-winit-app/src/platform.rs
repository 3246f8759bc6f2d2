use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use vesper_graphics::GraphicsResult;
use vesper_graphics::basic::graphics_type::Extent2D;
use vesper_graphics::interface::platform::PlatformContext;
use winit::window::Window;

/// 把 winit 的窗口提供给图形层
pub struct WinitPlatform<'a> {
    window: &'a Window,
}

impl<'a> WinitPlatform<'a> {
    pub fn new(window: &'a Window) -> Self {
        Self { window }
    }
}

impl PlatformContext for WinitPlatform<'_> {
    fn window_size(&self) -> Extent2D {
        let size = self.window.inner_size();
        Extent2D::new(size.width, size.height)
    }

    fn raw_display_handle(&self) -> GraphicsResult<RawDisplayHandle> {
        Ok(self.window.display_handle()?.as_raw())
    }

    fn raw_window_handle(&self) -> GraphicsResult<RawWindowHandle> {
        Ok(self.window.window_handle()?.as_raw())
    }
}
