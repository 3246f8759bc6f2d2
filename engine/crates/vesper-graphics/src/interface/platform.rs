use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::basic::error::{GraphicsError, GraphicsResult};
use crate::basic::graphics_type::Extent2D;

/// 窗口系统提供给图形层的信息
///
/// 只在 context 构造与 resize 时被访问
pub trait PlatformContext {
    /// framebuffer 的像素尺寸
    fn window_size(&self) -> Extent2D;

    fn raw_display_handle(&self) -> GraphicsResult<RawDisplayHandle>;

    fn raw_window_handle(&self) -> GraphicsResult<RawWindowHandle>;
}

/// 没有窗口的 platform，只提供尺寸
#[derive(Debug, Clone, Copy)]
pub struct HeadlessPlatform {
    pub size: Extent2D,
}

impl HeadlessPlatform {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Extent2D::new(width, height),
        }
    }
}

impl PlatformContext for HeadlessPlatform {
    fn window_size(&self) -> Extent2D {
        self.size
    }

    fn raw_display_handle(&self) -> GraphicsResult<RawDisplayHandle> {
        Err(GraphicsError::MissingPlatform)
    }

    fn raw_window_handle(&self) -> GraphicsResult<RawWindowHandle> {
        Err(GraphicsError::MissingPlatform)
    }
}
