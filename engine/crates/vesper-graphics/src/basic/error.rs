//! 图形层统一的错误类型
//!
//! 所有跨越抽象边界的失败都以 [`GraphicsError`] 表示。
//! 构造期的致命错误在返回之前先以 `[fatal]` 前缀写入日志，调用方视其为不可恢复。

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphicsError {
    /// native 图形 API 调用返回了非 success 的结果
    #[error("{call} failed: {result}")]
    Vulkan { call: &'static str, result: String },

    /// 设备或格式不支持请求的功能
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// 在错误的状态下调用（例如在 render pass 之外 draw）
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("no suitable physical device")]
    NoSuitableDevice,

    /// platform 没有提供创建 surface 所需的窗口句柄
    #[error("platform context is missing a window handle")]
    MissingPlatform,

    #[error("window handle error: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),
}

pub type GraphicsResult<T> = Result<T, GraphicsError>;

impl GraphicsError {
    /// 记录一条致命错误日志并原样返回，便于 `map_err(GraphicsError::fatal)` 的写法
    pub fn fatal(self) -> Self {
        log::error!("[fatal] {self}");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::Vulkan {
            call: "vkCreateDevice",
            result: "ERROR_INITIALIZATION_FAILED".to_string(),
        };
        assert_eq!(err.to_string(), "vkCreateDevice failed: ERROR_INITIALIZATION_FAILED");

        let err = GraphicsError::InvalidOperation("draw outside render pass".to_string());
        assert!(err.to_string().contains("draw outside render pass"));
    }

    #[test]
    fn test_fatal_returns_same_error() {
        let err = GraphicsError::NoSuitableDevice.fatal();
        assert!(matches!(err, GraphicsError::NoSuitableDevice));
    }

    #[test]
    fn test_window_handle_error_converts() {
        fn platform_handle() -> GraphicsResult<()> {
            Err(raw_window_handle::HandleError::Unavailable)?;
            Ok(())
        }
        let err = platform_handle().unwrap_err();
        assert!(matches!(err, GraphicsError::WindowHandle(raw_window_handle::HandleError::Unavailable)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
