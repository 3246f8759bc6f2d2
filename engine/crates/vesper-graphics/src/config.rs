use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::basic::error::{GraphicsError, GraphicsResult};
use crate::basic::graphics_type::{Extent2D, GraphicsBackend};

/// 创建 GraphicsContext 时使用的配置
///
/// ```toml
/// app_name = "vesper"
/// backend = "vulkan"
/// width = 1280
/// height = 720
/// msaa = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub app_name: String,
    pub backend: GraphicsBackend,
    pub width: u32,
    pub height: u32,
    pub msaa: bool,
    /// 是否开启 validation layer 与 debug messenger
    pub validation: bool,
    /// 优先使用 mailbox，不支持时退回 FIFO
    pub prefer_mailbox: bool,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            app_name: "vesper".to_string(),
            backend: GraphicsBackend::Vulkan,
            width: 800,
            height: 600,
            msaa: false,
            validation: cfg!(debug_assertions),
            prefer_mailbox: true,
        }
    }
}

impl GraphicsConfig {
    pub fn from_toml_str(text: &str) -> GraphicsResult<Self> {
        toml::from_str(text).map_err(|e| GraphicsError::Config(e.to_string()))
    }

    /// 从文件读取配置，文件不存在时使用默认值
    pub fn load(path: impl AsRef<Path>) -> GraphicsResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| GraphicsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::info!("config loaded from {}: {:?}", path.display(), config);
        Ok(config)
    }

    #[inline]
    pub fn extent(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = GraphicsConfig::from_toml_str("backend = \"null\"\nwidth = 1920\nheight = 1080\n").unwrap();
        assert_eq!(config.backend, GraphicsBackend::Null);
        assert_eq!(config.extent(), Extent2D::new(1920, 1080));
        assert!(!config.msaa);
        assert_eq!(config.app_name, "vesper");
    }

    #[test]
    fn test_invalid_toml() {
        let err = GraphicsConfig::from_toml_str("backend = \"dx11\"").unwrap_err();
        assert!(matches!(err, GraphicsError::Config(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = GraphicsConfig::load("definitely/not/here/vesper.toml").unwrap();
        assert_eq!(config, GraphicsConfig::default());
        assert_eq!(config.extent(), Extent2D::new(800, 600));
    }
}
