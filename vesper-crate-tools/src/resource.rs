use std::path::{Path, PathBuf};

/// 统一资源路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// # 使用示例
/// ```ignore
/// let config = VesperPath::config_path();                  // vesper.toml
/// let shader = VesperPath::shader_path("triangle.vert");   // shader/.build/triangle.vert.spv
/// ```
pub struct VesperPath {}
// 核心路径
impl VesperPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
    }

    pub fn target_path() -> PathBuf {
        Self::workspace_path().join("target")
    }

    /// 工作区根目录下的 `vesper.toml`
    pub fn config_path() -> PathBuf {
        Self::workspace_path().join("vesper.toml")
    }
}
// 根目录下
impl VesperPath {
    /// 获取 `assets/` 目录下的文件路径
    pub fn assets_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("assets").join(filename)
    }

    pub fn shader_root_path() -> PathBuf {
        Self::workspace_path().join("shader")
    }

    /// 获取 `shader/.build/` 目录下编译好的 SPIR-V
    pub fn shader_path(filename: &str) -> PathBuf {
        Self::shader_root_path().join(".build").join(format!("{filename}.spv"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_workspace() {
        let root = VesperPath::workspace_path();
        assert!(VesperPath::config_path().starts_with(&root));
        assert_eq!(VesperPath::config_path().file_name().and_then(|n| n.to_str()), Some("vesper.toml"));
        assert!(VesperPath::assets_path("a.png").ends_with("assets/a.png"));
    }

    #[test]
    fn test_shader_path_suffix() {
        let p = VesperPath::shader_path("clear.frag");
        assert_eq!(p.file_name().and_then(|n| n.to_str()), Some("clear.frag.spv"));
        assert!(p.parent().is_some_and(|d| d.ends_with(".build")));
    }
}
