use std::path::Path;

use crate::basic::error::{GraphicsError, GraphicsResult};
use crate::interface::resource::GraphicsResource;

/// 顶点 + 片元 shader
pub trait GraphicsShader: GraphicsResource {
    fn vertex_entry(&self) -> &str;

    fn fragment_entry(&self) -> &str;
}

pub trait ComputeShader: GraphicsResource {
    fn entry(&self) -> &str;
}

/// shader 的入口函数名
pub const SHADER_ENTRY: &str = "main";

/// 从磁盘读取编译好的 shader 字节码，不做任何校验
pub fn read_shader_bytes(path: impl AsRef<Path>) -> GraphicsResult<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|source| GraphicsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_shader() {
        let err = read_shader_bytes("missing/shader.vert.spv").unwrap_err();
        assert!(matches!(err, GraphicsError::Io { .. }));
    }
}
