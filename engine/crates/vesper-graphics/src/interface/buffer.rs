use crate::basic::error::{GraphicsError, GraphicsResult};
use crate::basic::graphics_type::{IndexFormat, MemoryProperty};
use crate::interface::resource::GraphicsResource;

/// 所有 buffer 共同的接口
pub trait Buffer: GraphicsResource {
    /// 字节数
    fn size(&self) -> u64;

    fn property(&self) -> MemoryProperty;

    /// 从 offset 开始写入 data
    ///
    /// 只有 Dynamic 与 Staging 的 buffer 可以写入，Static 返回 InvalidOperation；越界返回 InvalidArgument
    fn update(&self, offset: u64, data: &[u8]) -> GraphicsResult<()>;
}

pub trait VertexBuffer: Buffer {
    /// 单个顶点的字节数
    fn element_size(&self) -> u32;

    fn element_count(&self) -> u32;
}

pub trait IndexBuffer: Buffer {
    fn index_format(&self) -> IndexFormat;

    fn index_count(&self) -> u32;
}

pub trait ConstantBuffer: Buffer {}

pub trait StructuredBuffer: Buffer {
    fn element_size(&self) -> u32;

    fn element_count(&self) -> u32;

    /// 读回整个 buffer 的内容，只支持 host visible 的 buffer
    fn fetch(&self) -> GraphicsResult<Vec<u8>>;
}

/// 检查初始数据与 buffer 大小一致
pub fn validate_buffer_data(size: u64, data: Option<&[u8]>) -> GraphicsResult<()> {
    if size == 0 {
        return Err(GraphicsError::InvalidArgument("buffer size must not be 0".to_string()));
    }
    match data {
        Some(data) if data.len() as u64 != size => Err(GraphicsError::InvalidArgument(format!(
            "initial data is {} bytes, buffer is {size} bytes",
            data.len()
        ))),
        _ => Ok(()),
    }
}

/// 检查一次 update 是否合法
pub fn validate_buffer_update(property: MemoryProperty, size: u64, offset: u64, data: &[u8]) -> GraphicsResult<()> {
    if !property.is_host_visible() {
        return Err(GraphicsError::InvalidOperation("static buffer cannot be updated".to_string()));
    }
    match offset.checked_add(data.len() as u64) {
        Some(end) if end <= size => Ok(()),
        _ => Err(GraphicsError::InvalidArgument(format!(
            "update of {} bytes at offset {offset} exceeds buffer size {size}",
            data.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_buffer_data() {
        assert!(validate_buffer_data(12, Some(&[0u8; 12])).is_ok());
        assert!(validate_buffer_data(12, None).is_ok());
        assert!(validate_buffer_data(12, Some(&[0u8; 8])).is_err());
        assert!(validate_buffer_data(0, None).is_err());
    }

    #[test]
    fn test_validate_buffer_update() {
        assert!(validate_buffer_update(MemoryProperty::Dynamic, 16, 8, &[0u8; 8]).is_ok());
        assert!(matches!(
            validate_buffer_update(MemoryProperty::Dynamic, 16, 9, &[0u8; 8]),
            Err(GraphicsError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_buffer_update(MemoryProperty::Static, 16, 0, &[0u8; 4]),
            Err(GraphicsError::InvalidOperation(_))
        ));
        assert!(validate_buffer_update(MemoryProperty::Staging, 16, u64::MAX, &[0u8; 1]).is_err());
    }
}
