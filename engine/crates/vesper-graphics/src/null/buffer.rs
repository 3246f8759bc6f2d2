use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::basic::error::{GraphicsError, GraphicsResult};
use crate::basic::graphics_func;
use crate::basic::graphics_type::{GraphicsBackend, IndexFormat, MemoryProperty};
use crate::interface::buffer::{
    Buffer, ConstantBuffer, IndexBuffer, StructuredBuffer, VertexBuffer, validate_buffer_data, validate_buffer_update,
};
use crate::interface::resource::GraphicsResource;
use crate::null::NullResourceId;
use crate::null::device::NullDevice;

/// 所有 null buffer 共用的存储
pub struct NullBufferStorage {
    device: Rc<NullDevice>,
    id: u64,
    property: MemoryProperty,
    bytes: RefCell<Vec<u8>>,
}

impl NullBufferStorage {
    pub fn new(device: &Rc<NullDevice>, property: MemoryProperty, size: u64, data: Option<&[u8]>) -> GraphicsResult<Self> {
        validate_buffer_data(size, data)?;
        let bytes = match data {
            Some(data) => data.to_vec(),
            None => vec![0; size as usize],
        };
        Ok(Self {
            device: device.clone(),
            id: device.alloc_id(),
            property,
            bytes: RefCell::new(bytes),
        })
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.bytes.borrow().len() as u64
    }

    pub fn update(&self, offset: u64, data: &[u8]) -> GraphicsResult<()> {
        validate_buffer_update(self.property, self.size(), offset, data)?;
        let offset = offset as usize;
        self.bytes.borrow_mut()[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn fetch(&self) -> GraphicsResult<Vec<u8>> {
        if !self.property.is_host_visible() {
            return Err(GraphicsError::Unsupported("fetching a static buffer".to_string()));
        }
        Ok(self.bytes.borrow().clone())
    }
}

impl Drop for NullBufferStorage {
    fn drop(&mut self) {
        self.device.defer_destroy("buffer", self.id);
    }
}

macro_rules! impl_null_buffer {
    ($ty:ty) => {
        impl GraphicsResource for $ty {
            fn backend(&self) -> GraphicsBackend {
                GraphicsBackend::Null
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        impl Buffer for $ty {
            fn size(&self) -> u64 {
                self.storage.size()
            }

            fn property(&self) -> MemoryProperty {
                self.storage.property
            }

            fn update(&self, offset: u64, data: &[u8]) -> GraphicsResult<()> {
                self.storage.update(offset, data)
            }
        }

        impl NullResourceId for $ty {
            fn resource_id(&self) -> u64 {
                self.storage.id
            }
        }
    };
}

pub struct NullVertexBuffer {
    storage: NullBufferStorage,
    element_size: u32,
    element_count: u32,
}

impl NullVertexBuffer {
    pub fn new(
        device: &Rc<NullDevice>,
        property: MemoryProperty,
        element_size: u32,
        element_count: u32,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Self> {
        let size = element_size as u64 * element_count as u64;
        Ok(Self {
            storage: NullBufferStorage::new(device, property, size, data)?,
            element_size,
            element_count,
        })
    }
}

impl_null_buffer!(NullVertexBuffer);

impl VertexBuffer for NullVertexBuffer {
    fn element_size(&self) -> u32 {
        self.element_size
    }

    fn element_count(&self) -> u32 {
        self.element_count
    }
}

pub struct NullIndexBuffer {
    storage: NullBufferStorage,
    format: IndexFormat,
    index_count: u32,
}

impl NullIndexBuffer {
    pub fn new(
        device: &Rc<NullDevice>,
        property: MemoryProperty,
        format: IndexFormat,
        index_count: u32,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Self> {
        let size = graphics_func::index_format_size(format) as u64 * index_count as u64;
        Ok(Self {
            storage: NullBufferStorage::new(device, property, size, data)?,
            format,
            index_count,
        })
    }
}

impl_null_buffer!(NullIndexBuffer);

impl IndexBuffer for NullIndexBuffer {
    fn index_format(&self) -> IndexFormat {
        self.format
    }

    fn index_count(&self) -> u32 {
        self.index_count
    }
}

pub struct NullConstantBuffer {
    storage: NullBufferStorage,
}

impl NullConstantBuffer {
    pub fn new(device: &Rc<NullDevice>, property: MemoryProperty, size: u64, data: Option<&[u8]>) -> GraphicsResult<Self> {
        Ok(Self {
            storage: NullBufferStorage::new(device, property, size, data)?,
        })
    }
}

impl_null_buffer!(NullConstantBuffer);

impl ConstantBuffer for NullConstantBuffer {}

pub struct NullStructuredBuffer {
    storage: NullBufferStorage,
    element_size: u32,
    element_count: u32,
}

impl NullStructuredBuffer {
    pub fn new(
        device: &Rc<NullDevice>,
        property: MemoryProperty,
        element_size: u32,
        element_count: u32,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Self> {
        let size = element_size as u64 * element_count as u64;
        Ok(Self {
            storage: NullBufferStorage::new(device, property, size, data)?,
            element_size,
            element_count,
        })
    }
}

impl_null_buffer!(NullStructuredBuffer);

impl StructuredBuffer for NullStructuredBuffer {
    fn element_size(&self) -> u32 {
        self.element_size
    }

    fn element_count(&self) -> u32 {
        self.element_count
    }

    fn fetch(&self) -> GraphicsResult<Vec<u8>> {
        self.storage.fetch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_buffer_size() {
        let device = Rc::new(NullDevice::new());
        let vb = NullVertexBuffer::new(&device, MemoryProperty::Static, 12, 3, Some(&[1u8; 36])).unwrap();
        assert_eq!(vb.size(), 36);
        assert_eq!(vb.element_count(), 3);
        assert!(vb.update(0, &[0u8; 4]).is_err());
    }

    #[test]
    fn test_structured_fetch() {
        let device = Rc::new(NullDevice::new());
        let sb = NullStructuredBuffer::new(&device, MemoryProperty::Dynamic, 4, 2, None).unwrap();
        sb.update(4, &7u32.to_le_bytes()).unwrap();
        assert_eq!(sb.fetch().unwrap(), vec![0, 0, 0, 0, 7, 0, 0, 0]);

        let static_sb = NullStructuredBuffer::new(&device, MemoryProperty::Static, 4, 2, None).unwrap();
        assert!(matches!(static_sb.fetch(), Err(GraphicsError::Unsupported(_))));
    }

    #[test]
    fn test_drop_is_deferred() {
        let device = Rc::new(NullDevice::new());
        let ib = NullIndexBuffer::new(&device, MemoryProperty::Dynamic, IndexFormat::U16, 6, None).unwrap();
        let id = ib.resource_id();
        assert_eq!(ib.size(), 12);
        drop(ib);

        assert!(device.deleted().is_empty());
        device.advance_deletions();
        device.advance_deletions();
        assert_eq!(device.deleted(), vec![format!("buffer#{id}")]);
    }
}
