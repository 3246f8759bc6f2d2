use std::any::Any;
use std::rc::Rc;

use ash::vk;
use vesper_graphics::basic::graphics_func;
use vesper_graphics::basic::graphics_type::{GraphicsBackend, IndexFormat, MemoryProperty};
use vesper_graphics::interface::buffer::{
    Buffer, ConstantBuffer, IndexBuffer, StructuredBuffer, VertexBuffer, validate_buffer_data, validate_buffer_update,
};
use vesper_graphics::interface::resource::GraphicsResource;
use vesper_graphics::{GraphicsError, GraphicsResult};
use vk_mem::Alloc;

use crate::foundation::VkResultExt;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::VkDevice;

/// 根据内存属性决定 vma 的分配方式
///
/// - Static：优先 device local，只能通过 transfer 写入
/// - Dynamic / Staging：host visible + coherent，创建后持久映射
pub fn buffer_alloc_info(property: MemoryProperty) -> vk_mem::AllocationCreateInfo {
    match property {
        MemoryProperty::Static => vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        },
        MemoryProperty::Dynamic | MemoryProperty::Staging => vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::Auto,
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
            required_flags: vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ..Default::default()
        },
    }
}

/// 在 buffer 的用途之上补充 transfer 相关的 usage
pub fn buffer_usage(usage: vk::BufferUsageFlags, property: MemoryProperty) -> vk::BufferUsageFlags {
    match property {
        MemoryProperty::Static => usage | vk::BufferUsageFlags::TRANSFER_DST,
        MemoryProperty::Dynamic => usage,
        MemoryProperty::Staging => usage | vk::BufferUsageFlags::TRANSFER_SRC,
    }
}

/// 所有 Vulkan buffer 共用的部分：native buffer、vma allocation 与映射地址
pub struct VkBufferStorage {
    device: Rc<VkDevice>,
    handle: vk::Buffer,
    allocation: Option<vk_mem::Allocation>,

    size: vk::DeviceSize,
    property: MemoryProperty,

    /// 在初始化阶段写死，只有 host visible 的 buffer 才有值
    map_ptr: Option<*mut u8>,
}

impl DebugType for VkBufferStorage {
    fn debug_type_name() -> &'static str {
        "VkBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// new & init
impl VkBufferStorage {
    pub fn new(
        device: &Rc<VkDevice>,
        usage: vk::BufferUsageFlags,
        property: MemoryProperty,
        size: vk::DeviceSize,
        data: Option<&[u8]>,
        name: &str,
    ) -> GraphicsResult<Self> {
        validate_buffer_data(size, data)?;

        let buffer_ci = vk::BufferCreateInfo::default()
            .size(size)
            .usage(buffer_usage(usage, property))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let alloc_ci = buffer_alloc_info(property);

        let allocator = device.allocator();
        let (handle, mut allocation) =
            unsafe { allocator.create_buffer(&buffer_ci, &alloc_ci) }.vk_context("vmaCreateBuffer")?;

        let map_ptr = if property.is_host_visible() {
            match unsafe { allocator.map_memory(&mut allocation) }.vk_context("vmaMapMemory") {
                Ok(ptr) => Some(ptr),
                Err(e) => {
                    unsafe { allocator.destroy_buffer(handle, &mut allocation) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        let buffer = Self {
            device: device.clone(),
            handle,
            allocation: Some(allocation),
            size,
            property,
            map_ptr,
        };
        device.set_debug_name(&buffer, name);

        if let Some(data) = data {
            buffer.upload(data, name)?;
        }
        Ok(buffer)
    }

    #[inline]
    pub fn new_stage_buffer(device: &Rc<VkDevice>, data: &[u8], name: &str) -> GraphicsResult<Self> {
        Self::new(
            device,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryProperty::Staging,
            data.len() as vk::DeviceSize,
            Some(data),
            &format!("{name}-stage-buffer"),
        )
    }

    /// 写入初始数据：host visible 直接写映射内存，Static 通过临时的 stage buffer 同步拷贝
    fn upload(&self, data: &[u8], name: &str) -> GraphicsResult<()> {
        if self.map_ptr.is_some() {
            return self.write_mapped(0, data);
        }

        let stage_buffer = Self::new_stage_buffer(&self.device, data, name)?;
        self.device.one_time_exec(&format!("{name}-transfer-data"), |device, cmd| {
            let region = vk::BufferCopy {
                size: data.len() as vk::DeviceSize,
                ..Default::default()
            };
            unsafe { device.cmd_copy_buffer(cmd, stage_buffer.handle, self.handle, std::slice::from_ref(&region)) };
            Ok(())
        })
    }
}

// getters
impl VkBufferStorage {
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn property(&self) -> MemoryProperty {
        self.property
    }
}

// tools
impl VkBufferStorage {
    fn write_mapped(&self, offset: vk::DeviceSize, data: &[u8]) -> GraphicsResult<()> {
        let (Some(ptr), Some(allocation)) = (self.map_ptr, &self.allocation) else {
            return Err(GraphicsError::InvalidOperation("buffer is not mapped".to_string()));
        };
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(offset as usize), data.len());
        }
        self.device
            .allocator()
            .flush_allocation(allocation, offset, data.len() as vk::DeviceSize)
            .vk_context("vmaFlushAllocation")
    }

    pub fn update(&self, offset: vk::DeviceSize, data: &[u8]) -> GraphicsResult<()> {
        validate_buffer_update(self.property, self.size, offset, data)?;
        self.write_mapped(offset, data)
    }

    /// 读回整个 buffer
    pub fn fetch(&self) -> GraphicsResult<Vec<u8>> {
        let (Some(ptr), Some(allocation)) = (self.map_ptr, &self.allocation) else {
            return Err(GraphicsError::Unsupported("fetching a static buffer".to_string()));
        };
        self.device
            .allocator()
            .invalidate_allocation(allocation, 0, self.size)
            .vk_context("vmaInvalidateAllocation")?;

        let mut bytes = vec![0u8; self.size as usize];
        unsafe {
            std::ptr::copy_nonoverlapping(ptr as *const u8, bytes.as_mut_ptr(), bytes.len());
        }
        Ok(bytes)
    }
}

impl Drop for VkBufferStorage {
    fn drop(&mut self) {
        let Some(mut allocation) = self.allocation.take() else {
            return;
        };
        let handle = self.handle;
        let mapped = self.map_ptr.is_some();
        self.device.defer_destroy(move |device| unsafe {
            let allocator = device.allocator();
            if mapped {
                allocator.unmap_memory(&mut allocation);
            }
            allocator.destroy_buffer(handle, &mut allocation);
        });
    }
}

macro_rules! impl_vk_buffer {
    ($ty:ty) => {
        impl GraphicsResource for $ty {
            fn backend(&self) -> GraphicsBackend {
                GraphicsBackend::Vulkan
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
                self.storage.property()
            }

            fn update(&self, offset: u64, data: &[u8]) -> GraphicsResult<()> {
                self.storage.update(offset, data)
            }
        }

        impl $ty {
            #[inline]
            pub fn handle(&self) -> vk::Buffer {
                self.storage.handle()
            }
        }
    };
}

pub struct VkVertexBuffer {
    storage: VkBufferStorage,
    element_size: u32,
    element_count: u32,
}

impl VkVertexBuffer {
    pub fn new(
        device: &Rc<VkDevice>,
        property: MemoryProperty,
        element_size: u32,
        element_count: u32,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Self> {
        let size = element_size as u64 * element_count as u64;
        Ok(Self {
            storage: VkBufferStorage::new(
                device,
                vk::BufferUsageFlags::VERTEX_BUFFER,
                property,
                size,
                data,
                "vertex-buffer",
            )?,
            element_size,
            element_count,
        })
    }
}

impl_vk_buffer!(VkVertexBuffer);

impl VertexBuffer for VkVertexBuffer {
    fn element_size(&self) -> u32 {
        self.element_size
    }

    fn element_count(&self) -> u32 {
        self.element_count
    }
}

pub struct VkIndexBuffer {
    storage: VkBufferStorage,
    format: IndexFormat,
    index_count: u32,
}

impl VkIndexBuffer {
    pub fn new(
        device: &Rc<VkDevice>,
        property: MemoryProperty,
        format: IndexFormat,
        index_count: u32,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Self> {
        let size = graphics_func::index_format_size(format) as u64 * index_count as u64;
        Ok(Self {
            storage: VkBufferStorage::new(device, vk::BufferUsageFlags::INDEX_BUFFER, property, size, data, "index-buffer")?,
            format,
            index_count,
        })
    }
}

impl_vk_buffer!(VkIndexBuffer);

impl IndexBuffer for VkIndexBuffer {
    fn index_format(&self) -> IndexFormat {
        self.format
    }

    fn index_count(&self) -> u32 {
        self.index_count
    }
}

pub struct VkConstantBuffer {
    storage: VkBufferStorage,
}

impl VkConstantBuffer {
    pub fn new(device: &Rc<VkDevice>, property: MemoryProperty, size: u64, data: Option<&[u8]>) -> GraphicsResult<Self> {
        Ok(Self {
            storage: VkBufferStorage::new(
                device,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                property,
                size,
                data,
                "constant-buffer",
            )?,
        })
    }
}

impl_vk_buffer!(VkConstantBuffer);

impl ConstantBuffer for VkConstantBuffer {}

pub struct VkStructuredBuffer {
    storage: VkBufferStorage,
    element_size: u32,
    element_count: u32,
}

impl VkStructuredBuffer {
    pub fn new(
        device: &Rc<VkDevice>,
        property: MemoryProperty,
        element_size: u32,
        element_count: u32,
        data: Option<&[u8]>,
    ) -> GraphicsResult<Self> {
        let size = element_size as u64 * element_count as u64;
        Ok(Self {
            storage: VkBufferStorage::new(
                device,
                vk::BufferUsageFlags::STORAGE_BUFFER,
                property,
                size,
                data,
                "structured-buffer",
            )?,
            element_size,
            element_count,
        })
    }
}

impl_vk_buffer!(VkStructuredBuffer);

impl StructuredBuffer for VkStructuredBuffer {
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
    fn test_alloc_info_by_property() {
        let static_info = buffer_alloc_info(MemoryProperty::Static);
        assert!(matches!(static_info.usage, vk_mem::MemoryUsage::AutoPreferDevice));
        assert!(static_info.required_flags.is_empty());

        let dynamic_info = buffer_alloc_info(MemoryProperty::Dynamic);
        assert!(dynamic_info.required_flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE));
        assert!(dynamic_info.flags.contains(vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM));
    }

    #[test]
    fn test_usage_by_property() {
        let usage = vk::BufferUsageFlags::VERTEX_BUFFER;
        assert!(buffer_usage(usage, MemoryProperty::Static).contains(vk::BufferUsageFlags::TRANSFER_DST));
        assert_eq!(buffer_usage(usage, MemoryProperty::Dynamic), usage);
        assert!(buffer_usage(usage, MemoryProperty::Staging).contains(vk::BufferUsageFlags::TRANSFER_SRC));
    }
}
