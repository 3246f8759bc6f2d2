use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::basic::error::GraphicsResult;
use crate::basic::graphics_type::{GraphicsBackend, ShaderResourceBinding, ShaderResourceType};
use crate::interface::buffer::{ConstantBuffer, StructuredBuffer};
use crate::interface::resource::GraphicsResource;
use crate::interface::shader_resources::{ShaderResources, ShaderResourcesLayout};
use crate::interface::texture::{Texture2D, Texture2DArray, TextureCube};
use crate::null::NullResourceId;
use crate::null::device::NullDevice;

pub struct NullShaderResourcesLayout {
    bindings: Vec<ShaderResourceBinding>,
}

impl NullShaderResourcesLayout {
    pub fn new(bindings: &[ShaderResourceBinding]) -> Self {
        Self {
            bindings: bindings.to_vec(),
        }
    }
}

impl GraphicsResource for NullShaderResourcesLayout {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Null
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ShaderResourcesLayout for NullShaderResourcesLayout {
    fn bindings(&self) -> &[ShaderResourceBinding] {
        &self.bindings
    }
}

/// 被某个 binding 持有的资源
#[derive(Clone)]
pub enum NullBoundResource {
    ConstantBuffer(Rc<dyn ConstantBuffer>),
    StructuredBuffer(Rc<dyn StructuredBuffer>),
    Texture2D(Rc<dyn Texture2D>),
    Texture2DArray(Rc<dyn Texture2DArray>),
    TextureCube(Rc<dyn TextureCube>),
}

pub struct NullShaderResources {
    device: Rc<NullDevice>,
    id: u64,
    layout: Rc<dyn ShaderResourcesLayout>,
    bound: RefCell<BTreeMap<u32, NullBoundResource>>,
    /// 每次 bind 都是一次独立的写入
    write_count: Cell<u32>,
}

impl NullShaderResources {
    pub fn new(device: &Rc<NullDevice>, layout: Rc<dyn ShaderResourcesLayout>) -> Self {
        Self {
            device: device.clone(),
            id: device.alloc_id(),
            layout,
            bound: RefCell::new(BTreeMap::new()),
            write_count: Cell::new(0),
        }
    }

    pub fn bound(&self, binding: u32) -> Option<NullBoundResource> {
        self.bound.borrow().get(&binding).cloned()
    }

    pub fn write_count(&self) -> u32 {
        self.write_count.get()
    }

    fn bind(&self, binding: u32, ty: ShaderResourceType, resource: NullBoundResource) -> GraphicsResult<()> {
        self.layout.check_binding(binding, ty)?;
        self.bound.borrow_mut().insert(binding, resource);
        self.write_count.set(self.write_count.get() + 1);
        Ok(())
    }
}

impl Drop for NullShaderResources {
    fn drop(&mut self) {
        self.device.defer_destroy("descriptor_set", self.id);
    }
}

impl GraphicsResource for NullShaderResources {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Null
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl NullResourceId for NullShaderResources {
    fn resource_id(&self) -> u64 {
        self.id
    }
}

impl ShaderResources for NullShaderResources {
    fn layout(&self) -> Rc<dyn ShaderResourcesLayout> {
        self.layout.clone()
    }

    fn bind_constant_buffer(&self, binding: u32, buffer: Rc<dyn ConstantBuffer>) -> GraphicsResult<()> {
        self.bind(binding, ShaderResourceType::UniformBuffer, NullBoundResource::ConstantBuffer(buffer))
    }

    fn bind_structured_buffer(&self, binding: u32, buffer: Rc<dyn StructuredBuffer>) -> GraphicsResult<()> {
        self.bind(binding, ShaderResourceType::StorageBuffer, NullBoundResource::StructuredBuffer(buffer))
    }

    fn bind_texture_2d(&self, binding: u32, texture: Rc<dyn Texture2D>) -> GraphicsResult<()> {
        self.bind(binding, ShaderResourceType::CombinedImageSampler, NullBoundResource::Texture2D(texture))
    }

    fn bind_texture_2d_array(&self, binding: u32, texture: Rc<dyn Texture2DArray>) -> GraphicsResult<()> {
        self.bind(binding, ShaderResourceType::CombinedImageSampler, NullBoundResource::Texture2DArray(texture))
    }

    fn bind_texture_cube(&self, binding: u32, texture: Rc<dyn TextureCube>) -> GraphicsResult<()> {
        self.bind(binding, ShaderResourceType::CombinedImageSampler, NullBoundResource::TextureCube(texture))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::error::GraphicsError;
    use crate::basic::graphics_type::{MemoryProperty, ShaderStage};
    use crate::null::buffer::{NullConstantBuffer, NullStructuredBuffer};

    #[test]
    fn test_bind_declared_only() {
        let device = Rc::new(NullDevice::new());
        let layout = Rc::new(NullShaderResourcesLayout::new(&[ShaderResourceBinding::new(
            0,
            ShaderResourceType::UniformBuffer,
            ShaderStage::ALL_GRAPHICS,
        )]));
        let resources = NullShaderResources::new(&device, layout);
        let cb: Rc<dyn ConstantBuffer> =
            Rc::new(NullConstantBuffer::new(&device, MemoryProperty::Dynamic, 64, None).unwrap());

        resources.bind_constant_buffer(0, cb.clone()).unwrap();
        resources.bind_constant_buffer(0, cb.clone()).unwrap();
        assert_eq!(resources.write_count(), 2);
        assert!(matches!(resources.bound(0), Some(NullBoundResource::ConstantBuffer(_))));

        assert!(matches!(resources.bind_constant_buffer(3, cb.clone()), Err(GraphicsError::InvalidArgument(_))));
        let sb = Rc::new(NullStructuredBuffer::new(&device, MemoryProperty::Dynamic, 4, 4, None).unwrap());
        assert!(resources.bind_structured_buffer(0, sb).is_err());
    }
}
