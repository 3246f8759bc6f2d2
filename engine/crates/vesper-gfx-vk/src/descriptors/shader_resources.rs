use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use ash::vk;
use itertools::Itertools;
use vesper_graphics::basic::graphics_type::{GraphicsBackend, ShaderResourceBinding, ShaderResourceType};
use vesper_graphics::interface::buffer::{ConstantBuffer, StructuredBuffer};
use vesper_graphics::interface::resource::GraphicsResource;
use vesper_graphics::interface::shader_resources::{ShaderResources, ShaderResourcesLayout};
use vesper_graphics::interface::texture::{Texture2D, Texture2DArray, TextureCube};
use vesper_graphics::{GraphicsError, GraphicsResult};

use crate::conversion::{convert_to_vk_descriptor_type, convert_to_vk_shader_stage};
use crate::descriptors::descriptor_pool::VkDescriptorPool;
use crate::foundation::VkResultExt;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::VkDevice;
use crate::resources::buffer::{VkConstantBuffer, VkStructuredBuffer};
use crate::resources::texture::{VkTexture2D, VkTexture2DArray, VkTextureCube, VkTextureStorage};
use crate::vk_cast;

/// 检查 binding 编号不重复且数量有效，然后转换为 Vulkan 的描述
pub fn layout_bindings(bindings: &[ShaderResourceBinding]) -> GraphicsResult<Vec<vk::DescriptorSetLayoutBinding<'static>>> {
    let mut seen = HashSet::new();
    for binding in bindings {
        if !seen.insert(binding.binding) {
            return Err(GraphicsError::InvalidArgument(format!("binding {} declared twice", binding.binding)));
        }
        if binding.count == 0 {
            return Err(GraphicsError::InvalidArgument(format!("binding {} has zero descriptors", binding.binding)));
        }
    }

    Ok(bindings
        .iter()
        .map(|b| {
            vk::DescriptorSetLayoutBinding::default()
                .binding(b.binding)
                .descriptor_type(convert_to_vk_descriptor_type(b.ty))
                .descriptor_count(b.count)
                .stage_flags(convert_to_vk_shader_stage(b.stage))
        })
        .collect_vec())
}

pub struct VkShaderResourcesLayout {
    device: Rc<VkDevice>,
    bindings: Vec<ShaderResourceBinding>,
    handle: vk::DescriptorSetLayout,
}

impl DebugType for VkShaderResourcesLayout {
    fn debug_type_name() -> &'static str {
        "VkDescriptorSetLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl VkShaderResourcesLayout {
    pub fn new(device: &Rc<VkDevice>, bindings: &[ShaderResourceBinding]) -> GraphicsResult<Self> {
        let vk_bindings = layout_bindings(bindings)?;
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
        let handle = unsafe { device.create_descriptor_set_layout(&create_info, None) }
            .vk_context("vkCreateDescriptorSetLayout")?;

        let layout = Self {
            device: device.clone(),
            bindings: bindings.to_vec(),
            handle,
        };
        device.set_debug_name(&layout, format!("{}-bindings", bindings.len()));
        Ok(layout)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }
}

impl Drop for VkShaderResourcesLayout {
    fn drop(&mut self) {
        let handle = self.handle;
        self.device.defer_destroy(move |device| unsafe {
            device.destroy_descriptor_set_layout(handle, None);
        });
    }
}

impl GraphicsResource for VkShaderResourcesLayout {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Vulkan
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ShaderResourcesLayout for VkShaderResourcesLayout {
    fn bindings(&self) -> &[ShaderResourceBinding] {
        &self.bindings
    }
}

/// 被 descriptor set 引用的资源，保证它们的 native 对象在 set 之前不被销毁
enum VkBoundResource {
    ConstantBuffer(Rc<dyn ConstantBuffer>),
    StructuredBuffer(Rc<dyn StructuredBuffer>),
    Texture2D(Rc<dyn Texture2D>),
    Texture2DArray(Rc<dyn Texture2DArray>),
    TextureCube(Rc<dyn TextureCube>),
}

pub struct VkShaderResources {
    device: Rc<VkDevice>,
    pool: Rc<VkDescriptorPool>,
    layout: Rc<dyn ShaderResourcesLayout>,
    set: vk::DescriptorSet,
    bound: RefCell<BTreeMap<u32, VkBoundResource>>,
}

impl DebugType for VkShaderResources {
    fn debug_type_name() -> &'static str {
        "VkDescriptorSet"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.set
    }
}

// new & init
impl VkShaderResources {
    pub fn new(
        device: &Rc<VkDevice>,
        pool: &Rc<VkDescriptorPool>,
        layout: Rc<dyn ShaderResourcesLayout>,
    ) -> GraphicsResult<Self> {
        let vk_layout: &VkShaderResourcesLayout = vk_cast(layout.as_ref());
        let set = pool.allocate(vk_layout.handle())?;

        let resources = Self {
            device: device.clone(),
            pool: pool.clone(),
            layout,
            set,
            bound: RefCell::new(BTreeMap::new()),
        };
        device.set_debug_name(&resources, "shader-resources");
        Ok(resources)
    }
}

// getters
impl VkShaderResources {
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSet {
        self.set
    }

    #[inline]
    pub fn bound_count(&self) -> usize {
        self.bound.borrow().len()
    }
}

// tools
impl VkShaderResources {
    fn write_buffer(&self, binding: u32, ty: ShaderResourceType, buffer: vk::Buffer) {
        let buffer_info = vk::DescriptorBufferInfo {
            buffer,
            offset: 0,
            range: vk::WHOLE_SIZE,
        };
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(binding)
            .descriptor_type(convert_to_vk_descriptor_type(ty))
            .buffer_info(std::slice::from_ref(&buffer_info));
        unsafe { self.device.update_descriptor_sets(std::slice::from_ref(&write), &[]) };
    }

    fn write_texture(&self, binding: u32, storage: &VkTextureStorage) -> GraphicsResult<()> {
        let image_info = storage.descriptor_image_info()?;
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(std::slice::from_ref(&image_info));
        unsafe { self.device.update_descriptor_sets(std::slice::from_ref(&write), &[]) };
        Ok(())
    }

    /// 写入成功之后才替换旧的资源
    fn hold(&self, binding: u32, resource: VkBoundResource) {
        self.bound.borrow_mut().insert(binding, resource);
    }
}

impl Drop for VkShaderResources {
    fn drop(&mut self) {
        self.pool.free(self.set);
    }
}

impl GraphicsResource for VkShaderResources {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Vulkan
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ShaderResources for VkShaderResources {
    fn layout(&self) -> Rc<dyn ShaderResourcesLayout> {
        self.layout.clone()
    }

    fn bind_constant_buffer(&self, binding: u32, buffer: Rc<dyn ConstantBuffer>) -> GraphicsResult<()> {
        let ty = ShaderResourceType::UniformBuffer;
        self.layout.check_binding(binding, ty)?;
        self.write_buffer(binding, ty, vk_cast::<VkConstantBuffer, _>(buffer.as_ref()).handle());
        self.hold(binding, VkBoundResource::ConstantBuffer(buffer));
        Ok(())
    }

    fn bind_structured_buffer(&self, binding: u32, buffer: Rc<dyn StructuredBuffer>) -> GraphicsResult<()> {
        let ty = ShaderResourceType::StorageBuffer;
        self.layout.check_binding(binding, ty)?;
        self.write_buffer(binding, ty, vk_cast::<VkStructuredBuffer, _>(buffer.as_ref()).handle());
        self.hold(binding, VkBoundResource::StructuredBuffer(buffer));
        Ok(())
    }

    fn bind_texture_2d(&self, binding: u32, texture: Rc<dyn Texture2D>) -> GraphicsResult<()> {
        self.layout.check_binding(binding, ShaderResourceType::CombinedImageSampler)?;
        self.write_texture(binding, vk_cast::<VkTexture2D, _>(texture.as_ref()).storage())?;
        self.hold(binding, VkBoundResource::Texture2D(texture));
        Ok(())
    }

    fn bind_texture_2d_array(&self, binding: u32, texture: Rc<dyn Texture2DArray>) -> GraphicsResult<()> {
        self.layout.check_binding(binding, ShaderResourceType::CombinedImageSampler)?;
        self.write_texture(binding, vk_cast::<VkTexture2DArray, _>(texture.as_ref()).storage())?;
        self.hold(binding, VkBoundResource::Texture2DArray(texture));
        Ok(())
    }

    fn bind_texture_cube(&self, binding: u32, texture: Rc<dyn TextureCube>) -> GraphicsResult<()> {
        self.layout.check_binding(binding, ShaderResourceType::CombinedImageSampler)?;
        self.write_texture(binding, vk_cast::<VkTextureCube, _>(texture.as_ref()).storage())?;
        self.hold(binding, VkBoundResource::TextureCube(texture));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_graphics::basic::graphics_type::ShaderStage;

    #[test]
    fn test_layout_bindings() {
        let bindings = [
            ShaderResourceBinding::new(0, ShaderResourceType::UniformBuffer, ShaderStage::VERTEX),
            ShaderResourceBinding::new(2, ShaderResourceType::CombinedImageSampler, ShaderStage::FRAGMENT),
        ];
        let vk_bindings = layout_bindings(&bindings).unwrap();
        assert_eq!(vk_bindings.len(), 2);
        assert_eq!(vk_bindings[1].binding, 2);
        assert_eq!(vk_bindings[1].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(vk_bindings[0].stage_flags, vk::ShaderStageFlags::VERTEX);
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let bindings = [
            ShaderResourceBinding::new(1, ShaderResourceType::UniformBuffer, ShaderStage::VERTEX),
            ShaderResourceBinding::new(1, ShaderResourceType::StorageBuffer, ShaderStage::COMPUTE),
        ];
        assert!(matches!(layout_bindings(&bindings), Err(GraphicsError::InvalidArgument(_))));

        let mut empty = ShaderResourceBinding::new(0, ShaderResourceType::UniformBuffer, ShaderStage::VERTEX);
        empty.count = 0;
        assert!(layout_bindings(&[empty]).is_err());
    }
}
