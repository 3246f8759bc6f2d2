use std::any::Any;
use std::io::Cursor;
use std::rc::Rc;

use ash::vk;
use vesper_graphics::basic::graphics_type::GraphicsBackend;
use vesper_graphics::interface::resource::GraphicsResource;
use vesper_graphics::interface::shader::{ComputeShader, GraphicsShader, SHADER_ENTRY};
use vesper_graphics::{GraphicsError, GraphicsResult};

use crate::foundation::VkResultExt;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::VkDevice;

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// 把字节码转换为 SPIR-V 的 word，并检查 magic number
pub fn parse_spirv(stage: &str, code: &[u8]) -> GraphicsResult<Vec<u32>> {
    if code.is_empty() {
        return Err(GraphicsError::InvalidArgument(format!("{stage} shader code is empty")));
    }
    let words = ash::util::read_spv(&mut Cursor::new(code))
        .map_err(|e| GraphicsError::InvalidArgument(format!("{stage} shader is not SPIR-V: {e}")))?;
    if words.first() != Some(&SPIRV_MAGIC) {
        return Err(GraphicsError::InvalidArgument(format!("{stage} shader has a bad SPIR-V magic number")));
    }
    Ok(words)
}

pub struct VkShaderModule {
    device: Rc<VkDevice>,
    handle: vk::ShaderModule,
}

impl DebugType for VkShaderModule {
    fn debug_type_name() -> &'static str {
        "VkShaderModule"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl VkShaderModule {
    pub fn new(device: &Rc<VkDevice>, stage: &str, code: &[u8]) -> GraphicsResult<Self> {
        let words = parse_spirv(stage, code)?;
        let create_info = vk::ShaderModuleCreateInfo::default().code(&words);
        let handle = unsafe { device.create_shader_module(&create_info, None) }.vk_context("vkCreateShaderModule")?;

        let module = Self {
            device: device.clone(),
            handle,
        };
        device.set_debug_name(&module, stage);
        Ok(module)
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }
}

impl Drop for VkShaderModule {
    fn drop(&mut self) {
        let handle = self.handle;
        self.device.defer_destroy(move |device| unsafe {
            device.destroy_shader_module(handle, None);
        });
    }
}

pub struct VkGraphicsShader {
    vertex: VkShaderModule,
    fragment: VkShaderModule,
}

impl VkGraphicsShader {
    pub fn new(device: &Rc<VkDevice>, vertex_code: &[u8], fragment_code: &[u8]) -> GraphicsResult<Self> {
        Ok(Self {
            vertex: VkShaderModule::new(device, "vertex", vertex_code)?,
            fragment: VkShaderModule::new(device, "fragment", fragment_code)?,
        })
    }

    #[inline]
    pub fn vertex_module(&self) -> vk::ShaderModule {
        self.vertex.handle()
    }

    #[inline]
    pub fn fragment_module(&self) -> vk::ShaderModule {
        self.fragment.handle()
    }
}

impl GraphicsResource for VkGraphicsShader {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Vulkan
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl GraphicsShader for VkGraphicsShader {
    fn vertex_entry(&self) -> &str {
        SHADER_ENTRY
    }

    fn fragment_entry(&self) -> &str {
        SHADER_ENTRY
    }
}

pub struct VkComputeShader {
    module: VkShaderModule,
}

impl VkComputeShader {
    pub fn new(device: &Rc<VkDevice>, code: &[u8]) -> GraphicsResult<Self> {
        Ok(Self {
            module: VkShaderModule::new(device, "compute", code)?,
        })
    }

    #[inline]
    pub fn module(&self) -> vk::ShaderModule {
        self.module.handle()
    }
}

impl GraphicsResource for VkComputeShader {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Vulkan
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ComputeShader for VkComputeShader {
    fn entry(&self) -> &str {
        SHADER_ENTRY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spirv() {
        let mut code = SPIRV_MAGIC.to_le_bytes().to_vec();
        code.extend_from_slice(&[0u8; 16]);
        assert_eq!(parse_spirv("vertex", &code).unwrap().len(), 5);
    }

    #[test]
    fn test_parse_spirv_rejects_garbage() {
        assert!(parse_spirv("vertex", &[]).is_err());
        assert!(parse_spirv("vertex", &[1, 2, 3]).is_err());
        assert!(matches!(parse_spirv("fragment", &[0u8; 8]), Err(GraphicsError::InvalidArgument(_))));
    }
}
