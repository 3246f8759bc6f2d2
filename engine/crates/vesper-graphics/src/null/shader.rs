use std::any::Any;
use std::rc::Rc;

use crate::basic::error::{GraphicsError, GraphicsResult};
use crate::basic::graphics_type::GraphicsBackend;
use crate::interface::resource::GraphicsResource;
use crate::interface::shader::{ComputeShader, GraphicsShader, SHADER_ENTRY};
use crate::null::NullResourceId;
use crate::null::device::NullDevice;

fn check_code(stage: &str, code: &[u8]) -> GraphicsResult<()> {
    if code.is_empty() {
        return Err(GraphicsError::InvalidArgument(format!("{stage} shader code is empty")));
    }
    Ok(())
}

pub struct NullGraphicsShader {
    device: Rc<NullDevice>,
    id: u64,
    code_size: usize,
}

impl NullGraphicsShader {
    pub fn new(device: &Rc<NullDevice>, vertex_code: &[u8], fragment_code: &[u8]) -> GraphicsResult<Self> {
        check_code("vertex", vertex_code)?;
        check_code("fragment", fragment_code)?;
        Ok(Self {
            device: device.clone(),
            id: device.alloc_id(),
            code_size: vertex_code.len() + fragment_code.len(),
        })
    }

    #[inline]
    pub fn code_size(&self) -> usize {
        self.code_size
    }
}

impl GraphicsResource for NullGraphicsShader {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Null
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl GraphicsShader for NullGraphicsShader {
    fn vertex_entry(&self) -> &str {
        SHADER_ENTRY
    }

    fn fragment_entry(&self) -> &str {
        SHADER_ENTRY
    }
}

impl NullResourceId for NullGraphicsShader {
    fn resource_id(&self) -> u64 {
        self.id
    }
}

impl Drop for NullGraphicsShader {
    fn drop(&mut self) {
        self.device.defer_destroy("shader", self.id);
    }
}

pub struct NullComputeShader {
    device: Rc<NullDevice>,
    id: u64,
}

impl NullComputeShader {
    pub fn new(device: &Rc<NullDevice>, code: &[u8]) -> GraphicsResult<Self> {
        check_code("compute", code)?;
        Ok(Self {
            device: device.clone(),
            id: device.alloc_id(),
        })
    }
}

impl GraphicsResource for NullComputeShader {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Null
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ComputeShader for NullComputeShader {
    fn entry(&self) -> &str {
        SHADER_ENTRY
    }
}

impl NullResourceId for NullComputeShader {
    fn resource_id(&self) -> u64 {
        self.id
    }
}

impl Drop for NullComputeShader {
    fn drop(&mut self) {
        self.device.defer_destroy("shader", self.id);
    }
}
