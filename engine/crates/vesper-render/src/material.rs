use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use vesper_graphics::interface::pipeline::GraphicsPipeline;
use vesper_graphics::interface::shader_resources::ShaderResources;

/// material 的 shader resources 绑定在 set 0
pub const MATERIAL_SET: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(u64);

impl MaterialId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// 一个 pipeline 加上它在 MATERIAL_SET 使用的资源
pub struct Material {
    id: MaterialId,
    name: String,
    pipeline: Rc<dyn GraphicsPipeline>,
    shader_resources: Option<Rc<dyn ShaderResources>>,
}

impl Material {
    pub fn new(name: impl Into<String>, pipeline: Rc<dyn GraphicsPipeline>) -> Self {
        Self {
            id: MaterialId::next(),
            name: name.into(),
            pipeline,
            shader_resources: None,
        }
    }

    /// builder
    pub fn with_shader_resources(mut self, resources: Rc<dyn ShaderResources>) -> Self {
        self.shader_resources = Some(resources);
        self
    }

    #[inline]
    pub fn id(&self) -> MaterialId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn pipeline(&self) -> &Rc<dyn GraphicsPipeline> {
        &self.pipeline
    }

    #[inline]
    pub fn shader_resources(&self) -> Option<&Rc<dyn ShaderResources>> {
        self.shader_resources.as_ref()
    }
}
