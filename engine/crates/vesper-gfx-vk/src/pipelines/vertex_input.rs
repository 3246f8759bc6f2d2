use std::any::Any;

use ash::vk;
use itertools::Itertools;
use vesper_graphics::basic::graphics_type::{GraphicsBackend, VertexInputLayoutDesc};
use vesper_graphics::interface::pipeline::VertexInputLayout;
use vesper_graphics::interface::resource::GraphicsResource;
use vesper_graphics::{GraphicsError, GraphicsResult};

use crate::conversion::{convert_to_vk_input_rate, convert_to_vk_vertex_format};

/// 顶点输入在 pipeline 创建时直接使用，不对应任何 native 对象
pub struct VkVertexInputLayout {
    desc: VertexInputLayoutDesc,
    bindings: Vec<vk::VertexInputBindingDescription>,
    attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VkVertexInputLayout {
    pub fn new(desc: &VertexInputLayoutDesc) -> GraphicsResult<Self> {
        if let Some(attribute) = desc.attributes.iter().find(|a| !desc.bindings.iter().any(|b| b.binding == a.binding)) {
            return Err(GraphicsError::InvalidArgument(format!(
                "attribute at location {} uses undeclared binding {}",
                attribute.location, attribute.binding
            )));
        }
        if !desc.attributes.iter().map(|a| a.location).all_unique() {
            return Err(GraphicsError::InvalidArgument("vertex attribute locations overlap".to_string()));
        }

        let bindings = desc
            .bindings
            .iter()
            .map(|b| vk::VertexInputBindingDescription {
                binding: b.binding,
                stride: b.stride,
                input_rate: convert_to_vk_input_rate(b.input_rate),
            })
            .collect_vec();
        let attributes = desc
            .attributes
            .iter()
            .map(|a| vk::VertexInputAttributeDescription {
                location: a.location,
                binding: a.binding,
                format: convert_to_vk_vertex_format(a.format),
                offset: a.offset,
            })
            .collect_vec();

        Ok(Self {
            desc: desc.clone(),
            bindings,
            attributes,
        })
    }

    #[inline]
    pub fn vk_bindings(&self) -> &[vk::VertexInputBindingDescription] {
        &self.bindings
    }

    #[inline]
    pub fn vk_attributes(&self) -> &[vk::VertexInputAttributeDescription] {
        &self.attributes
    }
}

impl GraphicsResource for VkVertexInputLayout {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Vulkan
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl VertexInputLayout for VkVertexInputLayout {
    fn desc(&self) -> &VertexInputLayoutDesc {
        &self.desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_graphics::basic::graphics_func::GeometryVertex;
    use vesper_graphics::basic::graphics_type::{VertexAttribute, VertexBinding, VertexFormat, VertexInputRate};

    #[test]
    fn test_geometry_layout() {
        let layout = VkVertexInputLayout::new(&GeometryVertex::vertex_input_layout_desc()).unwrap();
        assert_eq!(layout.vk_bindings().len(), 1);
        assert_eq!(layout.vk_bindings()[0].stride, GeometryVertex::STRIDE);
        assert_eq!(layout.vk_attributes()[0].format, vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn test_undeclared_binding() {
        let desc = VertexInputLayoutDesc {
            bindings: vec![VertexBinding {
                binding: 0,
                stride: 16,
                input_rate: VertexInputRate::PerVertex,
            }],
            attributes: vec![VertexAttribute {
                location: 0,
                binding: 1,
                format: VertexFormat::Float4,
                offset: 0,
            }],
        };
        assert!(matches!(VkVertexInputLayout::new(&desc), Err(GraphicsError::InvalidArgument(_))));
    }
}
