use crate::basic::error::{GraphicsError, GraphicsResult};
use crate::basic::graphics_func;
use crate::basic::graphics_type::{
    Extent2D, MemoryProperty, PixelFormat, SampleCount, SamplerDesc, TextureDesc, TextureUsage,
};
use crate::interface::resource::GraphicsResource;

/// 所有 texture 共同的接口
pub trait Texture: GraphicsResource {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn format(&self) -> PixelFormat;

    fn layer_count(&self) -> u32;

    fn mip_levels(&self) -> u32;

    fn samples(&self) -> SampleCount;

    fn usage(&self) -> TextureUsage;

    fn property(&self) -> MemoryProperty;

    fn sampler_desc(&self) -> SamplerDesc;

    /// 是否是 swapchain 等外部持有的 image
    fn is_external(&self) -> bool {
        false
    }

    /// 覆盖某个 layer 的 level 0，只支持 Dynamic 的 texture
    fn update(&self, layer: u32, data: &[u8]) -> GraphicsResult<()>;

    #[inline]
    fn extent(&self) -> Extent2D {
        Extent2D::new(self.width(), self.height())
    }
}

pub trait Texture2D: Texture {}

pub trait Texture2DArray: Texture {}

/// 6 个 layer 依次为 +X, -X, +Y, -Y, +Z, -Z
pub trait TextureCube: Texture {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    Texture2D,
    Texture2DArray,
    TextureCube,
}

/// 校验并规整 texture 的创建参数
///
/// 返回规整后的描述（cube 的 layer 固定为 6）以及 mip 层数
pub fn validate_texture_desc(
    kind: TextureKind,
    desc: &TextureDesc,
    data: Option<&[u8]>,
) -> GraphicsResult<(TextureDesc, u32)> {
    let mut desc = desc.clone();
    match kind {
        TextureKind::Texture2D if desc.layers != 1 => {
            return Err(GraphicsError::InvalidArgument(format!("texture 2d has {} layers", desc.layers)));
        }
        TextureKind::Texture2DArray if desc.layers == 0 => {
            return Err(GraphicsError::InvalidArgument("texture array needs at least one layer".to_string()));
        }
        TextureKind::TextureCube => {
            if desc.width != desc.height {
                return Err(GraphicsError::InvalidArgument(format!(
                    "cube faces must be square, got {}x{}",
                    desc.width, desc.height
                )));
            }
            desc.layers = 6;
        }
        _ => {}
    }

    if desc.width == 0 || desc.height == 0 {
        return Err(GraphicsError::InvalidArgument(format!("texture extent {}x{}", desc.width, desc.height)));
    }
    if desc.property == MemoryProperty::Staging {
        return Err(GraphicsError::InvalidArgument("staging textures are not supported, use a staging buffer".to_string()));
    }
    if desc.property == MemoryProperty::Dynamic && (desc.samples.is_multisampled() || desc.generate_mipmaps) {
        return Err(GraphicsError::InvalidArgument("dynamic textures are single sampled without mips".to_string()));
    }

    let mip_levels = if desc.generate_mipmaps {
        if desc.samples.is_multisampled() {
            return Err(GraphicsError::InvalidArgument("multisampled texture cannot have mips".to_string()));
        }
        if graphics_func::is_depth_format(desc.format) {
            return Err(GraphicsError::Unsupported(format!("mip generation for depth format {:?}", desc.format)));
        }
        graphics_func::mip_level_count(desc.width, desc.height)
    } else {
        1
    };

    if let Some(data) = data {
        let expected = graphics_func::texture_layer_size(desc.width, desc.height, desc.format) * desc.layers as u64;
        if data.len() as u64 != expected {
            return Err(GraphicsError::InvalidArgument(format!(
                "texture data is {} bytes, expected {expected}",
                data.len()
            )));
        }
        if desc.samples.is_multisampled() {
            return Err(GraphicsError::InvalidArgument("multisampled texture cannot be uploaded".to_string()));
        }
    }

    Ok((desc, mip_levels))
}

/// 检查一次 layer 写入是否合法
pub fn validate_texture_update(texture: &(impl Texture + ?Sized), layer: u32, data: &[u8]) -> GraphicsResult<()> {
    if texture.property() != MemoryProperty::Dynamic {
        return Err(GraphicsError::InvalidOperation("only dynamic textures can be updated".to_string()));
    }
    if layer >= texture.layer_count() {
        return Err(GraphicsError::InvalidArgument(format!(
            "layer {layer} out of {} layers",
            texture.layer_count()
        )));
    }
    let expected = graphics_func::texture_layer_size(texture.width(), texture.height(), texture.format());
    if data.len() as u64 != expected {
        return Err(GraphicsError::InvalidArgument(format!(
            "layer data is {} bytes, expected {expected}",
            data.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_layers_forced() {
        let desc = TextureDesc::sampled_2d(16, 16, PixelFormat::R8G8B8A8Unorm);
        let (desc, mips) = validate_texture_desc(TextureKind::TextureCube, &desc, Some(&[0u8; 16 * 16 * 4 * 6])).unwrap();
        assert_eq!(desc.layers, 6);
        assert_eq!(mips, 1);
    }

    #[test]
    fn test_mip_count_from_desc() {
        let desc = TextureDesc::sampled_2d(64, 16, PixelFormat::R8G8B8A8Unorm).with_mipmaps();
        let (_, mips) = validate_texture_desc(TextureKind::Texture2D, &desc, None).unwrap();
        assert_eq!(mips, 7);
    }

    #[test]
    fn test_rejected_descs() {
        let base = TextureDesc::sampled_2d(8, 4, PixelFormat::R8G8B8A8Unorm);
        assert!(validate_texture_desc(TextureKind::TextureCube, &base, None).is_err());
        assert!(validate_texture_desc(TextureKind::Texture2D, &base.clone().with_layers(2), None).is_err());
        assert!(
            validate_texture_desc(TextureKind::Texture2D, &base.clone().with_property(MemoryProperty::Staging), None)
                .is_err()
        );
        assert!(validate_texture_desc(TextureKind::Texture2D, &base, Some(&[0u8; 3])).is_err());

        let depth = TextureDesc::sampled_2d(8, 8, PixelFormat::D32Float).with_mipmaps();
        assert!(matches!(
            validate_texture_desc(TextureKind::Texture2D, &depth, None),
            Err(GraphicsError::Unsupported(_))
        ));
    }
}
