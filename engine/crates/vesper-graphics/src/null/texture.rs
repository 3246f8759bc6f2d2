use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::basic::error::GraphicsResult;
use crate::basic::graphics_func;
use crate::basic::graphics_type::{
    GraphicsBackend, MemoryProperty, PixelFormat, SampleCount, SamplerDesc, TextureDesc, TextureUsage,
};
use crate::interface::resource::GraphicsResource;
use crate::interface::texture::{
    Texture, Texture2D, Texture2DArray, TextureCube, TextureKind, validate_texture_desc, validate_texture_update,
};
use crate::null::NullResourceId;
use crate::null::device::NullDevice;

/// 所有 null texture 共用的存储，只保存 level 0 的像素
pub struct NullTextureStorage {
    device: Rc<NullDevice>,
    id: u64,
    desc: TextureDesc,
    mip_levels: u32,
    external: bool,
    pixels: RefCell<Vec<u8>>,
}

impl NullTextureStorage {
    fn new(device: &Rc<NullDevice>, kind: TextureKind, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Self> {
        let (desc, mip_levels) = validate_texture_desc(kind, desc, data)?;
        let size = graphics_func::texture_layer_size(desc.width, desc.height, desc.format) * desc.layers as u64;
        let pixels = match data {
            Some(data) => data.to_vec(),
            None => vec![0; size as usize],
        };
        Ok(Self {
            device: device.clone(),
            id: device.alloc_id(),
            desc,
            mip_levels,
            external: false,
            pixels: RefCell::new(pixels),
        })
    }

    fn layer_bytes(&self, layer: u32) -> Vec<u8> {
        let layer_size = graphics_func::texture_layer_size(self.desc.width, self.desc.height, self.desc.format) as usize;
        let start = layer as usize * layer_size;
        self.pixels.borrow().get(start..start + layer_size).map(<[u8]>::to_vec).unwrap_or_default()
    }
}

impl Drop for NullTextureStorage {
    fn drop(&mut self) {
        // 外部 image 由 swapchain 负责销毁
        if !self.external {
            self.device.defer_destroy("texture", self.id);
        }
    }
}

macro_rules! impl_null_texture {
    ($ty:ty) => {
        impl GraphicsResource for $ty {
            fn backend(&self) -> GraphicsBackend {
                GraphicsBackend::Null
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        impl Texture for $ty {
            fn width(&self) -> u32 {
                self.storage.desc.width
            }

            fn height(&self) -> u32 {
                self.storage.desc.height
            }

            fn format(&self) -> PixelFormat {
                self.storage.desc.format
            }

            fn layer_count(&self) -> u32 {
                self.storage.desc.layers
            }

            fn mip_levels(&self) -> u32 {
                self.storage.mip_levels
            }

            fn samples(&self) -> SampleCount {
                self.storage.desc.samples
            }

            fn usage(&self) -> TextureUsage {
                self.storage.desc.usage
            }

            fn property(&self) -> MemoryProperty {
                self.storage.desc.property
            }

            fn sampler_desc(&self) -> SamplerDesc {
                self.storage.desc.sampler
            }

            fn is_external(&self) -> bool {
                self.storage.external
            }

            fn update(&self, layer: u32, data: &[u8]) -> GraphicsResult<()> {
                validate_texture_update(self, layer, data)?;
                let start = layer as usize * data.len();
                self.storage.pixels.borrow_mut()[start..start + data.len()].copy_from_slice(data);
                Ok(())
            }
        }

        impl NullResourceId for $ty {
            fn resource_id(&self) -> u64 {
                self.storage.id
            }
        }

        impl $ty {
            /// 读取某个 layer 的 level 0，layer 越界时返回空
            pub fn layer_bytes(&self, layer: u32) -> Vec<u8> {
                self.storage.layer_bytes(layer)
            }
        }
    };
}

pub struct NullTexture2D {
    storage: NullTextureStorage,
}

impl NullTexture2D {
    pub fn new(device: &Rc<NullDevice>, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Self> {
        Ok(Self {
            storage: NullTextureStorage::new(device, TextureKind::Texture2D, desc, data)?,
        })
    }

    /// swapchain 的 image，不拥有内存
    pub fn new_external(device: &Rc<NullDevice>, desc: &TextureDesc) -> GraphicsResult<Self> {
        let mut storage = NullTextureStorage::new(device, TextureKind::Texture2D, desc, None)?;
        storage.external = true;
        Ok(Self { storage })
    }
}

impl_null_texture!(NullTexture2D);

impl Texture2D for NullTexture2D {}

pub struct NullTexture2DArray {
    storage: NullTextureStorage,
}

impl NullTexture2DArray {
    pub fn new(device: &Rc<NullDevice>, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Self> {
        Ok(Self {
            storage: NullTextureStorage::new(device, TextureKind::Texture2DArray, desc, data)?,
        })
    }
}

impl_null_texture!(NullTexture2DArray);

impl Texture2DArray for NullTexture2DArray {}

pub struct NullTextureCube {
    storage: NullTextureStorage,
}

impl NullTextureCube {
    pub fn new(device: &Rc<NullDevice>, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Self> {
        Ok(Self {
            storage: NullTextureStorage::new(device, TextureKind::TextureCube, desc, data)?,
        })
    }
}

impl_null_texture!(NullTextureCube);

impl TextureCube for NullTextureCube {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::error::GraphicsError;

    #[test]
    fn test_texture_with_mips() {
        let device = Rc::new(NullDevice::new());
        let desc = TextureDesc::sampled_2d(256, 128, PixelFormat::R8G8B8A8Unorm).with_mipmaps();
        let tex = NullTexture2D::new(&device, &desc, Some(&vec![9u8; 256 * 128 * 4])).unwrap();
        assert_eq!(tex.mip_levels(), 9);
        assert_eq!(tex.layer_bytes(0)[0], 9);
    }

    #[test]
    fn test_array_and_cube_mips() {
        let device = Rc::new(NullDevice::new());
        let desc = TextureDesc::sampled_2d(32, 32, PixelFormat::R8Unorm).with_layers(3).with_mipmaps();
        let array = NullTexture2DArray::new(&device, &desc, Some(&[1u8; 32 * 32 * 3])).unwrap();
        assert_eq!(array.layer_count(), 3);
        assert_eq!(array.mip_levels(), 6);

        let cube = NullTextureCube::new(&device, &desc, None).unwrap();
        assert_eq!(cube.layer_count(), 6);
        assert_eq!(cube.mip_levels(), 6);
    }

    #[test]
    fn test_dynamic_update() {
        let device = Rc::new(NullDevice::new());
        let desc = TextureDesc::sampled_2d(2, 2, PixelFormat::R8Unorm)
            .with_layers(2)
            .with_property(MemoryProperty::Dynamic);
        let array = NullTexture2DArray::new(&device, &desc, None).unwrap();
        array.update(1, &[1, 2, 3, 4]).unwrap();
        assert_eq!(array.layer_bytes(0), vec![0; 4]);
        assert_eq!(array.layer_bytes(1), vec![1, 2, 3, 4]);
        assert!(array.update(2, &[0; 4]).is_err());

        let static_tex =
            NullTexture2D::new(&device, &TextureDesc::sampled_2d(2, 2, PixelFormat::R8Unorm), None).unwrap();
        assert!(matches!(static_tex.update(0, &[0; 4]), Err(GraphicsError::InvalidOperation(_))));
    }

    #[test]
    fn test_external_not_deleted() {
        let device = Rc::new(NullDevice::new());
        let desc = TextureDesc::attachment(4, 4, PixelFormat::B8G8R8A8Unorm, SampleCount::X1);
        drop(NullTexture2D::new_external(&device, &desc).unwrap());
        assert_eq!(device.pending_deletions(), 0);
    }
}
