use std::any::Any;
use std::rc::Rc;

use ash::vk;
use vesper_graphics::basic::graphics_func;
use vesper_graphics::basic::graphics_type::{
    GraphicsBackend, MemoryProperty, PixelFormat, SampleCount, SamplerDesc, TextureDesc, TextureUsage,
};
use vesper_graphics::interface::resource::GraphicsResource;
use vesper_graphics::interface::texture::{
    Texture, Texture2D, Texture2DArray, TextureCube, TextureKind, validate_texture_desc, validate_texture_update,
};
use vesper_graphics::{GraphicsError, GraphicsResult};
use vk_mem::Alloc;

use crate::commands::barrier::VkImageBarrier;
use crate::conversion::{
    convert_to_vk_format, convert_to_vk_image_layout, convert_to_vk_image_usage, convert_to_vk_sample_count,
    image_aspect,
};
use crate::foundation::VkResultExt;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::VkDevice;
use crate::resources::buffer::{VkBufferStorage, buffer_alloc_info};
use crate::resources::sampler::VkSampler;

pub fn image_view_type(kind: TextureKind) -> vk::ImageViewType {
    match kind {
        TextureKind::Texture2D => vk::ImageViewType::TYPE_2D,
        TextureKind::Texture2DArray => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureKind::TextureCube => vk::ImageViewType::CUBE,
    }
}

/// 在声明的 usage 之上补充上传与生成 mipmap 所需的 transfer usage
pub fn image_usage(desc: &TextureDesc, mip_levels: u32, has_data: bool) -> vk::ImageUsageFlags {
    let mut usage = convert_to_vk_image_usage(desc.usage);
    if has_data && desc.property == MemoryProperty::Static {
        usage |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if mip_levels > 1 {
        usage |= vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
    }
    usage
}

/// 创建完成后 image 所处的 layout
///
/// Dynamic 的 texture 使用 linear tiling 并由 host 直接写入，固定为 GENERAL
pub fn texture_final_layout(desc: &TextureDesc) -> vk::ImageLayout {
    match desc.property {
        MemoryProperty::Dynamic => vk::ImageLayout::GENERAL,
        _ => convert_to_vk_image_layout(desc.initial_layout),
    }
}

/// 所有 Vulkan texture 共用的部分
pub struct VkTextureStorage {
    device: Rc<VkDevice>,
    image: vk::Image,
    allocation: Option<vk_mem::Allocation>,

    /// 采样使用的 view，覆盖全部 mip 与 layer
    view: vk::ImageView,
    /// 带 stencil 的 depth attachment 需要同时包含两个 aspect 的 view
    attachment_view: Option<vk::ImageView>,
    sampler: Option<VkSampler>,

    kind: TextureKind,
    desc: TextureDesc,
    mip_levels: u32,
    layout: vk::ImageLayout,
    /// swapchain 的 image，不由自己销毁
    external: bool,
    map_ptr: Option<*mut u8>,
}

impl DebugType for VkTextureStorage {
    fn debug_type_name() -> &'static str {
        "VkImage"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.image
    }
}

// new & init
impl VkTextureStorage {
    pub fn new(
        device: &Rc<VkDevice>,
        kind: TextureKind,
        desc: &TextureDesc,
        data: Option<&[u8]>,
        name: &str,
    ) -> GraphicsResult<Self> {
        let _span = tracy_client::span!("VkTextureStorage::new");
        let (desc, mip_levels) = validate_texture_desc(kind, desc, data)?;
        let format = convert_to_vk_format(desc.format);
        if mip_levels > 1 && !device.supports_linear_blit(format) {
            return Err(GraphicsError::Unsupported(format!("linear blit for mipmaps of {:?}", desc.format)));
        }

        let dynamic = desc.property == MemoryProperty::Dynamic;
        let image_ci = vk::ImageCreateInfo::default()
            .flags(if kind == TextureKind::TextureCube {
                vk::ImageCreateFlags::CUBE_COMPATIBLE
            } else {
                vk::ImageCreateFlags::empty()
            })
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(mip_levels)
            .array_layers(desc.layers)
            .samples(convert_to_vk_sample_count(desc.samples))
            .tiling(if dynamic { vk::ImageTiling::LINEAR } else { vk::ImageTiling::OPTIMAL })
            .usage(image_usage(&desc, mip_levels, data.is_some()))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(if dynamic { vk::ImageLayout::PREINITIALIZED } else { vk::ImageLayout::UNDEFINED });
        let alloc_ci = buffer_alloc_info(desc.property);

        let allocator = device.allocator();
        let (image, mut allocation) =
            unsafe { allocator.create_image(&image_ci, &alloc_ci) }.vk_context("vmaCreateImage")?;
        let map_ptr = if dynamic {
            match unsafe { allocator.map_memory(&mut allocation) }.vk_context("vmaMapMemory") {
                Ok(ptr) => Some(ptr),
                Err(e) => {
                    unsafe { allocator.destroy_image(image, &mut allocation) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        // 之后的任何失败都由 Drop 负责清理
        let mut texture = Self {
            device: device.clone(),
            image,
            allocation: Some(allocation),
            view: vk::ImageView::null(),
            attachment_view: None,
            sampler: None,
            kind,
            layout: texture_final_layout(&desc),
            desc,
            mip_levels,
            external: false,
            map_ptr,
        };
        device.set_debug_name(&texture, name);

        texture.initialize_content(data, name)?;
        texture.create_views(name)?;
        if texture.desc.usage.contains(TextureUsage::SAMPLED) {
            texture.sampler = Some(VkSampler::new(device, &texture.desc.sampler, mip_levels, name)?);
        }
        Ok(texture)
    }

    /// 包装 swapchain 的 image：只创建 view，没有 allocation 与 sampler
    pub fn new_external(device: &Rc<VkDevice>, image: vk::Image, desc: &TextureDesc, name: &str) -> GraphicsResult<Self> {
        let mut texture = Self {
            device: device.clone(),
            image,
            allocation: None,
            view: vk::ImageView::null(),
            attachment_view: None,
            sampler: None,
            kind: TextureKind::Texture2D,
            desc: desc.clone(),
            mip_levels: 1,
            layout: vk::ImageLayout::UNDEFINED,
            external: true,
            map_ptr: None,
        };
        texture.create_views(name)?;
        Ok(texture)
    }

    /// 写入初始数据，并把 image 转换到最终的 layout
    fn initialize_content(&self, data: Option<&[u8]>, name: &str) -> GraphicsResult<()> {
        let layer_count = self.desc.layers;
        let barrier_aspect = image_aspect(self.desc.format, true);
        let full_barrier = || {
            VkImageBarrier::new()
                .image(self.image)
                .image_aspect_flag(barrier_aspect)
                .mip_range(0, self.mip_levels)
                .layer_range(0, layer_count)
        };

        if self.map_ptr.is_some() {
            if let Some(data) = data {
                let layer_size =
                    graphics_func::texture_layer_size(self.desc.width, self.desc.height, self.desc.format) as usize;
                for (layer, layer_data) in data.chunks_exact(layer_size).enumerate() {
                    self.write_linear_layer(layer as u32, layer_data)?;
                }
            }
            return self.device.one_time_exec(&format!("{name}-init-layout"), |device, cmd| {
                full_barrier().layout_transfer(vk::ImageLayout::PREINITIALIZED, self.layout).record(device, cmd);
                Ok(())
            });
        }

        let Some(data) = data else {
            if self.layout == vk::ImageLayout::UNDEFINED {
                return Ok(());
            }
            return self.device.one_time_exec(&format!("{name}-init-layout"), |device, cmd| {
                full_barrier().layout_transfer(vk::ImageLayout::UNDEFINED, self.layout).record(device, cmd);
                Ok(())
            });
        };

        let stage_buffer = VkBufferStorage::new_stage_buffer(&self.device, data, name)?;
        self.device.one_time_exec(&format!("{name}-upload"), |device, cmd| {
            full_barrier()
                .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .record(device, cmd);

            // 所有 layer 的 level 0 在 buffer 中紧密排列，一次拷贝完成
            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: image_aspect(self.desc.format, false),
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count,
                })
                .image_extent(vk::Extent3D {
                    width: self.desc.width,
                    height: self.desc.height,
                    depth: 1,
                });
            unsafe {
                device.cmd_copy_buffer_to_image(
                    cmd,
                    stage_buffer.handle(),
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    std::slice::from_ref(&region),
                );
            }

            if self.mip_levels > 1 {
                self.record_mipmaps(device, cmd);
            } else if self.layout != vk::ImageLayout::TRANSFER_DST_OPTIMAL {
                full_barrier()
                    .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, self.layout)
                    .record(device, cmd);
            }
            Ok(())
        })
    }

    /// 逐级 blit 生成 mip 链，所有 layer 一起处理
    ///
    /// 调用时所有 level 都处于 TRANSFER_DST，结束后都处于最终 layout
    fn record_mipmaps(&self, device: &VkDevice, cmd: vk::CommandBuffer) {
        let (width, height, layer_count) = (self.desc.width, self.desc.height, self.desc.layers);
        let level_barrier = |level: u32| {
            VkImageBarrier::new()
                .image(self.image)
                .image_aspect_flag(vk::ImageAspectFlags::COLOR)
                .mip_range(level, 1)
                .layer_range(0, layer_count)
        };
        let subresource = |level: u32| vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: level,
            base_array_layer: 0,
            layer_count,
        };
        let far_corner = |level: u32| {
            let (w, h) = graphics_func::mip_extent(width, height, level);
            vk::Offset3D {
                x: w as i32,
                y: h as i32,
                z: 1,
            }
        };

        for level in 1..self.mip_levels {
            level_barrier(level - 1)
                .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                .record(device, cmd);

            let blit = vk::ImageBlit {
                src_subresource: subresource(level - 1),
                src_offsets: [vk::Offset3D::default(), far_corner(level - 1)],
                dst_subresource: subresource(level),
                dst_offsets: [vk::Offset3D::default(), far_corner(level)],
            };
            unsafe {
                device.cmd_blit_image(
                    cmd,
                    self.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    std::slice::from_ref(&blit),
                    vk::Filter::LINEAR,
                );
            }

            level_barrier(level - 1)
                .layout_transfer(vk::ImageLayout::TRANSFER_SRC_OPTIMAL, self.layout)
                .record(device, cmd);
        }
        level_barrier(self.mip_levels - 1)
            .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, self.layout)
            .record(device, cmd);
    }

    fn create_views(&mut self, name: &str) -> GraphicsResult<()> {
        let sampled_aspect = image_aspect(self.desc.format, false);
        self.view = self.create_view(image_view_type(self.kind), sampled_aspect)?;
        self.device.set_object_debug_name(self.view, format!("ImageView::{name}"));

        let attachment_aspect = image_aspect(self.desc.format, true);
        if self.desc.usage.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT) && attachment_aspect != sampled_aspect {
            let view = self.create_view(vk::ImageViewType::TYPE_2D, attachment_aspect)?;
            self.device.set_object_debug_name(view, format!("ImageView::{name}-attachment"));
            self.attachment_view = Some(view);
        }
        Ok(())
    }

    fn create_view(&self, view_type: vk::ImageViewType, aspect: vk::ImageAspectFlags) -> GraphicsResult<vk::ImageView> {
        let view_ci = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(view_type)
            .format(convert_to_vk_format(self.desc.format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: self.mip_levels,
                base_array_layer: 0,
                layer_count: if view_type == vk::ImageViewType::TYPE_2D { 1 } else { self.desc.layers },
            });
        unsafe { self.device.create_image_view(&view_ci, None) }.vk_context("vkCreateImageView")
    }
}

// getters
impl VkTextureStorage {
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// 作为 framebuffer attachment 时使用的 view
    #[inline]
    pub fn attachment_view(&self) -> vk::ImageView {
        self.attachment_view.unwrap_or(self.view)
    }

    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    #[inline]
    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.external
    }

    /// 写入 combined image sampler 所需的信息，没有 sampler 的 texture 不能被采样
    pub fn descriptor_image_info(&self) -> GraphicsResult<vk::DescriptorImageInfo> {
        let Some(sampler) = &self.sampler else {
            return Err(GraphicsError::InvalidArgument("texture was not created with SAMPLED usage".to_string()));
        };
        Ok(vk::DescriptorImageInfo {
            sampler: sampler.handle(),
            image_view: self.view,
            image_layout: self.layout,
        })
    }
}

// tools
impl VkTextureStorage {
    /// 按 driver 给出的 row pitch 逐行写入 linear image 的某个 layer
    fn write_linear_layer(&self, layer: u32, data: &[u8]) -> GraphicsResult<()> {
        let (Some(ptr), Some(allocation)) = (self.map_ptr, &self.allocation) else {
            return Err(GraphicsError::InvalidOperation("texture is not host visible".to_string()));
        };
        let subresource = vk::ImageSubresource {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            array_layer: layer,
        };
        let sub_layout = unsafe { self.device.get_image_subresource_layout(self.image, subresource) };

        let row_bytes = (self.desc.width * graphics_func::pixel_format_size(self.desc.format)) as usize;
        for (row, row_data) in data.chunks_exact(row_bytes).enumerate() {
            let dst_offset = sub_layout.offset as usize + row * sub_layout.row_pitch as usize;
            unsafe {
                std::ptr::copy_nonoverlapping(row_data.as_ptr(), ptr.add(dst_offset), row_bytes);
            }
        }
        self.device
            .allocator()
            .flush_allocation(allocation, sub_layout.offset, sub_layout.size)
            .vk_context("vmaFlushAllocation")
    }
}

impl Drop for VkTextureStorage {
    fn drop(&mut self) {
        let image = self.image;
        let views = [Some(self.view), self.attachment_view].into_iter().flatten().filter(|v| *v != vk::ImageView::null());
        let views: Vec<_> = views.collect();
        let allocation = self.allocation.take();
        let mapped = self.map_ptr.is_some();
        self.device.defer_destroy(move |device| unsafe {
            for view in views {
                device.destroy_image_view(view, None);
            }
            // 外部 image 没有 allocation，由 swapchain 销毁
            if let Some(mut allocation) = allocation {
                let allocator = device.allocator();
                if mapped {
                    allocator.unmap_memory(&mut allocation);
                }
                allocator.destroy_image(image, &mut allocation);
            }
        });
    }
}

macro_rules! impl_vk_texture {
    ($ty:ty) => {
        impl GraphicsResource for $ty {
            fn backend(&self) -> GraphicsBackend {
                GraphicsBackend::Vulkan
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
                self.storage.write_linear_layer(layer, data)
            }
        }

        impl $ty {
            #[inline]
            pub fn storage(&self) -> &VkTextureStorage {
                &self.storage
            }
        }
    };
}

pub struct VkTexture2D {
    storage: VkTextureStorage,
}

impl VkTexture2D {
    pub fn new(device: &Rc<VkDevice>, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Self> {
        Ok(Self {
            storage: VkTextureStorage::new(device, TextureKind::Texture2D, desc, data, "texture-2d")?,
        })
    }

    pub fn new_external(device: &Rc<VkDevice>, image: vk::Image, desc: &TextureDesc, name: &str) -> GraphicsResult<Self> {
        Ok(Self {
            storage: VkTextureStorage::new_external(device, image, desc, name)?,
        })
    }
}

impl_vk_texture!(VkTexture2D);

impl Texture2D for VkTexture2D {}

pub struct VkTexture2DArray {
    storage: VkTextureStorage,
}

impl VkTexture2DArray {
    pub fn new(device: &Rc<VkDevice>, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Self> {
        Ok(Self {
            storage: VkTextureStorage::new(device, TextureKind::Texture2DArray, desc, data, "texture-2d-array")?,
        })
    }
}

impl_vk_texture!(VkTexture2DArray);

impl Texture2DArray for VkTexture2DArray {}

pub struct VkTextureCube {
    storage: VkTextureStorage,
}

impl VkTextureCube {
    pub fn new(device: &Rc<VkDevice>, desc: &TextureDesc, data: Option<&[u8]>) -> GraphicsResult<Self> {
        Ok(Self {
            storage: VkTextureStorage::new(device, TextureKind::TextureCube, desc, data, "texture-cube")?,
        })
    }
}

impl_vk_texture!(VkTextureCube);

impl TextureCube for VkTextureCube {}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_graphics::basic::graphics_type::ImageLayout;

    #[test]
    fn test_image_usage() {
        let desc = TextureDesc::sampled_2d(64, 64, PixelFormat::R8G8B8A8Unorm);
        let usage = image_usage(&desc, 1, true);
        assert!(usage.contains(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST));
        assert!(!usage.contains(vk::ImageUsageFlags::TRANSFER_SRC));

        let usage = image_usage(&desc, 7, true);
        assert!(usage.contains(vk::ImageUsageFlags::TRANSFER_SRC));

        let attachment = TextureDesc::attachment(64, 64, PixelFormat::D32Float, SampleCount::X4);
        assert_eq!(image_usage(&attachment, 1, false), vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
    }

    #[test]
    fn test_final_layout() {
        let desc = TextureDesc::sampled_2d(4, 4, PixelFormat::R8Unorm);
        assert_eq!(texture_final_layout(&desc), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(
            texture_final_layout(&desc.clone().with_property(MemoryProperty::Dynamic)),
            vk::ImageLayout::GENERAL
        );

        let mut depth = TextureDesc::attachment(4, 4, PixelFormat::D24UnormS8Uint, SampleCount::X1);
        depth.initial_layout = ImageLayout::DepthStencilAttachment;
        assert_eq!(texture_final_layout(&depth), vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn test_view_types() {
        assert_eq!(image_view_type(TextureKind::TextureCube), vk::ImageViewType::CUBE);
        assert_eq!(image_view_type(TextureKind::Texture2DArray), vk::ImageViewType::TYPE_2D_ARRAY);
    }
}
