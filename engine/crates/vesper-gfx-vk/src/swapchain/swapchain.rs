use std::rc::Rc;

use ash::vk;
use vesper_graphics::basic::graphics_type::{
    Extent2D, FramebufferDesc, ImageLayout, PixelFormat, RenderPassDesc, RenderPassLayoutDesc, SampleCount, TextureDesc,
};
use vesper_graphics::deletion_queue::DELETION_DELAY;
use vesper_graphics::interface::render_pass::{Framebuffer, RenderPass, RenderPassLayout};
use vesper_graphics::interface::texture::Texture2D;
use vesper_graphics::{GraphicsError, GraphicsResult};

use crate::conversion::{convert_to_pixel_format, convert_to_vk_format};
use crate::foundation::VkResultExt;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::VkDevice;
use crate::render_pass::{VkFramebuffer, VkRenderPass, VkRenderPassLayout};
use crate::resources::texture::VkTexture2D;
use crate::swapchain::surface::VkSurface;

/// 按优先级排列的 depth 格式
pub const DEPTH_FORMAT_CANDIDATES: [PixelFormat; 3] =
    [PixelFormat::D24UnormS8Uint, PixelFormat::D32FloatS8Uint, PixelFormat::D32Float];

/// 优先 BGRA8 UNORM + SRGB_NONLINEAR，否则使用第一个可以表示的格式
///
/// 回退时跳过没有对应 `PixelFormat` 的格式：swapchain image 要包装成 Texture2D，
/// 格式必须能在抽象层中表示。
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| f.format == vk::Format::B8G8R8A8_UNORM && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.iter().find(|f| convert_to_pixel_format(f.format).is_some()))
        .copied()
}

/// FIFO 总是可用
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], prefer_mailbox: bool) -> vk::PresentModeKHR {
    if prefer_mailbox && modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// max_image_count == 0 表示不限制 image 数量
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    if caps.max_image_count == 0 {
        caps.min_image_count + 1
    } else {
        u32::min(caps.max_image_count, caps.min_image_count + 1)
    }
}

/// current_extent 为 u32::MAX 时由窗口尺寸决定，需要 clamp 到允许的范围
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, requested: Extent2D) -> Extent2D {
    if caps.current_extent.width != u32::MAX {
        return Extent2D::new(caps.current_extent.width, caps.current_extent.height);
    }
    Extent2D::new(
        requested.width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        requested.height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    )
}

/// 在候选中找到 device 支持作为 depth attachment 的格式
pub fn choose_depth_format(device: &VkDevice) -> GraphicsResult<PixelFormat> {
    let candidates = DEPTH_FORMAT_CANDIDATES.map(convert_to_vk_format);
    device
        .find_supported_format(&candidates, vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        .and_then(convert_to_pixel_format)
        .ok_or_else(|| GraphicsError::Unsupported("no depth attachment format".to_string()).fatal())
}

/// 重建 swapchain 时需要的参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainParams {
    pub extent: Extent2D,
    pub samples: SampleCount,
    pub depth_format: PixelFormat,
    pub prefer_mailbox: bool,
}

/// 每个 image 配一个 depth，开启 MSAA 时再配一个多重采样的 color，image 作为 resolve 目标
pub struct VkSwapchain {
    device: Rc<VkDevice>,
    surface: Rc<VkSurface>,
    handle: vk::SwapchainKHR,

    extent: Extent2D,
    color_format: PixelFormat,
    present_mode: vk::PresentModeKHR,

    attachments: SwapchainAttachments,
}

impl DebugType for VkSwapchain {
    fn debug_type_name() -> &'static str {
        "VkSwapchain"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// new & init
impl VkSwapchain {
    /// `old` 存在时作为 old_swapchain 传入，并在 layout 不变时复用它的 render pass layout
    pub fn new(
        device: &Rc<VkDevice>,
        surface: &Rc<VkSurface>,
        params: &SwapchainParams,
        old: Option<&VkSwapchain>,
    ) -> GraphicsResult<Self> {
        let _span = tracy_client::span!("VkSwapchain::new");
        let pdevice = device.pdevice().handle();

        let caps = surface.capabilities(pdevice)?;
        let surface_format = choose_surface_format(&surface.formats(pdevice)?)
            .ok_or_else(|| GraphicsError::Unsupported("no usable surface format".to_string()))?;
        let color_format = convert_to_pixel_format(surface_format.format)
            .ok_or_else(|| GraphicsError::Unsupported(format!("surface format {:?}", surface_format.format)))?;
        let present_mode = choose_present_mode(&surface.present_modes(pdevice)?, params.prefer_mailbox);
        let image_count = choose_image_count(&caps);
        let extent = choose_extent(&caps, params.extent);
        if image_count > DELETION_DELAY + 1 {
            log::warn!("swapchain asks for {image_count} images, more frames in flight than the deletion delay covers");
        }

        let families = device.queue_families();
        let family_indices = families.unique_families();
        let (sharing_mode, shared_families) = if families.graphics != families.present {
            (vk::SharingMode::CONCURRENT, family_indices.as_slice())
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(vk::Extent2D {
                width: extent.width,
                height: extent.height,
            })
            .image_array_layers(1)
            // TRANSFER_DST 用于 Nsight 分析
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(shared_families)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old.map_or(vk::SwapchainKHR::null(), |o| o.handle));
        let handle = unsafe { device.swapchain_loader().create_swapchain(&create_info, None) }
            .vk_context("vkCreateSwapchainKHR")?;

        let attachments = match SwapchainAttachments::new(device, handle, extent, color_format, params, old) {
            Ok(attachments) => attachments,
            Err(e) => {
                // 排在已创建的 image view 之后销毁
                device.defer_destroy(move |device| unsafe {
                    device.swapchain_loader().destroy_swapchain(handle, None);
                });
                return Err(e);
            }
        };

        let swapchain = Self {
            device: device.clone(),
            surface: surface.clone(),
            handle,
            extent,
            color_format,
            present_mode,
            attachments,
        };
        device.set_debug_name(&swapchain, "main");

        log::info!(
            "swapchain created: {}x{}, {:?}, {:?}, {} images, {:?}",
            extent.width,
            extent.height,
            color_format,
            present_mode,
            swapchain.attachments.framebuffers.len(),
            params.samples
        );
        Ok(swapchain)
    }
}

/// 依赖 swapchain image 的 render pass 与 framebuffer
struct SwapchainAttachments {
    layout: Rc<dyn RenderPassLayout>,
    clear_pass: Rc<dyn RenderPass>,
    load_pass: Rc<dyn RenderPass>,
    framebuffers: Vec<Rc<dyn Framebuffer>>,
}

impl SwapchainAttachments {
    fn new(
        device: &Rc<VkDevice>,
        handle: vk::SwapchainKHR,
        extent: Extent2D,
        color_format: PixelFormat,
        params: &SwapchainParams,
        old: Option<&VkSwapchain>,
    ) -> GraphicsResult<Self> {
        let samples = params.samples;
        let layout_desc = RenderPassLayoutDesc {
            color_formats: vec![color_format],
            depth_format: Some(params.depth_format),
            samples,
            resolve: samples.is_multisampled(),
        };
        let layout: Rc<dyn RenderPassLayout> = match old.map(|o| o.attachments.layout.clone()) {
            Some(old_layout) if *old_layout.desc() == layout_desc => old_layout,
            _ => Rc::new(VkRenderPassLayout::new(device, &layout_desc)?),
        };
        let clear_pass: Rc<dyn RenderPass> = Rc::new(VkRenderPass::new(
            device,
            layout.clone(),
            &RenderPassDesc::clear(ImageLayout::PresentSrc),
            "swapchain-clear",
        )?);
        let load_pass: Rc<dyn RenderPass> = Rc::new(VkRenderPass::new(
            device,
            layout.clone(),
            &RenderPassDesc::load(ImageLayout::PresentSrc),
            "swapchain-load",
        )?);

        let images = unsafe { device.swapchain_loader().get_swapchain_images(handle) }
            .vk_context("vkGetSwapchainImagesKHR")?;
        let (width, height) = (extent.width, extent.height);
        let framebuffers = images
            .iter()
            .enumerate()
            .map(|(idx, image)| -> GraphicsResult<Rc<dyn Framebuffer>> {
                device.set_object_debug_name(*image, format!("swapchain-image-{idx}"));
                let image: Rc<dyn Texture2D> = Rc::new(VkTexture2D::new_external(
                    device,
                    *image,
                    &TextureDesc::attachment(width, height, color_format, SampleCount::X1),
                    &format!("swapchain-{idx}"),
                )?);
                let depth: Rc<dyn Texture2D> = Rc::new(VkTexture2D::new(
                    device,
                    &TextureDesc::attachment(width, height, params.depth_format, samples),
                    None,
                )?);
                let (color_attachments, resolve_attachments) = if samples.is_multisampled() {
                    let msaa_color: Rc<dyn Texture2D> = Rc::new(VkTexture2D::new(
                        device,
                        &TextureDesc::attachment(width, height, color_format, samples),
                        None,
                    )?);
                    (vec![msaa_color], vec![image])
                } else {
                    (vec![image], vec![])
                };

                let framebuffer = VkFramebuffer::new(
                    device,
                    FramebufferDesc {
                        layout: layout.clone(),
                        color_attachments,
                        depth_attachment: Some(depth),
                        resolve_attachments,
                        width,
                        height,
                    },
                    &format!("swapchain-{idx}"),
                )?;
                Ok(Rc::new(framebuffer))
            })
            .collect::<GraphicsResult<Vec<_>>>()?;

        Ok(Self {
            layout,
            clear_pass,
            load_pass,
            framebuffers,
        })
    }
}

// getters
impl VkSwapchain {
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    #[inline]
    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    #[inline]
    pub fn color_format(&self) -> PixelFormat {
        self.color_format
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.attachments.framebuffers.len()
    }

    #[inline]
    pub fn layout(&self) -> &Rc<dyn RenderPassLayout> {
        &self.attachments.layout
    }

    #[inline]
    pub fn clear_pass(&self) -> &Rc<dyn RenderPass> {
        &self.attachments.clear_pass
    }

    #[inline]
    pub fn load_pass(&self) -> &Rc<dyn RenderPass> {
        &self.attachments.load_pass
    }

    #[inline]
    pub fn framebuffers(&self) -> &[Rc<dyn Framebuffer>] {
        &self.attachments.framebuffers
    }
}

// tools
impl VkSwapchain {
    /// 返回 None 表示 swapchain 已经过期或者不再是最优的，需要重建
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> GraphicsResult<Option<usize>> {
        let result = unsafe {
            self.device.swapchain_loader().acquire_next_image(self.handle, u64::MAX, semaphore, vk::Fence::null())
        };
        match result {
            Ok((index, false)) => Ok(Some(index as usize)),
            Ok((_, true)) => {
                log::debug!("swapchain is suboptimal on acquire");
                Ok(None)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("swapchain is out of date on acquire");
                Ok(None)
            }
            Err(e) => Err(e).vk_context("vkAcquireNextImageKHR"),
        }
    }

    /// 返回 false 表示 swapchain 需要重建
    pub fn present(&self, wait_semaphore: vk::Semaphore, image_index: usize) -> GraphicsResult<bool> {
        let image_indices = [image_index as u32];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(std::slice::from_ref(&wait_semaphore))
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.handle));

        let result = unsafe { self.device.swapchain_loader().queue_present(self.device.present_queue(), &present_info) };
        match result {
            Ok(false) => Ok(true),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("swapchain needs rebuild after present");
                Ok(false)
            }
            Err(e) => Err(e).vk_context("vkQueuePresentKHR"),
        }
    }
}

impl Drop for VkSwapchain {
    fn drop(&mut self) {
        let handle = self.handle;
        // surface 必须在 swapchain 之后销毁
        let surface = self.surface.clone();
        self.device.defer_destroy(move |device| unsafe {
            device.swapchain_loader().destroy_swapchain(handle, None);
            drop(surface);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min: u32, max: u32, current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: current,
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_surface_format_preference() {
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let bgra = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(choose_surface_format(&[srgb, bgra]), Some(bgra));
        assert_eq!(choose_surface_format(&[srgb]), Some(srgb));
        assert_eq!(choose_surface_format(&[]), None);

        // 无法表示为 PixelFormat 的格式即使排在前面也不会被选中
        let packed = vk::SurfaceFormatKHR {
            format: vk::Format::A2B10G10R10_UNORM_PACK32,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(choose_surface_format(&[packed, srgb]), Some(srgb));
        assert_eq!(choose_surface_format(&[packed]), None);
    }

    #[test]
    fn test_present_mode() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::MAILBOX);
        assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::FIFO);
        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO], true), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_image_count() {
        let current = vk::Extent2D { width: 8, height: 8 };
        assert_eq!(choose_image_count(&caps(2, 0, current)), 3);
        assert_eq!(choose_image_count(&caps(2, 2, current)), 2);
        assert_eq!(choose_image_count(&caps(2, 8, current)), 3);
    }

    #[test]
    fn test_extent() {
        let fixed = caps(2, 0, vk::Extent2D { width: 640, height: 480 });
        assert_eq!(choose_extent(&fixed, Extent2D::new(100, 100)), Extent2D::new(640, 480));

        let free = caps(
            2,
            0,
            vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
        );
        assert_eq!(choose_extent(&free, Extent2D::new(800, 600)), Extent2D::new(800, 600));
        assert_eq!(choose_extent(&free, Extent2D::new(9000, 0)), Extent2D::new(4096, 1));
    }
}
