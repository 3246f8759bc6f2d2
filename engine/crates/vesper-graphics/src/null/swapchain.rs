use std::rc::Rc;

use crate::basic::error::GraphicsResult;
use crate::basic::graphics_type::{
    Extent2D, FramebufferDesc, ImageLayout, PixelFormat, RenderPassDesc, RenderPassLayoutDesc, SampleCount, TextureDesc,
};
use crate::interface::render_pass::{Framebuffer, RenderPass, RenderPassLayout};
use crate::interface::texture::Texture2D;
use crate::null::device::NullDevice;
use crate::null::render_pass::{NullFramebuffer, NullRenderPass, NullRenderPassLayout};
use crate::null::texture::NullTexture2D;

/// null swapchain 的 image 数量
pub const NULL_IMAGE_COUNT: usize = 2;
pub const NULL_COLOR_FORMAT: PixelFormat = PixelFormat::B8G8R8A8Unorm;
pub const NULL_DEPTH_FORMAT: PixelFormat = PixelFormat::D24UnormS8Uint;
/// null device 声称支持的最大采样数
pub const NULL_MAX_SAMPLES: SampleCount = SampleCount::X4;

/// 与 Vulkan swapchain 结构相同的内存版本：
/// 每个 image 配一个 depth，开启 MSAA 时再配一个多重采样的 color，image 作为 resolve 目标
pub struct NullSwapchain {
    extent: Extent2D,
    layout: Rc<dyn RenderPassLayout>,
    clear_pass: Rc<dyn RenderPass>,
    load_pass: Rc<dyn RenderPass>,
    framebuffers: Vec<Rc<dyn Framebuffer>>,
    acquire_count: usize,
}

// new & init
impl NullSwapchain {
    /// `old_layout` 的格式与采样数不变时直接复用
    pub fn new(
        device: &Rc<NullDevice>,
        extent: Extent2D,
        samples: SampleCount,
        old_layout: Option<Rc<dyn RenderPassLayout>>,
    ) -> GraphicsResult<Self> {
        let layout_desc = RenderPassLayoutDesc {
            color_formats: vec![NULL_COLOR_FORMAT],
            depth_format: Some(NULL_DEPTH_FORMAT),
            samples,
            resolve: samples.is_multisampled(),
        };
        let layout: Rc<dyn RenderPassLayout> = match old_layout {
            Some(old) if *old.desc() == layout_desc => old,
            _ => Rc::new(NullRenderPassLayout::new(&layout_desc)),
        };
        let clear_pass: Rc<dyn RenderPass> =
            Rc::new(NullRenderPass::new(layout.clone(), &RenderPassDesc::clear(ImageLayout::PresentSrc)));
        let load_pass: Rc<dyn RenderPass> =
            Rc::new(NullRenderPass::new(layout.clone(), &RenderPassDesc::load(ImageLayout::PresentSrc)));

        let mut framebuffers: Vec<Rc<dyn Framebuffer>> = Vec::with_capacity(NULL_IMAGE_COUNT);
        for _ in 0..NULL_IMAGE_COUNT {
            let image: Rc<dyn Texture2D> = Rc::new(NullTexture2D::new_external(
                device,
                &TextureDesc::attachment(extent.width, extent.height, NULL_COLOR_FORMAT, SampleCount::X1),
            )?);
            let depth: Rc<dyn Texture2D> = Rc::new(NullTexture2D::new(
                device,
                &TextureDesc::attachment(extent.width, extent.height, NULL_DEPTH_FORMAT, samples),
                None,
            )?);
            let (color_attachments, resolve_attachments) = if samples.is_multisampled() {
                let msaa_color: Rc<dyn Texture2D> = Rc::new(NullTexture2D::new(
                    device,
                    &TextureDesc::attachment(extent.width, extent.height, NULL_COLOR_FORMAT, samples),
                    None,
                )?);
                (vec![msaa_color], vec![image])
            } else {
                (vec![image], vec![])
            };

            framebuffers.push(Rc::new(NullFramebuffer::new(
                device.alloc_id(),
                FramebufferDesc {
                    layout: layout.clone(),
                    color_attachments,
                    depth_attachment: Some(depth),
                    resolve_attachments,
                    width: extent.width,
                    height: extent.height,
                },
            )?));
        }

        Ok(Self {
            extent,
            layout,
            clear_pass,
            load_pass,
            framebuffers,
            acquire_count: 0,
        })
    }
}

// getters
impl NullSwapchain {
    #[inline]
    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    #[inline]
    pub fn layout(&self) -> &Rc<dyn RenderPassLayout> {
        &self.layout
    }

    #[inline]
    pub fn clear_pass(&self) -> &Rc<dyn RenderPass> {
        &self.clear_pass
    }

    #[inline]
    pub fn load_pass(&self) -> &Rc<dyn RenderPass> {
        &self.load_pass
    }

    #[inline]
    pub fn framebuffers(&self) -> &[Rc<dyn Framebuffer>] {
        &self.framebuffers
    }
}

// tools
impl NullSwapchain {
    /// image 按顺序轮转
    pub fn acquire_next_image(&mut self) -> usize {
        let index = self.acquire_count % self.framebuffers.len();
        self.acquire_count += 1;
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::texture::Texture;

    #[test]
    fn test_msaa_attachments() {
        let device = Rc::new(NullDevice::new());
        let swapchain = NullSwapchain::new(&device, Extent2D::new(320, 240), SampleCount::X4, None).unwrap();
        for fb in swapchain.framebuffers() {
            assert_eq!(fb.color_attachments()[0].samples(), SampleCount::X4);
            assert_eq!(fb.resolve_attachments().len(), 1);
            assert!(fb.resolve_attachments()[0].is_external());
        }
        assert!(swapchain.layout().desc().has_resolve());
    }

    #[test]
    fn test_layout_reused_when_unchanged() {
        let device = Rc::new(NullDevice::new());
        let first = NullSwapchain::new(&device, Extent2D::new(8, 8), SampleCount::X1, None).unwrap();
        let second =
            NullSwapchain::new(&device, Extent2D::new(16, 16), SampleCount::X1, Some(first.layout().clone())).unwrap();
        assert!(Rc::ptr_eq(first.layout(), second.layout()));

        let msaa =
            NullSwapchain::new(&device, Extent2D::new(16, 16), SampleCount::X4, Some(first.layout().clone())).unwrap();
        assert!(!Rc::ptr_eq(first.layout(), msaa.layout()));
    }

    #[test]
    fn test_acquire_rotates() {
        let device = Rc::new(NullDevice::new());
        let mut swapchain = NullSwapchain::new(&device, Extent2D::new(8, 8), SampleCount::X1, None).unwrap();
        let order: Vec<_> = (0..4).map(|_| swapchain.acquire_next_image()).collect();
        assert_eq!(order, vec![0, 1, 0, 1]);
    }
}
