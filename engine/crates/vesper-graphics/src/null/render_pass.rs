use std::any::Any;
use std::rc::Rc;

use crate::basic::error::GraphicsResult;
use crate::basic::graphics_type::{FramebufferDesc, GraphicsBackend, RenderPassDesc, RenderPassLayoutDesc};
use crate::interface::render_pass::{Framebuffer, RenderPass, RenderPassLayout, validate_framebuffer_desc};
use crate::interface::resource::GraphicsResource;
use crate::interface::texture::Texture2D;
use crate::null::NullResourceId;

pub struct NullRenderPassLayout {
    desc: RenderPassLayoutDesc,
}

impl NullRenderPassLayout {
    pub fn new(desc: &RenderPassLayoutDesc) -> Self {
        Self { desc: desc.clone() }
    }
}

impl GraphicsResource for NullRenderPassLayout {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Null
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RenderPassLayout for NullRenderPassLayout {
    fn desc(&self) -> &RenderPassLayoutDesc {
        &self.desc
    }
}

pub struct NullRenderPass {
    layout: Rc<dyn RenderPassLayout>,
    desc: RenderPassDesc,
}

impl NullRenderPass {
    pub fn new(layout: Rc<dyn RenderPassLayout>, desc: &RenderPassDesc) -> Self {
        Self {
            layout,
            desc: desc.clone(),
        }
    }
}

impl GraphicsResource for NullRenderPass {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Null
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RenderPass for NullRenderPass {
    fn layout(&self) -> Rc<dyn RenderPassLayout> {
        self.layout.clone()
    }

    fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }
}

pub struct NullFramebuffer {
    id: u64,
    desc: FramebufferDesc,
}

impl NullFramebuffer {
    pub fn new(id: u64, desc: FramebufferDesc) -> GraphicsResult<Self> {
        validate_framebuffer_desc(&desc)?;
        Ok(Self { id, desc })
    }
}

impl GraphicsResource for NullFramebuffer {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Null
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl NullResourceId for NullFramebuffer {
    fn resource_id(&self) -> u64 {
        self.id
    }
}

impl Framebuffer for NullFramebuffer {
    fn width(&self) -> u32 {
        self.desc.width
    }

    fn height(&self) -> u32 {
        self.desc.height
    }

    fn layout(&self) -> Rc<dyn RenderPassLayout> {
        self.desc.layout.clone()
    }

    fn color_attachments(&self) -> &[Rc<dyn Texture2D>] {
        &self.desc.color_attachments
    }

    fn depth_attachment(&self) -> Option<&Rc<dyn Texture2D>> {
        self.desc.depth_attachment.as_ref()
    }

    fn resolve_attachments(&self) -> &[Rc<dyn Texture2D>] {
        &self.desc.resolve_attachments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::graphics_type::{PixelFormat, SampleCount, TextureDesc};
    use crate::null::device::NullDevice;
    use crate::null::texture::NullTexture2D;

    fn attachment(device: &Rc<NullDevice>, w: u32, h: u32, format: PixelFormat) -> Rc<dyn Texture2D> {
        Rc::new(NullTexture2D::new(device, &TextureDesc::attachment(w, h, format, SampleCount::X1), None).unwrap())
    }

    #[test]
    fn test_framebuffer_validation() {
        let device = Rc::new(NullDevice::new());
        let layout: Rc<dyn RenderPassLayout> = Rc::new(NullRenderPassLayout::new(&RenderPassLayoutDesc {
            color_formats: vec![PixelFormat::R16G16B16A16Float],
            depth_format: Some(PixelFormat::D32Float),
            samples: SampleCount::X1,
            resolve: false,
        }));

        let ok = NullFramebuffer::new(
            1,
            FramebufferDesc {
                layout: layout.clone(),
                color_attachments: vec![attachment(&device, 64, 32, PixelFormat::R16G16B16A16Float)],
                depth_attachment: Some(attachment(&device, 64, 32, PixelFormat::D32Float)),
                resolve_attachments: vec![],
                width: 64,
                height: 32,
            },
        )
        .unwrap();
        assert_eq!((ok.width(), ok.height()), (64, 32));

        let wrong_size = NullFramebuffer::new(
            2,
            FramebufferDesc {
                layout: layout.clone(),
                color_attachments: vec![attachment(&device, 64, 64, PixelFormat::R16G16B16A16Float)],
                depth_attachment: Some(attachment(&device, 64, 32, PixelFormat::D32Float)),
                resolve_attachments: vec![],
                width: 64,
                height: 32,
            },
        );
        assert!(wrong_size.is_err());

        let missing_depth = NullFramebuffer::new(
            3,
            FramebufferDesc {
                layout,
                color_attachments: vec![attachment(&device, 64, 32, PixelFormat::R16G16B16A16Float)],
                depth_attachment: None,
                resolve_attachments: vec![],
                width: 64,
                height: 32,
            },
        );
        assert!(missing_depth.is_err());
    }
}
