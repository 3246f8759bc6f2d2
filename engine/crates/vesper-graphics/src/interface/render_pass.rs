use std::rc::Rc;

use crate::basic::error::{GraphicsError, GraphicsResult};
use crate::basic::graphics_type::{Extent2D, FramebufferDesc, RenderPassDesc, RenderPassLayoutDesc, SampleCount};
use crate::interface::resource::GraphicsResource;
use crate::interface::texture::{Texture, Texture2D};

/// attachment 的格式与采样数，决定 render pass 与 pipeline 的兼容性
pub trait RenderPassLayout: GraphicsResource {
    fn desc(&self) -> &RenderPassLayoutDesc;
}

/// 基于某个 layout 的 load/store 行为
pub trait RenderPass: GraphicsResource {
    fn layout(&self) -> Rc<dyn RenderPassLayout>;

    fn desc(&self) -> &RenderPassDesc;
}

pub trait Framebuffer: GraphicsResource {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn layout(&self) -> Rc<dyn RenderPassLayout>;

    fn color_attachments(&self) -> &[Rc<dyn Texture2D>];

    fn depth_attachment(&self) -> Option<&Rc<dyn Texture2D>>;

    fn resolve_attachments(&self) -> &[Rc<dyn Texture2D>];

    #[inline]
    fn extent(&self) -> Extent2D {
        Extent2D::new(self.width(), self.height())
    }
}

/// 检查 framebuffer 的 attachment 与 layout 一致，且尺寸都等于 framebuffer 的尺寸
pub fn validate_framebuffer_desc(desc: &FramebufferDesc) -> GraphicsResult<()> {
    let layout = desc.layout.desc();
    let invalid = |msg: String| Err(GraphicsError::InvalidArgument(msg));

    if desc.width == 0 || desc.height == 0 {
        return invalid(format!("framebuffer extent {}x{}", desc.width, desc.height));
    }
    if desc.color_attachments.len() != layout.color_formats.len() {
        return invalid(format!(
            "framebuffer has {} color attachments, layout declares {}",
            desc.color_attachments.len(),
            layout.color_formats.len()
        ));
    }
    let expected_resolves = if layout.has_resolve() { layout.color_formats.len() } else { 0 };
    if desc.resolve_attachments.len() != expected_resolves {
        return invalid(format!(
            "framebuffer has {} resolve attachments, layout expects {expected_resolves}",
            desc.resolve_attachments.len()
        ));
    }

    let extent = Extent2D::new(desc.width, desc.height);
    for (i, color) in desc.color_attachments.iter().enumerate() {
        if color.format() != layout.color_formats[i] || color.samples() != layout.samples {
            return invalid(format!("color attachment {i} does not match the layout"));
        }
        if color.extent() != extent {
            return invalid(format!("color attachment {i} is {:?}, framebuffer is {extent:?}", color.extent()));
        }
    }
    for (i, resolve) in desc.resolve_attachments.iter().enumerate() {
        if resolve.format() != layout.color_formats[i] || resolve.samples() != SampleCount::X1 {
            return invalid(format!("resolve attachment {i} does not match the layout"));
        }
        if resolve.extent() != extent {
            return invalid(format!("resolve attachment {i} is {:?}, framebuffer is {extent:?}", resolve.extent()));
        }
    }
    match (&desc.depth_attachment, layout.depth_format) {
        (Some(depth), Some(format)) => {
            if depth.format() != format || depth.samples() != layout.samples {
                return invalid("depth attachment does not match the layout".to_string());
            }
            if depth.extent() != extent {
                return invalid(format!("depth attachment is {:?}, framebuffer is {extent:?}", depth.extent()));
            }
        }
        (None, None) => {}
        _ => return invalid("depth attachment presence does not match the layout".to_string()),
    }
    Ok(())
}
