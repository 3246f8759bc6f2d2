use std::any::Any;
use std::rc::Rc;

use ash::vk;
use itertools::Itertools;
use vesper_graphics::basic::graphics_func;
use vesper_graphics::basic::graphics_type::{
    AttachmentLoadOp, ClearValue, FramebufferDesc, GraphicsBackend, ImageLayout, RenderPassDesc, RenderPassLayoutDesc,
    SampleCount,
};
use vesper_graphics::interface::render_pass::{Framebuffer, RenderPass, RenderPassLayout, validate_framebuffer_desc};
use vesper_graphics::interface::resource::GraphicsResource;
use vesper_graphics::interface::texture::Texture2D;
use vesper_graphics::{GraphicsError, GraphicsResult};

use crate::conversion::{
    convert_to_vk_format, convert_to_vk_image_layout, convert_to_vk_load_op, convert_to_vk_sample_count,
    convert_to_vk_store_op,
};
use crate::foundation::VkResultExt;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::VkDevice;
use crate::resources::texture::VkTexture2D;
use crate::vk_cast;

/// 按 color、depth、resolve 的顺序生成 attachment 描述
///
/// - Load 的 attachment 初始 layout 等于最终 layout，其余都从 UNDEFINED 开始
/// - 有 resolve 时多重采样的 color 停留在 COLOR_ATTACHMENT，由 resolve attachment 进入最终 layout
pub fn attachment_descriptions(layout: &RenderPassLayoutDesc, desc: &RenderPassDesc) -> Vec<vk::AttachmentDescription> {
    let initial_layout = |load_op: AttachmentLoadOp, final_layout: vk::ImageLayout| match load_op {
        AttachmentLoadOp::Load => final_layout,
        AttachmentLoadOp::Clear | AttachmentLoadOp::DontCare => vk::ImageLayout::UNDEFINED,
    };
    let samples = convert_to_vk_sample_count(layout.samples);
    let resolve = layout.has_resolve();
    let color_final_layout = convert_to_vk_image_layout(desc.color_final_layout);

    let mut attachments = Vec::with_capacity(layout.color_formats.len() * 2 + 1);
    let color_final = if resolve { vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL } else { color_final_layout };
    attachments.extend(layout.color_formats.iter().map(|format| {
        vk::AttachmentDescription::default()
            .format(convert_to_vk_format(*format))
            .samples(samples)
            .load_op(convert_to_vk_load_op(desc.color_load_op))
            .store_op(convert_to_vk_store_op(desc.color_store_op))
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(initial_layout(desc.color_load_op, color_final))
            .final_layout(color_final)
    }));

    if let Some(depth_format) = layout.depth_format {
        let depth_final = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;
        let (stencil_load, stencil_store) = if graphics_func::has_stencil(depth_format) {
            (convert_to_vk_load_op(desc.depth_load_op), convert_to_vk_store_op(desc.depth_store_op))
        } else {
            (vk::AttachmentLoadOp::DONT_CARE, vk::AttachmentStoreOp::DONT_CARE)
        };
        attachments.push(
            vk::AttachmentDescription::default()
                .format(convert_to_vk_format(depth_format))
                .samples(samples)
                .load_op(convert_to_vk_load_op(desc.depth_load_op))
                .store_op(convert_to_vk_store_op(desc.depth_store_op))
                .stencil_load_op(stencil_load)
                .stencil_store_op(stencil_store)
                .initial_layout(initial_layout(desc.depth_load_op, depth_final))
                .final_layout(depth_final),
        );
    }

    if resolve {
        attachments.extend(layout.color_formats.iter().map(|format| {
            vk::AttachmentDescription::default()
                .format(convert_to_vk_format(*format))
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::DONT_CARE)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(color_final_layout)
        }));
    }
    attachments
}

/// 单个 subpass 与外部之间的依赖
pub fn subpass_dependencies() -> [vk::SubpassDependency; 2] {
    let attachment_stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    let attachment_writes = vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    [
        vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: attachment_stages,
            dst_stage_mask: attachment_stages,
            src_access_mask: attachment_writes,
            dst_access_mask: attachment_writes
                | vk::AccessFlags::COLOR_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
            dependency_flags: vk::DependencyFlags::empty(),
        },
        // 离屏的 attachment 之后可能被 shader 采样或者拷贝
        vk::SubpassDependency {
            src_subpass: 0,
            dst_subpass: vk::SUBPASS_EXTERNAL,
            src_stage_mask: attachment_stages,
            dst_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER
                | vk::PipelineStageFlags::COMPUTE_SHADER
                | vk::PipelineStageFlags::TRANSFER,
            src_access_mask: attachment_writes,
            dst_access_mask: vk::AccessFlags::SHADER_READ | vk::AccessFlags::TRANSFER_READ,
            dependency_flags: vk::DependencyFlags::empty(),
        },
    ]
}

fn create_native_render_pass(
    device: &VkDevice,
    layout: &RenderPassLayoutDesc,
    desc: &RenderPassDesc,
) -> GraphicsResult<vk::RenderPass> {
    let attachments = attachment_descriptions(layout, desc);
    let color_count = layout.color_formats.len() as u32;

    let color_refs = (0..color_count)
        .map(|i| vk::AttachmentReference {
            attachment: i,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        })
        .collect_vec();
    let depth_ref = vk::AttachmentReference {
        attachment: color_count,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let resolve_base = color_count + layout.depth_format.is_some() as u32;
    let resolve_refs = (0..color_count)
        .map(|i| vk::AttachmentReference {
            attachment: resolve_base + i,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        })
        .collect_vec();

    let mut subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);
    if layout.depth_format.is_some() {
        subpass = subpass.depth_stencil_attachment(&depth_ref);
    }
    if layout.has_resolve() {
        subpass = subpass.resolve_attachments(&resolve_refs);
    }

    let dependencies = subpass_dependencies();
    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(std::slice::from_ref(&subpass))
        .dependencies(&dependencies);
    unsafe { device.create_render_pass(&create_info, None) }.vk_context("vkCreateRenderPass")
}

fn destroy_native_render_pass(device: &Rc<VkDevice>, handle: vk::RenderPass) {
    device.defer_destroy(move |device| unsafe {
        device.destroy_render_pass(handle, None);
    });
}

/// 按 attachment 的顺序转换 clear value
pub fn vk_clear_values(layout: &RenderPassLayoutDesc, desc: &RenderPassDesc) -> Vec<vk::ClearValue> {
    desc.clear_values(layout)
        .into_iter()
        .map(|value| match value {
            ClearValue::Color(color) => vk::ClearValue {
                color: vk::ClearColorValue { float32: color },
            },
            ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
            },
        })
        .collect()
}

/// 持有一个只用于兼容性检查的 VkRenderPass
///
/// pipeline 与 framebuffer 都基于这个 render pass 创建，与之兼容的 render pass 都可以使用它们
pub struct VkRenderPassLayout {
    device: Rc<VkDevice>,
    desc: RenderPassLayoutDesc,
    compat: vk::RenderPass,
}

impl DebugType for VkRenderPassLayout {
    fn debug_type_name() -> &'static str {
        "VkRenderPassLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.compat
    }
}

impl VkRenderPassLayout {
    pub fn new(device: &Rc<VkDevice>, desc: &RenderPassLayoutDesc) -> GraphicsResult<Self> {
        if desc.color_formats.is_empty() && desc.depth_format.is_none() {
            return Err(GraphicsError::InvalidArgument("render pass layout without attachments".to_string()));
        }
        if let Some(format) = desc.color_formats.iter().find(|f| graphics_func::is_depth_format(**f)) {
            return Err(GraphicsError::InvalidArgument(format!("{format:?} used as color attachment")));
        }
        if let Some(format) = desc.depth_format.filter(|f| !graphics_func::is_depth_format(*f)) {
            return Err(GraphicsError::InvalidArgument(format!("{format:?} used as depth attachment")));
        }
        if desc.samples.count() > device.pdevice().max_usable_sample_count().count() {
            return Err(GraphicsError::Unsupported(format!("{:?} samples", desc.samples)));
        }

        // 兼容性与 load/store 和 layout 无关
        let compat = create_native_render_pass(device, desc, &RenderPassDesc::clear(ImageLayout::ColorAttachment))?;
        let layout = Self {
            device: device.clone(),
            desc: desc.clone(),
            compat,
        };
        device.set_debug_name(&layout, format!("{}-color-{:?}", desc.color_formats.len(), desc.samples));
        Ok(layout)
    }

    #[inline]
    pub fn compat_handle(&self) -> vk::RenderPass {
        self.compat
    }
}

impl Drop for VkRenderPassLayout {
    fn drop(&mut self) {
        destroy_native_render_pass(&self.device, self.compat);
    }
}

impl GraphicsResource for VkRenderPassLayout {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Vulkan
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RenderPassLayout for VkRenderPassLayout {
    fn desc(&self) -> &RenderPassLayoutDesc {
        &self.desc
    }
}

pub struct VkRenderPass {
    device: Rc<VkDevice>,
    layout: Rc<dyn RenderPassLayout>,
    desc: RenderPassDesc,
    handle: vk::RenderPass,
    clear_values: Vec<vk::ClearValue>,
}

impl DebugType for VkRenderPass {
    fn debug_type_name() -> &'static str {
        "VkRenderPass"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl VkRenderPass {
    pub fn new(
        device: &Rc<VkDevice>,
        layout: Rc<dyn RenderPassLayout>,
        desc: &RenderPassDesc,
        name: &str,
    ) -> GraphicsResult<Self> {
        let handle = create_native_render_pass(device, layout.desc(), desc)?;
        let render_pass = Self {
            device: device.clone(),
            clear_values: vk_clear_values(layout.desc(), desc),
            layout,
            desc: desc.clone(),
            handle,
        };
        device.set_debug_name(&render_pass, name);
        Ok(render_pass)
    }

    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }

    #[inline]
    pub fn clear_values(&self) -> &[vk::ClearValue] {
        &self.clear_values
    }
}

impl Drop for VkRenderPass {
    fn drop(&mut self) {
        destroy_native_render_pass(&self.device, self.handle);
    }
}

impl GraphicsResource for VkRenderPass {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Vulkan
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RenderPass for VkRenderPass {
    fn layout(&self) -> Rc<dyn RenderPassLayout> {
        self.layout.clone()
    }

    fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }
}

/// attachment 的 view 来自 [`VkTexture2D`]，framebuffer 持有 texture 保证 view 有效
pub struct VkFramebuffer {
    device: Rc<VkDevice>,
    desc: FramebufferDesc,
    handle: vk::Framebuffer,
}

impl DebugType for VkFramebuffer {
    fn debug_type_name() -> &'static str {
        "VkFramebuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl VkFramebuffer {
    pub fn new(device: &Rc<VkDevice>, desc: FramebufferDesc, name: &str) -> GraphicsResult<Self> {
        validate_framebuffer_desc(&desc)?;

        let view_of = |texture: &Rc<dyn Texture2D>| vk_cast::<VkTexture2D, _>(texture.as_ref()).storage().attachment_view();
        let views = desc
            .color_attachments
            .iter()
            .chain(desc.depth_attachment.iter())
            .chain(desc.resolve_attachments.iter())
            .map(view_of)
            .collect_vec();

        let layout: &VkRenderPassLayout = vk_cast(desc.layout.as_ref());
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(layout.compat_handle())
            .attachments(&views)
            .width(desc.width)
            .height(desc.height)
            .layers(1);
        let handle = unsafe { device.create_framebuffer(&create_info, None) }.vk_context("vkCreateFramebuffer")?;

        let framebuffer = Self {
            device: device.clone(),
            desc,
            handle,
        };
        device.set_debug_name(&framebuffer, name);
        Ok(framebuffer)
    }

    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.handle
    }

    #[inline]
    pub fn samples(&self) -> SampleCount {
        self.desc.layout.desc().samples
    }
}

impl Drop for VkFramebuffer {
    fn drop(&mut self) {
        let handle = self.handle;
        self.device.defer_destroy(move |device| unsafe {
            device.destroy_framebuffer(handle, None);
        });
    }
}

impl GraphicsResource for VkFramebuffer {
    fn backend(&self) -> GraphicsBackend {
        GraphicsBackend::Vulkan
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Framebuffer for VkFramebuffer {
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
    use vesper_graphics::basic::graphics_type::PixelFormat;

    fn msaa_layout() -> RenderPassLayoutDesc {
        RenderPassLayoutDesc {
            color_formats: vec![PixelFormat::B8G8R8A8Unorm],
            depth_format: Some(PixelFormat::D24UnormS8Uint),
            samples: SampleCount::X4,
            resolve: true,
        }
    }

    #[test]
    fn test_attachment_order_with_resolve() {
        let attachments = attachment_descriptions(&msaa_layout(), &RenderPassDesc::clear(ImageLayout::PresentSrc));
        assert_eq!(attachments.len(), 3);

        assert_eq!(attachments[0].samples, vk::SampleCountFlags::TYPE_4);
        assert_eq!(attachments[0].final_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(attachments[1].format, vk::Format::D24_UNORM_S8_UINT);
        assert_eq!(attachments[1].stencil_load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachments[2].samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(attachments[2].load_op, vk::AttachmentLoadOp::DONT_CARE);
        assert_eq!(attachments[2].final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn test_load_pass_keeps_content() {
        let layout = RenderPassLayoutDesc {
            samples: SampleCount::X1,
            depth_format: Some(PixelFormat::D32Float),
            ..msaa_layout()
        };
        let attachments = attachment_descriptions(&layout, &RenderPassDesc::load(ImageLayout::PresentSrc));
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].initial_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(attachments[1].initial_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        assert_eq!(attachments[1].stencil_load_op, vk::AttachmentLoadOp::DONT_CARE);

        let attachments = attachment_descriptions(&layout, &RenderPassDesc::clear(ImageLayout::PresentSrc));
        assert_eq!(attachments[0].initial_layout, vk::ImageLayout::UNDEFINED);
    }

    #[test]
    fn test_clear_values_follow_attachments() {
        let values = vk_clear_values(&msaa_layout(), &RenderPassDesc::clear(ImageLayout::PresentSrc));
        assert_eq!(values.len(), 3);
        unsafe {
            assert_eq!(values[0].color.float32, [0.0, 0.0, 0.0, 1.0]);
            assert_eq!(values[1].depth_stencil.depth, 1.0);
        }
    }

    #[test]
    fn test_external_dependencies() {
        let [enter, leave] = subpass_dependencies();
        assert_eq!(enter.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(leave.dst_subpass, vk::SUBPASS_EXTERNAL);
    }
}
