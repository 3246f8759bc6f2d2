//! 后端无关的类型与 Vulkan 类型之间的转换

use ash::vk;
use vesper_graphics::basic::graphics_func;
use vesper_graphics::basic::graphics_type::{
    AttachmentLoadOp, AttachmentStoreOp, BlendFactor, BlendOp, BlendState, CompareOp, CullMode, Filter, FrontFace,
    ImageLayout, IndexFormat, PixelFormat, PolygonMode, PrimitiveTopology, Rect2D, SampleCount, SamplerAddressMode,
    ShaderResourceType, ShaderStage, TextureUsage, VertexFormat, VertexInputRate, Viewport,
};

// region format

pub const fn convert_to_vk_format(format: PixelFormat) -> vk::Format {
    match format {
        PixelFormat::R8Unorm => vk::Format::R8_UNORM,
        PixelFormat::R8G8Unorm => vk::Format::R8G8_UNORM,
        PixelFormat::R8G8B8A8Unorm => vk::Format::R8G8B8A8_UNORM,
        PixelFormat::R8G8B8A8Srgb => vk::Format::R8G8B8A8_SRGB,
        PixelFormat::B8G8R8A8Unorm => vk::Format::B8G8R8A8_UNORM,
        PixelFormat::B8G8R8A8Srgb => vk::Format::B8G8R8A8_SRGB,
        PixelFormat::R16Float => vk::Format::R16_SFLOAT,
        PixelFormat::R16G16Float => vk::Format::R16G16_SFLOAT,
        PixelFormat::R16G16B16A16Float => vk::Format::R16G16B16A16_SFLOAT,
        PixelFormat::R32Float => vk::Format::R32_SFLOAT,
        PixelFormat::R32G32Float => vk::Format::R32G32_SFLOAT,
        PixelFormat::R32G32B32Float => vk::Format::R32G32B32_SFLOAT,
        PixelFormat::R32G32B32A32Float => vk::Format::R32G32B32A32_SFLOAT,
        PixelFormat::R32Uint => vk::Format::R32_UINT,
        PixelFormat::D16Unorm => vk::Format::D16_UNORM,
        PixelFormat::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
        PixelFormat::D32Float => vk::Format::D32_SFLOAT,
        PixelFormat::D32FloatS8Uint => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

/// 没有对应 PixelFormat 的格式返回 None
pub fn convert_to_pixel_format(format: vk::Format) -> Option<PixelFormat> {
    PixelFormat::ALL.into_iter().find(|f| convert_to_vk_format(*f) == format)
}

pub const fn convert_to_vk_vertex_format(format: VertexFormat) -> vk::Format {
    match format {
        VertexFormat::Float => vk::Format::R32_SFLOAT,
        VertexFormat::Float2 => vk::Format::R32G32_SFLOAT,
        VertexFormat::Float3 => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::Float4 => vk::Format::R32G32B32A32_SFLOAT,
        VertexFormat::Int => vk::Format::R32_SINT,
        VertexFormat::Int2 => vk::Format::R32G32_SINT,
        VertexFormat::Int3 => vk::Format::R32G32B32_SINT,
        VertexFormat::Int4 => vk::Format::R32G32B32A32_SINT,
        VertexFormat::UInt => vk::Format::R32_UINT,
        VertexFormat::UInt2 => vk::Format::R32G32_UINT,
        VertexFormat::UInt3 => vk::Format::R32G32B32_UINT,
        VertexFormat::UInt4 => vk::Format::R32G32B32A32_UINT,
        VertexFormat::UByte4Norm => vk::Format::R8G8B8A8_UNORM,
    }
}

pub const fn convert_to_vk_index_type(format: IndexFormat) -> vk::IndexType {
    match format {
        IndexFormat::U16 => vk::IndexType::UINT16,
        IndexFormat::U32 => vk::IndexType::UINT32,
    }
}

/// 创建 image view 与 barrier 时使用的 aspect
///
/// depth 格式在作为 attachment 时需要同时包含 stencil
pub const fn image_aspect(format: PixelFormat, include_stencil: bool) -> vk::ImageAspectFlags {
    if !graphics_func::is_depth_format(format) {
        vk::ImageAspectFlags::COLOR
    } else if include_stencil && graphics_func::has_stencil(format) {
        vk::ImageAspectFlags::from_raw(vk::ImageAspectFlags::DEPTH.as_raw() | vk::ImageAspectFlags::STENCIL.as_raw())
    } else {
        vk::ImageAspectFlags::DEPTH
    }
}

// endregion

// region texture

pub const fn convert_to_vk_sample_count(samples: SampleCount) -> vk::SampleCountFlags {
    match samples {
        SampleCount::X1 => vk::SampleCountFlags::TYPE_1,
        SampleCount::X2 => vk::SampleCountFlags::TYPE_2,
        SampleCount::X4 => vk::SampleCountFlags::TYPE_4,
        SampleCount::X8 => vk::SampleCountFlags::TYPE_8,
        SampleCount::X16 => vk::SampleCountFlags::TYPE_16,
        SampleCount::X32 => vk::SampleCountFlags::TYPE_32,
        SampleCount::X64 => vk::SampleCountFlags::TYPE_64,
    }
}

pub const fn convert_to_vk_image_layout(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub fn convert_to_vk_image_usage(usage: TextureUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    let pairs = [
        (TextureUsage::SAMPLED, vk::ImageUsageFlags::SAMPLED),
        (TextureUsage::STORAGE, vk::ImageUsageFlags::STORAGE),
        (TextureUsage::COLOR_ATTACHMENT, vk::ImageUsageFlags::COLOR_ATTACHMENT),
        (TextureUsage::DEPTH_STENCIL_ATTACHMENT, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT),
        (TextureUsage::TRANSFER_SRC, vk::ImageUsageFlags::TRANSFER_SRC),
        (TextureUsage::TRANSFER_DST, vk::ImageUsageFlags::TRANSFER_DST),
    ];
    for (usage_bit, vk_bit) in pairs {
        if usage.contains(usage_bit) {
            flags |= vk_bit;
        }
    }
    flags
}

pub const fn convert_to_vk_filter(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub const fn convert_to_vk_mipmap_mode(filter: Filter) -> vk::SamplerMipmapMode {
    match filter {
        Filter::Nearest => vk::SamplerMipmapMode::NEAREST,
        Filter::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub const fn convert_to_vk_address_mode(mode: SamplerAddressMode) -> vk::SamplerAddressMode {
    match mode {
        SamplerAddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        SamplerAddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        SamplerAddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        SamplerAddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

// endregion

// region render pass

pub const fn convert_to_vk_load_op(op: AttachmentLoadOp) -> vk::AttachmentLoadOp {
    match op {
        AttachmentLoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        AttachmentLoadOp::Load => vk::AttachmentLoadOp::LOAD,
        AttachmentLoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub const fn convert_to_vk_store_op(op: AttachmentStoreOp) -> vk::AttachmentStoreOp {
    match op {
        AttachmentStoreOp::Store => vk::AttachmentStoreOp::STORE,
        AttachmentStoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

// endregion

// region pipeline

pub fn convert_to_vk_shader_stage(stage: ShaderStage) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stage.contains(ShaderStage::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stage.contains(ShaderStage::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    if stage.contains(ShaderStage::COMPUTE) {
        flags |= vk::ShaderStageFlags::COMPUTE;
    }
    flags
}

pub const fn convert_to_vk_descriptor_type(ty: ShaderResourceType) -> vk::DescriptorType {
    match ty {
        ShaderResourceType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        ShaderResourceType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        ShaderResourceType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

pub const fn convert_to_vk_input_rate(rate: VertexInputRate) -> vk::VertexInputRate {
    match rate {
        VertexInputRate::PerVertex => vk::VertexInputRate::VERTEX,
        VertexInputRate::PerInstance => vk::VertexInputRate::INSTANCE,
    }
}

pub const fn convert_to_vk_topology(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
    }
}

pub const fn convert_to_vk_cull_mode(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub const fn convert_to_vk_front_face(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub const fn convert_to_vk_polygon_mode(mode: PolygonMode) -> vk::PolygonMode {
    match mode {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
        PolygonMode::Point => vk::PolygonMode::POINT,
    }
}

pub const fn convert_to_vk_compare_op(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

pub const fn convert_to_vk_blend_factor(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
    }
}

pub const fn convert_to_vk_blend_op(op: BlendOp) -> vk::BlendOp {
    match op {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

pub fn convert_to_vk_blend_attachment(blend: &BlendState) -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(blend.enabled)
        .src_color_blend_factor(convert_to_vk_blend_factor(blend.src_color))
        .dst_color_blend_factor(convert_to_vk_blend_factor(blend.dst_color))
        .color_blend_op(convert_to_vk_blend_op(blend.color_op))
        .src_alpha_blend_factor(convert_to_vk_blend_factor(blend.src_alpha))
        .dst_alpha_blend_factor(convert_to_vk_blend_factor(blend.dst_alpha))
        .alpha_blend_op(convert_to_vk_blend_op(blend.alpha_op))
        .color_write_mask(vk::ColorComponentFlags::RGBA)
}

#[inline]
pub fn convert_to_vk_viewport(viewport: &Viewport) -> vk::Viewport {
    vk::Viewport {
        x: viewport.x,
        y: viewport.y,
        width: viewport.width,
        height: viewport.height,
        min_depth: viewport.min_depth,
        max_depth: viewport.max_depth,
    }
}

#[inline]
pub fn convert_to_vk_rect(rect: &Rect2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: rect.x, y: rect.y },
        extent: vk::Extent2D {
            width: rect.width,
            height: rect.height,
        },
    }
}

// endregion

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_round_trip() {
        for format in PixelFormat::ALL {
            assert_eq!(convert_to_pixel_format(convert_to_vk_format(format)), Some(format), "{format:?}");
        }
        assert_eq!(convert_to_pixel_format(vk::Format::BC7_UNORM_BLOCK), None);
    }

    #[test]
    fn test_vertex_format_size_matches() {
        // UByte4Norm 是 4 字节，与 R8G8B8A8 一致
        assert_eq!(convert_to_vk_vertex_format(VertexFormat::UByte4Norm), vk::Format::R8G8B8A8_UNORM);
        assert_eq!(graphics_func::vertex_format_size(VertexFormat::UByte4Norm), 4);
        assert_eq!(convert_to_vk_vertex_format(VertexFormat::Float3), vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn test_image_aspect() {
        assert_eq!(image_aspect(PixelFormat::R8G8B8A8Unorm, true), vk::ImageAspectFlags::COLOR);
        assert_eq!(image_aspect(PixelFormat::D32Float, true), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            image_aspect(PixelFormat::D24UnormS8Uint, true),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(image_aspect(PixelFormat::D24UnormS8Uint, false), vk::ImageAspectFlags::DEPTH);
    }

    #[test]
    fn test_flags() {
        assert_eq!(
            convert_to_vk_shader_stage(ShaderStage::ALL_GRAPHICS),
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
        assert_eq!(
            convert_to_vk_image_usage(TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST),
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST
        );
        assert_eq!(convert_to_vk_sample_count(SampleCount::X8), vk::SampleCountFlags::TYPE_8);
    }
}
