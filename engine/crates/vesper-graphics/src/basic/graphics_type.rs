//! 后端无关的图形类型：枚举、flags 以及各类资源的描述结构
//!
//! 这里只有数据，没有状态。各个后端负责把它们翻译为 native 的类型。

use std::rc::Rc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::basic::shared_ref::SharedRef;
use crate::interface::pipeline::VertexInputLayout;
use crate::interface::render_pass::RenderPassLayout;
use crate::interface::shader::{ComputeShader, GraphicsShader};
use crate::interface::shader_resources::ShaderResourcesLayout;
use crate::interface::texture::Texture2D;

/// 运行时选择的图形后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsBackend {
    #[default]
    Vulkan,
    /// 不依赖 GPU 的内存后端，用于测试与 CI
    Null,
}

/// 资源的内存属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryProperty {
    /// device local，创建时通过 staging 上传一次，之后 CPU 不可写
    Static,
    /// host visible + coherent，持久映射，可以每帧 update
    Dynamic,
    /// host visible + coherent，只作为 copy 的源
    Staging,
}

impl MemoryProperty {
    #[inline]
    pub fn is_host_visible(self) -> bool {
        !matches!(self, MemoryProperty::Static)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    R8Unorm,
    R8G8Unorm,
    R8G8B8A8Unorm,
    R8G8B8A8Srgb,
    B8G8R8A8Unorm,
    B8G8R8A8Srgb,
    R16Float,
    R16G16Float,
    R16G16B16A16Float,
    R32Float,
    R32G32Float,
    R32G32B32Float,
    R32G32B32A32Float,
    R32Uint,
    D16Unorm,
    D24UnormS8Uint,
    D32Float,
    D32FloatS8Uint,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 18] = [
        PixelFormat::R8Unorm,
        PixelFormat::R8G8Unorm,
        PixelFormat::R8G8B8A8Unorm,
        PixelFormat::R8G8B8A8Srgb,
        PixelFormat::B8G8R8A8Unorm,
        PixelFormat::B8G8R8A8Srgb,
        PixelFormat::R16Float,
        PixelFormat::R16G16Float,
        PixelFormat::R16G16B16A16Float,
        PixelFormat::R32Float,
        PixelFormat::R32G32Float,
        PixelFormat::R32G32B32Float,
        PixelFormat::R32G32B32A32Float,
        PixelFormat::R32Uint,
        PixelFormat::D16Unorm,
        PixelFormat::D24UnormS8Uint,
        PixelFormat::D32Float,
        PixelFormat::D32FloatS8Uint,
    ];
}

/// 顶点属性的格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float,
    Float2,
    Float3,
    Float4,
    Int,
    Int2,
    Int3,
    Int4,
    UInt,
    UInt2,
    UInt3,
    UInt4,
    UByte4Norm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexInputRate {
    #[default]
    PerVertex,
    PerInstance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    #[default]
    TriangleList,
    TriangleStrip,
    LineList,
    LineStrip,
    PointList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareOp {
    Never,
    #[default]
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// 所有 color attachment 共用的混合状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub enabled: bool,
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub color_op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOp,
}

impl Default for BlendState {
    fn default() -> Self {
        Self::opaque()
    }
}

impl BlendState {
    pub const fn opaque() -> Self {
        Self {
            enabled: false,
            src_color: BlendFactor::One,
            dst_color: BlendFactor::Zero,
            color_op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
        }
    }

    /// 非预乘的 alpha 混合：`src * a + dst * (1 - a)`
    pub const fn alpha_blend() -> Self {
        Self {
            enabled: true,
            src_color: BlendFactor::SrcAlpha,
            dst_color: BlendFactor::OneMinusSrcAlpha,
            color_op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::OneMinusSrcAlpha,
            alpha_op: BlendOp::Add,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentLoadOp {
    Clear,
    Load,
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentStoreOp {
    Store,
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum SampleCount {
    #[default]
    X1,
    X2,
    X4,
    X8,
    X16,
    X32,
    X64,
}

impl SampleCount {
    /// 从高到低排列，用于挑选设备支持的最大采样数
    pub const DESCENDING: [SampleCount; 7] = [
        SampleCount::X64,
        SampleCount::X32,
        SampleCount::X16,
        SampleCount::X8,
        SampleCount::X4,
        SampleCount::X2,
        SampleCount::X1,
    ];

    #[inline]
    pub const fn count(self) -> u32 {
        match self {
            SampleCount::X1 => 1,
            SampleCount::X2 => 2,
            SampleCount::X4 => 4,
            SampleCount::X8 => 8,
            SampleCount::X16 => 16,
            SampleCount::X32 => 32,
            SampleCount::X64 => 64,
        }
    }

    #[inline]
    pub const fn is_multisampled(self) -> bool {
        !matches!(self, SampleCount::X1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerAddressMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

/// texture 自带 sampler 的描述
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_mode: Filter,
    pub address_mode_u: SamplerAddressMode,
    pub address_mode_v: SamplerAddressMode,
    pub address_mode_w: SamplerAddressMode,
    /// None 表示关闭各向异性过滤；实际值会被 clamp 到设备上限
    pub max_anisotropy: Option<f32>,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mipmap_mode: Filter::Linear,
            address_mode_u: SamplerAddressMode::Repeat,
            address_mode_v: SamplerAddressMode::Repeat,
            address_mode_w: SamplerAddressMode::Repeat,
            max_anisotropy: Some(16.0),
        }
    }
}

impl SamplerDesc {
    pub fn nearest_clamp() -> Self {
        Self {
            mag_filter: Filter::Nearest,
            min_filter: Filter::Nearest,
            mipmap_mode: Filter::Nearest,
            address_mode_u: SamplerAddressMode::ClampToEdge,
            address_mode_v: SamplerAddressMode::ClampToEdge,
            address_mode_w: SamplerAddressMode::ClampToEdge,
            max_anisotropy: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderResourceType {
    UniformBuffer,
    StorageBuffer,
    CombinedImageSampler,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStage: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SAMPLED = 1 << 0;
        const STORAGE = 1 << 1;
        const COLOR_ATTACHMENT = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
    }
}

bitflags! {
    /// 决定 pipeline 声明哪些 dynamic state
    ///
    /// 设置后，command queue 在绑定时使用当前 framebuffer 的尺寸设置 viewport/scissor，
    /// 同一个 pipeline 可以服务于不同尺寸的 framebuffer 而无需重建
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineBehaviorFlags: u32 {
        const AUTO_RESIZE_VIEWPORT = 1 << 0;
        const AUTO_RESIZE_SCISSOR = 1 << 1;
    }
}

impl Default for PipelineBehaviorFlags {
    fn default() -> Self {
        Self::AUTO_RESIZE_VIEWPORT | Self::AUTO_RESIZE_SCISSOR
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn from_extent(extent: Extent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn from_extent(extent: Extent2D) -> Self {
        Self {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
        }
    }
}

// region vertex input

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBinding {
    pub binding: u32,
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexInputLayoutDesc {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

// endregion

// region shader resources

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderResourceBinding {
    pub binding: u32,
    pub ty: ShaderResourceType,
    pub stage: ShaderStage,
    pub count: u32,
}

impl ShaderResourceBinding {
    pub const fn new(binding: u32, ty: ShaderResourceType, stage: ShaderStage) -> Self {
        Self {
            binding,
            ty,
            stage,
            count: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PushConstantRange {
    pub stage: ShaderStage,
    pub offset: u32,
    pub size: u32,
}

// endregion

// region textures

/// 创建 texture 所需的全部参数
///
/// `layers` 对 2D 为 1，对 cube 固定为 6，对 array 为元素个数
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub format: PixelFormat,
    pub usage: TextureUsage,
    pub property: MemoryProperty,
    pub samples: SampleCount,
    /// 上传数据之后是否通过 blit 生成完整的 mip 链
    pub generate_mipmaps: bool,
    /// 上传完成后 texture 所处的 layout
    pub initial_layout: ImageLayout,
    pub sampler: SamplerDesc,
}

impl TextureDesc {
    /// 用于采样的 2D texture
    pub fn sampled_2d(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            layers: 1,
            format,
            usage: TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
            property: MemoryProperty::Static,
            samples: SampleCount::X1,
            generate_mipmaps: false,
            initial_layout: ImageLayout::ShaderReadOnly,
            sampler: SamplerDesc::default(),
        }
    }

    /// render target，可以同时被采样
    pub fn attachment(width: u32, height: u32, format: PixelFormat, samples: SampleCount) -> Self {
        let is_depth = crate::basic::graphics_func::is_depth_format(format);
        let (usage, layout) = if is_depth {
            (TextureUsage::DEPTH_STENCIL_ATTACHMENT, ImageLayout::DepthStencilAttachment)
        } else {
            (TextureUsage::COLOR_ATTACHMENT, ImageLayout::ColorAttachment)
        };
        // 多重采样的 attachment 不能被采样
        let usage = if samples.is_multisampled() {
            usage
        } else {
            usage | TextureUsage::SAMPLED
        };
        Self {
            width,
            height,
            layers: 1,
            format,
            usage,
            property: MemoryProperty::Static,
            samples,
            generate_mipmaps: false,
            initial_layout: layout,
            sampler: SamplerDesc::nearest_clamp(),
        }
    }

    #[inline]
    pub fn with_layers(mut self, layers: u32) -> Self {
        self.layers = layers;
        self
    }

    #[inline]
    pub fn with_mipmaps(mut self) -> Self {
        self.generate_mipmaps = true;
        self.usage |= TextureUsage::TRANSFER_SRC | TextureUsage::TRANSFER_DST;
        self
    }

    #[inline]
    pub fn with_property(mut self, property: MemoryProperty) -> Self {
        self.property = property;
        self
    }

    #[inline]
    pub fn extent(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }
}

// endregion

// region render pass & framebuffer

/// render pass 的"形状"：attachment 的格式与采样数
///
/// 两个 render pass 只要 layout 相同就彼此兼容，基于同一个 layout 构建的 pipeline
/// 可以在它们之间自由切换
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderPassLayoutDesc {
    pub color_formats: Vec<PixelFormat>,
    pub depth_format: Option<PixelFormat>,
    pub samples: SampleCount,
    /// 为每个 color attachment 附加一个单采样的 resolve attachment，只在多重采样时有效
    pub resolve: bool,
}

impl RenderPassLayoutDesc {
    #[inline]
    pub fn has_resolve(&self) -> bool {
        self.resolve && self.samples.is_multisampled()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

/// 基于某个 layout 的 render pass 的 load/store 行为
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassDesc {
    pub color_load_op: AttachmentLoadOp,
    pub color_store_op: AttachmentStoreOp,
    pub depth_load_op: AttachmentLoadOp,
    pub depth_store_op: AttachmentStoreOp,
    /// color（或 resolve）attachment 在 render pass 结束后的 layout
    pub color_final_layout: ImageLayout,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: u32,
}

impl RenderPassDesc {
    /// 每帧第一次开始 render pass 时使用，清除所有 attachment
    pub fn clear(color_final_layout: ImageLayout) -> Self {
        Self {
            color_load_op: AttachmentLoadOp::Clear,
            color_store_op: AttachmentStoreOp::Store,
            depth_load_op: AttachmentLoadOp::Clear,
            depth_store_op: AttachmentStoreOp::Store,
            color_final_layout,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_depth: 1.0,
            clear_stencil: 0,
        }
    }

    /// 同一帧内切换回来时使用，保留之前的内容
    pub fn load(color_final_layout: ImageLayout) -> Self {
        Self {
            color_load_op: AttachmentLoadOp::Load,
            depth_load_op: AttachmentLoadOp::Load,
            ..Self::clear(color_final_layout)
        }
    }

    pub fn clear_values(&self, layout: &RenderPassLayoutDesc) -> Vec<ClearValue> {
        let mut values = vec![ClearValue::Color(self.clear_color); layout.color_formats.len()];
        if layout.depth_format.is_some() {
            values.push(ClearValue::DepthStencil {
                depth: self.clear_depth,
                stencil: self.clear_stencil,
            });
        }
        if layout.has_resolve() {
            values.extend(std::iter::repeat_n(ClearValue::Color(self.clear_color), layout.color_formats.len()));
        }
        values
    }
}

/// framebuffer 的 attachment 集合
pub struct FramebufferDesc {
    pub layout: Rc<dyn RenderPassLayout>,
    pub color_attachments: Vec<Rc<dyn Texture2D>>,
    pub depth_attachment: Option<Rc<dyn Texture2D>>,
    pub resolve_attachments: Vec<Rc<dyn Texture2D>>,
    pub width: u32,
    pub height: u32,
}

// endregion

// region pipeline desc

/// graphics pipeline 的完整描述
///
/// 共享资源按指针身份比较，setter 用它判断是否需要重建 native pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsPipelineDesc {
    pub shader: Option<SharedRef<dyn GraphicsShader>>,
    pub vertex_input_layout: Option<SharedRef<dyn VertexInputLayout>>,
    pub render_pass_layout: Option<SharedRef<dyn RenderPassLayout>>,
    pub shader_resources_layouts: Vec<SharedRef<dyn ShaderResourcesLayout>>,
    pub push_constant_ranges: Vec<PushConstantRange>,

    pub topology: PrimitiveTopology,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_mode: PolygonMode,
    pub line_width: f32,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare_op: CompareOp,
    pub blend: BlendState,

    pub behavior: PipelineBehaviorFlags,
    /// 只有没有设置 AUTO_RESIZE_VIEWPORT 时才会被烘焙进 pipeline
    pub viewport: Viewport,
    /// 只有没有设置 AUTO_RESIZE_SCISSOR 时才会被烘焙进 pipeline
    pub scissor: Rect2D,
}

impl Default for GraphicsPipelineDesc {
    fn default() -> Self {
        Self {
            shader: None,
            vertex_input_layout: None,
            render_pass_layout: None,
            shader_resources_layouts: vec![],
            push_constant_ranges: vec![],
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            polygon_mode: PolygonMode::Fill,
            line_width: 1.0,
            depth_test: true,
            depth_write: true,
            depth_compare_op: CompareOp::Less,
            blend: BlendState::opaque(),
            behavior: PipelineBehaviorFlags::default(),
            viewport: Viewport::default(),
            scissor: Rect2D::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComputePipelineDesc {
    pub shader: Option<SharedRef<dyn ComputeShader>>,
    pub shader_resources_layouts: Vec<SharedRef<dyn ShaderResourcesLayout>>,
    pub push_constant_ranges: Vec<PushConstantRange>,
}

// endregion

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_count_order() {
        assert_eq!(SampleCount::DESCENDING.first(), Some(&SampleCount::X64));
        assert!(SampleCount::DESCENDING.windows(2).all(|w| w[0] > w[1]));
        assert!(!SampleCount::X1.is_multisampled());
        assert_eq!(SampleCount::X8.count(), 8);
    }

    #[test]
    fn test_clear_values_layout() {
        let layout = RenderPassLayoutDesc {
            color_formats: vec![PixelFormat::B8G8R8A8Unorm],
            depth_format: Some(PixelFormat::D32Float),
            samples: SampleCount::X4,
            resolve: true,
        };
        let values = RenderPassDesc::clear(ImageLayout::PresentSrc).clear_values(&layout);
        assert_eq!(values.len(), 3);
        assert!(matches!(values[1], ClearValue::DepthStencil { depth, .. } if depth == 1.0));

        let no_msaa = RenderPassLayoutDesc {
            samples: SampleCount::X1,
            ..layout
        };
        assert!(!no_msaa.has_resolve());
        assert_eq!(RenderPassDesc::clear(ImageLayout::PresentSrc).clear_values(&no_msaa).len(), 2);
    }

    #[test]
    fn test_load_pass_keeps_layout() {
        let clear = RenderPassDesc::clear(ImageLayout::PresentSrc);
        let load = RenderPassDesc::load(ImageLayout::PresentSrc);
        assert_eq!(load.color_load_op, AttachmentLoadOp::Load);
        assert_eq!(clear.color_final_layout, load.color_final_layout);
    }

    #[test]
    fn test_attachment_desc_usage() {
        let depth = TextureDesc::attachment(4, 4, PixelFormat::D24UnormS8Uint, SampleCount::X1);
        assert!(depth.usage.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT));
        assert_eq!(depth.initial_layout, ImageLayout::DepthStencilAttachment);

        let msaa = TextureDesc::attachment(4, 4, PixelFormat::B8G8R8A8Unorm, SampleCount::X4);
        assert!(!msaa.usage.contains(TextureUsage::SAMPLED));
    }
}
