//! 纯函数：格式尺寸、mip 计算以及基础几何体的生成

use glam::{Vec2, Vec3};

use crate::basic::graphics_type::{
    IndexFormat, PixelFormat, VertexAttribute, VertexBinding, VertexFormat, VertexInputLayoutDesc, VertexInputRate,
};

// region format

/// 一个像素占用的字节数
pub const fn pixel_format_size(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::R8Unorm => 1,
        PixelFormat::R8G8Unorm => 2,
        PixelFormat::R8G8B8A8Unorm
        | PixelFormat::R8G8B8A8Srgb
        | PixelFormat::B8G8R8A8Unorm
        | PixelFormat::B8G8R8A8Srgb => 4,
        PixelFormat::R16Float => 2,
        PixelFormat::R16G16Float => 4,
        PixelFormat::R16G16B16A16Float => 8,
        PixelFormat::R32Float | PixelFormat::R32Uint => 4,
        PixelFormat::R32G32Float => 8,
        PixelFormat::R32G32B32Float => 12,
        PixelFormat::R32G32B32A32Float => 16,
        PixelFormat::D16Unorm => 2,
        PixelFormat::D24UnormS8Uint | PixelFormat::D32Float => 4,
        // depth 和 stencil 分开存放，按对齐后的大小计算
        PixelFormat::D32FloatS8Uint => 8,
    }
}

pub const fn vertex_format_size(format: VertexFormat) -> u32 {
    match format {
        VertexFormat::Float | VertexFormat::Int | VertexFormat::UInt | VertexFormat::UByte4Norm => 4,
        VertexFormat::Float2 | VertexFormat::Int2 | VertexFormat::UInt2 => 8,
        VertexFormat::Float3 | VertexFormat::Int3 | VertexFormat::UInt3 => 12,
        VertexFormat::Float4 | VertexFormat::Int4 | VertexFormat::UInt4 => 16,
    }
}

pub const fn index_format_size(format: IndexFormat) -> u32 {
    match format {
        IndexFormat::U16 => 2,
        IndexFormat::U32 => 4,
    }
}

pub const fn is_depth_format(format: PixelFormat) -> bool {
    matches!(
        format,
        PixelFormat::D16Unorm | PixelFormat::D24UnormS8Uint | PixelFormat::D32Float | PixelFormat::D32FloatS8Uint
    )
}

pub const fn has_stencil(format: PixelFormat) -> bool {
    matches!(format, PixelFormat::D24UnormS8Uint | PixelFormat::D32FloatS8Uint)
}

/// 整个 layer 的 level 0 数据大小
#[inline]
pub const fn texture_layer_size(width: u32, height: u32, format: PixelFormat) -> u64 {
    width as u64 * height as u64 * pixel_format_size(format) as u64
}

// endregion

// region mip

/// 完整 mip 链的层数：`floor(log2(max(w, h))) + 1`
pub const fn mip_level_count(width: u32, height: u32) -> u32 {
    let max = if width > height { width } else { height };
    let max = if max == 0 { 1 } else { max };
    32 - max.leading_zeros()
}

/// 第 level 层的尺寸，每一维最小为 1
pub const fn mip_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    let w = width >> level;
    let h = height >> level;
    (if w == 0 { 1 } else { w }, if h == 0 { 1 } else { h })
}

// endregion

// region geometry

/// 基础几何体使用的交错顶点格式
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GeometryVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl GeometryVertex {
    fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
        }
    }

    pub const STRIDE: u32 = size_of::<GeometryVertex>() as u32;

    /// binding 0，location 0/1/2 分别为 position/normal/uv
    pub fn vertex_input_layout_desc() -> VertexInputLayoutDesc {
        VertexInputLayoutDesc {
            bindings: vec![VertexBinding {
                binding: 0,
                stride: Self::STRIDE,
                input_rate: VertexInputRate::PerVertex,
            }],
            attributes: vec![
                VertexAttribute {
                    location: 0,
                    binding: 0,
                    format: VertexFormat::Float3,
                    offset: std::mem::offset_of!(GeometryVertex, position) as u32,
                },
                VertexAttribute {
                    location: 1,
                    binding: 0,
                    format: VertexFormat::Float3,
                    offset: std::mem::offset_of!(GeometryVertex, normal) as u32,
                },
                VertexAttribute {
                    location: 2,
                    binding: 0,
                    format: VertexFormat::Float2,
                    offset: std::mem::offset_of!(GeometryVertex, uv) as u32,
                },
            ],
        }
    }
}

/// 三角形列表，逆时针为正面
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub vertices: Vec<GeometryVertex>,
    pub indices: Vec<u32>,
}

impl Geometry {
    #[inline]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    #[inline]
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// XY 平面上 [-1, 1] 的矩形，朝向 +Z，常用于全屏 pass
pub fn generate_quad() -> Geometry {
    let corners = [
        (Vec2::new(-1.0, -1.0), Vec2::new(0.0, 1.0)),
        (Vec2::new(1.0, -1.0), Vec2::new(1.0, 1.0)),
        (Vec2::new(1.0, 1.0), Vec2::new(1.0, 0.0)),
        (Vec2::new(-1.0, 1.0), Vec2::new(0.0, 0.0)),
    ];
    let vertices = corners
        .iter()
        .map(|(pos, uv)| GeometryVertex::new(pos.extend(0.0), Vec3::Z, *uv))
        .collect();

    Geometry {
        vertices,
        indices: vec![0, 1, 2, 2, 3, 0],
    }
}

/// XZ 平面上边长为 size 的正方形，朝向 +Y，每条边切分为 subdivisions 段
pub fn generate_plane(size: f32, subdivisions: u32) -> Geometry {
    let n = subdivisions.max(1);
    let half = size * 0.5;
    let step = size / n as f32;

    let mut vertices = Vec::with_capacity(((n + 1) * (n + 1)) as usize);
    for j in 0..=n {
        for i in 0..=n {
            let pos = Vec3::new(-half + i as f32 * step, 0.0, -half + j as f32 * step);
            let uv = Vec2::new(i as f32 / n as f32, j as f32 / n as f32);
            vertices.push(GeometryVertex::new(pos, Vec3::Y, uv));
        }
    }

    let mut indices = Vec::with_capacity((n * n * 6) as usize);
    let row = n + 1;
    for j in 0..n {
        for i in 0..n {
            let a = j * row + i;
            let b = a + 1;
            let d = a + row;
            let c = d + 1;
            indices.extend_from_slice(&[a, d, c, a, c, b]);
        }
    }

    Geometry { vertices, indices }
}

/// 以原点为中心、边长为 1 的立方体，每个面 4 个顶点以保证法线不被平均
pub fn generate_cube() -> Geometry {
    // (normal, u, v)，满足 u × v = normal
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut geometry = Geometry {
        vertices: Vec::with_capacity(24),
        indices: Vec::with_capacity(36),
    };
    for (normal, u, v) in faces {
        let base = geometry.vertices.len() as u32;
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        for (su, sv) in corners {
            let pos = (normal + u * su + v * sv) * 0.5;
            let uv = Vec2::new((su + 1.0) * 0.5, 1.0 - (sv + 1.0) * 0.5);
            geometry.vertices.push(GeometryVertex::new(pos, normal, uv));
        }
        geometry.indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    geometry
}

/// UV 球，sectors 为经线方向的分段，stacks 为纬线方向的分段
pub fn generate_sphere(radius: f32, sectors: u32, stacks: u32) -> Geometry {
    let sectors = sectors.max(3);
    let stacks = stacks.max(2);

    let mut vertices = Vec::with_capacity(((stacks + 1) * (sectors + 1)) as usize);
    for i in 0..=stacks {
        let phi = std::f32::consts::PI * i as f32 / stacks as f32;
        for j in 0..=sectors {
            let theta = std::f32::consts::TAU * j as f32 / sectors as f32;
            let normal = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
            let uv = Vec2::new(j as f32 / sectors as f32, i as f32 / stacks as f32);
            vertices.push(GeometryVertex::new(normal * radius, normal, uv));
        }
    }

    let mut indices = Vec::new();
    let row = sectors + 1;
    for i in 0..stacks {
        for j in 0..sectors {
            let k1 = i * row + j;
            let k2 = k1 + row;
            // 两极处的三角形会退化，跳过
            if i != 0 {
                indices.extend_from_slice(&[k1, k1 + 1, k2]);
            }
            if i != stacks - 1 {
                indices.extend_from_slice(&[k1 + 1, k2 + 1, k2]);
            }
        }
    }

    Geometry { vertices, indices }
}

// endregion

#[cfg(test)]
mod tests {
    use super::*;

    /// 每个非退化三角形的几何法线都与顶点法线同向
    fn assert_ccw_outward(geometry: &Geometry) {
        for tri in geometry.indices.chunks(3) {
            let v = |i: u32| &geometry.vertices[i as usize];
            let (a, b, c) = (v(tri[0]), v(tri[1]), v(tri[2]));
            let pa = Vec3::from_array(a.position);
            let face = (Vec3::from_array(b.position) - pa).cross(Vec3::from_array(c.position) - pa);
            if face.length() < 1e-6 {
                continue;
            }
            assert!(face.dot(Vec3::from_array(a.normal)) > 0.0, "triangle {tri:?} faces inward");
        }
    }

    #[test]
    fn test_mip_level_count() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 1), 2);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(1920, 1080), 11);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn test_mip_extent_clamped() {
        assert_eq!(mip_extent(256, 64, 0), (256, 64));
        assert_eq!(mip_extent(256, 64, 3), (32, 8));
        assert_eq!(mip_extent(256, 64, 8), (1, 1));
    }

    #[test]
    fn test_format_sizes() {
        assert_eq!(pixel_format_size(PixelFormat::R8G8B8A8Unorm), 4);
        assert_eq!(pixel_format_size(PixelFormat::R32G32B32A32Float), 16);
        assert_eq!(vertex_format_size(VertexFormat::Float3), 12);
        assert_eq!(index_format_size(IndexFormat::U16), 2);
        assert_eq!(texture_layer_size(4, 2, PixelFormat::R16Float), 16);
        assert!(PixelFormat::ALL.iter().all(|f| pixel_format_size(*f) > 0));
    }

    #[test]
    fn test_depth_formats() {
        assert!(is_depth_format(PixelFormat::D32Float));
        assert!(!has_stencil(PixelFormat::D32Float));
        assert!(has_stencil(PixelFormat::D24UnormS8Uint));
        assert!(!is_depth_format(PixelFormat::B8G8R8A8Srgb));
    }

    #[test]
    fn test_vertex_layout_matches_struct() {
        let desc = GeometryVertex::vertex_input_layout_desc();
        assert_eq!(desc.bindings[0].stride, 32);
        let end = desc.attributes.iter().map(|a| a.offset + vertex_format_size(a.format)).max();
        assert_eq!(end, Some(GeometryVertex::STRIDE));
    }

    #[test]
    fn test_quad() {
        let quad = generate_quad();
        assert_eq!(quad.vertices.len(), 4);
        assert_eq!(quad.indices.len(), 6);
        assert_eq!(quad.vertex_bytes().len(), 4 * 32);
        assert_ccw_outward(&quad);
    }

    #[test]
    fn test_plane() {
        let plane = generate_plane(2.0, 4);
        assert_eq!(plane.vertices.len(), 25);
        assert_eq!(plane.indices.len(), 4 * 4 * 6);
        assert!(plane.vertices.iter().all(|v| v.position[1] == 0.0));
        assert_ccw_outward(&plane);
    }

    #[test]
    fn test_cube() {
        let cube = generate_cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert!(cube.vertices.iter().all(|v| v.position.iter().all(|c| c.abs() == 0.5)));
        assert_ccw_outward(&cube);
    }

    #[test]
    fn test_sphere() {
        let sphere = generate_sphere(2.0, 16, 8);
        assert_eq!(sphere.vertices.len(), 9 * 17);
        // 两极各少一行三角形
        assert_eq!(sphere.indices.len(), (16 * 8 * 2 - 2 * 16) * 3);
        for v in &sphere.vertices {
            assert!((Vec3::from_array(v.position).length() - 2.0).abs() < 1e-4);
        }
        assert_ccw_outward(&sphere);
    }
}
