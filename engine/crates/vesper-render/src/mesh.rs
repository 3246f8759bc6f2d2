use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use vesper_graphics::basic::graphics_func::{self, Geometry, GeometryVertex};
use vesper_graphics::basic::graphics_type::{IndexFormat, MemoryProperty};
use vesper_graphics::interface::buffer::{IndexBuffer, VertexBuffer};
use vesper_graphics::interface::context::GraphicsContext;
use vesper_graphics::{GraphicsError, GraphicsResult};

/// mesh 的唯一标识，RenderQueue 以它区分 instancing bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(u64);

impl MeshId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// index buffer 中的一段，对应一次 draw_indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshSegment {
    pub first_index: u32,
    pub index_count: u32,
    pub vertex_offset: i32,
}

impl MeshSegment {
    #[inline]
    pub fn new(first_index: u32, index_count: u32) -> Self {
        Self {
            first_index,
            index_count,
            vertex_offset: 0,
        }
    }
}

/// 共享一组 vertex / index buffer 的若干 segment
pub struct Mesh {
    id: MeshId,
    name: String,
    vertex_buffer: Rc<dyn VertexBuffer>,
    index_buffer: Rc<dyn IndexBuffer>,
    segments: Vec<MeshSegment>,
}

// new & init
impl Mesh {
    /// 每个 segment 都必须落在 index buffer 之内
    pub fn new(
        name: impl Into<String>,
        vertex_buffer: Rc<dyn VertexBuffer>,
        index_buffer: Rc<dyn IndexBuffer>,
        segments: Vec<MeshSegment>,
    ) -> GraphicsResult<Self> {
        let name = name.into();
        if segments.is_empty() {
            return Err(GraphicsError::InvalidArgument(format!("mesh {name} has no segment")));
        }
        let index_count = index_buffer.index_count() as u64;
        if let Some(seg) = segments.iter().find(|s| s.first_index as u64 + s.index_count as u64 > index_count) {
            return Err(GraphicsError::InvalidArgument(format!(
                "mesh {name}: segment {seg:?} exceeds {index_count} indices"
            )));
        }

        Ok(Self {
            id: MeshId::next(),
            name,
            vertex_buffer,
            index_buffer,
            segments,
        })
    }

    /// 上传为 Static buffer，整个几何体是唯一的 segment
    pub fn from_geometry(ctx: &dyn GraphicsContext, name: impl Into<String>, geometry: &Geometry) -> GraphicsResult<Self> {
        let _span = tracy_client::span!("Mesh::from_geometry");
        let vertex_buffer = ctx.create_vertex_buffer(
            MemoryProperty::Static,
            GeometryVertex::STRIDE,
            geometry.vertices.len() as u32,
            Some(geometry.vertex_bytes()),
        )?;
        let index_buffer = ctx.create_index_buffer(
            MemoryProperty::Static,
            IndexFormat::U32,
            geometry.indices.len() as u32,
            Some(geometry.index_bytes()),
        )?;
        let segment = MeshSegment::new(0, geometry.indices.len() as u32);
        Self::new(name, vertex_buffer, index_buffer, vec![segment])
    }

    pub fn quad(ctx: &dyn GraphicsContext) -> GraphicsResult<Self> {
        Self::from_geometry(ctx, "quad", &graphics_func::generate_quad())
    }

    pub fn cube(ctx: &dyn GraphicsContext) -> GraphicsResult<Self> {
        Self::from_geometry(ctx, "cube", &graphics_func::generate_cube())
    }

    pub fn plane(ctx: &dyn GraphicsContext, size: f32, subdivisions: u32) -> GraphicsResult<Self> {
        Self::from_geometry(ctx, "plane", &graphics_func::generate_plane(size, subdivisions))
    }

    pub fn sphere(ctx: &dyn GraphicsContext, radius: f32, sectors: u32, stacks: u32) -> GraphicsResult<Self> {
        Self::from_geometry(ctx, "sphere", &graphics_func::generate_sphere(radius, sectors, stacks))
    }
}

// getters
impl Mesh {
    #[inline]
    pub fn id(&self) -> MeshId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn vertex_buffer(&self) -> &Rc<dyn VertexBuffer> {
        &self.vertex_buffer
    }

    #[inline]
    pub fn index_buffer(&self) -> &Rc<dyn IndexBuffer> {
        &self.index_buffer
    }

    #[inline]
    pub fn segments(&self) -> &[MeshSegment] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> GraphicsResult<MeshSegment> {
        self.segments.get(index).copied().ok_or_else(|| {
            GraphicsError::InvalidArgument(format!("mesh {} has {} segments, asked for {index}", self.name, self.segments.len()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_graphics::config::GraphicsConfig;
    use vesper_graphics::interface::buffer::Buffer;
    use vesper_graphics::interface::platform::HeadlessPlatform;
    use vesper_graphics::null::NullContext;

    fn context() -> NullContext {
        NullContext::new(&GraphicsConfig::default(), &HeadlessPlatform::new(64, 64)).unwrap()
    }

    #[test]
    fn test_from_geometry() {
        let ctx = context();
        let cube = Mesh::cube(&ctx).unwrap();
        assert_eq!(cube.segments(), &[MeshSegment::new(0, 36)]);
        assert_eq!(cube.vertex_buffer().element_count(), 24);
        assert_eq!(cube.index_buffer().size(), 36 * 4);

        let quad = Mesh::quad(&ctx).unwrap();
        assert_ne!(cube.id(), quad.id());
        assert!(quad.segment(1).is_err());
    }

    #[test]
    fn test_segment_out_of_range() {
        let ctx = context();
        let quad = Mesh::quad(&ctx).unwrap();
        let segments = vec![MeshSegment::new(0, 3), MeshSegment::new(3, 4)];
        let result = Mesh::new("bad", quad.vertex_buffer().clone(), quad.index_buffer().clone(), segments);
        assert!(matches!(result, Err(GraphicsError::InvalidArgument(_))));

        let split = vec![MeshSegment::new(0, 3), MeshSegment::new(3, 3)];
        let mesh = Mesh::new("split", quad.vertex_buffer().clone(), quad.index_buffer().clone(), split).unwrap();
        assert_eq!(mesh.segment(1).unwrap().first_index, 3);
    }
}
