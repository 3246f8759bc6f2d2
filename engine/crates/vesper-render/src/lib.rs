//! Vesper 渲染层
//!
//! 在 [`GraphicsContext`](vesper_graphics::interface::context::GraphicsContext) 之上组织绘制：
//! [`mesh::Mesh`] 与 [`material::Material`] 描述要画什么，
//! [`render_queue::RenderQueue`] 把同一 material / mesh 的绘制合并为 instanced draw。

pub mod context_factory;
pub mod material;
pub mod mesh;
pub mod render_queue;

pub use context_factory::create_graphics_context;
