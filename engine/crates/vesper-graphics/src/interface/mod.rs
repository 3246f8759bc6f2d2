//! 后端无关的资源接口
//!
//! 每一种资源对应一个 trait，每个后端恰好有一个实现。
//! 资源由 [`context::GraphicsContext`] 的工厂方法创建，以 `Rc<dyn Trait>` 的形式共享。

pub mod buffer;
pub mod command_queue;
pub mod context;
pub mod pipeline;
pub mod platform;
pub mod render_pass;
pub mod resource;
pub mod shader;
pub mod shader_resources;
pub mod texture;
