//! Vesper 图形抽象层
//!
//! 定义与具体图形 API 无关的资源接口（buffer、texture、shader、pipeline、render pass、
//! framebuffer、shader resources）、命令队列以及 [`GraphicsContext`](interface::context::GraphicsContext)。
//!
//! 具体后端（Vulkan，或者用于测试的 [`null`] 后端）实现这些 trait，
//! 并通过 [`deletion_queue::DeletionQueue`] 将 native 资源的销毁推迟到 GPU 不再使用它们之后。

pub mod basic;
pub mod config;
pub mod deletion_queue;
pub mod interface;
pub mod lazy_pipeline;
pub mod null;
pub mod resources_pool;

pub use basic::error::{GraphicsError, GraphicsResult};
