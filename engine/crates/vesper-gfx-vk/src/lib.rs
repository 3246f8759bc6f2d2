//! Vesper 图形抽象层的 Vulkan 后端
//!
//! [`VkContext`] 实现 [`GraphicsContext`](vesper_graphics::interface::context::GraphicsContext)：
//! 持有 instance / device / surface / swapchain / descriptor pool 与 command queue，
//! 并为每一种抽象资源提供基于 ash 与 vk-mem 的具体实现。
//!
//! native 对象的销毁全部经过 [`VkDevice`](foundation::device::VkDevice) 上的延迟删除队列。

pub mod command_queue;
pub mod commands;
pub mod context;
pub mod conversion;
pub mod descriptors;
pub mod foundation;
pub mod pipelines;
pub mod render_pass;
pub mod resources;
pub mod swapchain;

pub use context::VkContext;

use vesper_graphics::basic::graphics_type::GraphicsBackend;
use vesper_graphics::interface::resource::{GraphicsResource, downcast_resource};

/// 还原为 Vulkan 后端的具体类型
#[inline]
pub(crate) fn vk_cast<T: 'static, R: GraphicsResource + ?Sized>(resource: &R) -> &T {
    downcast_resource(resource, GraphicsBackend::Vulkan)
}
