//! 不依赖 GPU 的内存后端
//!
//! 实现全部图形接口：buffer 保存字节，texture 保存尺寸与像素，pipeline 使用与 Vulkan 相同的延迟重建，
//! command queue 把录制的命令记录为 [`command_queue::NullCommand`]，并执行相同的状态机与延迟删除协议。
//! 用于测试以及没有 Vulkan 设备的机器。

pub mod buffer;
pub mod command_queue;
pub mod context;
pub mod device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod shader_resources;
pub mod swapchain;
pub mod texture;

pub use context::NullContext;

use crate::basic::graphics_type::GraphicsBackend;
use crate::interface::resource::{GraphicsResource, downcast_resource};

/// 还原为 null 后端的具体类型
#[inline]
pub(crate) fn null_cast<T: 'static, R: GraphicsResource + ?Sized>(resource: &R) -> &T {
    downcast_resource(resource, GraphicsBackend::Null)
}

/// null 后端资源的唯一编号，在命令记录与删除日志中用来标识资源
pub trait NullResourceId {
    fn resource_id(&self) -> u64;
}
