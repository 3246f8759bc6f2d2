use std::rc::Rc;

use crate::basic::error::{GraphicsError, GraphicsResult};
use crate::basic::graphics_type::{ShaderResourceBinding, ShaderResourceType};
use crate::interface::buffer::{ConstantBuffer, StructuredBuffer};
use crate::interface::resource::GraphicsResource;
use crate::interface::texture::{Texture2D, Texture2DArray, TextureCube};

/// 一组 binding 的声明，对应一个 descriptor set layout
pub trait ShaderResourcesLayout: GraphicsResource {
    fn bindings(&self) -> &[ShaderResourceBinding];

    fn find_binding(&self, binding: u32) -> Option<&ShaderResourceBinding> {
        self.bindings().iter().find(|b| b.binding == binding)
    }

    /// 检查 binding 已声明且类型匹配
    fn check_binding(&self, binding: u32, ty: ShaderResourceType) -> GraphicsResult<()> {
        match self.find_binding(binding) {
            Some(b) if b.ty == ty => Ok(()),
            Some(b) => Err(GraphicsError::InvalidArgument(format!(
                "binding {binding} is declared as {:?}, not {ty:?}",
                b.ty
            ))),
            None => Err(GraphicsError::InvalidArgument(format!("binding {binding} is not declared in the layout"))),
        }
    }
}

/// 按 layout 声明的 binding 绑定具体资源
///
/// 声明的 binding 集合在创建时固定，每次 bind 立即写入 native descriptor set。
/// 被绑定的资源会被持有，直到该 binding 被重新绑定或 shader resources 被销毁
pub trait ShaderResources: GraphicsResource {
    fn layout(&self) -> Rc<dyn ShaderResourcesLayout>;

    fn bind_constant_buffer(&self, binding: u32, buffer: Rc<dyn ConstantBuffer>) -> GraphicsResult<()>;

    fn bind_structured_buffer(&self, binding: u32, buffer: Rc<dyn StructuredBuffer>) -> GraphicsResult<()>;

    fn bind_texture_2d(&self, binding: u32, texture: Rc<dyn Texture2D>) -> GraphicsResult<()>;

    fn bind_texture_2d_array(&self, binding: u32, texture: Rc<dyn Texture2DArray>) -> GraphicsResult<()>;

    fn bind_texture_cube(&self, binding: u32, texture: Rc<dyn TextureCube>) -> GraphicsResult<()>;
}
