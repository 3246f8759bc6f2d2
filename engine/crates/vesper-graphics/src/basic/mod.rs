pub mod error;
pub mod graphics_func;
pub mod graphics_type;
pub mod shared_ref;
