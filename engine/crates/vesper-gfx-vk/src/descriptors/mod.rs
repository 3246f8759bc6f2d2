pub mod descriptor_pool;
pub mod shader_resources;
