pub mod buffer;
pub mod sampler;
pub mod texture;
