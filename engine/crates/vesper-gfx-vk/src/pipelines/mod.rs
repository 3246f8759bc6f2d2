pub mod compute_pipeline;
pub mod graphics_pipeline;
pub mod pipeline_layout;
pub mod shader;
pub mod vertex_input;
