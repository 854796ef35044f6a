mod cascade_textures;
mod combine_pipeline;
mod gpu_context;

pub use cascade_textures::CascadeTextures;
pub use combine_pipeline::CombinePipeline;
pub use gpu_context::GpuContext;
