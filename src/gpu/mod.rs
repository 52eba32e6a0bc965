pub mod types;
pub mod init;
pub mod surface;
pub mod texture;
pub mod params;
pub mod pipelines;
pub mod passes;
pub mod readback;
pub mod info;

// Re-export main types for convenience
pub use types::*;
pub use init::GpuContext;
pub use surface::{OutputFrame, OutputTarget};
pub use texture::ImageTextureSet;
pub use params::{pack, unpack, ParameterBuffer};
pub use pipelines::{BindingLayouts, ImageBindGroups, PipelineSet, ShaderSources};
pub use passes::{PassExecutor, PassStage, RunPlan};
pub use info::AdapterSummary;
