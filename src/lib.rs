//! Anisotropic Kuwahara stylization on the GPU.
//!
//! A [`KuwaharaFilter`] owns one wgpu device and an output target (a window
//! surface or an offscreen texture). Loading an image runs four render passes:
//! structure tensor, horizontal blur, vertical blur and the Kuwahara composite.
//! Settings changes re-run the passes against the already loaded image.

pub mod errors;
pub mod filter;
pub mod gpu;
pub mod logging;
pub mod profiler;
pub mod settings;


pub use errors::{FilterError, InitError, Result};
pub use filter::KuwaharaFilter;
pub use gpu::{AdapterSummary, GpuOptions, ImageTexture, PassStage, ShaderSources, TextureInfo};
pub use profiler::PassStats;
pub use settings::{Settings, SettingsUpdate};
