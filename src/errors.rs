use thiserror::Error;

use crate::gpu::types::PipelineKind;

/// Capability failures raised while acquiring the adapter, device or surface.
///
/// These are never retried: a missing adapter or an unbindable surface does not
/// go away on its own.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("GPU rendering is not supported: {message}")]
    NoGpuSupport { message: String },

    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Could not bind the presentation surface: {message}")]
    ContextUnavailable { message: String },
}

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("GPU initialization failed: {0}")]
    Init(#[from] InitError),

    #[error("Failed to allocate {resource} ({width}x{height}): {message}")]
    Allocation {
        resource: &'static str,
        width: u32,
        height: u32,
        message: String,
    },

    #[error("Failed to build {stage} pipeline: {message}")]
    PipelineBuild { stage: PipelineKind, message: String },

    #[error("Invalid pixel buffer: expected {expected} bytes of RGBA data, got {actual}")]
    InvalidPixelBuffer { expected: usize, actual: usize },

    #[error("Invalid settings: {message}")]
    InvalidSettings { message: String },

    #[error("Failed to acquire surface frame: {source}")]
    Frame {
        #[from]
        source: wgpu::SurfaceError,
    },

    #[error("Texture readback failed: {message}")]
    Readback { message: String },

    #[error("Filter is not initialized")]
    NotInitialized,

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, FilterError>;

impl FilterError {
    /// Returns true if the filter stays usable and the caller may retry
    /// (possibly with corrected input).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FilterError::Allocation { .. }
                | FilterError::PipelineBuild { .. }
                | FilterError::InvalidPixelBuffer { .. }
                | FilterError::InvalidSettings { .. }
                | FilterError::Frame { .. }
                | FilterError::Readback { .. }
                | FilterError::Io { .. }
        )
    }

    /// Returns a user-friendly error message with recovery suggestions
    pub fn user_message(&self) -> String {
        let base_message = self.to_string();
        let suggestion = match self {
            FilterError::Init(InitError::NoAdapter) => "No GPU adapter is available. Check your graphics drivers.",
            FilterError::Init(_) => "The GPU could not be initialized for rendering on this system.",
            FilterError::Allocation { .. } => "The image may exceed the GPU texture limits. Try a smaller image.",
            FilterError::PipelineBuild { .. } => "A shader program failed to compile. Fix the shader source and render again.",
            FilterError::InvalidPixelBuffer { .. } => "Supply tightly packed 8-bit RGBA pixels matching the image size.",
            FilterError::InvalidSettings { .. } => "Kernel size must be within 1..=32, the sector count at least 1 and all values finite.",
            FilterError::Frame { .. } => "The presentation surface was busy or lost. Render again.",
            FilterError::NotInitialized => "Initialize the filter before loading images.",
            _ => "An unexpected error occurred.",
        };

        format!("{}\n\n{}", base_message, suggestion)
    }

    /// Returns an error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            FilterError::Init(InitError::NoGpuSupport { .. }) => "NO_GPU_SUPPORT",
            FilterError::Init(InitError::NoAdapter) => "NO_ADAPTER",
            FilterError::Init(InitError::ContextUnavailable { .. }) => "CONTEXT_UNAVAILABLE",
            FilterError::Allocation { .. } => "ALLOCATION_ERROR",
            FilterError::PipelineBuild { .. } => "PIPELINE_BUILD_ERROR",
            FilterError::InvalidPixelBuffer { .. } => "INVALID_PIXEL_BUFFER",
            FilterError::InvalidSettings { .. } => "INVALID_SETTINGS",
            FilterError::Frame { .. } => "FRAME_ERROR",
            FilterError::Readback { .. } => "READBACK_ERROR",
            FilterError::NotInitialized => "NOT_INITIALIZED",
            FilterError::InvalidOperation { .. } => "INVALID_OPERATION",
            FilterError::Io { .. } => "IO_ERROR",
            FilterError::Json { .. } => "JSON_ERROR",
        }
    }
}
