use std::fmt;

/// Size in bytes of the parameter block shared with the composite shader.
pub const PARAMS_SIZE: usize = 48;

/// Shader-side layout of the composite parameters.
///
/// Integers occupy the first 16-byte block, floats the next two; the
/// `_pad` fields are always zero.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KuwaharaParams {
    pub kernel_size: i32,
    pub n: i32,
    pub _pad0: [i32; 2],
    pub hardness: f32,
    pub q: f32,
    pub zero_crossing: f32,
    pub zeta: f32,
    pub alpha: f32,
    pub _pad1: [f32; 3],
}

const _: () = assert!(std::mem::size_of::<KuwaharaParams>() == PARAMS_SIZE);

/// The three compiled render programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    Tensor,
    Blur,
    Composite,
}

impl PipelineKind {
    pub fn label(self) -> &'static str {
        match self {
            PipelineKind::Tensor => "structure_tensor",
            PipelineKind::Blur => "blur",
            PipelineKind::Composite => "composite",
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifies one of the four per-image textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTexture {
    Input,
    StructureTensor,
    BlurA,
    BlurB,
}

impl ImageTexture {
    pub const ALL: [ImageTexture; 4] = [
        ImageTexture::Input,
        ImageTexture::StructureTensor,
        ImageTexture::BlurA,
        ImageTexture::BlurB,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ImageTexture::Input => "input_texture",
            ImageTexture::StructureTensor => "structure_tensor_texture",
            ImageTexture::BlurA => "blur_a_texture",
            ImageTexture::BlurB => "blur_b_texture",
        }
    }
}

/// Size, format and usage of an allocated texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
}

/// Session-wide GPU configuration.
#[derive(Debug, Clone)]
pub struct GpuOptions {
    pub power_preference: wgpu::PowerPreference,
    pub force_fallback_adapter: bool,
    /// Re-run only the composite stage on settings-only changes.
    pub cache_structure_tensor: bool,
    pub present_mode: wgpu::PresentMode,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            cache_structure_tensor: true,
            present_mode: wgpu::PresentMode::Fifo,
        }
    }
}
