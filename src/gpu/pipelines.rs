use std::borrow::Cow;

use wgpu::util::DeviceExt;

use crate::errors::{FilterError, Result};
use crate::gpu::init::GpuContext;
use crate::gpu::params::ParameterBuffer;
use crate::gpu::texture::ImageTextureSet;
use crate::gpu::types::{ImageTexture, PipelineKind, PARAMS_SIZE};

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Vertices drawn per pass: two triangles covering the target.
pub const FULLSCREEN_VERTICES: u32 = 6;

/// WGSL source of the three stage programs.
///
/// Each program exposes `vs_main` (full-target quad) and `fs_main`, and must
/// consume exactly the bindings its `BindingLayouts` entry declares.
#[derive(Debug, Clone)]
pub struct ShaderSources {
    pub structure_tensor: Cow<'static, str>,
    pub blur: Cow<'static, str>,
    pub composite: Cow<'static, str>,
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self {
            structure_tensor: Cow::Borrowed(include_str!("../shaders/structure_tensor.wgsl")),
            blur: Cow::Borrowed(include_str!("../shaders/blur.wgsl")),
            composite: Cow::Borrowed(include_str!("../shaders/kuwahara.wgsl")),
        }
    }
}

impl ShaderSources {
    pub fn source(&self, kind: PipelineKind) -> &str {
        match kind {
            PipelineKind::Tensor => &self.structure_tensor,
            PipelineKind::Blur => &self.blur,
            PipelineKind::Composite => &self.composite,
        }
    }
}

/// Explicit bind-group layouts, one per program. They do not depend on shader
/// source, so bind groups built against them survive pipeline rebuilds.
#[derive(Debug)]
pub struct BindingLayouts {
    pub tensor: wgpu::BindGroupLayout,
    pub blur: wgpu::BindGroupLayout,
    pub composite: wgpu::BindGroupLayout,
}

impl BindingLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let tensor = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tensor_bind_group_layout"),
            entries: &[sampler_entry(0), texture_entry(1)],
        });

        let blur = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blur_bind_group_layout"),
            entries: &[sampler_entry(0), texture_entry(1), uniform_entry(2, 4)],
        });

        let composite = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("composite_bind_group_layout"),
            entries: &[
                sampler_entry(0),
                // Source image
                texture_entry(1),
                // Smoothed structure tensor
                texture_entry(2),
                uniform_entry(3, PARAMS_SIZE as u64),
            ],
        });

        Self { tensor, blur, composite }
    }

    pub fn get(&self, kind: PipelineKind) -> &wgpu::BindGroupLayout {
        match kind {
            PipelineKind::Tensor => &self.tensor,
            PipelineKind::Blur => &self.blur,
            PipelineKind::Composite => &self.composite,
        }
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32, min_size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(min_size),
        },
        count: None,
    }
}

/// Bilinear sampler shared by all three stages.
pub fn create_linear_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("linear_sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// The 4-byte direction uniforms of the two blur sub-passes (1 = horizontal, 0 = vertical).
#[derive(Debug)]
pub struct DirectionBuffers {
    pub horizontal: wgpu::Buffer,
    pub vertical: wgpu::Buffer,
}

impl DirectionBuffers {
    pub fn new(device: &wgpu::Device) -> Self {
        let create = |label: &'static str, value: i32| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(&value),
                usage: wgpu::BufferUsages::UNIFORM,
            })
        };
        Self {
            horizontal: create("blur_direction_horizontal", 1),
            vertical: create("blur_direction_vertical", 0),
        }
    }
}

impl Drop for DirectionBuffers {
    fn drop(&mut self) {
        self.horizontal.destroy();
        self.vertical.destroy();
    }
}

/// Compiled render pipelines for one output format.
#[derive(Debug)]
pub struct PipelineSet {
    pub tensor: wgpu::RenderPipeline,
    pub blur: wgpu::RenderPipeline,
    pub composite: wgpu::RenderPipeline,
    format: wgpu::TextureFormat,
}

impl PipelineSet {
    /// Compiles all three programs. Intermediate textures share the output
    /// format, so every stage targets `format`.
    pub fn build(
        ctx: &GpuContext,
        layouts: &BindingLayouts,
        shaders: &ShaderSources,
        format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let tensor = build_pipeline(ctx, PipelineKind::Tensor, layouts, shaders, format)?;
        let blur = build_pipeline(ctx, PipelineKind::Blur, layouts, shaders, format)?;
        let composite = build_pipeline(ctx, PipelineKind::Composite, layouts, shaders, format)?;

        tracing::debug!(?format, "render pipelines built");
        Ok(Self {
            tensor,
            blur,
            composite,
            format,
        })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }
}

fn build_pipeline(
    ctx: &GpuContext,
    kind: PipelineKind,
    layouts: &BindingLayouts,
    shaders: &ShaderSources,
    format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline> {
    let label = kind.label();
    let (pipeline, error) = ctx.scoped(|device| {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(shaders.source(kind))),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[layouts.get(kind)],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(VERTEX_ENTRY),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(FRAGMENT_ENTRY),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    });

    match error {
        Some(err) => {
            tracing::error!(stage = label, error = %err, "pipeline build failed");
            Err(FilterError::PipelineBuild {
                stage: kind,
                message: err.to_string(),
            })
        }
        None => Ok(pipeline),
    }
}

/// Bind groups for every pass over one `ImageTextureSet`.
/// Rebuilt whenever the set is replaced.
#[derive(Debug)]
pub struct ImageBindGroups {
    pub tensor: wgpu::BindGroup,
    pub blur_horizontal: wgpu::BindGroup,
    pub blur_vertical: wgpu::BindGroup,
    pub composite: wgpu::BindGroup,
}

impl ImageBindGroups {
    pub fn new(
        device: &wgpu::Device,
        layouts: &BindingLayouts,
        sampler: &wgpu::Sampler,
        textures: &ImageTextureSet,
        directions: &DirectionBuffers,
        params: &ParameterBuffer,
    ) -> Self {
        let tensor = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tensor_bind_group"),
            layout: &layouts.tensor,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(textures.view(ImageTexture::Input)),
                },
            ],
        });

        let blur = |label: &'static str, source: ImageTexture, direction: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layouts.blur,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(textures.view(source)),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: direction.as_entire_binding(),
                    },
                ],
            })
        };
        let blur_horizontal = blur("blur_horizontal_bind_group", ImageTexture::StructureTensor, &directions.horizontal);
        let blur_vertical = blur("blur_vertical_bind_group", ImageTexture::BlurA, &directions.vertical);

        let composite = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite_bind_group"),
            layout: &layouts.composite,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(textures.view(ImageTexture::Input)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(textures.view(ImageTexture::BlurB)),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params.buffer().as_entire_binding(),
                },
            ],
        });

        Self {
            tensor,
            blur_horizontal,
            blur_vertical,
            composite,
        }
    }
}
