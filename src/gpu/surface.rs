use crate::errors::{FilterError, Result};
use crate::gpu::init::GpuContext;

/// Pixel format of the headless output texture.
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// 8-bit four-channel formats the filter can upload straight RGBA into.
pub fn is_supported_format(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Rgba8Unorm
            | wgpu::TextureFormat::Rgba8UnormSrgb
            | wgpu::TextureFormat::Bgra8Unorm
            | wgpu::TextureFormat::Bgra8UnormSrgb
    )
}

/// Picks the first (most preferred) surface format the filter can work in.
pub fn choose_surface_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    formats.iter().copied().find(|&f| is_supported_format(f))
}

/// Premultiplied when available, otherwise whatever the surface offers first.
pub fn choose_alpha_mode(modes: &[wgpu::CompositeAlphaMode]) -> wgpu::CompositeAlphaMode {
    if modes.contains(&wgpu::CompositeAlphaMode::PreMultiplied) {
        wgpu::CompositeAlphaMode::PreMultiplied
    } else {
        modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto)
    }
}

/// Where the composite stage writes its frame.
#[derive(Debug)]
pub enum OutputTarget {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
    },
}

/// A frame acquired for one composite submission.
pub struct OutputFrame {
    pub view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl OutputFrame {
    /// Schedules a surface frame for presentation; offscreen frames need nothing.
    pub fn present(self) {
        if let Some(frame) = self.surface_texture {
            frame.present();
        }
    }
}

impl OutputTarget {
    pub fn surface(surface: wgpu::Surface<'static>, config: wgpu::SurfaceConfiguration) -> Self {
        OutputTarget::Surface { surface, config }
    }

    pub fn offscreen(ctx: &GpuContext, width: u32, height: u32) -> Result<Self> {
        Ok(OutputTarget::Offscreen {
            texture: create_offscreen_texture(ctx, width.max(1), height.max(1))?,
        })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        match self {
            OutputTarget::Surface { config, .. } => config.format,
            OutputTarget::Offscreen { .. } => OFFSCREEN_FORMAT,
        }
    }

    /// Offscreen frames hold premultiplied color, matching what a configured surface expects.
    pub fn alpha_mode(&self) -> wgpu::CompositeAlphaMode {
        match self {
            OutputTarget::Surface { config, .. } => config.alpha_mode,
            OutputTarget::Offscreen { .. } => wgpu::CompositeAlphaMode::PreMultiplied,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        match self {
            OutputTarget::Surface { config, .. } => (config.width, config.height),
            OutputTarget::Offscreen { texture } => (texture.width(), texture.height()),
        }
    }

    /// Changes the frame extent; format and alpha mode stay fixed for the session.
    /// On error the target keeps its previous size.
    pub fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32) -> Result<()> {
        let (width, height) = (width.max(1), height.max(1));
        if self.size() == (width, height) {
            return Ok(());
        }
        check_extent(ctx, width, height)?;
        match self {
            OutputTarget::Surface { surface, config } => {
                config.width = width;
                config.height = height;
                surface.configure(&ctx.device, config);
            }
            OutputTarget::Offscreen { texture } => {
                let replacement = create_offscreen_texture(ctx, width, height)?;
                let old = std::mem::replace(texture, replacement);
                old.destroy();
            }
        }
        tracing::debug!(width, height, "output target resized");
        Ok(())
    }

    /// Acquires the next frame. A lost or outdated surface is reconfigured and
    /// retried once.
    pub fn acquire(&mut self, device: &wgpu::Device) -> Result<OutputFrame> {
        match self {
            OutputTarget::Surface { surface, config } => {
                let frame = match surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        tracing::warn!("surface lost or outdated; reconfiguring");
                        surface.configure(device, config);
                        surface.get_current_texture()?
                    }
                    Err(e) => return Err(FilterError::from(e)),
                };
                let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
                Ok(OutputFrame {
                    view,
                    surface_texture: Some(frame),
                })
            }
            OutputTarget::Offscreen { texture } => Ok(OutputFrame {
                view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
                surface_texture: None,
            }),
        }
    }

    pub fn offscreen_texture(&self) -> Option<&wgpu::Texture> {
        match self {
            OutputTarget::Offscreen { texture } => Some(texture),
            OutputTarget::Surface { .. } => None,
        }
    }

    pub fn release(self) {
        match self {
            OutputTarget::Offscreen { texture } => texture.destroy(),
            OutputTarget::Surface { surface, .. } => drop(surface),
        }
    }
}

/// Surface configuration failures are fatal in wgpu, so oversized extents are
/// rejected up front.
pub fn check_extent(ctx: &GpuContext, width: u32, height: u32) -> Result<()> {
    let max_dim = ctx.max_texture_dimension();
    if width > max_dim || height > max_dim {
        return Err(FilterError::Allocation {
            resource: "output target",
            width,
            height,
            message: format!("dimensions must be within 1..={max_dim}"),
        });
    }
    Ok(())
}

fn create_offscreen_texture(ctx: &GpuContext, width: u32, height: u32) -> Result<wgpu::Texture> {
    check_extent(ctx, width, height)?;
    let (texture, error) = ctx.scoped(|device| {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen_output"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
    });

    match error {
        Some(err) => {
            texture.destroy();
            Err(FilterError::Allocation {
                resource: "output target",
                width,
                height,
                message: err.to_string(),
            })
        }
        None => Ok(texture),
    }
}
