use crate::errors::{FilterError, InitError};
use crate::gpu::surface::{self, OutputTarget};
use crate::gpu::types::GpuOptions;

/// Device and queue shared by every resource of one session.
#[derive(Debug)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Requests an adapter (compatible with `surface` when given) and a device from it.
    pub async fn new(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
        options: &GpuOptions,
    ) -> Result<(Self, wgpu::Adapter), InitError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference,
                compatible_surface: surface,
                force_fallback_adapter: options.force_fallback_adapter,
            })
            .await
            .ok_or(InitError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        // Ask for the adapter's own limits so large images are not capped by the
        // conservative defaults.
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("kuwahara_gpu_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| InitError::NoGpuSupport {
                message: format!("request_device failed: {e}"),
            })?;

        device.on_uncaptured_error(Box::new(|err| {
            tracing::error!(error = %err, "uncaptured GPU error");
        }));

        log::info!("GPU initialized: {} ({})", adapter_info.name, adapter_info.backend.to_str());

        Ok((
            Self {
                device,
                queue,
                adapter_info,
            },
            adapter,
        ))
    }

    /// Runs `work` inside validation and out-of-memory error scopes and returns
    /// the first captured error alongside its result.
    pub fn scoped<T>(&self, work: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let value = work(&self.device);

        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        let validation = pollster::block_on(self.device.pop_error_scope());

        (value, validation.or(out_of_memory))
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    pub fn destroy(&self) {
        self.device.destroy();
    }
}

/// Acquires a device bound to a presentable surface and configures the surface
/// for premultiplied-alpha compositing.
///
/// The surface is created before the adapter is requested, so an unbindable
/// target reports `ContextUnavailable` even on a machine with no adapter.
pub async fn initialize_surface(
    target: wgpu::SurfaceTarget<'static>,
    width: u32,
    height: u32,
    options: &GpuOptions,
) -> Result<(GpuContext, OutputTarget), FilterError> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

    let surface = instance
        .create_surface(target)
        .map_err(|e| InitError::ContextUnavailable {
            message: e.to_string(),
        })?;

    let (ctx, adapter) = GpuContext::new(&instance, Some(&surface), options).await?;

    let caps = surface.get_capabilities(&adapter);
    if caps.formats.is_empty() {
        return Err(InitError::ContextUnavailable {
            message: format!("surface is not supported by adapter '{}'", ctx.adapter_info.name),
        }
        .into());
    }

    let format = surface::choose_surface_format(&caps.formats).ok_or_else(|| InitError::NoGpuSupport {
        message: format!("no 8-bit RGBA surface format among {:?}", caps.formats),
    })?;
    let alpha_mode = surface::choose_alpha_mode(&caps.alpha_modes);
    if alpha_mode != wgpu::CompositeAlphaMode::PreMultiplied {
        tracing::warn!(
            ?alpha_mode,
            supported = ?caps.alpha_modes,
            "surface does not support premultiplied alpha; host compositing may differ"
        );
    }

    let present_mode = if caps.present_modes.contains(&options.present_mode) {
        options.present_mode
    } else {
        wgpu::PresentMode::Fifo
    };

    let (width, height) = (width.max(1), height.max(1));
    surface::check_extent(&ctx, width, height)?;

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width,
        height,
        present_mode,
        desired_maximum_frame_latency: 2,
        alpha_mode,
        view_formats: vec![],
    };
    surface.configure(&ctx.device, &config);

    tracing::info!(?format, ?alpha_mode, width = config.width, height = config.height, "surface configured");

    Ok((ctx, OutputTarget::surface(surface, config)))
}

/// Acquires a device without a surface; the final frame goes to an offscreen
/// texture that can be read back.
pub async fn initialize_headless(
    width: u32,
    height: u32,
    options: &GpuOptions,
) -> Result<(GpuContext, OutputTarget), FilterError> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let (ctx, _adapter) = GpuContext::new(&instance, None, options).await?;
    let output = OutputTarget::offscreen(&ctx, width, height)?;

    tracing::info!(width, height, "headless output configured");

    Ok((ctx, output))
}
