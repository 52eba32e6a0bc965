//! The filter service: owns the GPU session and drives the passes in response
//! to image loads and settings changes.

use crate::errors::{FilterError, Result};
use crate::gpu::info::AdapterSummary;
use crate::gpu::init::{self, GpuContext};
use crate::gpu::params::{pack, ParameterBuffer};
use crate::gpu::passes::{PassExecutor, PassResources, RunPlan};
use crate::gpu::pipelines::{self, BindingLayouts, DirectionBuffers, ImageBindGroups, PipelineSet, ShaderSources};
use crate::gpu::readback;
use crate::gpu::surface::OutputTarget;
use crate::gpu::texture::ImageTextureSet;
use crate::gpu::types::{GpuOptions, ImageTexture, TextureInfo};
use crate::profiler::PassStats;
use crate::settings::{Settings, SettingsUpdate};

/// GPU operations are only reachable through `Ready`.
enum State {
    Uninitialized,
    Ready(Box<Session>),
}

/// The currently loaded image: its texture set and the bind groups over it.
struct LoadedImage {
    // Declared before `textures` so the bind groups drop first.
    bind_groups: ImageBindGroups,
    textures: ImageTextureSet,
    generation: u64,
    /// The tensor and blur textures hold results for this image.
    tensor_current: bool,
}

/// All GPU state of one initialized session.
struct Session {
    ctx: GpuContext,
    output: OutputTarget,
    layouts: BindingLayouts,
    sampler: wgpu::Sampler,
    params: ParameterBuffer,
    directions: DirectionBuffers,
    pipelines: Option<PipelineSet>,
    image: Option<LoadedImage>,
    executor: PassExecutor,
    generation: u64,
}

impl Session {
    fn open(ctx: GpuContext, output: OutputTarget, settings: &Settings) -> Self {
        let layouts = BindingLayouts::new(&ctx.device);
        let sampler = pipelines::create_linear_sampler(&ctx.device);
        let params = ParameterBuffer::new(&ctx.device);
        params.write(&ctx.queue, &pack(settings));
        let directions = DirectionBuffers::new(&ctx.device);

        Self {
            ctx,
            output,
            layouts,
            sampler,
            params,
            directions,
            pipelines: None,
            image: None,
            executor: PassExecutor::new(),
            generation: 0,
        }
    }

    fn write_settings(&self, settings: &Settings) {
        self.params.write(&self.ctx.queue, &pack(settings));
    }

    fn load_image(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<()> {
        let textures = ImageTextureSet::allocate(&self.ctx, width, height, self.output.format())?;
        textures.upload_image(&self.ctx.queue, pixels)?;
        let bind_groups = ImageBindGroups::new(
            &self.ctx.device,
            &self.layouts,
            &self.sampler,
            &textures,
            &self.directions,
            &self.params,
        );

        // Before the swap, so a failed resize leaves the previous image in place.
        self.output.resize(&self.ctx, width, height)?;

        self.generation += 1;
        let previous = self.image.replace(LoadedImage {
            bind_groups,
            textures,
            generation: self.generation,
            tensor_current: false,
        });
        if let Some(previous) = previous {
            tracing::debug!(generation = previous.generation, "releasing previous image");
        }

        tracing::info!(width, height, generation = self.generation, "image loaded");
        Ok(())
    }

    fn render(&mut self, shaders: &ShaderSources, cache_tensor: bool) -> Result<()> {
        if self.image.is_none() {
            tracing::trace!("no image loaded; skipping render");
            return Ok(());
        }
        if self.pipelines.as_ref().map(|p| p.format()) != Some(self.output.format()) {
            self.pipelines = Some(PipelineSet::build(&self.ctx, &self.layouts, shaders, self.output.format())?);
        }

        let (Some(image), Some(pipelines)) = (self.image.as_mut(), self.pipelines.as_ref()) else {
            return Ok(());
        };

        let plan = if cache_tensor && image.tensor_current {
            RunPlan::CompositeOnly
        } else {
            RunPlan::Full
        };
        let resources = PassResources {
            ctx: &self.ctx,
            pipelines,
            bind_groups: &image.bind_groups,
            textures: &image.textures,
        };
        self.executor.run(&resources, &mut self.output, plan)?;

        if plan == RunPlan::Full {
            image.tensor_current = true;
        }
        tracing::debug!(generation = image.generation, ?plan, "frame rendered");
        Ok(())
    }

    fn invalidate_pipelines(&mut self) {
        self.pipelines = None;
        if let Some(image) = self.image.as_mut() {
            image.tensor_current = false;
        }
    }

    fn release(self) {
        let Session {
            ctx,
            output,
            layouts,
            sampler,
            params,
            directions,
            pipelines,
            image,
            ..
        } = self;

        drop(image);
        drop(pipelines);
        drop(params);
        drop(directions);
        drop(sampler);
        drop(layouts);
        output.release();
        ctx.destroy();
    }
}

/// Anisotropic Kuwahara filter bound to one GPU device and output target.
pub struct KuwaharaFilter {
    state: State,
    settings: Settings,
    shaders: ShaderSources,
    options: GpuOptions,
}

impl Default for KuwaharaFilter {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl KuwaharaFilter {
    pub fn new(settings: Settings) -> Self {
        Self::with_options(settings, GpuOptions::default())
    }

    pub fn with_options(settings: Settings, options: GpuOptions) -> Self {
        Self {
            state: State::Uninitialized,
            settings,
            shaders: ShaderSources::default(),
            options,
        }
    }

    /// Acquires the device and binds it to a presentable surface of `width` x `height`.
    pub fn initialize(
        &mut self,
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.settings.validate()?;
        let (ctx, output) = pollster::block_on(init::initialize_surface(target.into(), width, height, &self.options))?;
        self.install(ctx, output);
        Ok(())
    }

    /// Like [`initialize`](Self::initialize), but renders into an offscreen texture
    /// that [`read_frame`](Self::read_frame) can fetch.
    pub fn initialize_headless(&mut self, width: u32, height: u32) -> Result<()> {
        self.settings.validate()?;
        let (ctx, output) = pollster::block_on(init::initialize_headless(width, height, &self.options))?;
        self.install(ctx, output);
        Ok(())
    }

    fn install(&mut self, ctx: GpuContext, output: OutputTarget) {
        if self.is_ready() {
            tracing::info!("re-initializing; destroying previous session");
            self.destroy();
        }
        self.state = State::Ready(Box::new(Session::open(ctx, output, &self.settings)));
    }

    /// Replaces the loaded image with `pixels` (straight RGBA, `width * height * 4` bytes)
    /// and renders it.
    ///
    /// Allocation failures leave the previously loaded image in place.
    pub fn load_image(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<()> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .unwrap_or(usize::MAX);
        if pixels.len() != expected {
            return Err(FilterError::InvalidPixelBuffer {
                expected,
                actual: pixels.len(),
            });
        }

        let cache = self.options.cache_structure_tensor;
        let session = ready_mut(&mut self.state)?;
        session.load_image(width, height, pixels)?;
        session.render(&self.shaders, cache)
    }

    /// Applies a partial settings change and re-renders the loaded image, if any.
    /// Invalid values are rejected without touching the stored settings.
    pub fn update_settings(&mut self, update: SettingsUpdate) -> Result<()> {
        let merged = self.settings.merged(&update);
        merged.validate()?;
        self.settings = merged;
        tracing::debug!(?merged, "settings updated");

        let cache = self.options.cache_structure_tensor;
        if let State::Ready(session) = &mut self.state {
            session.write_settings(&merged);
            session.render(&self.shaders, cache)?;
        }
        Ok(())
    }

    pub fn set_settings(&mut self, settings: Settings) -> Result<()> {
        self.update_settings(SettingsUpdate::from(settings))
    }

    /// Swaps the stage programs. Pipelines are rebuilt on the next render.
    pub fn set_shaders(&mut self, shaders: ShaderSources) {
        self.shaders = shaders;
        if let State::Ready(session) = &mut self.state {
            session.invalidate_pipelines();
        }
    }

    /// Re-runs the passes for the loaded image; a no-op when none is loaded.
    pub fn render(&mut self) -> Result<()> {
        let cache = self.options.cache_structure_tensor;
        let session = ready_mut(&mut self.state)?;
        session.render(&self.shaders, cache)
    }

    /// Changes the output extent and re-renders. Extents beyond the device
    /// limits fail with `Allocation` and keep the current size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let cache = self.options.cache_structure_tensor;
        let session = ready_mut(&mut self.state)?;
        session.output.resize(&session.ctx, width, height)?;
        session.render(&self.shaders, cache)
    }

    /// Releases every GPU resource and the device. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if let State::Ready(session) = std::mem::replace(&mut self.state, State::Uninitialized) {
            session.release();
            tracing::info!("GPU session destroyed");
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn options(&self) -> &GpuOptions {
        &self.options
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.session().ok()?.image.as_ref().map(|image| image.textures.size())
    }

    pub fn output_size(&self) -> Option<(u32, u32)> {
        self.session().ok().map(|s| s.output.size())
    }

    pub fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.session().ok().map(|s| s.output.format())
    }

    pub fn alpha_mode(&self) -> Option<wgpu::CompositeAlphaMode> {
        self.session().ok().map(|s| s.output.alpha_mode())
    }

    pub fn texture_info(&self, kind: ImageTexture) -> Option<TextureInfo> {
        self.session().ok()?.image.as_ref().map(|image| image.textures.info(kind))
    }

    pub fn pass_stats(&self) -> PassStats {
        self.session().map(|s| s.executor.stats()).unwrap_or_default()
    }

    pub fn adapter_summary(&self) -> Option<AdapterSummary> {
        self.session().ok().map(|s| AdapterSummary::from(&s.ctx.adapter_info))
    }

    /// Reads one of the per-image textures back as RGBA.
    pub fn read_texture(&self, kind: ImageTexture) -> Result<Vec<u8>> {
        let session = self.session()?;
        let image = session.image.as_ref().ok_or_else(|| FilterError::InvalidOperation {
            message: "no image loaded".to_string(),
        })?;
        readback::read_texture_rgba(&session.ctx, image.textures.texture(kind))
    }

    /// Reads the last composited frame back as premultiplied RGBA (headless only).
    pub fn read_frame(&self) -> Result<Vec<u8>> {
        let session = self.session()?;
        let texture = session.output.offscreen_texture().ok_or_else(|| FilterError::InvalidOperation {
            message: "surface frames cannot be read back".to_string(),
        })?;
        readback::read_texture_rgba(&session.ctx, texture)
    }

    fn session(&self) -> Result<&Session> {
        match &self.state {
            State::Ready(session) => Ok(session),
            State::Uninitialized => Err(FilterError::NotInitialized),
        }
    }
}

/// Borrows only the state, leaving the filter's other fields free.
fn ready_mut(state: &mut State) -> Result<&mut Session> {
    match state {
        State::Ready(session) => Ok(session),
        State::Uninitialized => Err(FilterError::NotInitialized),
    }
}

impl Drop for KuwaharaFilter {
    fn drop(&mut self) {
        self.destroy();
    }
}
