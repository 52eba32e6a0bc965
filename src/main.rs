use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use kuwahara_wgpu::logging::init_tracing;
use kuwahara_wgpu::{KuwaharaFilter, Settings, SettingsUpdate};

/// Applies the anisotropic Kuwahara filter to an image file.
#[derive(Parser, Debug)]
#[command(name = "kuwahara-wgpu", version, about)]
struct Cli {
    /// Image to filter
    input: PathBuf,

    /// Where to write the filtered image; the format follows the extension
    output: PathBuf,

    /// JSON settings file (defaults to the stored user settings)
    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    kernel_size: Option<i32>,

    #[arg(long)]
    n: Option<i32>,

    #[arg(long)]
    hardness: Option<f32>,

    #[arg(long)]
    q: Option<f32>,

    #[arg(long)]
    alpha: Option<f32>,

    #[arg(long)]
    zero_crossing: Option<f32>,

    #[arg(long)]
    zeta: Option<f32>,

    /// Persist the effective settings to the user config directory
    #[arg(long)]
    save_settings: bool,

    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn overrides(&self) -> SettingsUpdate {
        SettingsUpdate {
            kernel_size: self.kernel_size,
            n: self.n,
            hardness: self.hardness,
            q: self.q,
            alpha: self.alpha,
            zero_crossing: self.zero_crossing,
            zeta: self.zeta,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let base = match &cli.settings {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?,
        None => Settings::load(),
    };
    let settings = base.merged(&cli.overrides());
    settings.validate()?;

    if cli.save_settings {
        settings.save().context("failed to save settings")?;
    }

    let source = image::open(&cli.input)
        .with_context(|| format!("failed to open {}", cli.input.display()))?
        .to_rgba8();
    let (width, height) = source.dimensions();

    let mut filter = KuwaharaFilter::new(settings);
    filter.initialize_headless(width, height).map_err(|e| anyhow::anyhow!(e.user_message()))?;
    if let Some(adapter) = filter.adapter_summary() {
        if adapter.is_software() {
            tracing::warn!(%adapter, "no hardware adapter; filtering on a software rasterizer");
        } else {
            tracing::info!(%adapter, "using GPU");
        }
    }

    filter.load_image(width, height, source.as_raw())?;
    let mut pixels = filter.read_frame()?;
    unpremultiply(&mut pixels);
    filter.destroy();

    let output = image::RgbaImage::from_raw(width, height, pixels)
        .context("frame size does not match the image size")?;
    output
        .save(&cli.output)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;

    tracing::info!(output = %cli.output.display(), width, height, "filtered image written");
    Ok(())
}

/// Frames are premultiplied; image files expect straight alpha.
fn unpremultiply(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u32 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}
