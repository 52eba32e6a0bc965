use std::borrow::Cow;

use crate::errors::{FilterError, Result};
use crate::gpu::init::GpuContext;
use crate::gpu::types::{ImageTexture, TextureInfo};

/// Usage shared by all four per-image textures.
pub const IMAGE_TEXTURE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::COPY_DST)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::RENDER_ATTACHMENT);

/// True for formats whose byte order is B, G, R, A.
pub fn is_bgra(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
    )
}

/// Swaps the red and blue channels of tightly packed 4-byte pixels.
pub fn swap_red_blue(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

/// Reorders straight RGBA bytes into the texture's channel order.
pub fn to_texture_order(pixels: &[u8], format: wgpu::TextureFormat) -> Cow<'_, [u8]> {
    if is_bgra(format) {
        let mut swizzled = pixels.to_vec();
        swap_red_blue(&mut swizzled);
        Cow::Owned(swizzled)
    } else {
        Cow::Borrowed(pixels)
    }
}

/// The four same-sized textures the passes read and write for one image.
///
/// The set is created and released as a unit: dropping it destroys every
/// texture, so replacing a set never leaves GPU memory behind.
#[derive(Debug)]
pub struct ImageTextureSet {
    textures: [wgpu::Texture; 4],
    views: [wgpu::TextureView; 4],
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
}

impl ImageTextureSet {
    /// Allocates all four textures, or none of them.
    pub fn allocate(ctx: &GpuContext, width: u32, height: u32, format: wgpu::TextureFormat) -> Result<Self> {
        let max_dim = ctx.max_texture_dimension();
        if width == 0 || height == 0 || width > max_dim || height > max_dim {
            return Err(FilterError::Allocation {
                resource: "image texture set",
                width,
                height,
                message: format!("dimensions must be within 1..={max_dim}"),
            });
        }

        let (set, error) = ctx.scoped(|device| {
            let textures = ImageTexture::ALL.map(|kind| create_image_texture(device, kind, width, height, format));
            let views = [0, 1, 2, 3].map(|i: usize| textures[i].create_view(&wgpu::TextureViewDescriptor::default()));
            Self {
                textures,
                views,
                width,
                height,
                format,
            }
        });

        if let Some(err) = error {
            // Partially valid textures are released with the set.
            drop(set);
            return Err(FilterError::Allocation {
                resource: "image texture set",
                width,
                height,
                message: err.to_string(),
            });
        }

        tracing::debug!(width, height, ?format, "allocated image texture set");
        Ok(set)
    }

    /// Copies straight (non-premultiplied) RGBA pixels into the input texture.
    pub fn upload_image(&self, queue: &wgpu::Queue, pixels: &[u8]) -> Result<()> {
        let expected = self.width as usize * self.height as usize * 4;
        if pixels.len() != expected {
            return Err(FilterError::InvalidPixelBuffer {
                expected,
                actual: pixels.len(),
            });
        }

        let data = to_texture_order(pixels, self.format);
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: self.texture(ImageTexture::Input),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.width),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    pub fn texture(&self, kind: ImageTexture) -> &wgpu::Texture {
        &self.textures[kind as usize]
    }

    pub fn view(&self, kind: ImageTexture) -> &wgpu::TextureView {
        &self.views[kind as usize]
    }

    pub fn info(&self, kind: ImageTexture) -> TextureInfo {
        let texture = self.texture(kind);
        TextureInfo {
            width: texture.width(),
            height: texture.height(),
            format: texture.format(),
            usage: texture.usage(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }
}

impl Drop for ImageTextureSet {
    fn drop(&mut self) {
        for texture in &self.textures {
            texture.destroy();
        }
        tracing::trace!(width = self.width, height = self.height, "released image texture set");
    }
}

fn create_image_texture(
    device: &wgpu::Device,
    kind: ImageTexture,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(kind.label()),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: IMAGE_TEXTURE_USAGE,
        view_formats: &[],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgra_upload_swaps_channels() {
        let rgba = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let bgra = to_texture_order(&rgba, wgpu::TextureFormat::Bgra8UnormSrgb);
        assert_eq!(&*bgra, &[3, 2, 1, 4, 7, 6, 5, 8]);

        let same = to_texture_order(&rgba, wgpu::TextureFormat::Rgba8Unorm);
        assert!(matches!(same, Cow::Borrowed(_)));
    }

    #[test]
    fn image_usage_covers_every_pass_role() {
        assert!(IMAGE_TEXTURE_USAGE.contains(wgpu::TextureUsages::TEXTURE_BINDING));
        assert!(IMAGE_TEXTURE_USAGE.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert!(IMAGE_TEXTURE_USAGE.contains(wgpu::TextureUsages::COPY_DST));
        assert!(IMAGE_TEXTURE_USAGE.contains(wgpu::TextureUsages::COPY_SRC));
        assert!(!IMAGE_TEXTURE_USAGE.contains(wgpu::TextureUsages::STORAGE_BINDING));
    }
}
