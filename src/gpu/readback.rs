use tokio::sync::oneshot;

use crate::errors::{FilterError, Result};
use crate::gpu::init::GpuContext;
use crate::gpu::texture::{is_bgra, swap_red_blue};

/// Row pitch of a readback copy, padded to wgpu's copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copies a 4-byte-per-pixel texture back to the CPU as tightly packed RGBA.
/// Blocks until the GPU has finished every previously submitted pass.
pub fn read_texture_rgba(ctx: &GpuContext, texture: &wgpu::Texture) -> Result<Vec<u8>> {
    let width = texture.width();
    let height = texture.height();
    let padded = padded_bytes_per_row(width);
    let size = padded as u64 * height as u64;

    let staging_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback_staging"),
        size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging_buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(Some(encoder.finish()));

    let buffer_slice = staging_buffer.slice(..);
    let (tx, rx) = oneshot::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |res| {
        let _ = tx.send(res);
    });

    ctx.device.poll(wgpu::Maintain::Wait);
    pollster::block_on(rx)
        .map_err(|e| FilterError::Readback { message: e.to_string() })?
        .map_err(|e| FilterError::Readback { message: e.to_string() })?;

    // Drop the mapped view before unmapping
    let mut pixels = {
        let data = buffer_slice.get_mapped_range();
        let tight = width as usize * 4;
        let mut pixels = Vec::with_capacity(tight * height as usize);
        for row in data.chunks(padded as usize).take(height as usize) {
            pixels.extend_from_slice(&row[..tight]);
        }
        pixels
    };
    staging_buffer.unmap();
    staging_buffer.destroy();

    if is_bgra(texture.format()) {
        swap_red_blue(&mut pixels);
    }
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(512), 2048);
    }
}
