use crate::gpu::types::{KuwaharaParams, PARAMS_SIZE};
use crate::settings::Settings;

/// Builds the shader-side parameter struct from the live settings.
pub fn create_params(settings: &Settings) -> KuwaharaParams {
    KuwaharaParams {
        kernel_size: settings.kernel_size,
        n: settings.n,
        _pad0: [0; 2],
        hardness: settings.hardness,
        q: settings.q,
        zero_crossing: settings.zero_crossing,
        zeta: settings.zeta,
        alpha: settings.alpha,
        _pad1: [0.0; 3],
    }
}

/// Serializes `settings` into the fixed 48-byte block the composite stage reads.
pub fn pack(settings: &Settings) -> [u8; PARAMS_SIZE] {
    let mut block = [0u8; PARAMS_SIZE];
    block.copy_from_slice(bytemuck::bytes_of(&create_params(settings)));
    block
}

/// Reads the numeric fields back out of a packed block.
pub fn unpack(block: &[u8; PARAMS_SIZE]) -> Settings {
    let params: KuwaharaParams = bytemuck::pod_read_unaligned(block);
    Settings {
        kernel_size: params.kernel_size,
        n: params.n,
        hardness: params.hardness,
        q: params.q,
        alpha: params.alpha,
        zero_crossing: params.zero_crossing,
        zeta: params.zeta,
    }
}

/// GPU-resident copy of the parameter block, created once per session.
#[derive(Debug)]
pub struct ParameterBuffer {
    buffer: wgpu::Buffer,
}

impl ParameterBuffer {
    pub fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kuwahara_params"),
            size: PARAMS_SIZE as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { buffer }
    }

    /// Queues the block for upload; it lands before the next submission.
    pub fn write(&self, queue: &wgpu::Queue, block: &[u8; PARAMS_SIZE]) {
        queue.write_buffer(&self.buffer, 0, block);
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

impl Drop for ParameterBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_i32(block: &[u8], offset: usize) -> i32 {
        i32::from_ne_bytes(block[offset..offset + 4].try_into().unwrap())
    }

    fn read_f32(block: &[u8], offset: usize) -> f32 {
        f32::from_ne_bytes(block[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn fields_land_at_fixed_offsets() {
        let settings = Settings {
            kernel_size: 9,
            n: 8,
            hardness: 8.0,
            q: 8.0,
            alpha: 1.0,
            zero_crossing: 0.6,
            zeta: 0.5,
        };
        let block = pack(&settings);

        assert_eq!(block.len(), 48);
        assert_eq!(read_i32(&block, 0), 9);
        assert_eq!(read_i32(&block, 4), 8);
        assert_eq!(read_i32(&block, 8), 0);
        assert_eq!(read_i32(&block, 12), 0);
        assert_eq!(read_f32(&block, 16), 8.0);
        assert_eq!(read_f32(&block, 20), 8.0);
        assert_eq!(read_f32(&block, 24), 0.6);
        assert_eq!(read_f32(&block, 28), 0.5);
        assert_eq!(read_f32(&block, 32), 1.0);
        assert!(block[36..].iter().all(|&b| b == 0));
    }

    #[test]
    fn unpack_reproduces_settings() {
        let samples = [
            Settings::default(),
            Settings {
                kernel_size: 1,
                n: 1,
                hardness: -3.25,
                q: 1e-7,
                alpha: f32::MAX,
                zero_crossing: f32::MIN_POSITIVE,
                zeta: -0.0,
            },
            Settings {
                kernel_size: crate::settings::MAX_KERNEL_SIZE,
                n: 64,
                hardness: 100.0,
                q: 18.0,
                alpha: 0.125,
                zero_crossing: 2.0,
                zeta: 3.5,
            },
        ];
        for settings in samples {
            let restored = unpack(&pack(&settings));
            assert_eq!(restored.kernel_size, settings.kernel_size);
            assert_eq!(restored.n, settings.n);
            assert_eq!(restored.hardness.to_bits(), settings.hardness.to_bits());
            assert_eq!(restored.q.to_bits(), settings.q.to_bits());
            assert_eq!(restored.alpha.to_bits(), settings.alpha.to_bits());
            assert_eq!(restored.zero_crossing.to_bits(), settings.zero_crossing.to_bits());
            assert_eq!(restored.zeta.to_bits(), settings.zeta.to_bits());
        }
    }
}
