//! End-to-end pass tests against a real adapter. Each test returns early when
//! the machine has no usable GPU.

use kuwahara_wgpu::{
    FilterError, GpuOptions, ImageTexture, KuwaharaFilter, PassStage, Settings, SettingsUpdate, ShaderSources,
};

fn headless(width: u32, height: u32, options: GpuOptions) -> Option<KuwaharaFilter> {
    let mut filter = KuwaharaFilter::with_options(Settings::default(), options);
    match filter.initialize_headless(width, height) {
        Ok(()) => Some(filter),
        Err(FilterError::Init(err)) => {
            eprintln!("skipping GPU test: {err}");
            None
        }
        Err(other) => panic!("unexpected initialization error: {other}"),
    }
}

/// A diagonal gradient with a hard vertical edge, so the tensor has structure.
fn test_image(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let edge = if x < width / 2 { 40 } else { 220 };
            pixels.extend_from_slice(&[edge, ((x + y) * 255 / (width + height)) as u8, (y * 255 / height) as u8, 255]);
        }
    }
    pixels
}

fn submissions(filter: &KuwaharaFilter) -> [u64; 4] {
    let stats = filter.pass_stats();
    [
        stats.submissions(PassStage::Tensor),
        stats.submissions(PassStage::BlurHorizontal),
        stats.submissions(PassStage::BlurVertical),
        stats.submissions(PassStage::Composite),
    ]
}

#[test]
fn load_then_update_reruns_only_the_composite() {
    let Some(mut filter) = headless(800, 600, GpuOptions::default()) else {
        return;
    };
    assert!(filter.is_ready());
    assert_eq!(filter.output_size(), Some((800, 600)));

    filter.load_image(512, 512, &test_image(512, 512)).unwrap();

    let format = filter.surface_format().unwrap();
    for kind in ImageTexture::ALL {
        let info = filter.texture_info(kind).unwrap();
        assert_eq!((info.width, info.height), (512, 512), "{}", kind.label());
        assert_eq!(info.format, format);
    }
    assert_eq!(filter.image_size(), Some((512, 512)));
    assert_eq!(submissions(&filter), [1, 1, 1, 1]);

    let tensor_before = filter.read_texture(ImageTexture::StructureTensor).unwrap();
    let blur_a_before = filter.read_texture(ImageTexture::BlurA).unwrap();
    let blur_b_before = filter.read_texture(ImageTexture::BlurB).unwrap();

    filter
        .update_settings(SettingsUpdate {
            kernel_size: Some(9),
            n: Some(8),
            hardness: Some(8.0),
            q: Some(8.0),
            zero_crossing: Some(0.6),
            zeta: Some(0.5),
            alpha: Some(1.0),
        })
        .unwrap();

    assert_eq!(submissions(&filter), [1, 1, 1, 2]);
    assert_eq!(filter.read_texture(ImageTexture::StructureTensor).unwrap(), tensor_before);
    assert_eq!(filter.read_texture(ImageTexture::BlurA).unwrap(), blur_a_before);
    assert_eq!(filter.read_texture(ImageTexture::BlurB).unwrap(), blur_b_before);
    assert_eq!(filter.settings().kernel_size, 9);

    filter.destroy();
    filter.destroy();
    assert!(!filter.is_ready());
    assert!(matches!(filter.render(), Err(FilterError::NotInitialized)));
}

#[test]
fn settings_change_without_image_submits_nothing() {
    let Some(mut filter) = headless(64, 64, GpuOptions::default()) else {
        return;
    };

    filter
        .update_settings(SettingsUpdate {
            kernel_size: Some(3),
            ..Default::default()
        })
        .unwrap();
    filter.render().unwrap();

    assert_eq!(filter.pass_stats().total_submissions(), 0);
    assert_eq!(filter.image_size(), None);
}

#[test]
fn rerendering_unchanged_inputs_is_stable() {
    let Some(mut filter) = headless(32, 32, GpuOptions::default()) else {
        return;
    };

    filter.load_image(32, 32, &test_image(32, 32)).unwrap();
    let first = filter.read_frame().unwrap();
    filter.render().unwrap();
    let second = filter.read_frame().unwrap();

    assert_eq!(first.len(), 32 * 32 * 4);
    assert_eq!(first, second);
    // Opaque input stays opaque
    assert!(first.chunks_exact(4).all(|px| px[3] == 255));
}

#[test]
fn sector_count_does_not_affect_the_tensor() {
    let options = GpuOptions {
        cache_structure_tensor: false,
        ..GpuOptions::default()
    };
    let Some(mut filter) = headless(48, 32, options) else {
        return;
    };

    filter.load_image(48, 32, &test_image(48, 32)).unwrap();
    let tensor = filter.read_texture(ImageTexture::StructureTensor).unwrap();
    let blurred = filter.read_texture(ImageTexture::BlurB).unwrap();

    filter
        .update_settings(SettingsUpdate {
            n: Some(4),
            ..Default::default()
        })
        .unwrap();

    // Without caching every stage re-runs
    assert_eq!(submissions(&filter), [2, 2, 2, 2]);
    assert_eq!(filter.read_texture(ImageTexture::StructureTensor).unwrap(), tensor);
    assert_eq!(filter.read_texture(ImageTexture::BlurB).unwrap(), blurred);
}

#[test]
fn failed_allocation_keeps_the_previous_image() {
    let Some(mut filter) = headless(16, 16, GpuOptions::default()) else {
        return;
    };

    filter.load_image(16, 8, &test_image(16, 8)).unwrap();
    let frame = filter.read_frame().unwrap();

    let err = filter.load_image(0, 4, &[]).unwrap_err();
    assert!(matches!(err, FilterError::Allocation { .. }));
    assert!(err.is_recoverable());

    let too_wide = 1 << 20;
    let err = filter.load_image(too_wide, 1, &vec![0u8; too_wide as usize * 4]).unwrap_err();
    assert!(matches!(err, FilterError::Allocation { .. }));

    assert_eq!(filter.image_size(), Some((16, 8)));
    assert_eq!(filter.read_frame().unwrap(), frame);
}

#[test]
fn broken_shader_reports_the_stage_and_recovers() {
    let Some(mut filter) = headless(16, 16, GpuOptions::default()) else {
        return;
    };

    filter.load_image(16, 16, &test_image(16, 16)).unwrap();
    let before = submissions(&filter);

    let broken = ShaderSources {
        composite: "@fragment fn fs_main() -> @location(0) vec4<f32> { return undefined_value; }".into(),
        ..ShaderSources::default()
    };
    filter.set_shaders(broken);

    match filter.render() {
        Err(FilterError::PipelineBuild { stage, .. }) => assert_eq!(stage.label(), "composite"),
        other => panic!("expected a pipeline build error, got {other:?}"),
    }
    assert_eq!(submissions(&filter), before);
    assert_eq!(filter.image_size(), Some((16, 16)));

    filter.set_shaders(ShaderSources::default());
    filter.render().unwrap();
    assert_eq!(filter.pass_stats().submissions(PassStage::Composite), before[3] + 1);
}

#[test]
fn mismatched_pixel_buffer_is_rejected() {
    let Some(mut filter) = headless(8, 8, GpuOptions::default()) else {
        return;
    };

    let err = filter.load_image(8, 8, &[0u8; 8 * 8 * 3]).unwrap_err();
    assert!(matches!(
        err,
        FilterError::InvalidPixelBuffer {
            expected: 256,
            actual: 192
        }
    ));
    assert_eq!(filter.image_size(), None);
    assert_eq!(filter.pass_stats().total_submissions(), 0);
}

#[test]
fn oversized_resize_keeps_the_current_output() {
    let Some(mut filter) = headless(16, 16, GpuOptions::default()) else {
        return;
    };
    filter.load_image(16, 8, &test_image(16, 8)).unwrap();
    let submitted = filter.pass_stats().total_submissions();

    let err = filter.resize(1 << 20, 1).unwrap_err();
    assert!(matches!(err, FilterError::Allocation { resource: "output target", .. }));
    assert_eq!(filter.output_size(), Some((16, 8)));
    assert_eq!(filter.pass_stats().total_submissions(), submitted);

    // Still usable at the old size
    filter.render().unwrap();
    assert_eq!(filter.read_frame().unwrap().len(), 16 * 8 * 4);
}

#[test]
fn oversized_headless_output_fails_initialization() {
    let mut filter = KuwaharaFilter::default();
    match filter.initialize_headless(1 << 20, 1) {
        Err(FilterError::Init(err)) => eprintln!("skipping GPU test: {err}"),
        Err(err) => {
            assert!(matches!(err, FilterError::Allocation { .. }));
            assert!(!filter.is_ready());
        }
        Ok(()) => panic!("an output wider than any device limit was accepted"),
    }
}

#[test]
fn loading_a_new_image_replaces_the_texture_set() {
    let Some(mut filter) = headless(16, 16, GpuOptions::default()) else {
        return;
    };

    filter.load_image(16, 8, &test_image(16, 8)).unwrap();
    filter
        .update_settings(SettingsUpdate {
            zeta: Some(0.75),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(submissions(&filter), [1, 1, 1, 2]);

    filter.load_image(32, 24, &test_image(32, 24)).unwrap();

    for kind in ImageTexture::ALL {
        let info = filter.texture_info(kind).unwrap();
        assert_eq!((info.width, info.height), (32, 24), "{}", kind.label());
    }
    assert_eq!(filter.image_size(), Some((32, 24)));
    assert_eq!(filter.output_size(), Some((32, 24)));
    // The new image gets a full run rather than reusing the old tensor
    assert_eq!(submissions(&filter), [2, 2, 2, 3]);
    assert_eq!(filter.read_texture(ImageTexture::BlurB).unwrap().len(), 32 * 24 * 4);
}

#[test]
fn translucent_input_is_composited_premultiplied() {
    let Some(mut filter) = headless(8, 8, GpuOptions::default()) else {
        return;
    };

    let pixels: Vec<u8> = [200u8, 100, 50, 128].repeat(8 * 8);
    filter.load_image(8, 8, &pixels).unwrap();
    let frame = filter.read_frame().unwrap();

    let expected = [200u32, 100, 50].map(|c| (c * 128 + 127) / 255);
    for px in frame.chunks_exact(4) {
        assert_eq!(px[3], 128);
        for (channel, want) in px[..3].iter().zip(expected) {
            assert!(*channel <= px[3]);
            assert!((*channel as i32 - want as i32).abs() <= 2, "got {px:?}, expected {expected:?}");
        }
    }
}
