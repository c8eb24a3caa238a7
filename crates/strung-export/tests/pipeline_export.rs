//! Integration test: run a synthetic image through the full pipeline and
//! export the result to JSON and PNG on disk.

#![allow(clippy::unwrap_used)]

use strung_pipeline::{PassConfig, PipelineConfig};

fn portrait_png() -> Vec<u8> {
    let img = image::RgbaImage::from_fn(64, 48, |x, y| {
        let v = if (20..44).contains(&x) && (10..40).contains(&y) {
            30
        } else {
            220
        };
        image::Rgba([v, v, v, 255])
    });
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgba8,
    )
    .unwrap();
    buf
}

#[test]
fn pipeline_result_survives_export() {
    let config = PipelineConfig {
        resolution: 64,
        nail_count: 32,
        coarse: PassConfig {
            max_iterations: 20,
            min_gap: 6,
            ..PassConfig::COARSE
        },
        fine: PassConfig {
            max_iterations: 60,
            min_gap: 4,
            ..PassConfig::FINE
        },
        ..PipelineConfig::default()
    };
    let staged = strung_pipeline::process(&portrait_png(), &config).unwrap();
    let result = staged.final_result();
    assert!(!result.line_sequence.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("string_art.json");
    let png_path = dir.path().join("string_art.png");

    std::fs::write(&json_path, strung_export::to_json(result, config.resolution).unwrap())
        .unwrap();
    std::fs::write(&png_path, strung_export::to_png(&result.rendered, false).unwrap()).unwrap();

    let document =
        strung_export::from_json(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(document.nail_count, 32);
    assert_eq!(document.resolution, Some(64));
    assert_eq!(document.total_lines, result.line_sequence.len());
    assert_eq!(document.connections(), result.line_sequence);

    let preview = image::open(&png_path).unwrap().to_luma8();
    assert_eq!(preview.dimensions(), (64, 64));
    assert!(preview.pixels().any(|p| p.0[0] > 0));
}
