//! strung-pipeline: greedy string-art optimization (sans-IO).
//!
//! Approximates a grayscale image with straight thread segments strung
//! between nails evenly spaced on a circle:
//! decode -> square ink-density target -> line cache -> coarse pass ->
//! fine pass.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and returns structured data. File formats live in
//! `strung-export`; the filesystem and process plumbing live in the
//! binaries.

pub mod diagnostics;
pub mod geometry;
pub mod ingest;
pub mod line_cache;
pub mod metrics;
pub mod optimizer;
pub mod pipeline;
pub mod raster;
pub mod types;

pub use geometry::{NailLayout, generate_nails, line_pixels, rasterize_line};
pub use ingest::ResizeFilter;
pub use line_cache::{LineCache, NailPair};
pub use optimizer::{GreedyOptimizer, NoProgress, Progress};
pub use pipeline::Pipeline;
pub use raster::RasterImage;
pub use types::{
    Dimensions, GenerationParams, GenerationResult, LineConnection, Nail, Pass, PassConfig,
    PipelineConfig, PipelineError, Point, QualityMetrics, Scoring, StagedResult, StopReason,
};

/// Run the full pipeline on encoded image bytes.
///
/// Decodes the image, builds the target, precomputes the line cache, and
/// runs the coarse and fine passes. [`StagedResult::final_result`] is the
/// result to export.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
pub fn process(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    process_with_progress(image_bytes, config, &mut NoProgress)
}

/// [`process`] with a progress receiver shared by both passes.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_with_progress(
    image_bytes: &[u8],
    config: &PipelineConfig,
    progress: &mut impl Progress,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(image_bytes.to_vec(), config.clone())
        .decode()?
        .prepare()
        .build_cache()
        .coarse(&mut *progress)
        .fine(&mut *progress)
        .into_result())
}
