//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs the entire pipeline in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use strung_pipeline::{NoProgress, Pipeline, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let config = PipelineConfig::default();
//! let staged = Pipeline::new(png, config)
//!     .decode()?
//!     .prepare()
//!     .build_cache()
//!     .coarse(&mut NoProgress)
//!     .fine(&mut NoProgress)
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying the intermediates later stages need. Only
//! [`Pending::decode`] is fallible: it validates the configuration and
//! decodes the image, after which every stage runs to completion.

use image::DynamicImage;

use crate::line_cache::LineCache;
use crate::optimizer::{GreedyOptimizer, Progress};
use crate::raster::RasterImage;
use crate::types::{
    Dimensions, GenerationResult, Pass, PipelineConfig, PipelineError, StagedResult,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing — call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Validate the configuration, decode the source image and advance
    /// to the [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if either pass has
    /// unusable parameters. Returns [`PipelineError::EmptyInput`] if the
    /// source bytes are empty. Returns [`PipelineError::ImageDecode`] if
    /// the image format is unrecognized or the data is corrupt.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.config.validate()?;
        let image = crate::ingest::decode(&self.source)?;
        Ok(Decoded {
            config: self.config,
            source_len: self.source.len(),
            image,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source image.
#[must_use = "pipeline stages are consumed by advancing — call .prepare() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    source_len: usize,
    image: DynamicImage,
}

impl Decoded {
    /// The decoded source image.
    #[must_use]
    pub const fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Size of the encoded source in bytes.
    #[must_use]
    pub const fn source_len(&self) -> usize {
        self.source_len
    }

    /// Build the ink-density target and advance to [`Prepared`].
    pub fn prepare(self) -> Prepared {
        let target = crate::ingest::to_target(
            &self.image,
            self.config.resolution,
            self.config.resize_filter,
        );
        Prepared {
            source_dimensions: Dimensions {
                width: self.image.width(),
                height: self.image.height(),
            },
            config: self.config,
            target,
        }
    }
}

// ───────────────────────── Stage 2: Prepared ─────────────────────────

/// Pipeline state after the optimization target has been built.
#[must_use = "pipeline stages are consumed by advancing — call .build_cache() to continue"]
pub struct Prepared {
    config: PipelineConfig,
    source_dimensions: Dimensions,
    target: RasterImage,
}

impl Prepared {
    /// The ink-density target.
    #[must_use]
    pub const fn target(&self) -> &RasterImage {
        &self.target
    }

    /// Precompute every nail-pair line and advance to [`CacheBuilt`].
    pub fn build_cache(self) -> CacheBuilt {
        let mut cache = LineCache::new();
        cache.precompute_with_margin(
            self.config.nail_count,
            self.target.dimensions(),
            self.config.nail_margin,
        );
        CacheBuilt {
            config: self.config,
            source_dimensions: self.source_dimensions,
            target: self.target,
            optimizer: GreedyOptimizer::with_cache(cache),
        }
    }
}

// ───────────────────────── Stage 3: CacheBuilt ───────────────────────

/// Pipeline state once the line cache is ready.
#[must_use = "pipeline stages are consumed by advancing — call .coarse() to continue"]
pub struct CacheBuilt {
    config: PipelineConfig,
    source_dimensions: Dimensions,
    target: RasterImage,
    optimizer: GreedyOptimizer,
}

impl CacheBuilt {
    /// The precomputed line cache.
    #[must_use]
    pub const fn cache(&self) -> &LineCache {
        self.optimizer.cache()
    }

    /// Run the exploratory pass and advance to [`CoarseDone`].
    pub fn coarse(mut self, progress: &mut impl Progress) -> CoarseDone {
        let params = self.config.params_for(Pass::Coarse);
        let coarse = self
            .optimizer
            .optimize_with_progress(&self.target, &params, progress);
        tracing::info!(
            lines = coarse.metrics.total_lines,
            mse = coarse.metrics.mse,
            "coarse pass complete"
        );
        CoarseDone {
            config: self.config,
            source_dimensions: self.source_dimensions,
            target: self.target,
            optimizer: self.optimizer,
            coarse,
        }
    }
}

// ───────────────────────── Stage 4: CoarseDone ───────────────────────

/// Pipeline state after the exploratory pass.
#[must_use = "pipeline stages are consumed by advancing — call .fine() to continue"]
pub struct CoarseDone {
    config: PipelineConfig,
    source_dimensions: Dimensions,
    target: RasterImage,
    optimizer: GreedyOptimizer,
    coarse: GenerationResult,
}

impl CoarseDone {
    /// Result of the exploratory pass.
    #[must_use]
    pub const fn coarse_result(&self) -> &GenerationResult {
        &self.coarse
    }

    /// Run the detailed pass from a blank buffer and advance to
    /// [`Finished`].
    pub fn fine(mut self, progress: &mut impl Progress) -> Finished {
        let params = self.config.params_for(Pass::Fine);
        let fine = self
            .optimizer
            .optimize_with_progress(&self.target, &params, progress);
        tracing::info!(
            lines = fine.metrics.total_lines,
            mse = fine.metrics.mse,
            "fine pass complete"
        );
        Finished {
            source_dimensions: self.source_dimensions,
            target: self.target,
            coarse: self.coarse,
            fine,
        }
    }
}

// ───────────────────────── Stage 5: Finished ─────────────────────────

/// Pipeline state after both passes — the final stage.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Finished {
    source_dimensions: Dimensions,
    target: RasterImage,
    coarse: GenerationResult,
    fine: GenerationResult,
}

impl Finished {
    /// Result of the detailed pass.
    #[must_use]
    pub const fn fine_result(&self) -> &GenerationResult {
        &self.fine
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            target: self.target,
            coarse: self.coarse,
            fine: self.fine,
            source_dimensions: self.source_dimensions,
        }
    }
}

/// Entry point for the typestate pipeline.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from source image bytes and config.
    ///
    /// No processing is performed — the bytes and config are simply
    /// stored. Call [`.decode()`](Pending::decode) to begin.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }
}
