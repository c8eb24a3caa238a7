//! Shared types for the strung optimization pipeline.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::raster::RasterImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Square dimensions with the given side length.
    #[must_use]
    pub const fn square(side: u32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }

    /// Total number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Center of the image in pixel coordinates.
    #[must_use]
    pub fn center(self) -> Point {
        Point::new(f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }
}

/// A fixed anchor point on the circle that thread is strung between.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Nail {
    /// Dense 0-based identifier, assigned in angular order.
    pub id: usize,
    /// Position on the image plane.
    pub position: Point,
    /// Polar angle in degrees used to place the nail.
    pub angle: f64,
}

impl Nail {
    /// Integer pixel position used for rasterization.
    ///
    /// Coordinates are rounded to the nearest pixel so that nails at
    /// exact multiples of 90° land on the expected row or column.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn pixel(&self) -> (i64, i64) {
        (
            self.position.x.round() as i64,
            self.position.y.round() as i64,
        )
    }
}

/// One committed move: a thread segment from one nail to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineConnection {
    /// Nail the thread leaves from.
    pub from: usize,
    /// Nail the thread is strung to.
    pub to: usize,
    /// Index of this move in the thread sequence.
    pub position: usize,
}

impl LineConnection {
    /// Create a new connection record.
    #[must_use]
    pub const fn new(from: usize, to: usize, position: usize) -> Self {
        Self { from, to, position }
    }
}

/// Final quality report for one optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Mean-squared error against the target (0–255 scale).
    pub mse: f64,
    /// Root of [`mse`](Self::mse).
    pub rmse: f64,
    /// Percentage of pixels carrying non-negligible thread.
    pub coverage_percent: f64,
    /// Number of committed lines.
    pub total_lines: usize,
    /// Wall-clock duration of the run (seconds).
    #[serde(with = "crate::diagnostics::duration_serde")]
    pub elapsed: Duration,
}

/// How candidate lines are scored during the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scoring {
    /// Copy the working buffer into a scratch buffer, draw the candidate,
    /// and re-score every pixel.
    FullImage,
    /// Score only the pixels the candidate line covers. Every other pixel
    /// is unchanged by the move, so the improvement equals the full-image
    /// one up to floating-point rounding.
    #[default]
    LineDelta,
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullImage => f.write_str("FullImage"),
            Self::LineDelta => f.write_str("LineDelta"),
        }
    }
}

/// Why a run stopped searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Every candidate was excluded by the minimum-gap rule.
    NoCandidates,
    /// The best candidate did not beat the improvement threshold.
    NoImprovement,
    /// `max_iterations` moves were committed.
    IterationBudget,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCandidates => f.write_str("no legal candidate"),
            Self::NoImprovement => f.write_str("no improving candidate"),
            Self::IterationBudget => f.write_str("iteration budget exhausted"),
        }
    }
}

/// Configuration for a single optimization run.
///
/// Immutable for the duration of a run. Use [`validate`](Self::validate)
/// at the boundary: the optimizer itself does not reject bad values and
/// simply stalls at "no candidates" below the valid range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Side length of the square working image in pixels.
    pub resolution: u32,
    /// Number of nails on the circle.
    pub nail_count: usize,
    /// Inward distance in pixels between the image edge and the nail circle.
    pub nail_margin: f64,
    /// Upper bound on committed moves.
    pub max_iterations: usize,
    /// Per-line opacity in `(0, 1]`.
    pub line_alpha: f64,
    /// Minimum circular index distance between the current nail and a candidate.
    pub min_gap: usize,
    /// A move is committed only if its improvement exceeds this value.
    pub min_improvement: f64,
    /// Candidate scoring strategy.
    pub scoring: Scoring,
}

impl GenerationParams {
    /// Default working resolution.
    pub const DEFAULT_RESOLUTION: u32 = 360;
    /// Default nail count.
    pub const DEFAULT_NAIL_COUNT: usize = 360;
    /// Default inward margin of the nail circle.
    pub const DEFAULT_NAIL_MARGIN: f64 = 5.0;
    /// Default iteration budget.
    pub const DEFAULT_MAX_ITERATIONS: usize = 1000;
    /// Default per-line opacity.
    pub const DEFAULT_LINE_ALPHA: f64 = 0.1;
    /// Default minimum gap.
    pub const DEFAULT_MIN_GAP: usize = 8;
    /// Default stop threshold, in mean-squared-error units.
    pub const DEFAULT_MIN_IMPROVEMENT: f64 = 0.005;

    /// Dimensions of the square working image.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions::square(self.resolution)
    }

    /// Check the preconditions the optimizer relies on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] when the resolution is
    /// zero, fewer than two nails are requested, the opacity is outside
    /// `(0, 1]`, the margin leaves no circle, or the threshold is
    /// negative or not finite.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.resolution == 0 {
            return Err(PipelineError::InvalidConfig(
                "resolution must be positive".to_string(),
            ));
        }
        if self.nail_count < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "nail_count must be at least 2, got {}",
                self.nail_count
            )));
        }
        if !(self.line_alpha > 0.0 && self.line_alpha <= 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "line_alpha must be in (0, 1], got {}",
                self.line_alpha
            )));
        }
        let radius = f64::from(self.resolution) / 2.0 - self.nail_margin;
        if !(self.nail_margin >= 0.0 && radius > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "nail_margin {} leaves no room for nails at resolution {}",
                self.nail_margin, self.resolution
            )));
        }
        if !(self.min_improvement.is_finite() && self.min_improvement >= 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "min_improvement must be finite and non-negative, got {}",
                self.min_improvement
            )));
        }
        Ok(())
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            resolution: Self::DEFAULT_RESOLUTION,
            nail_count: Self::DEFAULT_NAIL_COUNT,
            nail_margin: Self::DEFAULT_NAIL_MARGIN,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            line_alpha: Self::DEFAULT_LINE_ALPHA,
            min_gap: Self::DEFAULT_MIN_GAP,
            min_improvement: Self::DEFAULT_MIN_IMPROVEMENT,
            scoring: Scoring::default(),
        }
    }
}

/// Per-pass search settings of the two-pass pipeline.
///
/// When deserializing, fields missing from a partial object fall back to
/// [`PassConfig::FINE`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassConfig {
    /// Upper bound on committed moves.
    pub max_iterations: usize,
    /// Per-line opacity in `(0, 1]`.
    pub line_alpha: f64,
    /// Minimum circular index distance between consecutive nails.
    pub min_gap: usize,
    /// A move is committed only if its improvement exceeds this value.
    pub min_improvement: f64,
}

impl PassConfig {
    /// Fast exploratory pass: faint lines, wide gap.
    pub const COARSE: Self = Self {
        max_iterations: 500,
        line_alpha: 0.05,
        min_gap: 16,
        min_improvement: GenerationParams::DEFAULT_MIN_IMPROVEMENT,
    };

    /// Detailed pass whose result is exported.
    pub const FINE: Self = Self {
        max_iterations: 2000,
        line_alpha: 0.1,
        min_gap: 8,
        min_improvement: GenerationParams::DEFAULT_MIN_IMPROVEMENT,
    };
}

impl Default for PassConfig {
    fn default() -> Self {
        Self::FINE
    }
}

/// Which pass of the pipeline a run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pass {
    Coarse,
    Fine,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coarse => f.write_str("coarse"),
            Self::Fine => f.write_str("fine"),
        }
    }
}

/// Configuration for the full decode → target → coarse → fine pipeline.
///
/// Geometry and scoring are shared by both passes; each pass has its own
/// search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Side length of the square working image in pixels.
    pub resolution: u32,
    /// Number of nails on the circle.
    pub nail_count: usize,
    /// Inward distance in pixels between the image edge and the nail circle.
    pub nail_margin: f64,
    /// Filter used to stretch the source to the working resolution.
    pub resize_filter: crate::ingest::ResizeFilter,
    /// Candidate scoring strategy for both passes.
    pub scoring: Scoring,
    /// Settings for the exploratory pass.
    pub coarse: PassConfig,
    /// Settings for the exported pass.
    pub fine: PassConfig,
}

impl PipelineConfig {
    /// Default working resolution.
    pub const DEFAULT_RESOLUTION: u32 = GenerationParams::DEFAULT_RESOLUTION;
    /// Default nail count.
    pub const DEFAULT_NAIL_COUNT: usize = GenerationParams::DEFAULT_NAIL_COUNT;
    /// Default inward margin of the nail circle.
    pub const DEFAULT_NAIL_MARGIN: f64 = GenerationParams::DEFAULT_NAIL_MARGIN;

    /// Run parameters for one pass.
    #[must_use]
    pub const fn params_for(&self, pass: Pass) -> GenerationParams {
        let settings = match pass {
            Pass::Coarse => self.coarse,
            Pass::Fine => self.fine,
        };
        GenerationParams {
            resolution: self.resolution,
            nail_count: self.nail_count,
            nail_margin: self.nail_margin,
            max_iterations: settings.max_iterations,
            line_alpha: settings.line_alpha,
            min_gap: settings.min_gap,
            min_improvement: settings.min_improvement,
            scoring: self.scoring,
        }
    }

    /// Validate the parameters of both passes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the offending pass.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for pass in [Pass::Coarse, Pass::Fine] {
            self.params_for(pass).validate().map_err(|e| match e {
                PipelineError::InvalidConfig(msg) => {
                    PipelineError::InvalidConfig(format!("{pass} pass: {msg}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resolution: Self::DEFAULT_RESOLUTION,
            nail_count: Self::DEFAULT_NAIL_COUNT,
            nail_margin: Self::DEFAULT_NAIL_MARGIN,
            resize_filter: crate::ingest::ResizeFilter::default(),
            scoring: Scoring::default(),
            coarse: PassConfig::COARSE,
            fine: PassConfig::FINE,
        }
    }
}

/// Output of one optimization run.
///
/// Does not derive serde traits: the rendered buffer is handed to the
/// export crate, which owns the on-disk formats.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Committed moves in the order they were chosen.
    pub line_sequence: Vec<LineConnection>,
    /// Error reduction achieved by each committed move, parallel to
    /// `line_sequence`.
    pub improvements: Vec<f64>,
    /// Accumulated thread intensity after the last committed move.
    pub rendered: RasterImage,
    /// Quality report for the run.
    pub metrics: QualityMetrics,
    /// Nail layout the sequence refers to.
    pub nails: Vec<Nail>,
    /// Why the search stopped.
    pub stop_reason: StopReason,
}

/// All outputs of a pipeline run.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Ink-density target both passes approximated.
    pub target: RasterImage,
    /// Exploratory pass, reported but not exported.
    pub coarse: GenerationResult,
    /// Exported pass.
    pub fine: GenerationResult,
    /// Decoded source image dimensions in pixels.
    pub source_dimensions: Dimensions,
}

impl StagedResult {
    /// The result to export.
    #[must_use]
    pub const fn final_result(&self) -> &GenerationResult {
        &self.fine
    }

    /// Working image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.target.dimensions()
    }
}

/// Errors that can occur before or around an optimization run.
///
/// The search loop itself is infallible; these cover decoding and
/// configuration checks at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
