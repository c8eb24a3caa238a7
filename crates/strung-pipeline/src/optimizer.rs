//! Greedy line selection.
//!
//! Starting at nail 0, every iteration scores each legal candidate nail
//! by how much drawing the line `current → candidate` would reduce the
//! error against the target, commits the single best move, and moves to
//! that nail. The search stops when no candidate is legal, when the best
//! improvement does not exceed `min_improvement`, or when the iteration
//! budget runs out. None of these is an error: the caller always gets the
//! sequence built so far.
//!
//! Only the committed move touches the working buffer. Candidates are
//! simulated either on one reusable scratch buffer ([`Scoring::FullImage`])
//! or directly from the line's pixels ([`Scoring::LineDelta`]), so memory
//! stays at one working buffer plus one scratch buffer regardless of the
//! nail count. Because a move is committed only when it lowers the error
//! by more than the threshold, the error sequence is strictly decreasing.

use web_time::Instant;

use crate::geometry::circular_distance;
use crate::line_cache::LineCache;
use crate::metrics::{mean_squared_error, pixel_error};
use crate::raster::{RasterImage, blend};
use crate::types::{
    GenerationParams, GenerationResult, LineConnection, QualityMetrics, Scoring, StopReason,
};

/// Progress is reported after a committed move whose iteration index is
/// a multiple of this stride.
pub const PROGRESS_STRIDE: usize = 100;

/// Label passed to [`Progress::report`] during the search.
pub const PROGRESS_LABEL: &str = "Optimizing...";

/// Receiver for periodic progress updates.
///
/// Called synchronously from the search loop; a slow implementation
/// stalls the search. Any `FnMut(usize, usize, &str)` closure works.
pub trait Progress {
    /// `current` is the iteration index, `total` the iteration budget.
    fn report(&mut self, current: usize, total: usize, label: &str);
}

impl<F: FnMut(usize, usize, &str)> Progress for F {
    fn report(&mut self, current: usize, total: usize, label: &str) {
        self(current, total, label);
    }
}

/// [`Progress`] implementation that ignores every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&mut self, _current: usize, _total: usize, _label: &str) {}
}

/// Best move found in one iteration.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    nail: usize,
    improvement: f64,
    /// Whole-image error after the move, when the scorer measured it.
    error: Option<f64>,
}

/// Greedy optimizer owning the line cache it searches over.
///
/// The cache survives between runs, so consecutive runs with the same
/// geometry (a coarse pass followed by a fine pass) build it only once.
#[derive(Debug, Default)]
pub struct GreedyOptimizer {
    cache: LineCache,
}

impl GreedyOptimizer {
    /// Optimizer with an empty cache; the first run builds it.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Optimizer over an existing cache, e.g. one built with
    /// [`LineCache::from_nails`].
    #[must_use]
    pub const fn with_cache(cache: LineCache) -> Self {
        Self { cache }
    }

    #[must_use]
    pub const fn cache(&self) -> &LineCache {
        &self.cache
    }

    #[must_use]
    pub fn into_cache(self) -> LineCache {
        self.cache
    }

    /// Run one greedy search without progress reporting.
    #[must_use]
    pub fn optimize(&mut self, target: &RasterImage, params: &GenerationParams) -> GenerationResult {
        self.optimize_with_progress(target, params, &mut NoProgress)
    }

    /// Run one greedy search against `target`.
    ///
    /// The line cache is (re)built for the target's dimensions and
    /// `params.nail_count` unless it already holds that geometry. The
    /// working buffer starts blank.
    pub fn optimize_with_progress(
        &mut self,
        target: &RasterImage,
        params: &GenerationParams,
        progress: &mut impl Progress,
    ) -> GenerationResult {
        let start = Instant::now();
        let dimensions = target.dimensions();
        if dimensions != params.dimensions() {
            tracing::warn!(
                expected = params.resolution,
                width = dimensions.width,
                height = dimensions.height,
                "target size differs from configured resolution; using target size"
            );
        }
        self.cache
            .ensure(params.nail_count, dimensions, params.nail_margin);

        let nail_count = self.cache.nails().len();
        let mut working = RasterImage::new(dimensions.width, dimensions.height);
        let mut scratch = working.clone();
        let mut current_error = mean_squared_error(target, &working);
        let mut line_sequence = Vec::new();
        let mut improvements = Vec::new();
        let mut current = 0;
        let mut stop_reason = StopReason::IterationBudget;

        for iteration in 0..params.max_iterations {
            let best = match params.scoring {
                Scoring::FullImage => self.best_by_full_image(
                    target,
                    &working,
                    &mut scratch,
                    current,
                    current_error,
                    nail_count,
                    params,
                ),
                Scoring::LineDelta => {
                    self.best_by_line_delta(target, &working, current, nail_count, params)
                }
            };

            let Some(best) = best else {
                stop_reason = StopReason::NoCandidates;
                break;
            };
            if best.improvement <= params.min_improvement {
                stop_reason = StopReason::NoImprovement;
                break;
            }

            working.blend_pixels(self.cache.get_line(current, best.nail), params.line_alpha);
            current_error = best.error.unwrap_or(current_error - best.improvement);
            line_sequence.push(LineConnection::new(current, best.nail, line_sequence.len()));
            improvements.push(best.improvement);
            tracing::trace!(
                iteration,
                from = current,
                to = best.nail,
                improvement = best.improvement,
                "committed line"
            );
            current = best.nail;

            if iteration % PROGRESS_STRIDE == 0 {
                progress.report(iteration, params.max_iterations, PROGRESS_LABEL);
            }
        }

        let metrics =
            QualityMetrics::measure(target, &working, line_sequence.len(), start.elapsed());
        tracing::debug!(
            lines = metrics.total_lines,
            mse = metrics.mse,
            %stop_reason,
            "optimization finished"
        );

        GenerationResult {
            line_sequence,
            improvements,
            rendered: working,
            metrics,
            nails: self.cache.nails().to_vec(),
            stop_reason,
        }
    }

    /// Score every candidate by drawing it on `scratch` and re-scoring the
    /// whole image.
    #[allow(clippy::too_many_arguments)]
    fn best_by_full_image(
        &self,
        target: &RasterImage,
        working: &RasterImage,
        scratch: &mut RasterImage,
        current: usize,
        current_error: f64,
        nail_count: usize,
        params: &GenerationParams,
    ) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for nail in candidates(current, nail_count, params.min_gap) {
            scratch.as_mut_slice().copy_from_slice(working.as_slice());
            scratch.blend_pixels(self.cache.get_line(current, nail), params.line_alpha);
            let error = mean_squared_error(target, scratch);
            best = pick(best, Candidate {
                nail,
                improvement: current_error - error,
                error: Some(error),
            });
        }
        best
    }

    /// Score every candidate from the pixels its line covers.
    #[allow(clippy::cast_precision_loss)]
    fn best_by_line_delta(
        &self,
        target: &RasterImage,
        working: &RasterImage,
        current: usize,
        nail_count: usize,
        params: &GenerationParams,
    ) -> Option<Candidate> {
        if target.dimensions() != working.dimensions() || target.is_empty() {
            return None;
        }
        let pixel_count = target.len() as f64;
        let (target, working) = (target.as_slice(), working.as_slice());
        let mut best: Option<Candidate> = None;
        for nail in candidates(current, nail_count, params.min_gap) {
            let delta: f64 = self
                .cache
                .get_line(current, nail)
                .iter()
                .filter_map(|&i| Some((*target.get(i)?, *working.get(i)?)))
                .map(|(t, before)| {
                    pixel_error(t, before) - pixel_error(t, blend(before, params.line_alpha))
                })
                .sum();
            best = pick(best, Candidate {
                nail,
                improvement: delta / pixel_count,
                error: None,
            });
        }
        best
    }
}

/// Nails that may follow `current`: every other nail whose circular
/// index distance is at least `min_gap`.
fn candidates(current: usize, nail_count: usize, min_gap: usize) -> impl Iterator<Item = usize> {
    (0..nail_count)
        .filter(move |&c| c != current && circular_distance(c, current, nail_count) >= min_gap)
}

/// Keep the better of two candidates; the earlier one wins ties.
fn pick(best: Option<Candidate>, candidate: Candidate) -> Option<Candidate> {
    match best {
        Some(b) if b.improvement >= candidate.improvement => Some(b),
        _ => Some(candidate),
    }
}
