//! Pipeline diagnostics: timing, counts, and quality metrics for each stage.
//!
//! [`process_with_diagnostics`] runs the same stages as
//! [`process`](crate::process) and records how long each took together
//! with stage-specific metrics, for parameter tuning and benchmarking.
//!
//! Timing goes through the [`Clock`] trait so the crate stays free of a
//! hard platform clock; callers pass an implementation backed by
//! `std::time::Instant` or `web_time::Instant`.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::optimizer::Progress;
use crate::pipeline::Pipeline;
use crate::raster::RasterImage;
use crate::types::{GenerationResult, Pass, PipelineConfig, PipelineError, StagedResult, StopReason};

/// Number of trailing moves averaged into the `mean_recent_improvement`
/// of [`StageMetrics::Pass`].
pub const RECENT_WINDOW: usize = 100;

/// Source of monotonic timestamps.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
pub(crate) mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 0: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 1: resize, luminance and inversion into the target.
    pub ingest: StageDiagnostics,
    /// Stage 2: line cache precomputation.
    pub line_cache: StageDiagnostics,
    /// Stage 3: exploratory pass.
    pub coarse: StageDiagnostics,
    /// Stage 4: exported pass.
    pub fine: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Target preparation metrics.
    Ingest {
        /// Side length of the square target.
        resolution: u32,
        /// Resize filter name.
        filter: String,
        /// Mean ink density of the target in `[0, 1]`.
        mean_ink: f64,
    },
    /// Line cache metrics.
    LineCache {
        /// Nails on the circle.
        nail_count: usize,
        /// Cached nail pairs.
        line_count: usize,
        /// Pixel indices stored across all lines.
        total_pixels: usize,
    },
    /// Metrics of one optimization pass.
    Pass {
        /// Which pass.
        pass: Pass,
        /// Committed lines.
        lines: usize,
        /// Why the search stopped.
        stop_reason: StopReason,
        /// Final mean-squared error.
        mse: f64,
        /// Final root-mean-squared error.
        rmse: f64,
        /// Percentage of pixels carrying thread.
        coverage_percent: f64,
        /// Mean improvement of the last [`RECENT_WINDOW`] moves.
        mean_recent_improvement: f64,
    },
}

impl StageMetrics {
    fn for_pass(pass: Pass, result: &GenerationResult) -> Self {
        Self::Pass {
            pass,
            lines: result.metrics.total_lines,
            stop_reason: result.stop_reason,
            mse: result.metrics.mse,
            rmse: result.metrics.rmse,
            coverage_percent: result.metrics.coverage_percent,
            mean_recent_improvement: mean_recent_improvement(&result.improvements),
        }
    }
}

/// High-level summary for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Working resolution.
    pub resolution: u32,
    /// Nails on the circle.
    pub nail_count: usize,
    /// Lines in the exported sequence.
    pub final_line_count: usize,
    /// Mean-squared error of the exported result.
    pub final_mse: f64,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} -> {}x{} target, {} nails",
            self.summary.image_width,
            self.summary.image_height,
            self.summary.resolution,
            self.summary.resolution,
            self.summary.nail_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Decode", &self.decode),
            ("Ingest", &self.ingest),
            ("Line Cache", &self.line_cache),
            ("Coarse Pass", &self.coarse),
            ("Fine Pass", &self.fine),
        ];

        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Final lines: {}  |  Final MSE: {:.2}",
            self.summary.final_line_count, self.summary.final_mse,
        ));

        lines.join("\n")
    }
}

/// Run the full pipeline, recording per-stage diagnostics.
///
/// # Errors
///
/// Returns the same errors as [`process`](crate::process).
pub fn process_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
    progress: &mut impl Progress,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();

    let t = clock.now();
    let decoded = Pipeline::new(image_bytes.to_vec(), config.clone()).decode()?;
    let (width, height) = (decoded.image().width(), decoded.image().height());
    let decode = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Decode {
            input_bytes: image_bytes.len(),
            width,
            height,
            pixel_count: u64::from(width) * u64::from(height),
        },
    };

    let t = clock.now();
    let prepared = decoded.prepare();
    let ingest = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Ingest {
            resolution: config.resolution,
            filter: config.resize_filter.to_string(),
            mean_ink: mean_value(prepared.target()),
        },
    };

    let t = clock.now();
    let cached = prepared.build_cache();
    let line_cache = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::LineCache {
            nail_count: cached.cache().nails().len(),
            line_count: cached.cache().len(),
            total_pixels: cached.cache().total_pixels(),
        },
    };

    let t = clock.now();
    let coarse_done = cached.coarse(&mut *progress);
    let coarse = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::for_pass(Pass::Coarse, coarse_done.coarse_result()),
    };

    let t = clock.now();
    let finished = coarse_done.fine(&mut *progress);
    let fine = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::for_pass(Pass::Fine, finished.fine_result()),
    };

    let staged = finished.into_result();
    let summary = PipelineSummary {
        image_width: width,
        image_height: height,
        resolution: config.resolution,
        nail_count: config.nail_count,
        final_line_count: staged.fine.metrics.total_lines,
        final_mse: staged.fine.metrics.mse,
    };

    let diagnostics = PipelineDiagnostics {
        decode,
        ingest,
        line_cache,
        coarse,
        fine,
        total_duration: clock.elapsed(&start),
        summary,
    };
    Ok((staged, diagnostics))
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Mean pixel value, 0.0 for an empty image.
#[allow(clippy::cast_precision_loss)]
fn mean_value(image: &RasterImage) -> f64 {
    if image.is_empty() {
        return 0.0;
    }
    image.as_slice().iter().sum::<f64>() / image.len() as f64
}

/// Mean of the last [`RECENT_WINDOW`] improvements, 0.0 when none.
#[allow(clippy::cast_precision_loss)]
fn mean_recent_improvement(improvements: &[f64]) -> f64 {
    let recent = &improvements[improvements.len().saturating_sub(RECENT_WINDOW)..];
    if recent.is_empty() {
        return 0.0;
    }
    recent.iter().sum::<f64>() / recent.len() as f64
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Ingest {
            resolution,
            filter,
            mean_ink,
        } => format!("{resolution}x{resolution} {filter} ink={:.1}%", mean_ink * 100.0),
        StageMetrics::LineCache {
            nail_count,
            line_count,
            total_pixels,
        } => format!("{nail_count} nails, {line_count} lines, {total_pixels} px"),
        StageMetrics::Pass {
            lines,
            stop_reason,
            mse,
            coverage_percent,
            mean_recent_improvement,
            ..
        } => format!(
            "{lines} lines, mse={mse:.2} coverage={coverage_percent:.1}% recent={mean_recent_improvement:.3} ({stop_reason})",
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::optimizer::NoProgress;
    use crate::types::PassConfig;

    /// Clock that advances one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn png(side: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(side, side, |x, _| {
            if x < side / 2 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
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

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            resolution: 40,
            nail_count: 20,
            coarse: PassConfig {
                max_iterations: 10,
                min_gap: 4,
                ..PassConfig::COARSE
            },
            fine: PassConfig {
                max_iterations: 20,
                min_gap: 4,
                ..PassConfig::FINE
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn recent_improvement_uses_trailing_window() {
        assert!(mean_recent_improvement(&[]).abs() < f64::EPSILON);
        let mut values = vec![1000.0; 50];
        values.extend(std::iter::repeat_n(2.0, RECENT_WINDOW));
        assert!((mean_recent_improvement(&values) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn diagnostics_cover_every_stage() {
        let clock = TickClock(Cell::new(0));
        let (staged, diag) =
            process_with_diagnostics(&png(30), &small_config(), &clock, &mut NoProgress).unwrap();

        assert!(matches!(
            diag.decode.metrics,
            StageMetrics::Decode {
                width: 30,
                height: 30,
                ..
            }
        ));
        assert!(matches!(
            diag.line_cache.metrics,
            StageMetrics::LineCache {
                nail_count: 20,
                line_count: 190,
                ..
            }
        ));
        assert!(matches!(
            diag.fine.metrics,
            StageMetrics::Pass {
                pass: Pass::Fine,
                ..
            }
        ));
        assert_eq!(diag.summary.final_line_count, staged.fine.line_sequence.len());
        assert!(diag.total_duration >= diag.fine.duration);
    }

    #[test]
    fn report_lists_stages() {
        let clock = TickClock(Cell::new(0));
        let (_, diag) =
            process_with_diagnostics(&png(30), &small_config(), &clock, &mut NoProgress).unwrap();
        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Line Cache"));
        assert!(report.contains("Fine Pass"));
    }

    #[test]
    fn diagnostics_serialize_to_json() {
        let clock = TickClock(Cell::new(0));
        let (_, diag) =
            process_with_diagnostics(&png(30), &small_config(), &clock, &mut NoProgress).unwrap();
        let json = serde_json::to_string(&diag).unwrap();
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary.nail_count, 20);
        assert!(json.contains("\"total_duration\""));
    }

    #[test]
    fn errors_propagate() {
        let clock = TickClock(Cell::new(0));
        let result = process_with_diagnostics(&[], &small_config(), &clock, &mut NoProgress);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }
}
