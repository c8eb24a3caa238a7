//! Error and coverage metrics.
//!
//! The target holds ink density (1.0 = dark subject) and the rendering
//! holds thread intensity. Both are compared on a 0–255 scale where the
//! rendering is re-expressed as `255 - rendering * 255`, so error is
//! lowest where thread intensity mirrors the source brightness.

use std::time::Duration;

use crate::raster::RasterImage;
use crate::types::QualityMetrics;

/// Pixels above this intensity count as covered.
pub const COVERAGE_EPSILON: f64 = 0.01;

/// Squared error of one pixel pair on the 0–255 scale.
#[must_use]
#[inline]
pub fn pixel_error(target: f64, rendering: f64) -> f64 {
    let predicted = rendering.mul_add(-255.0, 255.0);
    let diff = target.mul_add(255.0, -predicted);
    diff * diff
}

/// Mean-squared error between `target` and `rendering`.
///
/// Returns 0.0 when the dimensions differ or the images are empty. The
/// improvement computation relies on this soft failure; callers that
/// report metrics should treat a mismatch as a precondition violation.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_squared_error(target: &RasterImage, rendering: &RasterImage) -> f64 {
    if target.dimensions() != rendering.dimensions() || target.is_empty() {
        return 0.0;
    }
    let sum: f64 = target
        .as_slice()
        .iter()
        .zip(rendering.as_slice())
        .map(|(&t, &r)| pixel_error(t, r))
        .sum();
    sum / target.len() as f64
}

/// Square root of [`mean_squared_error`].
#[must_use]
pub fn root_mean_squared_error(target: &RasterImage, rendering: &RasterImage) -> f64 {
    mean_squared_error(target, rendering).sqrt()
}

/// Error reduction from `before` to `after`. Positive means `after` is closer.
#[must_use]
pub fn improvement(target: &RasterImage, before: &RasterImage, after: &RasterImage) -> f64 {
    mean_squared_error(target, before) - mean_squared_error(target, after)
}

/// Percentage of pixels with intensity above [`COVERAGE_EPSILON`].
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn coverage_percent(rendering: &RasterImage) -> f64 {
    if rendering.is_empty() {
        return 0.0;
    }
    let covered = rendering
        .as_slice()
        .iter()
        .filter(|&&v| v > COVERAGE_EPSILON)
        .count();
    covered as f64 / rendering.len() as f64 * 100.0
}

impl QualityMetrics {
    /// Score a finished rendering.
    #[must_use]
    pub fn measure(
        target: &RasterImage,
        rendering: &RasterImage,
        total_lines: usize,
        elapsed: Duration,
    ) -> Self {
        let mse = mean_squared_error(target, rendering);
        Self {
            mse,
            rmse: mse.sqrt(),
            coverage_percent: coverage_percent(rendering),
            total_lines,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_polarity_has_zero_error() {
        // A fully inked target is matched by an unpainted rendering.
        let target = RasterImage::filled(4, 4, 1.0);
        let rendering = RasterImage::new(4, 4);
        assert!(mean_squared_error(&target, &rendering).abs() < f64::EPSILON);
    }

    #[test]
    fn opposite_polarity_has_max_error() {
        let target = RasterImage::new(4, 4);
        let rendering = RasterImage::new(4, 4);
        assert!((mean_squared_error(&target, &rendering) - 255.0 * 255.0).abs() < 1e-9);
        assert!((root_mean_squared_error(&target, &rendering) - 255.0).abs() < 1e-9);
    }

    #[test]
    fn dimension_mismatch_is_zero() {
        let target = RasterImage::new(4, 4);
        let rendering = RasterImage::new(5, 5);
        assert!(mean_squared_error(&target, &rendering).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_images_are_zero() {
        let empty = RasterImage::new(0, 0);
        assert!(mean_squared_error(&empty, &empty).abs() < f64::EPSILON);
        assert!(coverage_percent(&empty).abs() < f64::EPSILON);
    }

    #[test]
    fn mse_averages_over_pixels() {
        let target = RasterImage::new(2, 1);
        let rendering = RasterImage::from_fn(2, 1, |x, _| if x == 0 { 1.0 } else { 0.0 });
        // Pixel 0 matches exactly; pixel 1 is off by 255.
        let expected = 255.0 * 255.0 / 2.0;
        assert!((mean_squared_error(&target, &rendering) - expected).abs() < 1e-9);
    }

    #[test]
    fn improvement_is_positive_when_error_drops() {
        let target = RasterImage::new(3, 3);
        let before = RasterImage::new(3, 3);
        let mut after = before.clone();
        after.blend_pixels(&[0, 1, 2], 0.5);
        assert!(improvement(&target, &before, &after) > 0.0);
        assert!(improvement(&target, &after, &before) < 0.0);
    }

    #[test]
    fn pixel_error_matches_image_error() {
        let target = RasterImage::filled(1, 1, 0.3);
        let rendering = RasterImage::filled(1, 1, 0.6);
        assert!(
            (pixel_error(0.3, 0.6) - mean_squared_error(&target, &rendering)).abs() < 1e-9
        );
    }

    #[test]
    fn coverage_bounds() {
        assert!(coverage_percent(&RasterImage::new(10, 10)).abs() < f64::EPSILON);
        assert!((coverage_percent(&RasterImage::filled(10, 10, 0.5)) - 100.0).abs() < 1e-9);

        let mut half = RasterImage::new(2, 2);
        half.blend_pixels(&[0, 3], 0.2);
        assert!((coverage_percent(&half) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn coverage_ignores_faint_pixels() {
        let faint = RasterImage::filled(3, 3, COVERAGE_EPSILON);
        assert!(coverage_percent(&faint).abs() < f64::EPSILON);
    }

    #[test]
    fn measure_fills_every_field() {
        let target = RasterImage::new(2, 2);
        let rendering = RasterImage::filled(2, 2, 1.0);
        let metrics = QualityMetrics::measure(&target, &rendering, 7, Duration::from_millis(12));
        assert!(metrics.mse.abs() < 1e-9);
        assert!(metrics.rmse.abs() < 1e-9);
        assert!((metrics.coverage_percent - 100.0).abs() < 1e-9);
        assert_eq!(metrics.total_lines, 7);
        assert_eq!(metrics.elapsed, Duration::from_millis(12));
    }
}
