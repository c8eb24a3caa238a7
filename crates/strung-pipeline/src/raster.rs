//! Dense single-channel intensity buffer.
//!
//! Values are normalized to `[0.0, 1.0]` and stored row-major
//! (`index = y * width + x`). The same type holds the ink-density target
//! and the thread intensity accumulated by the optimizer.

use crate::types::Dimensions;

/// Owned row-major `f64` image.
///
/// The buffer length always equals `width * height`; every accessor is
/// bounds-checked against the declared dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    dimensions: Dimensions,
    data: Vec<f64>,
}

impl RasterImage {
    /// Zero-filled (unpainted) image.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0.0)
    }

    /// Image with every pixel set to `value`.
    #[must_use]
    pub fn filled(width: u32, height: u32, value: f64) -> Self {
        let dimensions = Dimensions { width, height };
        Self {
            dimensions,
            data: vec![value; dimensions.pixel_count()],
        }
    }

    /// Wrap an existing buffer.
    ///
    /// Returns `None` if `data.len() != width * height`.
    #[must_use]
    pub fn from_raw(width: u32, height: u32, data: Vec<f64>) -> Option<Self> {
        let dimensions = Dimensions { width, height };
        (data.len() == dimensions.pixel_count()).then_some(Self { dimensions, data })
    }

    /// Build an image by evaluating `f(x, y)` for every pixel.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f64) -> Self {
        let dimensions = Dimensions { width, height };
        let mut data = Vec::with_capacity(dimensions.pixel_count());
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { dimensions, data }
    }

    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimensions.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Number of pixels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat index of `(x, y)`, or `None` when outside the image.
    #[must_use]
    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.dimensions.width && y < self.dimensions.height)
            .then(|| y as usize * self.dimensions.width as usize + x as usize)
    }

    /// Pixel value at `(x, y)`, or `None` when outside the image.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f64> {
        self.index_of(x, y).map(|i| self.data[i])
    }

    /// Set the pixel at `(x, y)`. Returns `false` (and writes nothing)
    /// when outside the image.
    pub fn set(&mut self, x: u32, y: u32, value: f64) -> bool {
        match self.index_of(x, y) {
            Some(i) => {
                self.data[i] = value;
                true
            }
            None => false,
        }
    }

    /// Row-major pixel values.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutable row-major pixel values. The length cannot change.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Consume the image and return the underlying buffer.
    #[must_use]
    pub fn into_raw(self) -> Vec<f64> {
        self.data
    }

    /// Set every pixel to `value`.
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Composite one semi-transparent line over the listed pixels.
    ///
    /// Each covered pixel becomes `old * (1 - alpha) + alpha`, which
    /// saturates toward 1.0 without exceeding it for `alpha` in `[0, 1]`.
    /// Indices outside the buffer are skipped.
    pub fn blend_pixels(&mut self, indices: &[usize], alpha: f64) {
        for &i in indices {
            if let Some(value) = self.data.get_mut(i) {
                *value = blend(*value, alpha);
            }
        }
    }
}

/// Over-composite a line of opacity `alpha` onto one pixel value.
///
/// Shared by the optimizer, the line-delta scorer and the replay tool so
/// replayed frames match the optimizer's buffer bit for bit.
#[must_use]
#[inline]
pub fn blend(value: f64, alpha: f64) -> f64 {
    value.mul_add(1.0 - alpha, alpha)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_is_zero_filled() {
        let img = RasterImage::new(4, 3);
        assert_eq!(img.len(), 12);
        assert!(img.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn from_raw_rejects_length_mismatch() {
        assert!(RasterImage::from_raw(2, 2, vec![0.0; 3]).is_none());
        assert!(RasterImage::from_raw(2, 2, vec![0.0; 4]).is_some());
    }

    #[test]
    fn index_is_row_major() {
        let img = RasterImage::new(5, 4);
        assert_eq!(img.index_of(0, 0), Some(0));
        assert_eq!(img.index_of(4, 0), Some(4));
        assert_eq!(img.index_of(0, 1), Some(5));
        assert_eq!(img.index_of(2, 3), Some(17));
    }

    #[test]
    fn out_of_range_access_is_rejected() {
        let mut img = RasterImage::new(3, 3);
        assert_eq!(img.index_of(3, 0), None);
        assert_eq!(img.get(0, 3), None);
        // Writing past the row end must not wrap onto the next row.
        assert!(!img.set(3, 0, 1.0));
        assert_eq!(img.get(0, 1), Some(0.0));
    }

    #[test]
    fn from_fn_places_values() {
        let img = RasterImage::from_fn(3, 2, |x, y| f64::from(x + 10 * y));
        assert_eq!(img.get(2, 1), Some(12.0));
        assert_eq!(img.as_slice()[5], 12.0);
    }

    #[test]
    fn blend_saturates_toward_one() {
        let mut img = RasterImage::new(2, 1);
        for _ in 0..200 {
            img.blend_pixels(&[0], 0.2);
        }
        let v = img.get(0, 0).unwrap();
        assert!(v <= 1.0);
        assert!(v > 0.999);
        assert_eq!(img.get(1, 0), Some(0.0));
    }

    #[test]
    fn blend_single_step_matches_formula() {
        let mut img = RasterImage::filled(1, 1, 0.5);
        img.blend_pixels(&[0], 0.1);
        assert!((img.get(0, 0).unwrap() - (0.5 * 0.9 + 0.1)).abs() < 1e-15);
    }

    #[test]
    fn blend_skips_out_of_range_indices() {
        let mut img = RasterImage::new(2, 2);
        img.blend_pixels(&[3, 4, 100], 0.5);
        assert_eq!(img.as_slice(), &[0.0, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn blend_with_full_alpha_is_opaque() {
        assert!((blend(0.3, 1.0) - 1.0).abs() < f64::EPSILON);
        assert!((blend(0.0, 0.0)).abs() < f64::EPSILON);
    }
}
