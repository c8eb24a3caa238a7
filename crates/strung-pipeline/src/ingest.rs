//! Image decoding and target preparation.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the square
//! ink-density [`RasterImage`] the optimizer approximates: the source is
//! stretched to `resolution × resolution`, converted to luminance, and
//! inverted so that dark source pixels carry high target values.

use std::fmt;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::raster::RasterImage;
use crate::types::PipelineError;

/// Luminance weights applied to the R, G and B channels.
pub const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Resampling filter used when stretching the source to the working
/// resolution.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeFilter {
    /// Nearest-neighbor: each output pixel samples one source pixel.
    #[default]
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic (Catmull-Rom).
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with 3 lobes.
    Lanczos3,
}

impl ResizeFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Decode raw image bytes.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Build the optimization target from a decoded image.
///
/// The aspect ratio is not preserved: the image is stretched to fill the
/// square. Alpha is ignored.
#[must_use]
pub fn to_target(image: &DynamicImage, resolution: u32, filter: ResizeFilter) -> RasterImage {
    let resized = image
        .resize_exact(resolution, resolution, filter.to_image_filter())
        .to_rgb8();
    RasterImage::from_fn(resized.width(), resized.height(), |x, y| {
        let [r, g, b] = resized.get_pixel(x, y).0;
        1.0 - luminance(r, g, b) / 255.0
    })
}

/// Weighted luminance of one RGB pixel on the 0–255 scale.
#[must_use]
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    let [wr, wg, wb] = LUMA_WEIGHTS;
    wr.mul_add(
        f64::from(r),
        wg.mul_add(f64::from(g), wb * f64::from(b)),
    )
}
