//! Grayscale preview of the accumulated thread.
//!
//! Brightness is `intensity × 255`, truncated toward zero, so untouched
//! pixels are black and saturated thread is white. The optional mirror
//! flips the preview horizontally, which shows the piece as seen from the
//! back of the board.

use image::{GrayImage, Luma};
use strung_pipeline::RasterImage;

use crate::ExportError;

/// Render an intensity buffer to an 8-bit grayscale image.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn render(buffer: &RasterImage, mirror: bool) -> GrayImage {
    let width = buffer.width();
    GrayImage::from_fn(width, buffer.height(), |x, y| {
        let source_x = if mirror { width - 1 - x } else { x };
        let value = buffer.get(source_x, y).unwrap_or(0.0);
        Luma([(value.clamp(0.0, 1.0) * 255.0) as u8])
    })
}

/// Encode an intensity buffer as PNG bytes.
///
/// # Errors
///
/// Returns [`ExportError::Image`] if PNG encoding fails.
pub fn to_png(buffer: &RasterImage, mirror: bool) -> Result<Vec<u8>, ExportError> {
    let image = render(buffer, mirror);
    let mut bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut bytes);
    image::ImageEncoder::write_image(
        encoder,
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::L8,
    )?;
    Ok(bytes)
}
