//! Nail placement and digital line rasterization.
//!
//! Nails sit at equal angular spacing on a circle inscribed in the
//! square working image. Lines between nails are rasterized with
//! Bresenham's integer algorithm; the optimizer, the line cache and the
//! replay tool all go through [`line_pixels`] so they agree on exactly
//! which pixels a thread covers.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, Nail, Point};

/// Place `count` nails evenly on a circle.
///
/// Nail `i` sits at `i * 360 / count` degrees, measured from the +X axis
/// toward +Y (clockwise on screen, since image Y grows downward).
/// Deterministic: identical inputs give identical nails.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn generate_nails(count: usize, center: Point, radius: f64) -> Vec<Nail> {
    if count == 0 {
        return Vec::new();
    }
    let step = 360.0 / count as f64;
    (0..count)
        .map(|id| {
            let angle = id as f64 * step;
            let radians = angle.to_radians();
            Nail {
                id,
                position: Point::new(
                    radius.mul_add(radians.cos(), center.x),
                    radius.mul_add(radians.sin(), center.y),
                ),
                angle,
            }
        })
        .collect()
}

/// Pixels covered by the segment `(x0, y0)`–`(x1, y1)`, as flat indices.
///
/// Integer-only Bresenham walk with an independent sign step per axis,
/// so all eight octants are handled by the same loop. Both endpoints are
/// visited; a zero-length segment yields its single pixel. Pixels outside
/// `[0, width) × [0, height)` are skipped rather than clamped.
#[must_use]
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn rasterize_line(x0: i64, y0: i64, x1: i64, y1: i64, width: u32, height: u32) -> Vec<usize> {
    let (w, h) = (i64::from(width), i64::from(height));
    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };

    let mut pixels = Vec::with_capacity(dx.max(dy) as usize + 1);
    let mut err = dx - dy;
    let (mut x, mut y) = (x0, y0);

    loop {
        if (0..w).contains(&x) && (0..h).contains(&y) {
            pixels.push((y * w + x) as usize);
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }

    pixels
}

/// Rasterize the line between two nails inside an image of `dimensions`.
///
/// Bresenham is not symmetric in its endpoints, so the line is always
/// traced from the nail with the smaller id. Both argument orders give
/// the same pixels in the same order.
#[must_use]
pub fn line_pixels(from: &Nail, to: &Nail, dimensions: Dimensions) -> Vec<usize> {
    let (start, end) = if from.id <= to.id { (from, to) } else { (to, from) };
    let (x0, y0) = start.pixel();
    let (x1, y1) = end.pixel();
    rasterize_line(x0, y0, x1, y1, dimensions.width, dimensions.height)
}

/// How nails are laid out on a square image.
///
/// The circle is centered on the image with radius
/// `width / 2 - margin`, keeping nails inside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NailLayout {
    /// Number of nails.
    pub count: usize,
    /// Inward margin in pixels.
    pub margin: f64,
}

impl NailLayout {
    #[must_use]
    pub const fn new(count: usize, margin: f64) -> Self {
        Self { count, margin }
    }

    /// Circle radius for an image of `dimensions`.
    #[must_use]
    pub fn radius(&self, dimensions: Dimensions) -> f64 {
        f64::from(dimensions.width) / 2.0 - self.margin
    }

    /// Generate the nails for an image of `dimensions`.
    #[must_use]
    pub fn nails(&self, dimensions: Dimensions) -> Vec<Nail> {
        generate_nails(self.count, dimensions.center(), self.radius(dimensions))
    }
}

/// Circular index distance between two nails on a ring of `count`.
#[must_use]
pub const fn circular_distance(a: usize, b: usize, count: usize) -> usize {
    let d = a.abs_diff(b);
    let wrapped = count.saturating_sub(d);
    if d < wrapped { d } else { wrapped }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;

    fn coords(pixels: &[usize], width: u32) -> Vec<(i64, i64)> {
        pixels
            .iter()
            .map(|&i| ((i % width as usize) as i64, (i / width as usize) as i64))
            .collect()
    }

    fn assert_8_connected(points: &[(i64, i64)]) {
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let step = (a.0 - b.0).abs().max((a.1 - b.1).abs());
            assert_eq!(step, 1, "gap between {a:?} and {b:?}");
        }
    }

    #[test]
    fn nails_are_evenly_spaced() {
        let nails = generate_nails(4, Point::new(50.0, 50.0), 10.0);
        assert_eq!(nails.len(), 4);
        let expected = [(60.0, 50.0), (50.0, 60.0), (40.0, 50.0), (50.0, 40.0)];
        for (nail, (ex, ey)) in nails.iter().zip(expected) {
            assert!((nail.position.x - ex).abs() < 1e-9, "{nail:?}");
            assert!((nail.position.y - ey).abs() < 1e-9, "{nail:?}");
        }
        assert_eq!(
            nails.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        assert!((nails[3].angle - 270.0).abs() < 1e-12);
    }

    #[test]
    fn nail_generation_is_deterministic() {
        let a = generate_nails(360, Point::new(180.0, 180.0), 175.0);
        let b = generate_nails(360, Point::new(180.0, 180.0), 175.0);
        assert_eq!(a, b);
    }

    #[test]
    fn zero_nails_is_empty() {
        assert!(generate_nails(0, Point::new(0.0, 0.0), 1.0).is_empty());
    }

    #[test]
    fn single_pixel_line() {
        let pixels = rasterize_line(3, 4, 3, 4, 10, 10);
        assert_eq!(pixels, vec![43]);
    }

    #[test]
    fn horizontal_line_counts_chebyshev_plus_one() {
        let pixels = rasterize_line(2, 5, 9, 5, 10, 10);
        assert_eq!(pixels.len(), 8);
        assert_eq!(pixels.first(), Some(&52));
        assert_eq!(pixels.last(), Some(&59));
    }

    #[test]
    fn vertical_line_counts_chebyshev_plus_one() {
        let pixels = rasterize_line(4, 9, 4, 1, 10, 10);
        assert_eq!(pixels.len(), 9);
        assert_eq!(coords(&pixels, 10)[0], (4, 9));
        assert_eq!(coords(&pixels, 10)[8], (4, 1));
    }

    #[test]
    fn diagonal_line_counts_chebyshev_plus_one() {
        let pixels = rasterize_line(7, 0, 0, 7, 10, 10);
        assert_eq!(pixels.len(), 8);
        for (x, y) in coords(&pixels, 10) {
            assert_eq!(x + y, 7);
        }
    }

    #[test]
    fn every_octant_is_connected_and_hits_endpoints() {
        let center = (20_i64, 20_i64);
        let targets = [
            (35, 24),
            (24, 35),
            (16, 35),
            (5, 24),
            (5, 16),
            (16, 5),
            (24, 5),
            (35, 16),
        ];
        for (tx, ty) in targets {
            let pixels = rasterize_line(center.0, center.1, tx, ty, 40, 40);
            let points = coords(&pixels, 40);
            assert_eq!(points.first(), Some(&center));
            assert_eq!(points.last(), Some(&(tx, ty)));
            assert_8_connected(&points);
            let chebyshev = (tx - center.0).abs().max((ty - center.1).abs());
            assert_eq!(points.len() as i64, chebyshev + 1);
        }
    }

    #[test]
    fn out_of_bounds_pixels_are_skipped() {
        let pixels = rasterize_line(-3, 0, 3, 0, 10, 10);
        assert_eq!(pixels, vec![0, 1, 2, 3]);
        assert!(rasterize_line(-5, -5, -1, -1, 10, 10).is_empty());
    }

    #[test]
    fn layout_uses_image_center_and_margin() {
        let layout = NailLayout::new(8, 10.0);
        let dims = Dimensions::square(100);
        assert!((layout.radius(dims) - 40.0).abs() < f64::EPSILON);
        let nails = layout.nails(dims);
        assert_eq!(nails[0].pixel(), (90, 50));
        assert_eq!(nails[4].pixel(), (10, 50));
        assert_eq!(nails[6].pixel(), (50, 10));
    }

    #[test]
    fn line_pixels_between_opposite_nails_crosses_center() {
        let dims = Dimensions::square(100);
        let nails = NailLayout::new(8, 10.0).nails(dims);
        let pixels = line_pixels(&nails[0], &nails[4], dims);
        assert_eq!(pixels.len(), 81);
        assert!(pixels.contains(&(50 * 100 + 50)));
    }

    #[test]
    fn line_pixels_trace_from_lower_id_in_both_orders() {
        let dims = Dimensions::square(48);
        let nails = NailLayout::new(16, 5.0).nails(dims);
        for a in 0..16 {
            for b in (a + 1)..16 {
                let (x0, y0) = nails[a].pixel();
                let (x1, y1) = nails[b].pixel();
                let forward = rasterize_line(x0, y0, x1, y1, 48, 48);
                assert_eq!(line_pixels(&nails[a], &nails[b], dims), forward, "{a}-{b}");
                assert_eq!(line_pixels(&nails[b], &nails[a], dims), forward, "{b}-{a}");
            }
        }
    }

    #[test]
    fn reversed_bresenham_differs_for_some_pairs() {
        let dims = Dimensions::square(48);
        let nails = NailLayout::new(16, 5.0).nails(dims);
        let asymmetric = (0..16)
            .flat_map(|a| ((a + 1)..16).map(move |b| (a, b)))
            .filter(|&(a, b)| {
                let (x0, y0) = nails[a].pixel();
                let (x1, y1) = nails[b].pixel();
                let mut fwd = rasterize_line(x0, y0, x1, y1, 48, 48);
                let mut rev = rasterize_line(x1, y1, x0, y0, 48, 48);
                fwd.sort_unstable();
                rev.sort_unstable();
                fwd != rev
            })
            .count();
        assert!(asymmetric > 0);
    }

    #[test]
    fn circular_distance_wraps() {
        assert_eq!(circular_distance(0, 1, 10), 1);
        assert_eq!(circular_distance(0, 9, 10), 1);
        assert_eq!(circular_distance(2, 7, 10), 5);
        assert_eq!(circular_distance(7, 2, 10), 5);
        assert_eq!(circular_distance(3, 3, 10), 0);
    }
}
