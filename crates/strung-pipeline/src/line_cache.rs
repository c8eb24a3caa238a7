//! Precomputed rasterizations for every pair of nails.
//!
//! Building the cache costs `O(n²)` line rasterizations and is done once
//! per geometry; the greedy search then looks lines up in `O(1)` for
//! every candidate of every iteration. The cache is read-only during a
//! run and may be shared by consecutive runs over the same geometry.

use std::collections::HashMap;

use crate::geometry::{NailLayout, line_pixels};
use crate::types::{Dimensions, GenerationParams, Nail};

/// Unordered pair of nail ids.
///
/// [`NailPair::new`] stores the smaller id first, so `(a, b)` and
/// `(b, a)` produce the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NailPair {
    lo: usize,
    hi: usize,
}

impl NailPair {
    /// Canonicalize a pair of nail ids.
    #[must_use]
    pub const fn new(a: usize, b: usize) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    /// Smaller id.
    #[must_use]
    pub const fn lo(self) -> usize {
        self.lo
    }

    /// Larger id.
    #[must_use]
    pub const fn hi(self) -> usize {
        self.hi
    }
}

/// Geometry a cache was built for.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CacheKey {
    layout: NailLayout,
    dimensions: Dimensions,
}

/// Symmetric map from nail pairs to the pixel indices their line covers.
#[derive(Debug, Clone, Default)]
pub struct LineCache {
    lines: HashMap<NailPair, Vec<usize>>,
    nails: Vec<Nail>,
    dimensions: Option<Dimensions>,
    key: Option<CacheKey>,
}

impl LineCache {
    /// Empty cache. Every lookup misses until a precompute call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the cache for `nail_count` nails on a `width × height`
    /// image, using the default inward margin.
    pub fn precompute(&mut self, nail_count: usize, width: u32, height: u32) {
        self.precompute_with_margin(
            nail_count,
            Dimensions { width, height },
            GenerationParams::DEFAULT_NAIL_MARGIN,
        );
    }

    /// Rebuild the cache for a circle with an explicit inward margin.
    pub fn precompute_with_margin(&mut self, nail_count: usize, dimensions: Dimensions, margin: f64) {
        let layout = NailLayout::new(nail_count, margin);
        self.build(layout.nails(dimensions), dimensions);
        self.key = Some(CacheKey { layout, dimensions });
    }

    /// Build a cache over an explicit nail set.
    ///
    /// Nail ids must be dense and match their index in `nails`.
    #[must_use]
    pub fn from_nails(nails: Vec<Nail>, dimensions: Dimensions) -> Self {
        let mut cache = Self::new();
        cache.build(nails, dimensions);
        cache
    }

    /// Precompute only if the cache does not already hold this geometry.
    ///
    /// A cache built with [`from_nails`](Self::from_nails) is kept as long
    /// as its nail count and dimensions match.
    ///
    /// Returns `true` when a rebuild happened.
    pub fn ensure(&mut self, nail_count: usize, dimensions: Dimensions, margin: f64) -> bool {
        let wanted = CacheKey {
            layout: NailLayout::new(nail_count, margin),
            dimensions,
        };
        let up_to_date = match self.key {
            Some(key) => key == wanted,
            None => {
                self.dimensions == Some(dimensions)
                    && self.nails.len() == nail_count
                    && !self.nails.is_empty()
            }
        };
        if up_to_date {
            return false;
        }
        self.precompute_with_margin(nail_count, dimensions, margin);
        true
    }

    fn build(&mut self, nails: Vec<Nail>, dimensions: Dimensions) {
        self.lines.clear();
        self.key = None;
        let n = nails.len();
        self.lines.reserve(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                self.lines
                    .insert(NailPair::new(i, j), line_pixels(&nails[i], &nails[j], dimensions));
            }
        }
        tracing::debug!(
            nails = n,
            lines = self.lines.len(),
            width = dimensions.width,
            height = dimensions.height,
            "line cache built"
        );
        self.nails = nails;
        self.dimensions = Some(dimensions);
    }

    /// Pixel indices covered by the line between `from` and `to`.
    ///
    /// Argument order does not matter. Unknown pairs, including
    /// `from == to`, yield an empty slice: nothing to draw.
    #[must_use]
    pub fn get_line(&self, from: usize, to: usize) -> &[usize] {
        self.lines
            .get(&NailPair::new(from, to))
            .map_or(&[], Vec::as_slice)
    }

    /// Nails the cache was built over.
    #[must_use]
    pub fn nails(&self) -> &[Nail] {
        &self.nails
    }

    /// Image dimensions the cache was built for, if any.
    #[must_use]
    pub const fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    /// Number of cached lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Pixel indices stored across all cached lines.
    #[must_use]
    pub fn total_pixels(&self) -> usize {
        self.lines.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::generate_nails;
    use crate::types::Point;

    #[test]
    fn pair_is_canonical() {
        assert_eq!(NailPair::new(7, 2), NailPair::new(2, 7));
        let p = NailPair::new(9, 4);
        assert_eq!((p.lo(), p.hi()), (4, 9));
    }

    #[test]
    fn every_distinct_pair_has_one_entry() {
        let mut cache = LineCache::new();
        cache.precompute(12, 60, 60);
        assert_eq!(cache.len(), 12 * 11 / 2);
        assert_eq!(cache.nails().len(), 12);
        for a in 0..12 {
            for b in 0..12 {
                if a != b {
                    assert!(!cache.get_line(a, b).is_empty(), "missing {a}-{b}");
                }
            }
        }
    }

    #[test]
    fn lookup_is_symmetric() {
        let mut cache = LineCache::new();
        cache.precompute(16, 80, 80);
        for a in 0..16 {
            for b in 0..16 {
                assert_eq!(cache.get_line(a, b), cache.get_line(b, a));
            }
        }
    }

    #[test]
    fn cached_lines_match_line_pixels_in_either_order() {
        let dims = Dimensions::square(48);
        let mut cache = LineCache::new();
        cache.precompute_with_margin(16, dims, 5.0);
        let nails = cache.nails().to_vec();
        for a in 0..16 {
            for b in 0..16 {
                if a != b {
                    assert_eq!(
                        cache.get_line(a, b),
                        line_pixels(&nails[a], &nails[b], dims).as_slice(),
                        "{a}-{b}"
                    );
                }
            }
        }
    }

    #[test]
    fn misses_are_empty() {
        let mut cache = LineCache::new();
        assert!(cache.get_line(0, 1).is_empty());
        cache.precompute(4, 20, 20);
        assert!(cache.get_line(2, 2).is_empty());
        assert!(cache.total_pixels() >= cache.len() * 2);
        assert!(cache.get_line(0, 99).is_empty());
    }

    #[test]
    fn precompute_is_idempotent() {
        let mut a = LineCache::new();
        a.precompute(24, 90, 90);
        let mut b = LineCache::new();
        b.precompute(24, 90, 90);
        b.precompute(24, 90, 90);
        for i in 0..24 {
            for j in (i + 1)..24 {
                assert_eq!(a.get_line(i, j), b.get_line(i, j));
            }
        }
        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn precompute_replaces_previous_contents() {
        let mut cache = LineCache::new();
        cache.precompute(10, 50, 50);
        cache.precompute(4, 50, 50);
        assert_eq!(cache.len(), 6);
        assert!(cache.get_line(5, 9).is_empty());
    }

    #[test]
    fn ensure_skips_matching_geometry() {
        let mut cache = LineCache::new();
        let dims = Dimensions::square(40);
        assert!(cache.ensure(6, dims, 5.0));
        assert!(!cache.ensure(6, dims, 5.0));
        assert!(cache.ensure(6, dims, 2.0));
        assert!(cache.ensure(7, dims, 2.0));
    }

    #[test]
    fn ensure_keeps_explicit_nails() {
        let dims = Dimensions::square(100);
        let nails = generate_nails(8, Point::new(50.0, 50.0), 40.0);
        let mut cache = LineCache::from_nails(nails.clone(), dims);
        assert!(!cache.ensure(8, dims, 5.0));
        assert_eq!(cache.nails(), nails.as_slice());
        assert!(cache.ensure(9, dims, 5.0));
    }

    #[test]
    fn cached_pixels_stay_inside_image() {
        let mut cache = LineCache::new();
        cache.precompute(30, 64, 64);
        for i in 0..30 {
            for j in (i + 1)..30 {
                assert!(cache.get_line(i, j).iter().all(|&p| p < 64 * 64));
            }
        }
    }
}
