//! Hilbert curve mapping between genomic coordinates and 2D lattice points.
//!
//! A chromosome of length `L` is laid along a Hilbert curve of the smallest
//! order whose `2^order x 2^order` lattice has at least `L` cells. Intervals
//! on the chromosome then become regions of the lattice, which is what the
//! quadtree indexes.
//!
//! Aligned runs of `4^k` consecutive distances always fill one aligned
//! `2^k x 2^k` square of the lattice. [`HilbertMapper::range_to_bbox`] uses
//! this to bound an interval with a handful of squares instead of visiting
//! every cell.

use crate::bounding_box::Rect;
use crate::errors::{ErrorKind, QuindexError, QuindexResult};

/// Largest supported curve order; `4^31` distances still fit in a `u64`.
pub const MAX_HILBERT_ORDER: u32 = 31;

/// Returns the smallest Hilbert order whose curve has at least `length`
/// positions, i.e. `ceil(log2(length) / 2)`.
pub fn order_for_length(length: u64) -> QuindexResult<u32> {
    if length == 0 {
        return Err(QuindexError::new(
            "Chromosome length must be positive",
            ErrorKind::ConfigurationError,
        ));
    }

    let mut order = 0u32;
    while (1u128 << (2 * order)) < length as u128 {
        order += 1;
    }

    if order > MAX_HILBERT_ORDER {
        return Err(QuindexError::new(
            &format!(
                "Chromosome length {} needs Hilbert order {} (max {})",
                length, order, MAX_HILBERT_ORDER
            ),
            ErrorKind::ConfigurationError,
        ));
    }
    Ok(order)
}

/// Converts a distance along the curve of the given order to a lattice point.
pub fn hilbert_point(order: u32, d: u64) -> (u64, u64) {
    d2xy(1u64 << order, d)
}

/// Converts a lattice point to its distance along the curve of the given
/// order.
pub fn hilbert_distance(order: u32, x: u64, y: u64) -> u64 {
    xy2d(1u64 << order, x, y)
}

/// Maps 1D chromosome coordinates onto the Hilbert curve sized for one
/// chromosome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HilbertMapper {
    length: u64,
    order: u32,
}

impl HilbertMapper {
    /// Creates a mapper for a chromosome of `length` bases.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` when `length` is zero or too large for
    /// the supported curve orders.
    pub fn new(length: u64) -> QuindexResult<Self> {
        let order = order_for_length(length)?;
        Ok(Self { length, order })
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    /// Side of the lattice, `2^order`.
    pub fn side(&self) -> u64 {
        1u64 << self.order
    }

    /// Last valid distance on the curve, `4^order - 1`.
    pub fn max_distance(&self) -> u64 {
        (1u64 << (2 * self.order)) - 1
    }

    /// The lattice bounding square `(0, 0, side, side)`, used as the extent of
    /// the chromosome's quadtree.
    pub fn bounds(&self) -> Rect {
        let side = self.side() as f64;
        Rect::new(0.0, 0.0, side, side)
    }

    pub fn point_from_distance(&self, d: u64) -> (u64, u64) {
        hilbert_point(self.order, d)
    }

    pub fn distance_from_point(&self, x: u64, y: u64) -> u64 {
        hilbert_distance(self.order, x, y)
    }

    /// Bounds the lattice cells of every distance in `[start, end]`.
    ///
    /// The interval is split into maximal aligned blocks of `4^k` distances;
    /// each block covers an aligned `2^k` square whose diagonal corners are
    /// added to the envelope. The result is padded by `margin` on each side.
    /// The box is conservative: every cell of the interval is inside it, but
    /// it may also cover cells of distances outside the interval.
    ///
    /// Reversed bounds are swapped and `end` is clamped to the end of the
    /// curve.
    ///
    /// # Errors
    ///
    /// Returns `LookupError` when `start` lies beyond the end of the curve.
    pub fn range_to_bbox(&self, start: u64, end: u64, margin: f64) -> QuindexResult<Rect> {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let last = self.max_distance();
        if start > last {
            return Err(QuindexError::new(
                &format!(
                    "Coordinate {} is beyond the Hilbert curve of order {} (last {})",
                    start, self.order, last
                ),
                ErrorKind::LookupError,
            ));
        }
        let end = end.min(last);

        let mut bbox = Rect::empty();
        let mut cursor = start;
        loop {
            let level = self.block_level(cursor, end);
            let side = 1u64 << level;
            let (x, y) = self.point_from_distance(cursor);
            let (x0, y0) = (x & !(side - 1), y & !(side - 1));
            bbox.expand_point(x0 as f64, y0 as f64);
            bbox.expand_point((x0 + side - 1) as f64, (y0 + side - 1) as f64);

            let next = cursor + (1u64 << (2 * level));
            if next > end {
                break;
            }
            cursor = next;
        }

        Ok(bbox.inflate(margin))
    }

    /// Largest `k` such that `cursor` is a multiple of `4^k` and the block
    /// `[cursor, cursor + 4^k)` ends at or before `end`.
    fn block_level(&self, cursor: u64, end: u64) -> u32 {
        let aligned = if cursor == 0 {
            self.order
        } else {
            (cursor.trailing_zeros() / 2).min(self.order)
        };
        let remaining = end - cursor + 1;
        let mut level = aligned;
        while level > 0 && (1u64 << (2 * level)) > remaining {
            level -= 1;
        }
        level
    }
}

/// Converts (x, y) coordinates on the Hilbert curve to a 1D distance.
///
/// This is the core Hilbert curve algorithm using rotation and reflection.
fn xy2d(n: u64, x: u64, y: u64) -> u64 {
    let mut d = 0u64;
    let mut x = x;
    let mut y = y;
    let mut s = n / 2;

    while s > 0 {
        let rx = ((x & s) > 0) as u64;
        let ry = ((y & s) > 0) as u64;
        d += s * s * ((3 * rx) ^ ry);
        rotate(s, &mut x, &mut y, rx, ry);
        s /= 2;
    }

    d
}

/// Inverse of [`xy2d`].
fn d2xy(n: u64, d: u64) -> (u64, u64) {
    let mut x = 0u64;
    let mut y = 0u64;
    let mut t = d;
    let mut s = 1u64;

    while s < n {
        let rx = 1 & (t / 2);
        let ry = 1 & (t ^ rx);
        rotate(s, &mut x, &mut y, rx, ry);
        x += s * rx;
        y += s * ry;
        t /= 4;
        s *= 2;
    }

    (x, y)
}

/// Rotates and reflects the coordinate system appropriately for Hilbert curve.
fn rotate(n: u64, x: &mut u64, y: &mut u64, rx: u64, ry: u64) {
    if ry == 0 {
        if rx == 1 {
            *x = n.wrapping_sub(1).wrapping_sub(*x);
            *y = n.wrapping_sub(1).wrapping_sub(*y);
        }
        std::mem::swap(x, y);
    }
}
