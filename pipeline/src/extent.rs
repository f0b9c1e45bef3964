//! Structured extent math.
//!
//! An extent is the index-space box of a structured dataset, expressed as
//! inclusive lo/hi bounds per axis. The canonical empty extent is
//! `{0, -1, 0, -1, 0, -1}` (hi below lo on every axis).

use serde::{Deserialize, Serialize};

/// A structured index-space box: `[x_lo, x_hi, y_lo, y_hi, z_lo, z_hi]`.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Extent(pub [i32; 6]);

impl Extent {
    /// The canonical empty extent.
    pub const EMPTY: Extent = Extent([0, -1, 0, -1, 0, -1]);

    pub fn new(x_lo: i32, x_hi: i32, y_lo: i32, y_hi: i32, z_lo: i32, z_hi: i32) -> Self {
        Extent([x_lo, x_hi, y_lo, y_hi, z_lo, z_hi])
    }

    /// An extent is empty when hi falls below lo on any axis.
    pub fn is_empty(&self) -> bool {
        self.0[0] > self.0[1] || self.0[2] > self.0[3] || self.0[4] > self.0[5]
    }

    /// Axis-wise min/max bounding union. The union with an empty extent is
    /// the other extent.
    pub fn union(&self, other: &Extent) -> Extent {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let mut out = [0; 6];
        for axis in 0..3 {
            out[2 * axis] = self.0[2 * axis].min(other.0[2 * axis]);
            out[2 * axis + 1] = self.0[2 * axis + 1].max(other.0[2 * axis + 1]);
        }
        Extent(out)
    }

    /// True when `other` lies entirely within this extent.
    pub fn contains(&self, other: &Extent) -> bool {
        other.0[0] >= self.0[0]
            && other.0[1] <= self.0[1]
            && other.0[2] >= self.0[2]
            && other.0[3] <= self.0[3]
            && other.0[4] >= self.0[4]
            && other.0[5] <= self.0[5]
    }

    /// Intersection with `bounds`. Empty if the boxes do not overlap.
    pub fn clamp_to(&self, bounds: &Extent) -> Extent {
        if self.is_empty() || bounds.is_empty() {
            return Extent::EMPTY;
        }
        let mut out = [0; 6];
        for axis in 0..3 {
            out[2 * axis] = self.0[2 * axis].max(bounds.0[2 * axis]);
            out[2 * axis + 1] = self.0[2 * axis + 1].min(bounds.0[2 * axis + 1]);
            if out[2 * axis] > out[2 * axis + 1] {
                return Extent::EMPTY;
            }
        }
        Extent(out)
    }

    /// Point counts along each axis (`hi - lo + 1`), zero when empty.
    pub fn dimensions(&self) -> (usize, usize, usize) {
        if self.is_empty() {
            return (0, 0, 0);
        }
        (
            (self.0[1] - self.0[0] + 1) as usize,
            (self.0[3] - self.0[2] + 1) as usize,
            (self.0[5] - self.0[4] + 1) as usize,
        )
    }

    /// Total number of points covered by this extent.
    pub fn num_points(&self) -> usize {
        let (nx, ny, nz) = self.dimensions();
        nx * ny * nz
    }

    /// Grow every axis by `levels`, clamped to `bounds`.
    pub fn grow_within(&self, levels: i32, bounds: &Extent) -> Extent {
        if self.is_empty() {
            return *self;
        }
        let mut out = self.0;
        for axis in 0..3 {
            out[2 * axis] -= levels;
            out[2 * axis + 1] += levels;
        }
        Extent(out).clamp_to(bounds)
    }
}

impl Default for Extent {
    fn default() -> Self {
        Extent::EMPTY
    }
}

impl std::fmt::Display for Extent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} {} {} {} {} {}]",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}
