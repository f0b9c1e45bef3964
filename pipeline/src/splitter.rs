//! Deterministic partitioning of a structured extent into pieces.
//!
//! Used when an unstructured piece request reaches a structured producer
//! that can fill arbitrary sub-extents: the executive turns "piece p of n"
//! into a sub-extent of the whole extent.

use serde::{Deserialize, Serialize};

use crate::extent::Extent;

/// How an extent is divided into pieces.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SplitMode {
    /// Recursive bisection along the longest remaining axis.
    #[default]
    Block,
    /// Slabs along x only.
    XSlab,
    /// Slabs along y only.
    YSlab,
    /// Slabs along z only.
    ZSlab,
}

impl SplitMode {
    /// Decode the integer form carried by the split-mode key. Unknown
    /// values fall back to block mode.
    pub fn from_i64(value: i64) -> SplitMode {
        match value {
            1 => SplitMode::XSlab,
            2 => SplitMode::YSlab,
            3 => SplitMode::ZSlab,
            _ => SplitMode::Block,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            SplitMode::Block => 0,
            SplitMode::XSlab => 1,
            SplitMode::YSlab => 2,
            SplitMode::ZSlab => 3,
        }
    }
}

/// Splits a whole extent into pieces and optionally grows them by ghost
/// levels, clamped to the whole extent.
#[derive(Clone, Copy, Debug)]
pub struct ExtentSplitter {
    whole: Extent,
    ghost_levels: i32,
    mode: SplitMode,
}

impl ExtentSplitter {
    pub fn new(whole: Extent, ghost_levels: i32, mode: SplitMode) -> Self {
        ExtentSplitter {
            whole,
            ghost_levels,
            mode,
        }
    }

    /// The sub-extent for `piece` of `num_pieces`. Out-of-range pieces and
    /// pieces with no points map to the empty extent.
    pub fn split(&self, piece: i64, num_pieces: i64) -> Extent {
        if piece < 0 || num_pieces < 1 || piece >= num_pieces || self.whole.is_empty() {
            return Extent::EMPTY;
        }
        let zero_ghost = match self.mode {
            SplitMode::Block => split_block(self.whole, piece, num_pieces),
            SplitMode::XSlab => split_slab(self.whole, 0, piece, num_pieces),
            SplitMode::YSlab => split_slab(self.whole, 1, piece, num_pieces),
            SplitMode::ZSlab => split_slab(self.whole, 2, piece, num_pieces),
        };
        if self.ghost_levels > 0 {
            zero_ghost.grow_within(self.ghost_levels, &self.whole)
        } else {
            zero_ghost
        }
    }

    /// The piece without ghost growth, for carving ghost arrays.
    pub fn split_zero_ghost(&self, piece: i64, num_pieces: i64) -> Extent {
        ExtentSplitter::new(self.whole, 0, self.mode).split(piece, num_pieces)
    }
}

fn split_block(extent: Extent, piece: i64, num_pieces: i64) -> Extent {
    if num_pieces == 1 {
        return extent;
    }
    let (nx, ny, nz) = extent.dimensions();
    // Longest axis first; an axis of one point cannot be cut.
    let axis = if nz >= nx && nz >= ny {
        2
    } else if ny >= nx {
        1
    } else {
        0
    };
    let size = [nx, ny, nz][axis] as i64;
    if size < 2 {
        // Nothing left to cut: piece 0 takes it all, the rest are empty.
        return if piece == 0 { extent } else { Extent::EMPTY };
    }
    let low_pieces = num_pieces / 2;
    let high_pieces = num_pieces - low_pieces;
    let lo = extent.0[2 * axis];
    let hi = extent.0[2 * axis + 1];
    // Cut proportionally to the piece counts so leaf sizes stay balanced.
    let cut = lo + ((size * low_pieces) / num_pieces) as i32 - 1;
    let mut low_half = extent;
    low_half.0[2 * axis + 1] = cut;
    let mut high_half = extent;
    high_half.0[2 * axis] = cut + 1;
    if piece < low_pieces {
        split_block(low_half, piece, low_pieces)
    } else {
        split_block(high_half, piece - low_pieces, high_pieces)
    }
}

fn split_slab(extent: Extent, axis: usize, piece: i64, num_pieces: i64) -> Extent {
    let lo = extent.0[2 * axis] as i64;
    let hi = extent.0[2 * axis + 1] as i64;
    let size = hi - lo + 1;
    let start = lo + (size * piece) / num_pieces;
    let end = lo + (size * (piece + 1)) / num_pieces - 1;
    if start > end {
        return Extent::EMPTY;
    }
    let mut out = extent;
    out.0[2 * axis] = start as i32;
    out.0[2 * axis + 1] = end as i32;
    out
}
