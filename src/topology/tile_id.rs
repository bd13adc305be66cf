//! `TileId` and `TileIndex`: strong handles for grid tiles.
//!
//! A tile is addressed either by its lattice coordinate [`TileIndex`] `(i, j)`
//! or by its row-major global id [`TileId`] `i + j * nx`. The id is a plain
//! `u64` newtype so it can travel on the wire and serve as a message tag
//! offset; converting between the two forms always goes through a
//! [`GridExtent`](crate::topology::lattice::GridExtent), which checks bounds.

use std::fmt;

/// Row-major global tile id, unique within one grid.
///
/// # Memory layout
/// `repr(transparent)` over `u64`, so slices of ids can be cast to bytes.
#[derive(
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    bytemuck::Pod,
    bytemuck::Zeroable,
)]
#[repr(transparent)]
pub struct TileId(u64);

impl TileId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        TileId(raw)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id as an array index.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TileId").field(&self.0).finish()
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lattice coordinate of a tile: `i` along x (columns), `j` along y (rows).
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct TileIndex {
    pub i: usize,
    pub j: usize,
}

impl TileIndex {
    #[inline]
    pub const fn new(i: usize, j: usize) -> Self {
        Self { i, j }
    }
}

impl From<(usize, usize)> for TileIndex {
    fn from((i, j): (usize, usize)) -> Self {
        Self { i, j }
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.i, self.j)
    }
}
