//! Lattice geometry: grid extents, boundary policies and Moore neighborhoods.
//!
//! All neighbor enumerations are deterministic: offsets are visited in
//! row-major order of the 3x3 block around a tile, skipping the center.

use crate::grid_error::GridError;
use crate::topology::tile_id::{TileId, TileIndex};
use itertools::iproduct;

/// Moore offsets `(di, dj)` in row-major order of the 3x3 block minus the center.
pub const MOORE_OFFSETS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Position of an offset in [`MOORE_OFFSETS`], if it is a Moore offset.
pub fn offset_slot(di: i64, dj: i64) -> Option<usize> {
    MOORE_OFFSETS.iter().position(|&o| o == (di, dj))
}

/// Number of tiles along each axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct GridExtent {
    pub nx: usize,
    pub ny: usize,
}

impl GridExtent {
    pub const fn new(nx: usize, ny: usize) -> Self {
        Self { nx, ny }
    }

    /// Total tile count.
    pub const fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub const fn is_empty(&self) -> bool {
        self.nx == 0 || self.ny == 0
    }

    pub const fn contains(&self, index: TileIndex) -> bool {
        index.i < self.nx && index.j < self.ny
    }

    /// Row-major id of `index`, or `InvalidCoordinate` when outside the grid.
    pub fn id_of(&self, index: TileIndex) -> Result<TileId, GridError> {
        if !self.contains(index) {
            return Err(self.invalid(index.i as i64, index.j as i64));
        }
        Ok(TileId::new((index.i + index.j * self.nx) as u64))
    }

    /// Coordinate of `id`, or `InvalidTileId` when past the last tile.
    pub fn index_of(&self, id: TileId) -> Result<TileIndex, GridError> {
        let raw = id.as_usize();
        if raw >= self.len() {
            return Err(GridError::InvalidTileId { id, len: self.len() });
        }
        Ok(TileIndex::new(raw % self.nx, raw / self.nx))
    }

    /// Every coordinate in row-major order (`i` fastest).
    pub fn indices(&self) -> impl Iterator<Item = TileIndex> + use<> {
        iproduct!(0..self.ny, 0..self.nx).map(|(j, i)| TileIndex::new(i, j))
    }

    pub(crate) fn invalid(&self, i: i64, j: i64) -> GridError {
        GridError::InvalidCoordinate {
            i,
            j,
            nx: self.nx,
            ny: self.ny,
        }
    }
}

/// How neighbor lookups behave past the edge of an axis.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Indices wrap around modulo the axis length.
    #[default]
    Periodic,
    /// Out-of-range neighbors do not exist.
    Clamped,
}

impl BoundaryPolicy {
    fn resolve(self, coord: i64, len: usize) -> Option<usize> {
        let len = len as i64;
        match self {
            BoundaryPolicy::Periodic => Some(coord.rem_euclid(len) as usize),
            BoundaryPolicy::Clamped if (0..len).contains(&coord) => Some(coord as usize),
            BoundaryPolicy::Clamped => None,
        }
    }
}

/// Grid extent plus per-axis boundary policy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Topology {
    extent: GridExtent,
    x_policy: BoundaryPolicy,
    y_policy: BoundaryPolicy,
}

impl Topology {
    /// Same policy on both axes.
    pub fn new(extent: GridExtent, policy: BoundaryPolicy) -> Self {
        Self::with_axes(extent, policy, policy)
    }

    pub fn with_axes(extent: GridExtent, x_policy: BoundaryPolicy, y_policy: BoundaryPolicy) -> Self {
        Self {
            extent,
            x_policy,
            y_policy,
        }
    }

    pub fn extent(&self) -> GridExtent {
        self.extent
    }

    pub fn policies(&self) -> (BoundaryPolicy, BoundaryPolicy) {
        (self.x_policy, self.y_policy)
    }

    /// The tile at `index + (di, dj)` under the boundary policy, if any.
    ///
    /// `index` must lie inside the extent.
    pub fn neighbor(&self, index: TileIndex, di: i64, dj: i64) -> Option<TileIndex> {
        debug_assert!(self.extent.contains(index), "{index} outside {:?}", self.extent);
        let i = self.x_policy.resolve(index.i as i64 + di, self.extent.nx)?;
        let j = self.y_policy.resolve(index.j as i64 + dj, self.extent.ny)?;
        Some(TileIndex::new(i, j))
    }

    /// Moore neighbors paired with the offset that reached them.
    ///
    /// On periodic axes shorter than three tiles the same coordinate (or the
    /// tile itself) can appear under several offsets.
    pub fn neighbors_with_offsets(
        &self,
        index: TileIndex,
    ) -> impl Iterator<Item = ((i64, i64), TileIndex)> + '_ {
        MOORE_OFFSETS
            .iter()
            .filter_map(move |&(di, dj)| self.neighbor(index, di, dj).map(|n| ((di, dj), n)))
    }

    /// Up to eight Moore neighbors in row-major offset order.
    pub fn neighbors(&self, index: TileIndex) -> Vec<TileIndex> {
        self.neighbors_with_offsets(index).map(|(_, n)| n).collect()
    }

    /// Whether `a` and `b` are Moore neighbors of each other.
    pub fn are_adjacent(&self, a: TileIndex, b: TileIndex) -> bool {
        a != b && self.neighbors_with_offsets(a).any(|(_, n)| n == b)
    }
}
