//! Tiles: one rectangular block of the grid plus its communication metadata.

use crate::data::mesh::{CellValue, Mesh, TileBuffers};
use crate::topology::tile_id::{TileId, TileIndex};
use std::collections::BTreeSet;

/// Who holds a tile and how it takes part in halo exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CommInfo {
    pub owner: usize,
    /// True on the owning rank, false for virtual copies.
    pub local: bool,
    /// Set by boundary classification: some neighbor has another owner.
    pub boundary: bool,
    /// Number of distinct neighbor tiles owned by another rank.
    pub number_of_virtual_neighbors: usize,
    /// Distinct foreign owners among the neighbors.
    pub virtual_owners: BTreeSet<usize>,
    /// Foreign owner holding the most neighbors (lowest rank on ties).
    pub top_virtual_owner: Option<usize>,
}

impl CommInfo {
    pub fn local(owner: usize) -> Self {
        Self {
            owner,
            local: true,
            ..Self::default()
        }
    }

    pub fn remote(owner: usize) -> Self {
        Self {
            owner,
            local: false,
            ..Self::default()
        }
    }
}

/// Physical bounds of the whole grid, split evenly across tiles.
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GridLimits {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Default for GridLimits {
    fn default() -> Self {
        Self {
            xmin: 0.0,
            xmax: 1.0,
            ymin: 0.0,
            ymax: 1.0,
        }
    }
}

impl GridLimits {
    /// `(mins, maxs)` of tile `index` in an `nx x ny` grid.
    pub fn tile_bounds(&self, index: TileIndex, nx: usize, ny: usize) -> ([f64; 2], [f64; 2]) {
        let dx = (self.xmax - self.xmin) / nx as f64;
        let dy = (self.ymax - self.ymin) / ny as f64;
        let x0 = self.xmin + dx * index.i as f64;
        let y0 = self.ymin + dy * index.j as f64;
        ([x0, y0], [x0 + dx, y0 + dy])
    }
}

#[derive(Clone, Debug)]
pub struct Tile<T> {
    pub id: TileId,
    pub index: TileIndex,
    pub communication: CommInfo,
    pub mins: [f64; 2],
    pub maxs: [f64; 2],
    pub(crate) buffers: TileBuffers<T>,
}

impl<T: CellValue> Tile<T> {
    pub(crate) fn new(
        id: TileId,
        index: TileIndex,
        communication: CommInfo,
        bounds: ([f64; 2], [f64; 2]),
        buffers: TileBuffers<T>,
    ) -> Self {
        Self {
            id,
            index,
            communication,
            mins: bounds.0,
            maxs: bounds.1,
            buffers,
        }
    }

    pub fn is_local(&self) -> bool {
        self.communication.local
    }

    pub fn is_boundary(&self) -> bool {
        self.communication.boundary
    }

    pub fn owner(&self) -> usize {
        self.communication.owner
    }

    /// Current cell state.
    pub fn mesh(&self) -> &Mesh<T> {
        self.buffers.current()
    }

    pub fn mesh_mut(&mut self) -> &mut Mesh<T> {
        self.buffers.current_mut()
    }

    /// Physical size of one cell along each axis.
    pub fn cell_size(&self) -> [f64; 2] {
        let (w, h) = self.mesh().shape();
        [
            (self.maxs[0] - self.mins[0]) / w.max(1) as f64,
            (self.maxs[1] - self.mins[1]) / h.max(1) as f64,
        ]
    }

    pub fn snapshot(&self) -> TileSnapshot<T> {
        TileSnapshot {
            id: self.id,
            index: self.index,
            owner: self.owner(),
            boundary: self.is_boundary(),
            virtual_neighbors: self.communication.number_of_virtual_neighbors,
            mesh: self.mesh().clone(),
        }
    }
}

/// Owned copy of a tile's state for inspection or output.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TileSnapshot<T> {
    pub id: TileId,
    pub index: TileIndex,
    pub owner: usize,
    pub boundary: bool,
    pub virtual_neighbors: usize,
    pub mesh: Mesh<T>,
}
