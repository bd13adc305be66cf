//! Read-only view of a local tile and its eight Moore neighbors.
//!
//! Solvers use a [`Halo`] to read cells just past a tile's edge. Neighbors
//! owned by this rank come straight from the registry; foreign neighbors
//! come from the virtual copies filled by the last halo exchange.

use crate::data::mesh::{CellValue, Mesh};
use crate::data::registry::TileRegistry;
use crate::data::tile::Tile;
use crate::grid_error::GridError;
use crate::topology::lattice::{MOORE_OFFSETS, Topology, offset_slot};
use crate::topology::tile_id::TileIndex;

pub struct Halo<'a, T> {
    center: &'a Tile<T>,
    neighbors: [Option<&'a Tile<T>>; 8],
}

impl<'a, T: CellValue> Halo<'a, T> {
    /// Collect the neighbors of local tile `index`.
    ///
    /// Missing slots past a clamped edge stay empty. A foreign neighbor
    /// without a cached virtual copy is `NotFound`.
    pub fn gather(
        registry: &'a TileRegistry<T>,
        topology: &Topology,
        index: TileIndex,
    ) -> Result<Self, GridError> {
        let center = registry.get_at(index)?;
        let mut neighbors = [None; 8];
        for (slot, &(di, dj)) in MOORE_OFFSETS.iter().enumerate() {
            if let Some(n) = topology.neighbor(index, di, dj) {
                neighbors[slot] = Some(registry.get_at(n)?);
            }
        }
        Ok(Self { center, neighbors })
    }

    pub fn center(&self) -> &'a Tile<T> {
        self.center
    }

    /// Neighbor tile at offset `(di, dj)`; `(0, 0)` is the center.
    pub fn neighbor(&self, di: i64, dj: i64) -> Option<&'a Tile<T>> {
        if (di, dj) == (0, 0) {
            return Some(self.center);
        }
        self.neighbors[offset_slot(di, dj)?]
    }

    pub fn mesh(&self, di: i64, dj: i64) -> Option<&'a Mesh<T>> {
        self.neighbor(di, dj).map(|t| t.mesh())
    }

    /// Cell at `(x, y)` in the center tile's coordinates.
    ///
    /// Coordinates up to one tile past an edge resolve into the neighbor on
    /// that side. Returns `None` past a clamped edge or further out.
    pub fn cell(&self, x: i64, y: i64) -> Option<T> {
        let (w, h) = self.center.mesh().shape();
        let (w, h) = (w as i64, h as i64);
        let dx = x.div_euclid(w);
        let dy = y.div_euclid(h);
        if dx.abs() > 1 || dy.abs() > 1 {
            return None;
        }
        let mesh = self.mesh(dx, dy)?;
        mesh.get((x - dx * w) as usize, (y - dy * h) as usize)
    }
}
