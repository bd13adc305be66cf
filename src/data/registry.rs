//! Per-rank tile registry: local tiles plus cached virtual copies.
//!
//! Local tiles are owned by this rank and double-buffered. Virtual tiles are
//! read-only replicas of foreign neighbors, allocated lazily the first time a
//! halo exchange targets them and overwritten in place on later rounds. A tile
//! id is never local and virtual at the same time.

use crate::data::mesh::{CellValue, TileBuffers};
use crate::data::tile::{CommInfo, GridLimits, Tile};
use crate::debug_invariants::DebugInvariants;
use crate::grid_error::GridError;
use crate::topology::lattice::GridExtent;
use crate::topology::ownership::OwnershipMap;
use crate::topology::tile_id::{TileId, TileIndex};
use hashbrown::HashMap;

#[derive(Clone, Debug)]
pub struct TileRegistry<T> {
    extent: GridExtent,
    rank: usize,
    mesh_shape: (usize, usize),
    limits: GridLimits,
    local: HashMap<TileId, Tile<T>>,
    virtuals: HashMap<TileId, Tile<T>>,
}

impl<T: CellValue> TileRegistry<T> {
    pub fn new(extent: GridExtent, rank: usize, mesh_shape: (usize, usize), limits: GridLimits) -> Self {
        Self {
            extent,
            rank,
            mesh_shape,
            limits,
            local: HashMap::new(),
            virtuals: HashMap::new(),
        }
    }

    /// Registry holding every tile `ownership` assigns to `rank`.
    pub fn load_local_tiles(
        ownership: &OwnershipMap,
        rank: usize,
        mesh_shape: (usize, usize),
        limits: GridLimits,
    ) -> Result<Self, GridError> {
        let mut reg = Self::new(ownership.extent(), rank, mesh_shape, limits);
        for index in ownership.tiles_of(rank) {
            reg.add_local_tile(index, ownership)?;
        }
        log::debug!("[rank {rank}] loaded {} local tiles", reg.local.len());
        Ok(reg)
    }

    /// Register `index` as a local tile after checking this rank owns it.
    pub fn add_local_tile(&mut self, index: TileIndex, ownership: &OwnershipMap) -> Result<TileId, GridError> {
        let id = self.extent.id_of(index)?;
        let owner = ownership.owner_at(index)?;
        if owner != self.rank {
            return Err(GridError::OwnershipConflict {
                tile: id,
                owner,
                rank: self.rank,
            });
        }
        if self.local.contains_key(&id) {
            return Err(GridError::DuplicateTile(id));
        }
        self.virtuals.remove(&id);
        let (w, h) = self.mesh_shape;
        let tile = Tile::new(
            id,
            index,
            CommInfo::local(self.rank),
            self.limits.tile_bounds(index, self.extent.nx, self.extent.ny),
            TileBuffers::double(w, h),
        );
        self.local.insert(id, tile);
        Ok(id)
    }

    pub fn extent(&self) -> GridExtent {
        self.extent
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn mesh_shape(&self) -> (usize, usize) {
        self.mesh_shape
    }

    /// Local or virtual tile by id.
    ///
    /// Returns `InvalidTileId` for ids outside the grid and `NotFound` for
    /// valid ids this rank holds no copy of.
    pub fn get(&self, id: TileId) -> Result<&Tile<T>, GridError> {
        self.extent.index_of(id)?;
        self.local
            .get(&id)
            .or_else(|| self.virtuals.get(&id))
            .ok_or(GridError::NotFound(id))
    }

    pub fn get_at(&self, index: TileIndex) -> Result<&Tile<T>, GridError> {
        self.get(self.extent.id_of(index)?)
    }

    pub fn get_local(&self, id: TileId) -> Option<&Tile<T>> {
        self.local.get(&id)
    }

    pub fn get_local_mut(&mut self, id: TileId) -> Option<&mut Tile<T>> {
        self.local.get_mut(&id)
    }

    pub fn get_virtual(&self, id: TileId) -> Option<&Tile<T>> {
        self.virtuals.get(&id)
    }

    pub fn is_local(&self, id: TileId) -> bool {
        self.local.contains_key(&id)
    }

    /// Cached virtual tile for `id`, allocating it on first use.
    ///
    /// Fails with `OwnershipConflict` if `id` is local here.
    pub fn ensure_virtual(&mut self, id: TileId, owner: usize) -> Result<&mut Tile<T>, GridError> {
        let index = self.extent.index_of(id)?;
        if self.local.contains_key(&id) || owner == self.rank {
            return Err(GridError::OwnershipConflict {
                tile: id,
                owner,
                rank: self.rank,
            });
        }
        let (w, h) = self.mesh_shape;
        let bounds = self.limits.tile_bounds(index, self.extent.nx, self.extent.ny);
        let tile = self.virtuals.entry(id).or_insert_with(|| {
            Tile::new(id, index, CommInfo::remote(owner), bounds, TileBuffers::single(w, h))
        });
        tile.communication.owner = owner;
        Ok(tile)
    }

    /// Local ids in ascending order.
    pub fn local_ids(&self) -> Vec<TileId> {
        let mut ids: Vec<_> = self.local.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn virtual_ids(&self) -> Vec<TileId> {
        let mut ids: Vec<_> = self.virtuals.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Local tiles flagged as boundary, ascending.
    pub fn boundary_ids(&self) -> Vec<TileId> {
        let mut ids: Vec<_> = self
            .local
            .values()
            .filter(|t| t.is_boundary())
            .map(|t| t.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn local_tiles(&self) -> impl Iterator<Item = &Tile<T>> + '_ {
        self.local.values()
    }

    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    pub fn virtual_len(&self) -> usize {
        self.virtuals.len()
    }

    /// Drop every cached virtual tile.
    pub fn erase_virtuals(&mut self) {
        self.virtuals.clear();
    }

    /// Swap current and next meshes on every local tile.
    pub fn cycle_local(&mut self) {
        for tile in self.local.values_mut() {
            tile.buffers.cycle();
        }
    }
}

impl<T: CellValue> DebugInvariants for TileRegistry<T> {
    fn validate_invariants(&self) -> Result<(), GridError> {
        for (id, tile) in &self.local {
            if self.virtuals.contains_key(id) {
                return Err(GridError::DuplicateTile(*id));
            }
            if tile.owner() != self.rank || !tile.is_local() {
                return Err(GridError::OwnershipConflict {
                    tile: *id,
                    owner: tile.owner(),
                    rank: self.rank,
                });
            }
        }
        for (id, tile) in self.local.iter().chain(self.virtuals.iter()) {
            if tile.id != *id || self.extent.id_of(tile.index)? != *id {
                return Err(GridError::InvalidTileId {
                    id: *id,
                    len: self.extent.len(),
                });
            }
            if tile.mesh().shape() != self.mesh_shape {
                return Err(GridError::MeshShape {
                    expected: self.mesh_shape,
                    got: tile.mesh().shape(),
                });
            }
        }
        Ok(())
    }
}
