//! Dense tile ownership table.
//!
//! An [`OwnershipMap`] assigns every coordinate of the grid to exactly one
//! rank. It is built once on the coordinator
//! ([`build_ownership`](crate::partitioning::build_ownership)), broadcast
//! verbatim ([`distribute_ownership`](crate::algs::distribute::distribute_ownership))
//! and never mutated afterwards, so every rank can read it without locking.

use crate::debug_invariants::DebugInvariants;
use crate::grid_error::GridError;
use crate::topology::lattice::GridExtent;
use crate::topology::tile_id::{TileId, TileIndex};

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OwnershipMap {
    extent: GridExtent,
    rank_count: usize,
    /// Row-major owners, `owners[i + j * nx]`.
    owners: Vec<u32>,
}

impl OwnershipMap {
    /// Build a map from a row-major owner table, validating every entry.
    pub fn from_owners(
        extent: GridExtent,
        rank_count: usize,
        owners: &[usize],
    ) -> Result<Self, GridError> {
        if extent.is_empty() {
            return Err(GridError::Configuration(format!(
                "grid extent {}x{} has no tiles",
                extent.nx, extent.ny
            )));
        }
        if rank_count == 0 || rank_count > u32::MAX as usize {
            return Err(GridError::Configuration(format!(
                "rank count {rank_count} is out of range"
            )));
        }
        if owners.len() != extent.len() {
            return Err(GridError::Configuration(format!(
                "owner table has {} entries, grid {}x{} needs {}",
                owners.len(),
                extent.nx,
                extent.ny,
                extent.len()
            )));
        }
        let mut table = Vec::with_capacity(owners.len());
        for (index, &owner) in owners.iter().enumerate() {
            if owner >= rank_count {
                return Err(GridError::InvalidOwner {
                    index,
                    owner,
                    rank_count,
                });
            }
            table.push(owner as u32);
        }
        Ok(Self {
            extent,
            rank_count,
            owners: table,
        })
    }

    /// Build a map by evaluating `f` at every coordinate.
    pub fn from_fn<F>(extent: GridExtent, rank_count: usize, mut f: F) -> Result<Self, GridError>
    where
        F: FnMut(TileIndex) -> usize,
    {
        let owners: Vec<usize> = extent.indices().map(&mut f).collect();
        Self::from_owners(extent, rank_count, &owners)
    }

    pub fn extent(&self) -> GridExtent {
        self.extent
    }

    pub fn rank_count(&self) -> usize {
        self.rank_count
    }

    /// Owner of coordinate `(i, j)`; signed so callers can pass raw offsets.
    pub fn owner(&self, i: i64, j: i64) -> Result<usize, GridError> {
        if i < 0 || j < 0 {
            return Err(self.extent.invalid(i, j));
        }
        self.owner_at(TileIndex::new(i as usize, j as usize))
    }

    pub fn owner_at(&self, index: TileIndex) -> Result<usize, GridError> {
        let id = self.extent.id_of(index)?;
        Ok(self.owners[id.as_usize()] as usize)
    }

    pub fn owner_of(&self, id: TileId) -> Result<usize, GridError> {
        self.extent.index_of(id)?;
        Ok(self.owners[id.as_usize()] as usize)
    }

    pub fn is_owned_by(&self, index: TileIndex, rank: usize) -> bool {
        self.owner_at(index).is_ok_and(|owner| owner == rank)
    }

    /// `(coordinate, owner)` pairs in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (TileIndex, usize)> + '_ {
        self.extent
            .indices()
            .zip(self.owners.iter().map(|&o| o as usize))
    }

    /// Coordinates owned by `rank`, row-major.
    pub fn tiles_of(&self, rank: usize) -> impl Iterator<Item = TileIndex> + '_ {
        self.iter()
            .filter_map(move |(index, owner)| (owner == rank).then_some(index))
    }

    /// Number of tiles per rank, indexed by rank.
    pub fn counts_per_rank(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.rank_count];
        for &o in &self.owners {
            counts[o as usize] += 1;
        }
        counts
    }

    /// Raw row-major owner table.
    pub fn as_raw(&self) -> &[u32] {
        &self.owners
    }
}

impl DebugInvariants for OwnershipMap {
    fn validate_invariants(&self) -> Result<(), GridError> {
        if self.owners.len() != self.extent.len() {
            return Err(GridError::Configuration(format!(
                "owner table has {} entries for {} tiles",
                self.owners.len(),
                self.extent.len()
            )));
        }
        if let Some((index, &owner)) = self
            .owners
            .iter()
            .enumerate()
            .find(|(_, o)| **o as usize >= self.rank_count)
        {
            return Err(GridError::InvalidOwner {
                index,
                owner: owner as usize,
                rank_count: self.rank_count,
            });
        }
        Ok(())
    }
}
