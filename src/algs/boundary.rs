//! Boundary classification and exchange-plan construction.
//!
//! A local tile is a *boundary* tile when at least one of its Moore neighbors
//! (under the grid's boundary policy) is owned by another rank. Each such
//! adjacency yields one [`SendEntry`] (this tile must go to that rank) and one
//! [`RecvEntry`] (that neighbor must come from its owner). Entries are kept in
//! ordered sets, so repeated adjacencies collapse and the result does not
//! depend on the order local tiles are visited.

use crate::data::mesh::CellValue;
use crate::data::registry::TileRegistry;
use crate::debug_invariants::DebugInvariants;
use crate::grid_error::GridError;
use crate::topology::lattice::Topology;
use crate::topology::ownership::OwnershipMap;
use crate::topology::tile_id::{TileId, TileIndex};
use std::collections::{BTreeMap, BTreeSet};

/// Local `tile` must be sent to rank `dest` every round.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct SendEntry {
    pub tile: TileId,
    pub dest: usize,
}

/// Foreign `tile` is expected from rank `source` every round.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct RecvEntry {
    pub tile: TileId,
    pub source: usize,
}

/// Per-tile neighbor summary written into [`CommInfo`](crate::data::tile::CommInfo).
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct TileCommSummary {
    pub virtual_neighbors: usize,
    pub virtual_owners: BTreeSet<usize>,
    pub top_virtual_owner: Option<usize>,
}

/// Classified local tiles plus the send/receive plan derived from them.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct BoundaryClassification {
    pub boundary: BTreeSet<TileId>,
    pub interior: BTreeSet<TileId>,
    pub send: BTreeSet<SendEntry>,
    pub recv: BTreeSet<RecvEntry>,
    pub per_tile: BTreeMap<TileId, TileCommSummary>,
}

impl BoundaryClassification {
    pub fn is_boundary(&self, id: TileId) -> bool {
        self.boundary.contains(&id)
    }

    /// Ids to send to `rank`, ascending.
    pub fn send_to(&self, rank: usize) -> Vec<TileId> {
        self.send
            .iter()
            .filter(|e| e.dest == rank)
            .map(|e| e.tile)
            .collect()
    }

    /// Ids expected from `rank`, ascending.
    pub fn recv_from(&self, rank: usize) -> Vec<TileId> {
        self.recv
            .iter()
            .filter(|e| e.source == rank)
            .map(|e| e.tile)
            .collect()
    }

    /// Every rank this one sends to or receives from.
    pub fn peers(&self) -> BTreeSet<usize> {
        self.send
            .iter()
            .map(|e| e.dest)
            .chain(self.recv.iter().map(|e| e.source))
            .collect()
    }

    /// Write per-tile descriptors into the registry's local tiles and
    /// allocate a virtual slot for every expected receive.
    pub fn apply<T: CellValue>(&self, registry: &mut TileRegistry<T>) -> Result<(), GridError> {
        for id in self.boundary.iter().chain(self.interior.iter()) {
            let tile = registry.get_local_mut(*id).ok_or(GridError::NotFound(*id))?;
            let summary = self.per_tile.get(id).cloned().unwrap_or_default();
            let comm = &mut tile.communication;
            comm.boundary = self.boundary.contains(id);
            comm.number_of_virtual_neighbors = summary.virtual_neighbors;
            comm.virtual_owners = summary.virtual_owners;
            comm.top_virtual_owner = summary.top_virtual_owner;
        }
        for entry in &self.recv {
            registry.ensure_virtual(entry.tile, entry.source)?;
        }
        Ok(())
    }
}

/// Classify `local` tiles of `my_rank` and build the exchange plan.
pub fn classify<I>(
    local: I,
    ownership: &OwnershipMap,
    topology: &Topology,
    my_rank: usize,
) -> Result<BoundaryClassification, GridError>
where
    I: IntoIterator<Item = TileIndex>,
{
    let extent = ownership.extent();
    let mut out = BoundaryClassification::default();

    for index in local {
        let id = extent.id_of(index)?;
        let owner = ownership.owner_at(index)?;
        if owner != my_rank {
            return Err(GridError::OwnershipConflict {
                tile: id,
                owner,
                rank: my_rank,
            });
        }

        let mut foreign: BTreeMap<TileId, usize> = BTreeMap::new();
        for n in topology.neighbors(index) {
            let n_owner = ownership.owner_at(n)?;
            if n_owner != my_rank {
                foreign.insert(extent.id_of(n)?, n_owner);
            }
        }

        if foreign.is_empty() {
            out.interior.insert(id);
            out.per_tile.insert(id, TileCommSummary::default());
            continue;
        }

        out.boundary.insert(id);
        let mut per_owner: BTreeMap<usize, usize> = BTreeMap::new();
        for (&n_id, &n_owner) in &foreign {
            out.recv.insert(RecvEntry {
                tile: n_id,
                source: n_owner,
            });
            out.send.insert(SendEntry {
                tile: id,
                dest: n_owner,
            });
            *per_owner.entry(n_owner).or_default() += 1;
        }
        // highest count, lowest rank on ties
        let top = per_owner
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(&rank, _)| rank);
        out.per_tile.insert(
            id,
            TileCommSummary {
                virtual_neighbors: foreign.len(),
                virtual_owners: per_owner.keys().copied().collect(),
                top_virtual_owner: top,
            },
        );
    }

    log::debug!(
        "[rank {my_rank}] classified {} boundary / {} interior tiles, {} sends, {} receives",
        out.boundary.len(),
        out.interior.len(),
        out.send.len(),
        out.recv.len()
    );
    crate::grid_invariants!(out, "classify");
    Ok(out)
}

impl DebugInvariants for BoundaryClassification {
    fn validate_invariants(&self) -> Result<(), GridError> {
        if let Some(id) = self.boundary.intersection(&self.interior).next() {
            return Err(GridError::DuplicateTile(*id));
        }
        for e in &self.send {
            if !self.boundary.contains(&e.tile) {
                return Err(GridError::NotFound(e.tile));
            }
        }
        for e in &self.recv {
            if self.boundary.contains(&e.tile) || self.interior.contains(&e.tile) {
                return Err(GridError::DuplicateTile(e.tile));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::lattice::{BoundaryPolicy, GridExtent};

    fn t(i: usize, j: usize) -> TileIndex {
        TileIndex::new(i, j)
    }

    fn id(i: usize, j: usize) -> TileId {
        TileId::new((i + 4 * j) as u64)
    }

    #[test]
    fn corner_tile_with_single_foreign_owner() {
        let ext = GridExtent::new(4, 4);
        let map = OwnershipMap::from_fn(ext, 2, |x| usize::from(x.i == 1 && x.j == 1)).unwrap();
        let topo = Topology::new(ext, BoundaryPolicy::Clamped);
        let c = classify([t(0, 0)], &map, &topo, 0).unwrap();
        assert!(c.is_boundary(id(0, 0)));
        assert_eq!(c.recv_from(1), vec![id(1, 1)]);
        assert_eq!(c.send_to(1), vec![id(0, 0)]);
        let s = &c.per_tile[&id(0, 0)];
        assert_eq!(s.virtual_neighbors, 1);
        assert_eq!(s.top_virtual_owner, Some(1));
    }

    #[test]
    fn top_owner_ties_go_to_lowest_rank() {
        let ext = GridExtent::new(3, 1);
        let map = OwnershipMap::from_owners(ext, 3, &[2, 0, 1]).unwrap();
        let topo = Topology::new(ext, BoundaryPolicy::Clamped);
        let c = classify([t(1, 0)], &map, &topo, 0).unwrap();
        let s = &c.per_tile[&TileId::new(1)];
        assert_eq!(s.virtual_owners, BTreeSet::from([1, 2]));
        assert_eq!(s.top_virtual_owner, Some(1));
        assert_eq!(c.peers(), BTreeSet::from([1, 2]));
    }

    #[test]
    fn rejects_unowned_and_out_of_grid() {
        let ext = GridExtent::new(2, 2);
        let map = OwnershipMap::from_owners(ext, 2, &[0, 1, 0, 1]).unwrap();
        let topo = Topology::new(ext, BoundaryPolicy::Periodic);
        assert!(matches!(
            classify([t(1, 0)], &map, &topo, 0),
            Err(GridError::OwnershipConflict { owner: 1, rank: 0, .. })
        ));
        assert!(matches!(
            classify([t(5, 0)], &map, &topo, 0),
            Err(GridError::InvalidCoordinate { i: 5, .. })
        ));
    }

    #[test]
    fn single_rank_has_no_boundary() {
        let ext = GridExtent::new(3, 3);
        let map = OwnershipMap::from_fn(ext, 1, |_| 0).unwrap();
        let topo = Topology::new(ext, BoundaryPolicy::Periodic);
        let c = classify(ext.indices(), &map, &topo, 0).unwrap();
        assert_eq!(c.interior.len(), 9);
        assert!(c.boundary.is_empty() && c.send.is_empty() && c.recv.is_empty());
    }
}
