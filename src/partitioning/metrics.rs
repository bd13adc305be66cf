//! Ownership quality metrics.
//!
//! Used for startup logging and for comparing strategies in tests: how many
//! tiles each rank holds, how many adjacent tile pairs straddle two ranks
//! (each such pair costs halo traffic every step), and the load imbalance.

use crate::topology::lattice::Topology;
use crate::topology::ownership::OwnershipMap;
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PartitionMetrics {
    /// Tile count per rank, indexed by rank.
    pub tiles_per_rank: Vec<usize>,
    /// Unordered adjacent tile pairs whose owners differ.
    pub cut_pairs: usize,
    /// `max / mean` tiles per rank; 1.0 is perfectly balanced.
    pub imbalance: f64,
}

/// Compute metrics for `map` under the adjacency of `topology` (O(tiles)).
pub fn partition_metrics(map: &OwnershipMap, topology: &Topology) -> PartitionMetrics {
    let extent = map.extent();
    let mut cut: BTreeSet<(u64, u64)> = BTreeSet::new();
    for (index, owner) in map.iter() {
        let Ok(a) = extent.id_of(index) else { continue };
        for n in topology.neighbors(index) {
            let (Ok(b), Ok(other)) = (extent.id_of(n), map.owner_at(n)) else {
                continue;
            };
            if other != owner {
                cut.insert((a.get().min(b.get()), a.get().max(b.get())));
            }
        }
    }

    let tiles_per_rank = map.counts_per_rank();
    let mean = extent.len() as f64 / tiles_per_rank.len() as f64;
    let max = tiles_per_rank.iter().copied().max().unwrap_or(0) as f64;
    PartitionMetrics {
        tiles_per_rank,
        cut_pairs: cut.len(),
        imbalance: if mean > 0.0 { max / mean } else { 0.0 },
    }
}
