//! Ownership strategies: how the coordinator assigns tiles to ranks.
//!
//! [`build_ownership`] is pure and deterministic; only the coordinator runs
//! it, and the result is then broadcast with
//! [`distribute_ownership`](crate::algs::distribute::distribute_ownership).
//! Randomized layouts draw from a `SmallRng` seeded from the strategy so
//! every run with the same seed produces the same table.

pub mod metrics;

pub use metrics::{PartitionMetrics, partition_metrics};

use crate::grid_error::GridError;
use crate::topology::lattice::GridExtent;
use crate::topology::ownership::OwnershipMap;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Rank that builds the ownership map and broadcasts it.
pub const COORDINATOR: usize = 0;

/// Selectable tile-to-rank assignment.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OwnershipStrategy {
    /// Uniform random owner per tile, reproducible from `seed`.
    Random { seed: u64 },
    /// Equal-width column bands: column `i` belongs to rank `i * R / nx`.
    XStripes,
    /// Equal-height row bands: row `j` belongs to rank `j * R / ny`.
    YStripes,
    /// Caller-provided row-major table.
    Explicit { owners: Vec<usize> },
}

impl Default for OwnershipStrategy {
    fn default() -> Self {
        OwnershipStrategy::XStripes
    }
}

impl OwnershipStrategy {
    /// Check that this strategy can partition `extent` over `rank_count` ranks.
    ///
    /// Run on every rank before any communication so that a bad configuration
    /// fails everywhere at once instead of leaving ranks waiting on the
    /// coordinator.
    pub fn check(&self, extent: GridExtent, rank_count: usize) -> Result<(), GridError> {
        if extent.is_empty() {
            return Err(GridError::Configuration(format!(
                "grid extent {}x{} has no tiles",
                extent.nx, extent.ny
            )));
        }
        if rank_count == 0 {
            return Err(GridError::Configuration("rank count must be positive".into()));
        }
        match self {
            OwnershipStrategy::Random { .. } => Ok(()),
            OwnershipStrategy::XStripes if rank_count > extent.nx => {
                Err(GridError::Configuration(format!(
                    "{rank_count} ranks cannot stripe {} columns: some rank would own no column",
                    extent.nx
                )))
            }
            OwnershipStrategy::YStripes if rank_count > extent.ny => {
                Err(GridError::Configuration(format!(
                    "{rank_count} ranks cannot stripe {} rows: some rank would own no row",
                    extent.ny
                )))
            }
            OwnershipStrategy::XStripes | OwnershipStrategy::YStripes => Ok(()),
            OwnershipStrategy::Explicit { owners } => {
                OwnershipMap::from_owners(extent, rank_count, owners).map(|_| ())
            }
        }
    }
}

/// Band index of `coord` when `len` cells are split into `parts` equal bands.
fn stripe(coord: usize, len: usize, parts: usize) -> usize {
    coord * parts / len
}

/// Compute the full ownership table. Coordinator only; never communicates.
pub fn build_ownership(
    extent: GridExtent,
    rank_count: usize,
    strategy: &OwnershipStrategy,
) -> Result<OwnershipMap, GridError> {
    strategy.check(extent, rank_count)?;
    let map = match strategy {
        OwnershipStrategy::Random { seed } => {
            let mut rng = SmallRng::seed_from_u64(*seed);
            let map = OwnershipMap::from_fn(extent, rank_count, |_| rng.gen_range(0..rank_count))?;
            for (rank, count) in map.counts_per_rank().into_iter().enumerate() {
                if count == 0 {
                    log::warn!("random ownership (seed {seed}) left rank {rank} without tiles");
                }
            }
            map
        }
        OwnershipStrategy::XStripes => OwnershipMap::from_fn(extent, rank_count, |t| {
            stripe(t.i, extent.nx, rank_count)
        })?,
        OwnershipStrategy::YStripes => OwnershipMap::from_fn(extent, rank_count, |t| {
            stripe(t.j, extent.ny, rank_count)
        })?,
        OwnershipStrategy::Explicit { owners } => {
            OwnershipMap::from_owners(extent, rank_count, owners)?
        }
    };
    crate::grid_invariants!(map, "build_ownership");
    Ok(map)
}
