//! `Grid`: the per-rank context tying ownership, tiles and exchange together.
//!
//! A `Grid` is built collectively: every rank calls [`Grid::new`] with the
//! same configuration and its own communicator. After that each step is
//!
//! 1. boundary analysis (computed once, the decomposition is static),
//! 2. halo exchange,
//! 3. the solver writes the next buffer of every local tile,
//! 4. buffers cycle.
//!
//! [`Grid::step`] runs all four in order so a solver never sees a halo from
//! a previous round. Calling the phases by hand is allowed, but
//! [`Grid::solve`] refuses to run until an exchange has completed for the
//! current step.

use crate::algs::boundary::{BoundaryClassification, classify};
use crate::algs::communicator::Communicator;
use crate::algs::distribute::distribute_ownership;
use crate::algs::exchange::{ExchangeReport, Exchanger};
use crate::algs::plan_check::verify_exchange_plan;
use crate::config::GridConfig;
use crate::data::halo::Halo;
use crate::data::mesh::CellValue;
use crate::data::registry::TileRegistry;
use crate::data::tile::TileSnapshot;
use crate::driver::{Initializer, Solver};
use crate::grid_error::GridError;
use crate::partitioning::{COORDINATOR, build_ownership, partition_metrics};
use crate::topology::lattice::Topology;
use crate::topology::ownership::OwnershipMap;
use once_cell::unsync::OnceCell;

/// Outcome of one [`Grid::step`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct StepReport {
    pub step: u64,
    pub exchange: ExchangeReport,
}

pub struct Grid<T, C> {
    config: GridConfig,
    topology: Topology,
    comm: C,
    ownership: OwnershipMap,
    registry: TileRegistry<T>,
    plan: OnceCell<BoundaryClassification>,
    exchanger: Exchanger,
    step: u64,
    // set by a successful exchange, cleared by cycle or a failed exchange
    halo_fresh: bool,
}

impl<T: CellValue, C: Communicator> Grid<T, C> {
    /// Build the ownership map on the coordinator, broadcast it and load this
    /// rank's tiles. Collective over `comm`.
    pub fn new(config: GridConfig, comm: C) -> Result<Self, GridError> {
        let rank = comm.rank();
        let size = comm.size();
        config.validate(size)?;
        let extent = config.extent();
        let topology = config.topology();
        let tags = config.exchange.tags();

        let (built, build_err) = if rank == COORDINATOR {
            match build_ownership(extent, size, &config.strategy) {
                Ok(map) => (Some(map), None),
                Err(e) => (None, Some(e)),
            }
        } else {
            (None, None)
        };
        let distributed = distribute_ownership(built.as_ref(), extent, &comm, tags.ownership);
        if let Some(e) = build_err {
            return Err(e);
        }
        let ownership = distributed?;

        if rank == COORDINATOR {
            let m = partition_metrics(&ownership, &topology);
            log::info!(
                "grid {}x{} over {size} ranks: tiles per rank {:?}, {} cut pairs, imbalance {:.3}",
                extent.nx,
                extent.ny,
                m.tiles_per_rank,
                m.cut_pairs,
                m.imbalance
            );
        }

        let registry =
            TileRegistry::load_local_tiles(&ownership, rank, config.mesh_shape(), config.limits)?;
        log::info!(
            "[rank {rank}] holds {} tiles of {}x{} cells",
            registry.local_len(),
            config.mesh_width,
            config.mesh_height
        );
        crate::grid_invariants!(registry, "Grid::new");

        let exchanger = Exchanger::new(tags, config.exchange.options());
        Ok(Self {
            config,
            topology,
            comm,
            ownership,
            registry,
            plan: OnceCell::new(),
            exchanger,
            step: 0,
            halo_fresh: false,
        })
    }

    /// Fill every local tile; the next buffer starts as a copy of the result.
    pub fn initialize<I: Initializer<T>>(&mut self, init: &mut I) {
        for id in self.registry.local_ids() {
            if let Some(tile) = self.registry.get_local_mut(id) {
                init.initialize(tile.index, tile.buffers.current_mut());
                tile.buffers.sync_next();
            }
        }
    }

    /// Classify local tiles and prepare virtual slots. Computed on the first
    /// call and cached; collective when plan verification is enabled.
    pub fn analyze_boundaries(&mut self) -> Result<&BoundaryClassification, GridError> {
        let Self {
            config,
            topology,
            comm,
            ownership,
            registry,
            plan,
            ..
        } = self;
        ensure_plan(plan, config, topology, comm, ownership, registry)
    }

    /// One halo exchange round. Collective.
    pub fn exchange(&mut self) -> Result<ExchangeReport, GridError> {
        let Self {
            config,
            topology,
            comm,
            ownership,
            registry,
            plan,
            exchanger,
            halo_fresh,
            ..
        } = self;
        *halo_fresh = false;
        let plan = ensure_plan(plan, config, topology, comm, ownership, registry)?;
        let report = exchanger.exchange(plan, registry, comm)?;
        *halo_fresh = true;
        Ok(report)
    }

    /// Run `solver` on every local tile, writing into the next buffers.
    ///
    /// Fails with `HaloNotExchanged` unless [`exchange`](Self::exchange)
    /// succeeded since the last [`cycle`](Self::cycle).
    pub fn solve<S: Solver<T>>(&mut self, solver: &mut S) -> Result<(), GridError> {
        if !self.halo_fresh {
            return Err(GridError::HaloNotExchanged { step: self.step });
        }
        for id in self.registry.local_ids() {
            let mut next = match self.registry.get_local_mut(id) {
                Some(tile) => tile.buffers.take_next(),
                None => return Err(GridError::NotFound(id)),
            };
            let result = self.registry.get(id).and_then(|tile| {
                let halo = Halo::gather(&self.registry, &self.topology, tile.index)?;
                solver.update(tile, &halo, &mut next);
                Ok(())
            });
            if let Some(tile) = self.registry.get_local_mut(id) {
                tile.buffers.restore_next(next);
            }
            result?;
        }
        Ok(())
    }

    /// Make every local tile's next buffer current.
    pub fn cycle(&mut self) {
        self.registry.cycle_local();
        self.step += 1;
        self.halo_fresh = false;
    }

    /// Analyze (cached), exchange, solve, cycle.
    pub fn step<S: Solver<T>>(&mut self, solver: &mut S) -> Result<StepReport, GridError> {
        let exchange = self.exchange()?;
        self.solve(solver)?;
        self.cycle();
        Ok(StepReport {
            step: self.step,
            exchange,
        })
    }

    /// Copies of every local tile, ascending by id.
    pub fn snapshots(&self) -> Vec<TileSnapshot<T>> {
        self.registry
            .local_ids()
            .into_iter()
            .filter_map(|id| self.registry.get_local(id).map(|t| t.snapshot()))
            .collect()
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn ownership(&self) -> &OwnershipMap {
        &self.ownership
    }

    pub fn registry(&self) -> &TileRegistry<T> {
        &self.registry
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    /// Completed steps.
    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// Whether virtual tiles hold this step's exchange.
    pub fn halo_is_fresh(&self) -> bool {
        self.halo_fresh
    }

    /// The cached classification, if analysis has run.
    pub fn plan(&self) -> Option<&BoundaryClassification> {
        self.plan.get()
    }
}

fn ensure_plan<'a, T, C>(
    cell: &'a OnceCell<BoundaryClassification>,
    config: &GridConfig,
    topology: &Topology,
    comm: &C,
    ownership: &OwnershipMap,
    registry: &mut TileRegistry<T>,
) -> Result<&'a BoundaryClassification, GridError>
where
    T: CellValue,
    C: Communicator,
{
    cell.get_or_try_init(|| {
        let rank = comm.rank();
        let local: Vec<_> = registry
            .local_ids()
            .into_iter()
            .filter_map(|id| registry.get_local(id).map(|t| t.index))
            .collect();
        let plan = classify(local, ownership, topology, rank)?;
        if config.exchange.verify_plan {
            verify_exchange_plan(&plan, comm, config.exchange.tags())?;
        }
        plan.apply(registry)?;
        crate::grid_invariants!(*registry, "analyze_boundaries");
        log::info!(
            "[rank {rank}] {} boundary tiles, {} virtual tiles, peers {:?}",
            plan.boundary.len(),
            registry.virtual_len(),
            plan.peers()
        );
        Ok(plan)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::data::mesh::Mesh;
    use crate::data::tile::Tile;
    use crate::partitioning::OwnershipStrategy;
    use crate::topology::tile_id::TileIndex;

    fn small() -> GridConfig {
        GridConfig {
            nx: 3,
            ny: 2,
            mesh_width: 2,
            mesh_height: 2,
            strategy: OwnershipStrategy::XStripes,
            ..GridConfig::default()
        }
    }

    #[test]
    fn single_rank_owns_everything() {
        let grid = Grid::<u8, _>::new(small(), NoComm).unwrap();
        assert_eq!(grid.registry().local_len(), 6);
        assert_eq!(grid.snapshots().len(), 6);
        assert!(grid.plan().is_none());
    }

    #[test]
    fn invalid_config_fails_before_communication() {
        let cfg = GridConfig {
            mesh_height: 0,
            ..small()
        };
        assert!(matches!(
            Grid::<u8, _>::new(cfg, NoComm),
            Err(GridError::Configuration(_))
        ));
    }

    #[test]
    fn step_cycles_buffers_and_counts() {
        let mut grid = Grid::<u32, _>::new(small(), NoComm).unwrap();
        grid.initialize(&mut |_: TileIndex, m: &mut Mesh<u32>| m.fill(1));
        let mut add_neighbors = |_tile: &Tile<u32>, halo: &Halo<'_, u32>, next: &mut Mesh<u32>| {
            for y in 0..2 {
                for x in 0..2 {
                    next[(x as usize, y as usize)] =
                        halo.cell(x - 1, y).unwrap_or(0) + halo.cell(x, y).unwrap_or(0);
                }
            }
        };
        let report = grid.step(&mut add_neighbors).unwrap();
        assert_eq!(report.step, 1);
        assert_eq!(report.exchange.sent, 0);
        assert!(grid.snapshots().iter().all(|s| s.mesh.as_slice() == [2, 2, 2, 2]));
        assert!(grid.plan().unwrap().boundary.is_empty());
    }

    #[test]
    fn solve_needs_exchange_since_last_cycle() {
        let mut grid = Grid::<u32, _>::new(small(), NoComm).unwrap();
        let mut noop = |_: &Tile<u32>, _: &Halo<'_, u32>, _: &mut Mesh<u32>| {};
        assert_eq!(grid.solve(&mut noop), Err(GridError::HaloNotExchanged { step: 0 }));
        grid.exchange().unwrap();
        assert!(grid.halo_is_fresh());
        grid.solve(&mut noop).unwrap();
        grid.cycle();
        assert_eq!(grid.solve(&mut noop), Err(GridError::HaloNotExchanged { step: 1 }));
    }
}
