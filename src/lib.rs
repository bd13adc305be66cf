#![cfg_attr(docsrs, feature(doc_cfg))]
//! # tile-halo
//!
//! tile-halo decomposes a 2-D lattice of fixed-size tiles across cooperating
//! ranks and keeps the ghost copies of neighboring tiles up to date, so a
//! stencil solver can run on each rank as if the whole grid were local.
//!
//! ## Features
//! - Ownership maps built once on a coordinator and broadcast to every rank
//!   (random, column/row stripes or explicit tables)
//! - A per-rank tile registry with double-buffered local tiles and lazily
//!   allocated virtual (ghost) tiles
//! - Boundary classification producing deduplicated send/receive plans, with
//!   an optional cross-rank consistency check
//! - Halo exchange over pluggable transports: serial, threads in one process,
//!   or MPI (`mpi-support` feature)
//!
//! ## Determinism
//!
//! Random ownership draws from a `SmallRng` seeded from configuration, and
//! every plan is an ordered set, so runs are reproducible rank for rank.
//!
//! ## Usage
//!
//! ```
//! use tile_halo::prelude::*;
//!
//! let config = GridConfig { nx: 4, ny: 4, mesh_width: 2, mesh_height: 2, ..GridConfig::default() };
//! let mut grid = Grid::<f64, _>::new(config, NoComm).unwrap();
//! grid.initialize(&mut |_: TileIndex, m: &mut Mesh<f64>| m.fill(1.0));
//! let mut copy = |_: &Tile<f64>, halo: &Halo<'_, f64>, next: &mut Mesh<f64>| {
//!     next[(0, 0)] = halo.cell(-1, 0).unwrap_or(0.0);
//! };
//! let report = grid.step(&mut copy).unwrap();
//! assert_eq!(report.step, 1);
//! ```

pub mod algs;
pub mod config;
pub mod data;
pub mod debug_invariants;
pub mod driver;
pub mod grid;
pub mod grid_error;
pub mod partitioning;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::boundary::{BoundaryClassification, RecvEntry, SendEntry, classify};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm, Wait};
    pub use crate::algs::distribute::distribute_ownership;
    pub use crate::algs::exchange::{ExchangeReport, Exchanger};
    pub use crate::config::{ExchangeConfig, GridConfig};
    pub use crate::data::{GridLimits, Halo, Mesh, Tile, TileRegistry, TileSnapshot};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::driver::{Initializer, Solver};
    pub use crate::grid::{Grid, StepReport};
    pub use crate::grid_error::GridError;
    pub use crate::partitioning::{OwnershipStrategy, build_ownership};
    pub use crate::topology::{BoundaryPolicy, GridExtent, OwnershipMap, TileId, TileIndex, Topology};
}
