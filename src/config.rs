//! Run configuration for a [`Grid`](crate::grid::Grid).
//!
//! Every field has a default, so partial JSON (or any serde format) works:
//!
//! ```
//! let cfg: tile_halo::config::GridConfig =
//!     serde_json::from_str(r#"{ "nx": 8, "ny": 4, "strategy": { "kind": "y_stripes" } }"#).unwrap();
//! assert_eq!(cfg.mesh_width, 16);
//! cfg.validate(2).unwrap();
//! ```

use crate::algs::communicator::GridCommTags;
use crate::algs::exchange::ExchangeOptions;
use crate::data::tile::GridLimits;
use crate::grid_error::GridError;
use crate::partitioning::OwnershipStrategy;
use crate::topology::lattice::{BoundaryPolicy, GridExtent, Topology};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub nx: usize,
    pub ny: usize,
    pub mesh_width: usize,
    pub mesh_height: usize,
    pub boundary_x: BoundaryPolicy,
    pub boundary_y: BoundaryPolicy,
    pub strategy: OwnershipStrategy,
    pub limits: GridLimits,
    pub exchange: ExchangeConfig,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            nx: 4,
            ny: 4,
            mesh_width: 16,
            mesh_height: 16,
            boundary_x: BoundaryPolicy::Periodic,
            boundary_y: BoundaryPolicy::Periodic,
            strategy: OwnershipStrategy::XStripes,
            limits: GridLimits::default(),
            exchange: ExchangeConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// First of the grid's message tags; tile payloads start at `tag_base + 16`.
    pub tag_base: u32,
    /// Bound on each halo receive in milliseconds; `None` blocks.
    pub recv_timeout_ms: Option<u64>,
    /// Cross-check send/receive plans between ranks after classification.
    pub verify_plan: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            tag_base: 1000,
            recv_timeout_ms: None,
            verify_plan: true,
        }
    }
}

impl ExchangeConfig {
    pub fn tags(&self) -> GridCommTags {
        GridCommTags::from_base(self.tag_base)
    }

    pub fn options(&self) -> ExchangeOptions {
        ExchangeOptions {
            recv_timeout: self.recv_timeout_ms.map(Duration::from_millis),
        }
    }
}

impl GridConfig {
    pub fn extent(&self) -> GridExtent {
        GridExtent::new(self.nx, self.ny)
    }

    pub fn topology(&self) -> Topology {
        Topology::with_axes(self.extent(), self.boundary_x, self.boundary_y)
    }

    pub fn mesh_shape(&self) -> (usize, usize) {
        (self.mesh_width, self.mesh_height)
    }

    /// Reject configurations that cannot run on `rank_count` ranks.
    ///
    /// Purely local; every rank runs it before communicating.
    pub fn validate(&self, rank_count: usize) -> Result<(), GridError> {
        if self.mesh_width == 0 || self.mesh_height == 0 {
            return Err(GridError::Configuration(format!(
                "mesh {}x{} has no cells",
                self.mesh_width, self.mesh_height
            )));
        }
        let l = &self.limits;
        if !(l.xmax > l.xmin && l.ymax > l.ymin) {
            return Err(GridError::Configuration(format!(
                "limits [{}, {}] x [{}, {}] are empty",
                l.xmin, l.xmax, l.ymin, l.ymax
            )));
        }
        if self.exchange.tag_base.checked_add(16).is_none() {
            return Err(GridError::Configuration(format!(
                "tag base {} leaves no room for tile tags",
                self.exchange.tag_base
            )));
        }
        self.strategy.check(self.extent(), rank_count)
    }
}
