//! Grid topology: tile identity, lattice neighborhoods and ownership.
//!
//! - [`tile_id`]: `TileId` / `TileIndex` handles
//! - [`lattice`]: extents, boundary policies and Moore neighborhoods
//! - [`ownership`]: the dense rank-per-tile table shared by every rank

pub mod lattice;
pub mod ownership;
pub mod tile_id;

pub use lattice::{BoundaryPolicy, GridExtent, MOORE_OFFSETS, Topology};
pub use ownership::OwnershipMap;
pub use tile_id::{TileId, TileIndex};
