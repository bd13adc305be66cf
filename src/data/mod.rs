//! Data module: cell meshes, tiles, the per-rank registry and halo views.

pub mod halo;
pub mod mesh;
pub mod registry;
pub mod tile;

pub use halo::Halo;
pub use mesh::{CellValue, Mesh, TileBuffers};
pub use registry::TileRegistry;
pub use tile::{CommInfo, GridLimits, Tile, TileSnapshot};
