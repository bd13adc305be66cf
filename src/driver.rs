//! Collaborator interfaces: the solver kernel and the initial-state source.
//!
//! Both are implemented for closures so drivers and tests can pass lambdas.

use crate::data::halo::Halo;
use crate::data::mesh::{CellValue, Mesh};
use crate::data::tile::Tile;
use crate::topology::tile_id::TileIndex;

/// Fills a freshly created local tile's mesh.
pub trait Initializer<T: CellValue> {
    fn initialize(&mut self, index: TileIndex, mesh: &mut Mesh<T>);
}

impl<T, F> Initializer<T> for F
where
    T: CellValue,
    F: FnMut(TileIndex, &mut Mesh<T>),
{
    fn initialize(&mut self, index: TileIndex, mesh: &mut Mesh<T>) {
        self(index, mesh)
    }
}

/// Per-tile stencil kernel.
///
/// Reads the current state of `tile` and its neighbors through `halo` and
/// writes the next state into `next`. Must not assume anything about the
/// previous contents of `next`.
pub trait Solver<T: CellValue> {
    fn update(&mut self, tile: &Tile<T>, halo: &Halo<'_, T>, next: &mut Mesh<T>);
}

impl<T, F> Solver<T> for F
where
    T: CellValue,
    F: FnMut(&Tile<T>, &Halo<'_, T>, &mut Mesh<T>),
{
    fn update(&mut self, tile: &Tile<T>, halo: &Halo<'_, T>, next: &mut Mesh<T>) {
        self(tile, halo, next)
    }
}
