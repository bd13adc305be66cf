//! Fixed, versioned, little-endian wire types for grid messages.
//!
//! Three message families cross ranks:
//! - the ownership table, broadcast once by the coordinator
//! - exchange-plan id lists, used to cross-check send/receive plans
//! - tile payloads, one per `(tile, destination)` per exchange round
//!
//! Headers are `Pod` structs with explicit little-endian fields. Cell data is
//! copied as raw bytes in host order; all ranks of one run share a layout.
//! Incoming buffers carry no alignment guarantee, so records are read with
//! `pod_read_unaligned` and cells are copied into typed storage byte-wise.

use crate::data::mesh::{CellValue, Mesh};
use crate::grid_error::GridError;
use crate::topology::lattice::GridExtent;
use crate::topology::ownership::OwnershipMap;
use crate::topology::tile_id::TileId;
use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

pub const KIND_OWNERSHIP: u16 = 1;
pub const KIND_TILE: u16 = 2;

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), GridError> {
    if actual == expected {
        Ok(())
    } else {
        Err(GridError::Wire(format!("expected {expected} bytes, got {actual}")))
    }
}

fn read<T: Pod>(bytes: &[u8], at: usize) -> Result<T, GridError> {
    let end = at + size_of::<T>();
    let Some(raw) = bytes.get(at..end) else {
        return Err(GridError::Wire(format!(
            "truncated message: need {end} bytes, have {}",
            bytes.len()
        )));
    };
    Ok(bytemuck::pod_read_unaligned(raw))
}

fn check_version(version_le: u16, kind_le: u16, kind: u16) -> Result<(), GridError> {
    let version = u16::from_le(version_le);
    if version != WIRE_VERSION {
        return Err(GridError::Wire(format!(
            "wire version {version}, expected {WIRE_VERSION}"
        )));
    }
    let got = u16::from_le(kind_le);
    if got != kind {
        return Err(GridError::Wire(format!("message kind {got}, expected {kind}")));
    }
    Ok(())
}

// ===== Common records ======================================================

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireTileIdRepr {
    pub id_le: u64,
}

impl WireTileIdRepr {
    pub fn of(id: TileId) -> Self {
        Self {
            id_le: id.get().to_le(),
        }
    }
    pub fn get(&self) -> TileId {
        TileId::new(u64::from_le(self.id_le))
    }
}

/// Sorted id list: `WireCount` followed by that many ids.
pub fn encode_ids(ids: &[TileId]) -> Vec<u8> {
    let mut out = Vec::with_capacity(size_of::<WireCount>() + ids.len() * 8);
    out.extend_from_slice(bytemuck::bytes_of(&WireCount::new(ids.len())));
    for &id in ids {
        out.extend_from_slice(bytemuck::bytes_of(&WireTileIdRepr::of(id)));
    }
    out
}

pub fn decode_ids(bytes: &[u8]) -> Result<Vec<TileId>, GridError> {
    let n = read::<WireCount>(bytes, 0)?.get();
    let head = size_of::<WireCount>();
    let rec = size_of::<WireTileIdRepr>();
    expect_exact_len(bytes.len(), head + n * rec)?;
    (0..n)
        .map(|k| read::<WireTileIdRepr>(bytes, head + k * rec).map(|r| r.get()))
        .collect()
}

// ===== Ownership broadcast =================================================

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireOwnershipHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub ranks_le: u32,
    pub nx_le: u32,
    pub ny_le: u32,
}

/// Header plus one little-endian `u32` owner per tile, row-major.
pub fn encode_ownership(map: &OwnershipMap) -> Vec<u8> {
    let extent = map.extent();
    let hdr = WireOwnershipHdr {
        version_le: WIRE_VERSION.to_le(),
        kind_le: KIND_OWNERSHIP.to_le(),
        ranks_le: (map.rank_count() as u32).to_le(),
        nx_le: (extent.nx as u32).to_le(),
        ny_le: (extent.ny as u32).to_le(),
    };
    let mut out = Vec::with_capacity(size_of::<WireOwnershipHdr>() + 4 * extent.len());
    out.extend_from_slice(bytemuck::bytes_of(&hdr));
    for &owner in map.as_raw() {
        out.extend_from_slice(&owner.to_le_bytes());
    }
    out
}

/// Decode an ownership table and check it describes `expected`.
pub fn decode_ownership(bytes: &[u8], expected: GridExtent) -> Result<OwnershipMap, GridError> {
    let hdr = read::<WireOwnershipHdr>(bytes, 0)?;
    check_version(hdr.version_le, hdr.kind_le, KIND_OWNERSHIP)?;
    let extent = GridExtent::new(
        u32::from_le(hdr.nx_le) as usize,
        u32::from_le(hdr.ny_le) as usize,
    );
    if extent != expected {
        return Err(GridError::Configuration(format!(
            "broadcast ownership covers {}x{}, local configuration says {}x{}",
            extent.nx, extent.ny, expected.nx, expected.ny
        )));
    }
    let head = size_of::<WireOwnershipHdr>();
    expect_exact_len(bytes.len(), head + 4 * extent.len())?;
    let owners: Vec<usize> = bytes[head..]
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as usize)
        .collect();
    OwnershipMap::from_owners(extent, u32::from_le(hdr.ranks_le) as usize, &owners)
}

// ===== Tile payloads =======================================================

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireTileHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub cell_size_le: u32,
    pub epoch_le: u64,
    pub tile_le: u64,
    pub width_le: u32,
    pub height_le: u32,
}

impl WireTileHdr {
    pub const SIZE: usize = 32;
}

/// A decoded tile message; `cells` borrows the receive buffer.
#[derive(Debug)]
pub struct TilePayload<'a> {
    pub tile: TileId,
    pub epoch: u64,
    pub width: usize,
    pub height: usize,
    pub cells: &'a [u8],
}

impl TilePayload<'_> {
    /// Copy the cells into `mesh`, which must match the payload's shape.
    pub fn copy_into<T: CellValue>(&self, mesh: &mut Mesh<T>) -> Result<(), GridError> {
        if mesh.shape() != (self.width, self.height) {
            return Err(GridError::MeshShape {
                expected: mesh.shape(),
                got: (self.width, self.height),
            });
        }
        let dest: &mut [u8] = bytemuck::cast_slice_mut(mesh.as_mut_slice());
        expect_exact_len(self.cells.len(), dest.len())?;
        dest.copy_from_slice(self.cells);
        Ok(())
    }
}

pub fn encode_tile<T: CellValue>(tile: TileId, epoch: u64, mesh: &Mesh<T>) -> Vec<u8> {
    let hdr = WireTileHdr {
        version_le: WIRE_VERSION.to_le(),
        kind_le: KIND_TILE.to_le(),
        cell_size_le: (size_of::<T>() as u32).to_le(),
        epoch_le: epoch.to_le(),
        tile_le: tile.get().to_le(),
        width_le: (mesh.width() as u32).to_le(),
        height_le: (mesh.height() as u32).to_le(),
    };
    let cells: &[u8] = bytemuck::cast_slice(mesh.as_slice());
    let mut out = Vec::with_capacity(WireTileHdr::SIZE + cells.len());
    out.extend_from_slice(bytemuck::bytes_of(&hdr));
    out.extend_from_slice(cells);
    out
}

/// Decode a tile message whose cells are `size_of::<T>()` bytes each.
pub fn decode_tile<T: CellValue>(bytes: &[u8]) -> Result<TilePayload<'_>, GridError> {
    let hdr = read::<WireTileHdr>(bytes, 0)?;
    check_version(hdr.version_le, hdr.kind_le, KIND_TILE)?;
    let cell_size = u32::from_le(hdr.cell_size_le) as usize;
    if cell_size != size_of::<T>() {
        return Err(GridError::Wire(format!(
            "cell size {cell_size}, expected {}",
            size_of::<T>()
        )));
    }
    let width = u32::from_le(hdr.width_le) as usize;
    let height = u32::from_le(hdr.height_le) as usize;
    expect_exact_len(bytes.len(), WireTileHdr::SIZE + width * height * cell_size)?;
    Ok(TilePayload {
        tile: TileId::new(u64::from_le(hdr.tile_le)),
        epoch: u64::from_le(hdr.epoch_le),
        width,
        height,
        cells: &bytes[WireTileHdr::SIZE..],
    })
}

// ===== Compile-time sanity checks =========================================

static_assertions::assert_eq_size!(WireCount, u32);
static_assertions::assert_eq_size!(WireTileIdRepr, u64);
static_assertions::assert_eq_size!(WireOwnershipHdr, [u8; 16]);
static_assertions::const_assert_eq!(size_of::<WireTileHdr>(), WireTileHdr::SIZE);
