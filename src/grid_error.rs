//! GridError: unified error type for tile-halo public APIs.
//!
//! Every fallible operation in the crate returns this type. Structural
//! violations (inconsistent ownership, mismatched send/receive plans, stale
//! payloads) are reported with the offending tile and rank pair so a run can
//! abort with a useful diagnostic instead of silently corrupting state.

use crate::topology::tile_id::TileId;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for tile-halo operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    /// The ownership strategy or grid parameters cannot be used for this run.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A coordinate outside `[0, nx) x [0, ny)` reached classification or lookup.
    #[error("coordinate ({i}, {j}) lies outside the {nx}x{ny} grid")]
    InvalidCoordinate { i: i64, j: i64, nx: usize, ny: usize },
    /// A tile id outside the grid's id range.
    #[error("tile id {id} is outside the grid ({len} tiles)")]
    InvalidTileId { id: TileId, len: usize },
    /// The id is valid but neither local nor a cached virtual tile.
    #[error("tile {0} is neither local nor a cached virtual tile")]
    NotFound(TileId),
    /// An ownership table entry names a rank that does not exist.
    #[error("owner {owner} at grid index {index} is not a valid rank (rank count {rank_count})")]
    InvalidOwner {
        index: usize,
        owner: usize,
        rank_count: usize,
    },
    /// A tile was treated as belonging to a rank that does not own it.
    #[error("tile {tile} is owned by rank {owner}, not rank {rank}")]
    OwnershipConflict {
        tile: TileId,
        owner: usize,
        rank: usize,
    },
    /// A local tile was registered twice.
    #[error("tile {0} is already registered")]
    DuplicateTile(TileId),
    /// Mesh dimensions disagree with the grid's fixed tile mesh shape.
    #[error("mesh shape mismatch: expected {expected:?}, got {got:?}")]
    MeshShape {
        expected: (usize, usize),
        got: (usize, usize),
    },
    /// Two ranks disagree about which tiles flow between them.
    #[error("exchange plan mismatch between rank {rank} and rank {peer}: {detail}")]
    ExchangeMismatch {
        rank: usize,
        peer: usize,
        detail: String,
    },
    /// A message could not be decoded.
    #[error("wire format error: {0}")]
    Wire(String),
    /// A tile payload belongs to a different exchange round.
    #[error("stale payload for tile {tile}: expected epoch {expected}, got {got}")]
    StalePayload { tile: TileId, expected: u64, got: u64 },
    /// A receive did not complete within the configured bound.
    #[error("timed out after {waited:?} waiting for tile {tile} from rank {source_rank}")]
    CommunicationTimeout {
        source_rank: usize,
        tile: TileId,
        waited: Duration,
    },
    /// A solve was attempted before this step's halo exchange completed.
    #[error("step {step} has no completed halo exchange; virtual tiles may be stale")]
    HaloNotExchanged { step: u64 },
    /// The transport reported a failure while talking to `neighbor`.
    #[error("communication error with rank {neighbor}: {detail}")]
    CommError { neighbor: usize, detail: String },
}

impl GridError {
    /// Whether the caller may reasonably continue after this error.
    ///
    /// Only registry misses are recoverable; everything else indicates a
    /// broken run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GridError::NotFound(_))
    }
}
