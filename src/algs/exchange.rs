//! Halo exchange: ship boundary tiles to the ranks that mirror them.
//!
//! One round has two phases. The send phase posts a non-blocking send for
//! every [`SendEntry`](crate::algs::boundary::SendEntry) before anything
//! waits, so no rank can block on a peer that is itself blocked. The receive
//! phase then waits for every
//! [`RecvEntry`](crate::algs::boundary::RecvEntry) and copies the payload into
//! the cached virtual tile. Each payload carries the round's epoch; a payload
//! from another round is rejected.

use crate::algs::boundary::BoundaryClassification;
use crate::algs::communicator::{Communicator, GridCommTags, Wait};
use crate::algs::wire::{decode_tile, encode_tile};
use crate::data::mesh::CellValue;
use crate::data::registry::TileRegistry;
use crate::grid_error::GridError;
use std::time::Duration;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExchangeOptions {
    /// Bound on each receive; `None` blocks until the peer sends.
    pub recv_timeout: Option<Duration>,
}

/// Counters for one completed round.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ExchangeReport {
    pub epoch: u64,
    pub sent: usize,
    pub received: usize,
    pub bytes_sent: usize,
    pub bytes_received: usize,
}

/// Stateful exchanger; owns the round counter.
#[derive(Clone, Debug)]
pub struct Exchanger {
    tags: GridCommTags,
    options: ExchangeOptions,
    epoch: u64,
}

impl Exchanger {
    pub fn new(tags: GridCommTags, options: ExchangeOptions) -> Self {
        Self {
            tags,
            options,
            epoch: 0,
        }
    }

    /// Epoch the next round will use.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn tags(&self) -> GridCommTags {
        self.tags
    }

    /// Check every tile tag of `plan` fits under `max_tag`.
    fn check_tags(&self, plan: &BoundaryClassification, max_tag: u32) -> Result<(), GridError> {
        let highest = plan
            .send
            .iter()
            .map(|e| e.tile)
            .chain(plan.recv.iter().map(|e| e.tile))
            .max();
        let Some(highest) = highest else {
            return Ok(());
        };
        match self.tags.tiles.offset(highest.get()) {
            Some(tag) if tag.as_u32() <= max_tag => Ok(()),
            _ => Err(GridError::Configuration(format!(
                "tile tag base {} plus tile id {highest} exceeds the transport's tag limit {max_tag}",
                self.tags.tiles.as_u32()
            ))),
        }
    }

    /// Run one exchange round of `plan` over `comm`.
    ///
    /// Every rank of the run must call this with the same epoch. Virtual
    /// slots for all receives must exist (see
    /// [`BoundaryClassification::apply`]).
    pub fn exchange<T, C>(
        &mut self,
        plan: &BoundaryClassification,
        registry: &mut TileRegistry<T>,
        comm: &C,
    ) -> Result<ExchangeReport, GridError>
    where
        T: CellValue,
        C: Communicator,
    {
        self.check_tags(plan, comm.max_tag())?;
        let me = comm.rank();
        let epoch = self.epoch;
        let tiles = self.tags.tiles;
        let mut report = ExchangeReport {
            epoch,
            ..ExchangeReport::default()
        };

        // send phase
        let mut pending = Vec::with_capacity(plan.send.len());
        let mut send_err: Option<GridError> = None;
        for entry in &plan.send {
            let Some(tile) = registry.get_local(entry.tile) else {
                send_err.get_or_insert(GridError::NotFound(entry.tile));
                continue;
            };
            let bytes = encode_tile(entry.tile, epoch, tile.mesh());
            let tag = tiles.as_u32() + entry.tile.get() as u32;
            log::trace!(
                "[rank {me}] send tile {} -> rank {} ({} bytes, epoch {epoch})",
                entry.tile,
                entry.dest,
                bytes.len()
            );
            report.bytes_sent += bytes.len();
            report.sent += 1;
            pending.push(comm.isend(entry.dest, tag, &bytes));
        }

        // receive phase
        let recv_result = match send_err {
            Some(e) => Err(e),
            None => self.receive_all(plan, registry, comm, &mut report),
        };

        for h in pending {
            let _ = h.wait();
        }

        recv_result?;
        self.epoch += 1;
        log::debug!(
            "[rank {me}] exchange epoch {epoch}: sent {} ({} B), received {} ({} B)",
            report.sent,
            report.bytes_sent,
            report.received,
            report.bytes_received
        );
        Ok(report)
    }

    fn receive_all<T, C>(
        &self,
        plan: &BoundaryClassification,
        registry: &mut TileRegistry<T>,
        comm: &C,
        report: &mut ExchangeReport,
    ) -> Result<(), GridError>
    where
        T: CellValue,
        C: Communicator,
    {
        let me = comm.rank();
        let epoch = self.epoch;
        let shape = registry.mesh_shape();
        for entry in &plan.recv {
            let tag = self.tags.tiles.as_u32() + entry.tile.get() as u32;
            let handle = comm.irecv(entry.source, tag);
            let data = match self.options.recv_timeout {
                Some(timeout) => handle.wait_timeout(timeout).ok_or(GridError::CommunicationTimeout {
                    source_rank: entry.source,
                    tile: entry.tile,
                    waited: timeout,
                })?,
                None => handle.wait().ok_or_else(|| GridError::CommError {
                    neighbor: entry.source,
                    detail: format!("no payload for tile {}", entry.tile),
                })?,
            };

            let payload = decode_tile::<T>(&data)?;
            if payload.tile != entry.tile {
                return Err(GridError::CommError {
                    neighbor: entry.source,
                    detail: format!("expected tile {}, got tile {}", entry.tile, payload.tile),
                });
            }
            if payload.epoch != epoch {
                return Err(GridError::StalePayload {
                    tile: entry.tile,
                    expected: epoch,
                    got: payload.epoch,
                });
            }
            if (payload.width, payload.height) != shape {
                return Err(GridError::MeshShape {
                    expected: shape,
                    got: (payload.width, payload.height),
                });
            }
            let tile = registry.ensure_virtual(entry.tile, entry.source)?;
            payload.copy_into(tile.mesh_mut())?;
            log::trace!(
                "[rank {me}] recv tile {} <- rank {} (epoch {epoch})",
                entry.tile,
                entry.source
            );
            report.received += 1;
            report.bytes_received += data.len();
        }
        Ok(())
    }
}
