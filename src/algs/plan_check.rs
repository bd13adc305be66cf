//! Cross-rank check that send and receive plans agree.
//!
//! Two stages over every pair of ranks: first the number of tiles each rank
//! intends to send to each peer, then the sorted ids themselves. Each rank
//! compares what arrives with its own receive list for that peer. Every send
//! handle is drained before returning, even on mismatch, so a failed check
//! leaves no message in flight.

use crate::algs::boundary::BoundaryClassification;
use crate::algs::communicator::{Communicator, GridCommTags, Wait};
use crate::algs::wire::{WireCount, decode_ids, encode_ids};
use crate::grid_error::GridError;
use crate::topology::tile_id::TileId;
use std::mem::size_of;

/// Verify that for every peer `p`, what `p` sends here equals what this rank
/// expects from `p`. Collective: every rank must call it.
pub fn verify_exchange_plan<C>(
    plan: &BoundaryClassification,
    comm: &C,
    tags: GridCommTags,
) -> Result<(), GridError>
where
    C: Communicator,
{
    let me = comm.rank();
    let peers: Vec<usize> = (0..comm.size()).filter(|&p| p != me).collect();
    if peers.is_empty() {
        return Ok(());
    }

    // stage 1: counts
    let outgoing: Vec<(usize, Vec<TileId>)> =
        peers.iter().map(|&p| (p, plan.send_to(p))).collect();
    let mut pending = Vec::with_capacity(2 * peers.len());
    for (p, ids) in &outgoing {
        let count = WireCount::new(ids.len());
        pending.push(comm.isend(*p, tags.plan_sizes.as_u32(), bytemuck::bytes_of(&count)));
    }
    let mut first_err: Option<GridError> = None;
    for &p in &peers {
        let expected = plan.recv_from(p).len();
        match comm.irecv(p, tags.plan_sizes.as_u32()).wait() {
            Some(data) if data.len() == size_of::<WireCount>() => {
                let got = bytemuck::pod_read_unaligned::<WireCount>(&data).get();
                if got != expected && first_err.is_none() {
                    first_err = Some(GridError::ExchangeMismatch {
                        rank: me,
                        peer: p,
                        detail: format!("peer sends {got} tiles, {expected} expected"),
                    });
                }
            }
            Some(data) if first_err.is_none() => {
                first_err = Some(GridError::CommError {
                    neighbor: p,
                    detail: format!(
                        "expected {} bytes for plan size, got {}",
                        size_of::<WireCount>(),
                        data.len()
                    ),
                });
            }
            None if first_err.is_none() => {
                first_err = Some(GridError::CommError {
                    neighbor: p,
                    detail: "failed to receive plan size".into(),
                });
            }
            _ => {}
        }
    }

    // stage 2: ids
    for (p, ids) in &outgoing {
        pending.push(comm.isend(*p, tags.plan_ids.as_u32(), &encode_ids(ids)));
    }
    for &p in &peers {
        let expected = plan.recv_from(p);
        let got = comm
            .irecv(p, tags.plan_ids.as_u32())
            .wait()
            .ok_or_else(|| GridError::CommError {
                neighbor: p,
                detail: "failed to receive plan ids".into(),
            })
            .and_then(|bytes| decode_ids(&bytes));
        if first_err.is_some() {
            continue;
        }
        match got {
            Ok(ids) if ids == expected => {}
            Ok(ids) => {
                let tile = ids
                    .iter()
                    .find(|id| !expected.contains(id))
                    .or_else(|| expected.iter().find(|id| !ids.contains(id)));
                first_err = Some(GridError::ExchangeMismatch {
                    rank: me,
                    peer: p,
                    detail: match tile {
                        Some(t) if ids.contains(t) => format!("peer sends tile {t}, not expected here"),
                        Some(t) => format!("tile {t} expected but peer does not send it"),
                        None => "tile lists differ".into(),
                    },
                });
            }
            Err(e) => first_err = Some(e),
        }
    }

    for h in pending {
        let _ = h.wait();
    }

    match first_err {
        Some(e) => {
            log::error!("[rank {me}] exchange plan check failed: {e}");
            Err(e)
        }
        None => {
            log::debug!("[rank {me}] exchange plan agrees with {} peers", peers.len());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::boundary::classify;
    use crate::algs::communicator::{NoComm, ThreadComm};
    use crate::topology::lattice::{BoundaryPolicy, GridExtent, Topology};
    use crate::topology::ownership::OwnershipMap;
    use std::thread;

    #[test]
    fn single_rank_is_trivially_consistent() {
        let plan = BoundaryClassification::default();
        verify_exchange_plan(&plan, &NoComm, GridCommTags::from_base(10)).unwrap();
    }

    #[test]
    fn matching_plans_pass_on_three_ranks() {
        let ext = GridExtent::new(6, 2);
        let map = OwnershipMap::from_fn(ext, 3, |t| t.i / 2).unwrap();
        let topo = Topology::new(ext, BoundaryPolicy::Periodic);
        let handles: Vec<_> = ThreadComm::world(3)
            .into_iter()
            .map(|comm| {
                let map = map.clone();
                thread::spawn(move || {
                    let me = comm.rank();
                    let plan = classify(map.tiles_of(me), &map, &topo, me).unwrap();
                    verify_exchange_plan(&plan, &comm, GridCommTags::from_base(10))
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }
    }
}
