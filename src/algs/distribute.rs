//! Ownership broadcast from the coordinator to every rank.
//!
//! Every rank calls [`distribute_ownership`] collectively. The coordinator
//! passes the table it built; the others pass `None` and receive a copy.
//! The call ends with a barrier, so no rank starts loading tiles before all
//! of them hold the same map.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{decode_ownership, encode_ownership};
use crate::grid_error::GridError;
use crate::partitioning::COORDINATOR;
use crate::topology::lattice::GridExtent;
use crate::topology::ownership::OwnershipMap;

/// Broadcast the coordinator's ownership map; every rank returns an equal copy.
///
/// `map` must be `Some` on the coordinator and is ignored elsewhere.
pub fn distribute_ownership<C>(
    map: Option<&OwnershipMap>,
    extent: GridExtent,
    comm: &C,
    tag: CommTag,
) -> Result<OwnershipMap, GridError>
where
    C: Communicator,
{
    let rank = comm.rank();
    let size = comm.size();

    let result = if rank == COORDINATOR {
        let checked = check_coordinator_map(map, extent, size);
        // an empty message makes the other ranks fail instead of waiting forever
        let bytes = match &checked {
            Ok(map) => encode_ownership(map),
            Err(_) => Vec::new(),
        };
        let pending: Vec<_> = (0..size)
            .filter(|&peer| peer != rank)
            .map(|peer| comm.isend(peer, tag.as_u32(), &bytes))
            .collect();
        for h in pending {
            let _ = h.wait();
        }
        log::debug!(
            "[rank {rank}] broadcast ownership of {} tiles ({} bytes) to {} ranks",
            extent.len(),
            bytes.len(),
            size - 1
        );
        checked.cloned()
    } else {
        match comm.irecv(COORDINATOR, tag.as_u32()).wait() {
            Some(bytes) => decode_ownership(&bytes, extent).and_then(|m| {
                if m.rank_count() == size {
                    Ok(m)
                } else {
                    Err(GridError::Configuration(format!(
                        "received ownership for {} ranks, this run has {size}",
                        m.rank_count()
                    )))
                }
            }),
            None => Err(GridError::CommError {
                neighbor: COORDINATOR,
                detail: "no ownership map received".into(),
            }),
        }
    };

    comm.barrier();
    result
}

fn check_coordinator_map(
    map: Option<&OwnershipMap>,
    extent: GridExtent,
    size: usize,
) -> Result<&OwnershipMap, GridError> {
    let map = map.ok_or_else(|| {
        GridError::Configuration("coordinator has no ownership map to broadcast".into())
    })?;
    if map.extent() != extent || map.rank_count() != size {
        return Err(GridError::Configuration(format!(
            "ownership map for {}x{} over {} ranks does not match a {}x{} run on {size} ranks",
            map.extent().nx,
            map.extent().ny,
            map.rank_count(),
            extent.nx,
            extent.ny
        )));
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, ThreadComm};
    use crate::partitioning::{OwnershipStrategy, build_ownership};
    use std::thread;

    #[test]
    fn single_rank_returns_own_map() {
        let ext = GridExtent::new(3, 3);
        let map = build_ownership(ext, 1, &OwnershipStrategy::XStripes).unwrap();
        let got = distribute_ownership(Some(&map), ext, &NoComm, CommTag(7)).unwrap();
        assert_eq!(got, map);
    }

    #[test]
    fn coordinator_without_map_is_configuration_error() {
        let ext = GridExtent::new(2, 2);
        assert!(matches!(
            distribute_ownership(None, ext, &NoComm, CommTag(7)),
            Err(GridError::Configuration(_))
        ));
    }

    #[test]
    fn three_ranks_receive_identical_maps() {
        let ext = GridExtent::new(5, 4);
        let handles: Vec<_> = ThreadComm::world(3)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let map = (comm.rank() == COORDINATOR).then(|| {
                        build_ownership(ext, 3, &OwnershipStrategy::Random { seed: 11 }).unwrap()
                    });
                    distribute_ownership(map.as_ref(), ext, &comm, CommTag(3)).unwrap()
                })
            })
            .collect();
        let maps: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(maps[0], maps[1]);
        assert_eq!(maps[0], maps[2]);
    }

    #[test]
    fn coordinator_failure_reaches_every_rank() {
        let ext = GridExtent::new(4, 1);
        let handles: Vec<_> = ThreadComm::world(2)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    // map built for the wrong rank count
                    let map = (comm.rank() == COORDINATOR)
                        .then(|| build_ownership(ext, 3, &OwnershipStrategy::XStripes).unwrap());
                    distribute_ownership(map.as_ref(), ext, &comm, CommTag(5))
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(matches!(results[0], Err(GridError::Configuration(_))));
        assert!(matches!(results[1], Err(GridError::Wire(_))));
    }
}
