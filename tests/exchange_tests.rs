mod util;
use util::*;

use serial_test::serial;
use std::time::Duration;
use tile_halo::algs::boundary::classify;
use tile_halo::algs::communicator::{Communicator, GridCommTags, ThreadComm};
use tile_halo::algs::exchange::{ExchangeOptions, Exchanger};
use tile_halo::algs::plan_check::verify_exchange_plan;
use tile_halo::data::{GridLimits, TileRegistry};
use tile_halo::grid_error::GridError;
use tile_halo::topology::{BoundaryPolicy, GridExtent, OwnershipMap, TileId, Topology};

const TAGS: GridCommTags = GridCommTags::from_base(100);

fn setup(
    comm: &ThreadComm,
    map: &OwnershipMap,
    policy: BoundaryPolicy,
    shape: (usize, usize),
) -> (tile_halo::algs::BoundaryClassification, TileRegistry<u64>) {
    let me = comm.rank();
    let topo = Topology::new(map.extent(), policy);
    let plan = classify(map.tiles_of(me), map, &topo, me).unwrap();
    let mut reg = TileRegistry::load_local_tiles(map, me, shape, GridLimits::default()).unwrap();
    plan.apply(&mut reg).unwrap();
    (plan, reg)
}

#[test]
#[serial]
fn neighbor_value_arrives_on_the_other_rank() {
    let map = x_stripes(4, 4, 2);
    let got = run_ranks(2, move |comm| {
        let (plan, mut reg) = setup(&comm, &map, BoundaryPolicy::Clamped, (1, 1));
        if comm.rank() == 1 {
            reg.get_local_mut(tid(2, 0, 4)).unwrap().mesh_mut()[(0, 0)] = 7;
        }
        let mut ex = Exchanger::new(TAGS, ExchangeOptions::default());
        let report = ex.exchange(&plan, &mut reg, &comm).unwrap();
        assert_eq!(report.sent, 4);
        assert_eq!(report.received, 4);
        reg.get(tid(2, 0, 4)).unwrap().mesh()[(0, 0)]
    });
    assert_eq!(got[0], 7);
    assert_eq!(got[1], 7);
}

#[test]
#[serial]
fn virtual_slots_are_reused_across_rounds() {
    let map = x_stripes(6, 3, 3);
    let rounds = run_ranks(3, move |comm| {
        let me = comm.rank();
        let (plan, mut reg) = setup(&comm, &map, BoundaryPolicy::Periodic, (2, 2));
        let slots_before = reg.virtual_len();
        let mut ex = Exchanger::new(TAGS, ExchangeOptions::default());
        let mut seen = Vec::new();
        for round in 0..5u64 {
            for id in reg.local_ids() {
                reg.get_local_mut(id).unwrap().mesh_mut().fill(round * 100 + id.get());
            }
            let report = ex.exchange(&plan, &mut reg, &comm).unwrap();
            assert_eq!(report.epoch, round);
            for e in &plan.recv {
                let cells = reg.get_virtual(e.tile).unwrap().mesh().as_slice().to_vec();
                assert!(cells.iter().all(|&c| c == round * 100 + e.tile.get()), "rank {me} round {round}");
            }
            seen.push(reg.virtual_len());
        }
        (slots_before, seen)
    });
    for (before, seen) in rounds {
        assert!(seen.iter().all(|&n| n == before));
    }
}

#[test]
#[serial]
fn four_ranks_random_layout_completes_many_rounds() {
    use tile_halo::partitioning::{OwnershipStrategy, build_ownership};
    let map = build_ownership(GridExtent::new(8, 8), 4, &OwnershipStrategy::Random { seed: 3 }).unwrap();
    let reports = run_ranks(4, move |comm| {
        let (plan, mut reg) = setup(&comm, &map, BoundaryPolicy::Periodic, (3, 3));
        let mut ex = Exchanger::new(TAGS, ExchangeOptions::default());
        (0..20)
            .map(|_| ex.exchange(&plan, &mut reg, &comm).unwrap())
            .last()
            .unwrap()
    });
    let sent: usize = reports.iter().map(|r| r.sent).sum();
    let received: usize = reports.iter().map(|r| r.received).sum();
    assert_eq!(sent, received);
    assert!(reports.iter().all(|r| r.epoch == 19));
}

#[test]
#[serial]
fn missing_peer_surfaces_timeout() {
    let map = x_stripes(2, 1, 2);
    let mut comms = ThreadComm::world(2);
    let comm = comms.swap_remove(0);
    let (plan, mut reg) = setup(&comm, &map, BoundaryPolicy::Clamped, (1, 1));
    let mut ex = Exchanger::new(
        TAGS,
        ExchangeOptions {
            recv_timeout: Some(Duration::from_millis(30)),
        },
    );
    // rank 1 never runs
    let err = ex.exchange(&plan, &mut reg, &comm).unwrap_err();
    assert_eq!(
        err,
        GridError::CommunicationTimeout {
            source_rank: 1,
            tile: TileId::new(1),
            waited: Duration::from_millis(30),
        }
    );
    assert_eq!(ex.epoch(), 0);
}

#[test]
#[serial]
fn diverged_ownership_is_caught_on_both_ranks() {
    let ext = GridExtent::new(3, 1);
    let results = run_ranks(2, move |comm| {
        // each rank believes a different table
        let owners: &[usize] = if comm.rank() == 0 { &[0, 1, 1] } else { &[0, 0, 1] };
        let map = OwnershipMap::from_owners(ext, 2, owners).unwrap();
        let topo = Topology::new(ext, BoundaryPolicy::Clamped);
        let plan = classify(map.tiles_of(comm.rank()), &map, &topo, comm.rank()).unwrap();
        verify_exchange_plan(&plan, &comm, TAGS)
    });
    for (rank, r) in results.into_iter().enumerate() {
        match r {
            Err(GridError::ExchangeMismatch { rank: got, peer, .. }) => {
                assert_eq!(got, rank);
                assert_eq!(peer, 1 - rank);
            }
            other => panic!("rank {rank}: expected mismatch, got {other:?}"),
        }
    }
}

#[test]
#[serial]
fn stale_payload_is_rejected() {
    let map = x_stripes(2, 1, 2);
    let results = run_ranks(2, move |comm| {
        let (plan, mut reg) = setup(&comm, &map, BoundaryPolicy::Clamped, (1, 1));
        let mut ex = Exchanger::new(TAGS, ExchangeOptions::default());
        if comm.rank() == 1 {
            // rank 1 runs one round ahead of rank 0's expectations
            ex.exchange(&plan, &mut reg, &comm).unwrap();
            comm.barrier();
            ex.exchange(&plan, &mut reg, &comm).map(|_| ())
        } else {
            ex.exchange(&plan, &mut reg, &comm).unwrap();
            comm.barrier();
            // pretend this rank missed a round: fresh exchanger restarts at epoch 0
            let mut behind = Exchanger::new(TAGS, ExchangeOptions::default());
            behind.exchange(&plan, &mut reg, &comm).map(|_| ())
        }
    });
    assert!(matches!(results[0], Err(GridError::StalePayload { expected: 0, got: 1, .. })));
    assert!(matches!(results[1], Err(GridError::StalePayload { expected: 1, got: 0, .. })));
}
