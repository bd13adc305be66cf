mod util;
use util::*;

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;
use tile_halo::algs::boundary::{RecvEntry, SendEntry, classify};
use tile_halo::data::{GridLimits, TileRegistry};
use tile_halo::grid_error::GridError;
use tile_halo::partitioning::{OwnershipStrategy, build_ownership};
use tile_halo::topology::{BoundaryPolicy, GridExtent, OwnershipMap, TileIndex, Topology};

fn clamped_4x4() -> (OwnershipMap, Topology) {
    let map = x_stripes(4, 4, 2);
    let topo = Topology::new(GridExtent::new(4, 4), BoundaryPolicy::Clamped);
    (map, topo)
}

#[test]
fn two_stripes_rank0_sends_column1_and_receives_column2() {
    let (map, topo) = clamped_4x4();
    let c = classify(map.tiles_of(0), &map, &topo, 0).unwrap();

    assert!(c.is_boundary(tid(1, 0, 4)));
    assert!(!c.is_boundary(tid(0, 0, 4)));
    assert!(c.interior.contains(&tid(0, 0, 4)));

    let want_send: BTreeSet<_> = (0..4).map(|j| SendEntry { tile: tid(1, j, 4), dest: 1 }).collect();
    let want_recv: BTreeSet<_> = (0..4).map(|j| RecvEntry { tile: tid(2, j, 4), source: 1 }).collect();
    assert_eq!(c.send, want_send);
    assert_eq!(c.recv, want_recv);

    assert_eq!(c.per_tile[&tid(1, 1, 4)].virtual_neighbors, 3);
    assert_eq!(c.per_tile[&tid(1, 0, 4)].virtual_neighbors, 2);
    assert_eq!(c.per_tile[&tid(1, 0, 4)].top_virtual_owner, Some(1));
    assert_eq!(c.per_tile[&tid(0, 2, 4)].virtual_neighbors, 0);
}

#[test]
fn periodic_stripes_make_every_tile_boundary() {
    let map = x_stripes(4, 4, 2);
    let topo = Topology::new(GridExtent::new(4, 4), BoundaryPolicy::Periodic);
    let c = classify(map.tiles_of(0), &map, &topo, 0).unwrap();
    // column 0 wraps onto column 3
    assert_eq!(c.boundary.len(), 8);
    assert!(c.interior.is_empty());
    assert_eq!(c.recv_from(1).len(), 8);
}

#[test]
fn foreign_local_index_is_ownership_conflict() {
    let (map, topo) = clamped_4x4();
    let err = classify([t(0, 0), t(3, 3)], &map, &topo, 0).unwrap_err();
    assert_eq!(
        err,
        GridError::OwnershipConflict { tile: tid(3, 3, 4), owner: 1, rank: 0 }
    );
}

#[test]
fn out_of_grid_index_is_invalid_coordinate() {
    let (map, topo) = clamped_4x4();
    assert!(matches!(
        classify([TileIndex::new(0, 4)], &map, &topo, 0),
        Err(GridError::InvalidCoordinate { i: 0, j: 4, .. })
    ));
}

#[test]
fn apply_marks_tiles_and_allocates_virtual_slots() {
    let (map, topo) = clamped_4x4();
    let c = classify(map.tiles_of(0), &map, &topo, 0).unwrap();
    let mut reg = TileRegistry::<f32>::load_local_tiles(&map, 0, (3, 2), GridLimits::default()).unwrap();
    c.apply(&mut reg).unwrap();
    assert_eq!(
        reg.boundary_ids(),
        (0..4).map(|j| tid(1, j, 4)).collect::<Vec<_>>()
    );
    assert_eq!(reg.virtual_ids(), (0..4).map(|j| tid(2, j, 4)).collect::<Vec<_>>());
    let tile = reg.get(tid(1, 1, 4)).unwrap();
    assert_eq!(tile.communication.number_of_virtual_neighbors, 3);
    assert_eq!(tile.communication.virtual_owners, BTreeSet::from([1]));
    let ghost = reg.get(tid(2, 3, 4)).unwrap();
    assert!(!ghost.is_local());
    assert_eq!(ghost.owner(), 1);
    assert_eq!(ghost.mesh().shape(), (3, 2));
}

#[test]
fn shuffled_visit_order_gives_same_plan() {
    let ext = GridExtent::new(6, 5);
    let map = build_ownership(ext, 3, &OwnershipStrategy::Random { seed: 5 }).unwrap();
    let topo = Topology::new(ext, BoundaryPolicy::Periodic);
    let mut local: Vec<_> = map.tiles_of(2).collect();
    let base = classify(local.clone(), &map, &topo, 2).unwrap();
    let mut rng = SmallRng::seed_from_u64(17);
    local.shuffle(&mut rng);
    let again = classify(local.iter().copied().chain(local.iter().copied()), &map, &topo, 2).unwrap();
    assert_eq!(base, again);
}

proptest! {
    /// For every rank pair, what r expects from s is what s sends to r.
    #[test]
    fn send_and_receive_plans_are_symmetric(
        nx in 1usize..7,
        ny in 1usize..7,
        ranks in 1usize..5,
        seed in any::<u64>(),
        periodic_x in any::<bool>(),
        periodic_y in any::<bool>(),
    ) {
        let ext = GridExtent::new(nx, ny);
        let map = build_ownership(ext, ranks, &OwnershipStrategy::Random { seed }).unwrap();
        let policy = |p: bool| if p { BoundaryPolicy::Periodic } else { BoundaryPolicy::Clamped };
        let topo = Topology::with_axes(ext, policy(periodic_x), policy(periodic_y));
        let plans: Vec<_> = (0..ranks)
            .map(|r| classify(map.tiles_of(r), &map, &topo, r).unwrap())
            .collect();
        for r in 0..ranks {
            for s in 0..ranks {
                if r != s {
                    prop_assert_eq!(plans[r].recv_from(s), plans[s].send_to(r));
                }
            }
            for e in &plans[r].recv {
                prop_assert_eq!(map.owner_of(e.tile).unwrap(), e.source);
                prop_assert!(e.source != r);
            }
        }
    }

    #[test]
    fn classification_is_idempotent(seed in any::<u64>()) {
        let ext = GridExtent::new(5, 4);
        let map = build_ownership(ext, 3, &OwnershipStrategy::Random { seed }).unwrap();
        let topo = Topology::new(ext, BoundaryPolicy::Periodic);
        let a = classify(map.tiles_of(1), &map, &topo, 1).unwrap();
        let b = classify(map.tiles_of(1), &map, &topo, 1).unwrap();
        prop_assert_eq!(a, b);
    }
}

#[test]
fn rank1_sends_its_left_column() {
    let (map, topo) = clamped_4x4();
    let c = classify(map.tiles_of(1), &map, &topo, 1).unwrap();
    let got: Vec<_> = c.send.iter().map(|e| e.tile).collect();
    assert_permutation(&got, &[tid(2, 3, 4), tid(2, 0, 4), tid(2, 2, 4), tid(2, 1, 4)]);
}
