mod util;
use util::*;

use proptest::prelude::*;
use tile_halo::algs::communicator::{CommTag, Communicator};
use tile_halo::algs::distribute::distribute_ownership;
use tile_halo::grid_error::GridError;
use tile_halo::partitioning::{COORDINATOR, OwnershipStrategy, build_ownership};
use tile_halo::topology::GridExtent;

#[test]
fn x_stripes_four_by_four_on_two_ranks() {
    let map = build_ownership(GridExtent::new(4, 4), 2, &OwnershipStrategy::XStripes).unwrap();
    assert_eq!(map.owner(0, 0).unwrap(), 0);
    assert_eq!(map.owner(1, 3).unwrap(), 0);
    assert_eq!(map.owner(2, 0).unwrap(), 1);
    assert_eq!(map.owner(3, 3).unwrap(), 1);
    assert_eq!(map.counts_per_rank(), vec![8, 8]);
}

#[test]
fn lookup_outside_grid_fails() {
    let map = x_stripes(4, 4, 2);
    assert!(matches!(
        map.owner(4, 0),
        Err(GridError::InvalidCoordinate { i: 4, j: 0, nx: 4, ny: 4 })
    ));
    assert!(matches!(map.owner(0, -1), Err(GridError::InvalidCoordinate { .. })));
}

#[test]
fn explicit_strategy_matches_table() {
    let owners = vec![2, 1, 0, 0, 1, 2];
    let map = build_ownership(
        GridExtent::new(3, 2),
        3,
        &OwnershipStrategy::Explicit { owners: owners.clone() },
    )
    .unwrap();
    let got: Vec<usize> = map.iter().map(|(_, o)| o).collect();
    assert_eq!(got, owners);
}

#[test]
fn broadcast_is_identical_on_every_rank() {
    let ext = GridExtent::new(7, 5);
    let maps = run_ranks(4, move |comm| {
        let built = (comm.rank() == COORDINATOR)
            .then(|| build_ownership(ext, 4, &OwnershipStrategy::Random { seed: 42 }).unwrap());
        distribute_ownership(built.as_ref(), ext, &comm, CommTag(500)).unwrap()
    });
    for m in &maps[1..] {
        assert_eq!(m, &maps[0]);
        assert_eq!(m.as_raw(), maps[0].as_raw());
    }
}

#[test]
fn coordinator_failure_reaches_every_rank() {
    let ext = GridExtent::new(2, 2);
    let results = run_ranks(3, move |comm| {
        // coordinator holds a map for the wrong rank count
        let bad = (comm.rank() == COORDINATOR)
            .then(|| build_ownership(ext, 2, &OwnershipStrategy::XStripes).unwrap());
        distribute_ownership(bad.as_ref(), ext, &comm, CommTag(600))
    });
    assert!(results.iter().all(|r| r.is_err()));
}

proptest! {
    #[test]
    fn stripes_cover_every_tile_and_rank(
        nx in 1usize..24,
        ny in 1usize..24,
        ranks in 1usize..8,
    ) {
        prop_assume!(ranks <= nx);
        let map = build_ownership(GridExtent::new(nx, ny), ranks, &OwnershipStrategy::XStripes).unwrap();
        let counts = map.counts_per_rank();
        prop_assert_eq!(counts.iter().sum::<usize>(), nx * ny);
        prop_assert!(counts.iter().all(|&c| c > 0));
        // columns never split across ranks and owners grow left to right
        for j in 0..ny {
            for i in 1..nx {
                let a = map.owner(i as i64 - 1, j as i64).unwrap();
                let b = map.owner(i as i64, j as i64).unwrap();
                prop_assert!(a <= b);
                prop_assert_eq!(map.owner(i as i64, 0).unwrap(), b);
            }
        }
    }

    #[test]
    fn random_owners_stay_in_range(seed in any::<u64>(), ranks in 1usize..6) {
        let map = build_ownership(GridExtent::new(9, 4), ranks, &OwnershipStrategy::Random { seed }).unwrap();
        prop_assert!(map.iter().all(|(_, o)| o < ranks));
    }
}
