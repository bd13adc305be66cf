#![allow(dead_code)]
use std::thread;
use tile_halo::{
    algs::communicator::ThreadComm,
    topology::{GridExtent, OwnershipMap, TileId, TileIndex},
};

pub fn t(i: usize, j: usize) -> TileIndex {
    TileIndex::new(i, j)
}

/// Row-major id of `(i, j)` in a grid `nx` tiles wide.
pub fn tid(i: usize, j: usize, nx: usize) -> TileId {
    TileId::new((i + j * nx) as u64)
}

/// Column stripes of `nx x ny` over `ranks` ranks.
pub fn x_stripes(nx: usize, ny: usize, ranks: usize) -> OwnershipMap {
    OwnershipMap::from_fn(GridExtent::new(nx, ny), ranks, |x| x.i * ranks / nx).unwrap()
}

/// Run `f` once per rank on its own thread and collect results by rank.
pub fn run_ranks<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send + 'static,
    F: Fn(ThreadComm) -> R + Send + Sync + Clone + 'static,
{
    let handles: Vec<_> = ThreadComm::world(n)
        .into_iter()
        .map(|comm| {
            let f = f.clone();
            thread::spawn(move || f(comm))
        })
        .collect();
    handles
        .into_iter()
        .map(|h| h.join().expect("rank thread panicked"))
        .collect()
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}
