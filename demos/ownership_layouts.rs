// Print the ownership map produced by each strategy for a 12x8 grid on four
// ranks, with the partition metrics logged at grid startup.

use tile_halo::partitioning::{OwnershipStrategy, build_ownership, partition_metrics};
use tile_halo::topology::{BoundaryPolicy, GridExtent, OwnershipMap, Topology};

fn show(map: &OwnershipMap) -> String {
    let ext = map.extent();
    let mut out = String::new();
    for j in 0..ext.ny {
        for i in 0..ext.nx {
            let owner = map.owner(i as i64, j as i64).unwrap_or(usize::MAX);
            out.push(char::from_digit(owner as u32, 36).unwrap_or('?'));
        }
        out.push('\n');
    }
    out
}

fn main() {
    let ext = GridExtent::new(12, 8);
    let ranks = 4;
    let topo = Topology::new(ext, BoundaryPolicy::Periodic);
    let strategies = [
        OwnershipStrategy::XStripes,
        OwnershipStrategy::YStripes,
        OwnershipStrategy::Random { seed: 2024 },
        OwnershipStrategy::Explicit {
            owners: ext.indices().map(|t| (t.i / 6) + 2 * (t.j / 4)).collect(),
        },
    ];
    for strategy in &strategies {
        let map = match build_ownership(ext, ranks, strategy) {
            Ok(m) => m,
            Err(e) => {
                eprintln!("{strategy:?}: {e}");
                continue;
            }
        };
        let m = partition_metrics(&map, &topo);
        println!("{strategy:?}");
        println!(
            "tiles per rank {:?}, cut pairs {}, imbalance {:.2}",
            m.tiles_per_rank, m.cut_pairs, m.imbalance
        );
        println!("{}", show(&map));
    }
}
