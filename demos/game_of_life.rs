// Conway's game of life on a periodic 24x16 field split into 6x4 tiles of 4x4
// cells. Ranks run as threads of this process (default 3, or the first
// argument); with `--features mpi-support` and `--mpi`, one rank per MPI
// process instead. Rank 0 prints the stitched field every few generations.
//
//     cargo run --example game_of_life -- 4
//     mpirun -n 4 cargo run --example game_of_life --features mpi-support -- --mpi

use tile_halo::prelude::*;

const TILES_X: usize = 6;
const TILES_Y: usize = 4;
const CELLS: usize = 4;
const WIDTH: usize = TILES_X * CELLS;
const HEIGHT: usize = TILES_Y * CELLS;
const GENERATIONS: usize = 12;

fn config() -> GridConfig {
    GridConfig {
        nx: TILES_X,
        ny: TILES_Y,
        mesh_width: CELLS,
        mesh_height: CELLS,
        strategy: OwnershipStrategy::XStripes,
        ..GridConfig::default()
    }
}

/// A glider and a blinker.
fn seed(index: TileIndex, mesh: &mut Mesh<u8>) {
    const LIVE: [(usize, usize); 8] = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2), (12, 8), (13, 8), (14, 8)];
    for y in 0..CELLS {
        for x in 0..CELLS {
            let g = (index.i * CELLS + x, index.j * CELLS + y);
            mesh[(x, y)] = u8::from(LIVE.contains(&g));
        }
    }
}

fn life(_tile: &Tile<u8>, halo: &Halo<'_, u8>, next: &mut Mesh<u8>) {
    for y in 0..CELLS as i64 {
        for x in 0..CELLS as i64 {
            let mut alive = 0;
            for (dx, dy) in tile_halo::topology::MOORE_OFFSETS {
                alive += halo.cell(x + dx, y + dy).unwrap_or(0);
            }
            let me = halo.cell(x, y).unwrap_or(0);
            next[(x as usize, y as usize)] = u8::from(alive == 3 || (me == 1 && alive == 2));
        }
    }
}

fn render(snapshots: &[TileSnapshot<u8>]) -> String {
    let mut field = vec![b'.'; WIDTH * HEIGHT];
    for snap in snapshots {
        for y in 0..CELLS {
            for x in 0..CELLS {
                if snap.mesh[(x, y)] == 1 {
                    field[snap.index.i * CELLS + x + (snap.index.j * CELLS + y) * WIDTH] = b'#';
                }
            }
        }
    }
    field
        .chunks(WIDTH)
        .map(|row| String::from_utf8_lossy(row).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run every generation; returns this rank's snapshots after each printed one.
fn run<C: Communicator>(comm: C) -> Result<Vec<Vec<TileSnapshot<u8>>>, GridError> {
    let mut grid = Grid::<u8, _>::new(config(), comm)?;
    grid.initialize(&mut seed);
    let mut frames = vec![grid.snapshots()];
    for generation in 1..=GENERATIONS {
        let report = grid.step(&mut life)?;
        if generation % 4 == 0 {
            println!(
                "rank {} generation {generation}: sent {} tiles, received {}",
                grid.rank(),
                report.exchange.sent,
                report.exchange.received
            );
            frames.push(grid.snapshots());
        }
    }
    Ok(frames)
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    #[cfg(feature = "mpi-support")]
    {
        if args.iter().any(|a| a == "--mpi") {
            let comm = MpiComm::new().expect("MPI init");
            let rank = comm.rank();
            let frames = run(comm).expect("game of life");
            // each rank prints only its own tiles under MPI
            for frame in frames {
                println!("rank {rank}:\n{}\n", render(&frame));
            }
            return;
        }
    }

    let ranks: usize = args.first().and_then(|a| a.parse().ok()).unwrap_or(3);
    let handles: Vec<_> = ThreadComm::world(ranks)
        .into_iter()
        .map(|comm| std::thread::spawn(move || run(comm)))
        .collect();
    let per_rank: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("rank thread panicked").expect("game of life"))
        .collect();

    for frame in 0..per_rank[0].len() {
        let merged: Vec<_> = per_rank.iter().flat_map(|f| f[frame].iter().cloned()).collect();
        println!("frame {frame}:\n{}\n", render(&merged));
    }
}
