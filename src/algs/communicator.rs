//! Thin façade over in-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are contiguous byte slices addressed by `(peer, tag)`. Sends are
//! fire-and-forget from the caller's point of view; receives return a handle
//! that yields the bytes when waited on. Messages between the same
//! `(source, destination, tag)` triple are delivered in send order.
//!
//! Three backends:
//! - [`NoComm`]: single rank, every call is a no-op
//! - [`ThreadComm`]: several ranks as threads of one process, sharing a mailbox
//! - `MpiComm` (feature `mpi-support`): one rank per MPI process

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

/// Message tag newtype.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommTag(pub u32);

impl CommTag {
    pub const fn new(raw: u32) -> Self {
        CommTag(raw)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Tag `self + delta`, or `None` on overflow.
    pub fn offset(self, delta: u64) -> Option<CommTag> {
        u32::try_from(self.0 as u64 + delta).ok().map(CommTag)
    }
}

/// Tags used by one grid's communication phases.
///
/// Tile payloads use `tiles + tile_id`, so the `tiles` base must leave room
/// for every tile id below the transport's [`Communicator::max_tag`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GridCommTags {
    pub ownership: CommTag,
    pub plan_sizes: CommTag,
    pub plan_ids: CommTag,
    pub tiles: CommTag,
}

impl GridCommTags {
    pub const fn from_base(base: u32) -> Self {
        Self {
            ownership: CommTag(base),
            plan_sizes: CommTag(base + 1),
            plan_ids: CommTag(base + 2),
            tiles: CommTag(base + 16),
        }
    }
}

/// Non-blocking point-to-point interface plus a barrier.
///
/// A rank's communicator is used from one thread at a time; backends that
/// simulate several ranks hand one instance to each thread.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u32, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u32) -> Self::RecvHandle;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Block until every rank has reached the barrier.
    fn barrier(&self);

    /// True for the single-rank no-op backend.
    fn is_no_comm(&self) -> bool {
        false
    }

    /// Largest tag value the transport accepts.
    fn max_tag(&self) -> u32 {
        u32::MAX
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;

    /// Like [`wait`](Wait::wait) but give up after `timeout`, returning `None`.
    ///
    /// Backends that cannot bound a wait fall back to blocking.
    fn wait_timeout(self, timeout: Duration) -> Option<Vec<u8>>
    where
        Self: Sized,
    {
        let _ = timeout;
        self.wait()
    }
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Single-rank communicator; sends vanish and receives yield nothing.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u32, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u32) {}

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn is_no_comm(&self) -> bool {
        true
    }
}

// --- ThreadComm: ranks as threads of one process ---

type Key = (usize, usize, u32); // (src, dst, tag)

/// Shared state of one simulated world.
#[derive(Debug)]
struct Mailbox {
    queues: DashMap<Key, VecDeque<Bytes>>,
    lock: Mutex<()>,
    arrived: Condvar,
    barrier: Barrier,
}

impl Mailbox {
    fn post(&self, key: Key, data: Bytes) {
        let _guard = self.lock.lock();
        self.queues.entry(key).or_default().push_back(data);
        self.arrived.notify_all();
    }

    fn try_take(&self, key: &Key) -> Option<Bytes> {
        self.queues.get_mut(key)?.pop_front()
    }

    fn take(&self, key: Key, deadline: Option<Instant>) -> Option<Bytes> {
        if let Some(data) = self.try_take(&key) {
            return Some(data);
        }
        let mut guard = self.lock.lock();
        loop {
            if let Some(data) = self.try_take(&key) {
                return Some(data);
            }
            match deadline {
                None => self.arrived.wait(&mut guard),
                Some(d) => {
                    if self.arrived.wait_until(&mut guard, d).timed_out() {
                        return self.try_take(&key);
                    }
                }
            }
        }
    }
}

/// Communicator for ranks running as threads of the same process.
///
/// Build a world with [`ThreadComm::world`] and move one instance into each
/// rank's thread. Every rank must take part in [`barrier`](Communicator::barrier).
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    hub: Arc<Mailbox>,
}

impl ThreadComm {
    /// Communicators for ranks `0..size` sharing one mailbox.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let hub = Arc::new(Mailbox {
            queues: DashMap::new(),
            lock: Mutex::new(()),
            arrived: Condvar::new(),
            barrier: Barrier::new(size.max(1)),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                hub: Arc::clone(&hub),
            })
            .collect()
    }
}

/// Pending receive on a [`ThreadComm`]; matching happens at wait time.
pub struct ThreadRecv {
    hub: Arc<Mailbox>,
    key: Key,
}

impl Wait for ThreadRecv {
    fn wait(self) -> Option<Vec<u8>> {
        self.hub.take(self.key, None).map(|b| b.to_vec())
    }

    fn wait_timeout(self, timeout: Duration) -> Option<Vec<u8>> {
        self.hub
            .take(self.key, Some(Instant::now() + timeout))
            .map(|b| b.to_vec())
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = ThreadRecv;

    fn isend(&self, peer: usize, tag: u32, buf: &[u8]) {
        self.hub
            .post((self.rank, peer, tag), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u32) -> ThreadRecv {
        ThreadRecv {
            hub: Arc::clone(&self.hub),
            key: (peer, self.rank, tag),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.hub.barrier.wait();
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use crate::grid_error::GridError;
    use mpi::environment::Universe;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;
    use std::time::{Duration, Instant};

    /// One rank per MPI process, on the world communicator.
    pub struct MpiComm {
        // field order matters: the world handle must go before the universe finalizes MPI
        world: SimpleCommunicator,
        _universe: Universe,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        /// Initialize MPI. Fails if MPI was already initialized in this process.
        pub fn new() -> Result<Self, GridError> {
            let universe = mpi::initialize().ok_or_else(|| GridError::CommError {
                neighbor: 0,
                detail: "MPI is already initialized".into(),
            })?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                world,
                _universe: universe,
                rank,
                size,
            })
        }
    }

    /// In-flight send. Owns its buffer until the request completes.
    pub struct MpiSend {
        req: Request<'static, [u8], StaticScope>,
        buf: *mut [u8],
    }

    impl Wait for MpiSend {
        fn wait(self) -> Option<Vec<u8>> {
            self.req.wait();
            // SAFETY: `buf` came from `Box::leak` in `isend` and the request
            // that borrowed it has completed.
            unsafe { drop(Box::from_raw(self.buf)) };
            None
        }
    }

    /// Pending receive; the matching MPI receive is posted at wait time.
    pub struct MpiRecv {
        peer: i32,
        tag: i32,
    }

    impl Wait for MpiRecv {
        fn wait(self) -> Option<Vec<u8>> {
            let world = SimpleCommunicator::world();
            let (data, _status) = world
                .process_at_rank(self.peer)
                .receive_vec_with_tag::<u8>(self.tag);
            Some(data)
        }

        fn wait_timeout(self, timeout: Duration) -> Option<Vec<u8>> {
            let world = SimpleCommunicator::world();
            let process = world.process_at_rank(self.peer);
            let deadline = Instant::now() + timeout;
            while process.immediate_probe_with_tag(self.tag).is_none() {
                if Instant::now() >= deadline {
                    return None;
                }
                std::thread::yield_now();
            }
            let (data, _status) = process.receive_vec_with_tag::<u8>(self.tag);
            Some(data)
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSend;
        type RecvHandle = MpiRecv;

        fn isend(&self, peer: usize, tag: u32, buf: &[u8]) -> MpiSend {
            let leaked: &'static mut [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let ptr: *mut [u8] = leaked;
            // SAFETY: the allocation stays alive until `MpiSend::wait` frees it.
            let data: &'static [u8] = unsafe { &*ptr };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, data, tag as i32);
            MpiSend { req, buf: ptr }
        }

        fn irecv(&self, peer: usize, tag: u32) -> MpiRecv {
            MpiRecv {
                peer: peer as i32,
                tag: tag as i32,
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn barrier(&self) {
            self.world.barrier();
        }

        fn max_tag(&self) -> u32 {
            // lower bound every MPI implementation guarantees for MPI_TAG_UB
            32_767
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
