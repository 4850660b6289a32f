//! Byte transport between the ranks of the coupling runtime.
//!
//! The connectivity protocol is blocking end to end: every send hands a
//! complete message to the transport and every receive waits for the
//! matching message. The seam is therefore a pair of blocking calls — no
//! request handles cross it, and transports that are asynchronous
//! underneath complete the operation before returning.
//!
//! Message order is FIFO per `(source, destination, tag)` triple; distinct
//! logical streams must use distinct tags (see
//! [`ChannelTags`](crate::comm::channel::ChannelTags)). Transports deliver
//! messages whole; length validation lives in the typed channel layer,
//! which always announces payload sizes ahead of the payload.

use once_cell::sync::Lazy;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};

use crate::couple_error::CoupleError;

/// Message tag. Each protocol stream of a channel runs under its own tag.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CommTag(u16);

impl CommTag {
    #[inline]
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    /// Derive a stream tag from a base, wrapping on overflow.
    #[inline]
    pub const fn offset(self, dx: u16) -> Self {
        Self(self.0.wrapping_add(dx))
    }
}

/// Blocking byte transport between the ranks of one communicator.
pub trait Communicator: Send + Sync + 'static {
    /// Deliver `bytes` to `peer` under `tag`; returns once the transport has
    /// accepted the message.
    fn send(&self, peer: usize, tag: CommTag, bytes: &[u8]) -> Result<(), CoupleError>;

    /// Wait for the next message from `peer` under `tag` and return its
    /// bytes. `expected` is the byte length the protocol step calls for;
    /// transports that must size a receive buffer up front use it.
    fn recv(&self, peer: usize, tag: CommTag, expected: usize) -> Result<Vec<u8>, CoupleError>;

    /// Rank of this process (0..size-1).
    fn rank(&self) -> usize;
    /// Total number of ranks.
    fn size(&self) -> usize;
}

/// Transport of a single-rank participant: sends vanish and receives fail,
/// because there is no peer to talk to.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn send(&self, _peer: usize, _tag: CommTag, _bytes: &[u8]) -> Result<(), CoupleError> {
        Ok(())
    }

    fn recv(&self, peer: usize, _tag: CommTag, _expected: usize) -> Result<Vec<u8>, CoupleError> {
        Err(CoupleError::Comm {
            peer,
            context: "single-rank participant has no transport".into(),
        })
    }

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }
}

// --- ThreadComm: in-process, thread-per-rank ---

/// One directed message queue; receivers park on the condvar until a
/// message lands.
type Route = Arc<(Mutex<VecDeque<Vec<u8>>>, Condvar)>;

/// Process-global routing table. Keyed `(source, destination, tag)`, so
/// several participants (and the link between their masters) can coexist in
/// one process as long as every channel uses its own tag range.
static ROUTES: Lazy<Mutex<HashMap<(usize, usize, u16), Route>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn route(source: usize, dest: usize, tag: CommTag) -> Route {
    ROUTES
        .lock()
        .expect("routing table poisoned")
        .entry((source, dest, tag.0))
        .or_default()
        .clone()
}

/// In-process transport, one rank per thread, for protocol tests and
/// single-process runs.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
}

impl ThreadComm {
    pub fn new(rank: usize, size: usize) -> Self {
        assert!(rank < size, "rank out of range");
        Self { rank, size }
    }
}

impl Communicator for ThreadComm {
    fn send(&self, peer: usize, tag: CommTag, bytes: &[u8]) -> Result<(), CoupleError> {
        let route = route(self.rank, peer, tag);
        route
            .0
            .lock()
            .expect("message queue poisoned")
            .push_back(bytes.to_vec());
        route.1.notify_all();
        Ok(())
    }

    fn recv(&self, peer: usize, tag: CommTag, _expected: usize) -> Result<Vec<u8>, CoupleError> {
        let route = route(peer, self.rank, tag);
        let (queue, arrived) = &*route;
        let mut q = queue.lock().expect("message queue poisoned");
        while q.is_empty() {
            q = arrived.wait(q).expect("message queue poisoned");
        }
        Ok(q.pop_front().expect("queue non-empty"))
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::datatype::Equivalence;
    use mpi::environment::Universe;
    use mpi::point_to_point::{Destination, Source};
    use mpi::topology::{Communicator as _, SimpleCommunicator};

    /// MPI transport over `MPI_COMM_WORLD`, one rank per process.
    ///
    /// The protocol is blocking, so the plain tagged send/receive calls
    /// suffice; no request objects are held across the seam.
    pub struct MpiComm {
        _universe: Universe,
        world: SimpleCommunicator,
    }

    // One rank per process; all protocol traffic is issued from a single
    // thread, so the world handle is never used concurrently.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl MpiComm {
        pub fn init() -> Self {
            let universe = mpi::initialize().expect("MPI initialization failed");
            let world = universe.world();
            Self {
                _universe: universe,
                world,
            }
        }
    }

    impl Default for MpiComm {
        fn default() -> Self {
            Self::init()
        }
    }

    impl Communicator for MpiComm {
        fn send(&self, peer: usize, tag: CommTag, bytes: &[u8]) -> Result<(), CoupleError> {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(bytes, tag.0 as i32);
            Ok(())
        }

        fn recv(&self, peer: usize, tag: CommTag, expected: usize) -> Result<Vec<u8>, CoupleError> {
            let mut bytes = vec![0u8; expected];
            let status = self
                .world
                .process_at_rank(peer as i32)
                .receive_into_with_tag(&mut bytes[..], tag.0 as i32);
            let got = status.count(u8::equivalent_datatype()) as usize;
            if got != expected {
                return Err(CoupleError::BufferSizeMismatch {
                    peer,
                    expected,
                    got,
                });
            }
            Ok(bytes)
        }

        fn rank(&self) -> usize {
            self.world.rank() as usize
        }

        fn size(&self) -> usize {
            self.world.size() as usize
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
