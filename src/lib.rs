//! # mesh-couple
//!
//! mesh-couple is the connectivity-discovery core of a parallel multi-physics
//! coupling runtime. Two independently partitioned solvers (participants)
//! exchange field data on overlapping mesh regions; before any field exchange
//! can happen, every rank of the receiving participant must learn which ranks
//! of the sending participant own geometrically overlapping mesh data.
//!
//! The crate provides:
//! - Axis-aligned bounding boxes with the sentinel-tolerant overlap predicate
//!   used for partition intersection tests
//! - A pluggable byte-transport seam ([`comm::communicator::Communicator`])
//!   with in-process and MPI backends, plus blocking typed channels and
//!   little-endian wire codecs for box maps and feedback maps
//! - [`partition::ReceivedBoxPartition`], the two-level (master↔slaves within
//!   a participant, master↔master between participants) protocol that turns
//!   per-rank bounding boxes into a per-rank routing table
//!
//! ## Usage
//! Add `mesh-couple` as a dependency and enable features as needed:
//!
//! ```toml
//! [dependencies]
//! mesh-couple = "0.1"
//! # Optional: MPI transport backend
//! # features = ["mpi-support"]
//! ```
//!
//! Every rank constructs one [`partition::ReceivedBoxPartition`] per coupled
//! mesh, attaches its mappings, then runs the two phases in order:
//! `communicate_bounding_box()` (master-only inter-participant receive)
//! followed by `compute_bounding_box()` (collective within the participant).
//! Afterwards each rank's `connected_ranks()` is its routing table and the
//! remote master has received the full feedback map.

pub mod comm;
pub mod couple_error;
pub mod geometry;
pub mod mesh;
pub mod partition;

/// A convenient prelude importing the most-used traits and types.
pub mod prelude {
    pub use crate::comm::channel::{BoxMap, ChannelTags, FeedbackMap, IntraChannel, PeerChannel};
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::communicator::MpiComm;
    pub use crate::comm::communicator::{CommTag, Communicator, NoComm, ThreadComm};
    pub use crate::couple_error::CoupleError;
    pub use crate::geometry::bbox::{BoundingBox, Extent};
    pub use crate::mesh::{Mapping, Mesh};
    pub use crate::partition::{PartitionConfig, ReceivedBoxPartition, Role};
}
