//! Transport seam and typed protocol channels.
//!
//! Layering, bottom up:
//! - [`communicator`]: blocking byte messages with `(peer, tag)` addressing;
//!   backends for single-rank, in-process, and MPI runs
//! - [`wire`]: fixed little-endian records carried inside those messages
//! - [`channel`]: blocking typed operations (counts, id lists, box maps,
//!   feedback maps) used by the partition protocol

pub mod channel;
pub mod communicator;
pub mod wire;
