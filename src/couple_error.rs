//! `CoupleError`: unified error type for mesh-couple public APIs.
//!
//! Transport and codec failures surface through this type; nothing at this
//! layer is retried, a failed exchange is fatal to the coupling. Precondition
//! violations (wrong rank role, negative safety factor, phase ordering) are
//! programmer errors and assert instead of returning an error.

use thiserror::Error;

/// Unified error type for mesh-couple operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoupleError {
    /// A point-to-point exchange with `peer` failed or returned no data.
    #[error("communication with rank {peer} failed: {context}")]
    Comm { peer: usize, context: String },
    /// A message arrived with a different byte length than the protocol step expects.
    #[error("rank {peer} sent {got} bytes where {expected} were expected")]
    BufferSizeMismatch {
        peer: usize,
        expected: usize,
        got: usize,
    },
    /// A box map announced a different entry count than the pre-sized local map holds.
    #[error("box map announced {got} entries, local map holds {expected}")]
    BoxMapSizeMismatch { expected: usize, got: usize },
    /// A box map entry named a rank with no pre-sized local slot.
    #[error("box map entry for rank {rank} has no local slot")]
    UnknownBoxMapRank { rank: usize },
}
