//! Connectivity discovery between coupled participants.
//!
//! One [`ReceivedBoxPartition`] instance exists per coupled mesh per
//! participant. Phase 1 pulls the remote participant's per-rank bounding
//! boxes to the local master; phase 2 fans them out, intersects them against
//! every rank's dilated local box, and returns the resulting feedback map to
//! the remote master.

pub mod received_boxes;

pub use received_boxes::ReceivedBoxPartition;

use serde::{Deserialize, Serialize};

/// Rank role within one participant, derived from the intra-participant
/// communicator. No process-wide role state exists.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// Rank 0 of a multi-rank participant; owns the inter-participant channel.
    Master,
    /// Any rank above 0.
    Slave,
    /// The only rank of a single-rank participant. Connectivity discovery for
    /// this mode is not implemented; both protocol phases are no-ops.
    Solo,
}

impl Role {
    pub fn of(rank: usize, size: usize) -> Role {
        assert!(size > 0, "communicator must have at least one rank");
        assert!(rank < size, "rank out of range");
        if size == 1 {
            Role::Solo
        } else if rank == 0 {
            Role::Master
        } else {
            Role::Slave
        }
    }

    #[inline]
    pub fn is_master(self) -> bool {
        matches!(self, Role::Master)
    }

    #[inline]
    pub fn is_slave(self) -> bool {
        matches!(self, Role::Slave)
    }
}

/// Construction-time options for a partition.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Non-negative factor by which every local box is dilated (relative to
    /// its longest edge) before the overlap test. Guards against mapped data
    /// falling just outside a rank's subdomain.
    pub safety_factor: f64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self { safety_factor: 0.5 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_derivation() {
        assert_eq!(Role::of(0, 1), Role::Solo);
        assert_eq!(Role::of(0, 4), Role::Master);
        assert_eq!(Role::of(3, 4), Role::Slave);
    }

    #[test]
    #[should_panic(expected = "rank out of range")]
    fn out_of_range_rank_panics() {
        let _ = Role::of(4, 4);
    }
}
