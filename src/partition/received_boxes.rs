//! Connectivity discovery from received bounding boxes.
//!
//! The protocol is collective across four role groups: local master, local
//! slaves, remote master, and (implicitly, behind the peer channel) remote
//! slaves running the mirror protocol. It runs in two strictly ordered
//! phases:
//!
//! 1. [`communicate_bounding_box`]: the local master receives the remote
//!    participant's rank count and per-rank box map on the peer channel.
//! 2. [`compute_bounding_box`]: every rank builds its dilated local box, the
//!    master fans the remote map out to the slaves, every rank intersects the
//!    remote boxes against its own in ascending rank order, the slaves report
//!    their overlap lists to the master, and the master ships the assembled
//!    feedback map back to the remote master.
//!
//! Every exchange is blocking and nothing is retried: a transport error is
//! fatal to the coupling and propagates to the partition driver.
//!
//! [`communicate_bounding_box`]: ReceivedBoxPartition::communicate_bounding_box
//! [`compute_bounding_box`]: ReceivedBoxPartition::compute_bounding_box

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::comm::channel::{BoxMap, FeedbackMap, IntraChannel, PeerChannel};
use crate::comm::communicator::Communicator;
use crate::couple_error::CoupleError;
use crate::geometry::bbox::{BoundingBox, Extent};
use crate::mesh::{Mapping, Mesh};
use crate::partition::{PartitionConfig, Role};

/// Protocol progress. Transitions are linear and each advances exactly once;
/// slaves skip `BoxesReceived` and move straight to `Computed`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Fresh,
    BoxesReceived,
    Computed,
}

/// Per-mesh partition connectivity, computed from the remote participant's
/// per-rank bounding boxes.
///
/// After [`compute_bounding_box`](Self::compute_bounding_box) the instance is
/// read-only: [`connected_ranks`](Self::connected_ranks) is this rank's
/// routing table for all later communication phases.
pub struct ReceivedBoxPartition<C: Communicator> {
    mesh: Arc<Mesh>,
    from_mapping: Option<Arc<Mapping>>,
    to_mapping: Option<Arc<Mapping>>,
    safety_factor: f64,
    intra: IntraChannel<C>,
    peer: Option<PeerChannel<C>>,
    role: Role,
    local_box: BoundingBox,
    remote_boxes: BoxMap,
    remote_size: usize,
    connected_ranks: Vec<usize>,
    state: State,
}

impl<C: Communicator> ReceivedBoxPartition<C> {
    /// Build a partition for `mesh`.
    ///
    /// `peer` is the channel to the remote participant's master and must be
    /// present exactly on the master rank. Mappings are attached afterwards,
    /// before phase 2.
    pub fn new(
        mesh: Arc<Mesh>,
        config: PartitionConfig,
        intra: IntraChannel<C>,
        peer: Option<PeerChannel<C>>,
    ) -> Self {
        assert!(
            config.safety_factor >= 0.0,
            "safety factor must be non-negative"
        );
        let role = Role::of(intra.rank(), intra.size());
        if role.is_master() {
            assert!(peer.is_some(), "the master rank needs a peer channel");
        }
        let dimensions = mesh.dimensions();
        Self {
            mesh,
            from_mapping: None,
            to_mapping: None,
            safety_factor: config.safety_factor,
            intra,
            peer,
            role,
            local_box: BoundingBox::empty(dimensions),
            remote_boxes: BoxMap::new(),
            remote_size: 0,
            connected_ranks: Vec::new(),
            state: State::Fresh,
        }
    }

    /// Mapping whose *output* mesh contributes to the local box.
    pub fn set_from_mapping(&mut self, mapping: Arc<Mapping>) {
        self.from_mapping = Some(mapping);
    }

    /// Mapping whose *input* mesh contributes to the local box.
    pub fn set_to_mapping(&mut self, mapping: Arc<Mapping>) {
        self.to_mapping = Some(mapping);
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// This rank's dilated bounding box (valid after phase 2).
    #[inline]
    pub fn local_bounding_box(&self) -> &BoundingBox {
        &self.local_box
    }

    /// The remote participant's per-rank boxes (valid after phase 2 on every
    /// rank; after phase 1 on the master).
    #[inline]
    pub fn remote_bounding_boxes(&self) -> &BoxMap {
        &self.remote_boxes
    }

    /// Rank count of the remote participant.
    #[inline]
    pub fn remote_size(&self) -> usize {
        self.remote_size
    }

    /// Remote ranks whose boxes overlap this rank's box, ascending — the
    /// routing table for all later communication phases.
    #[inline]
    pub fn connected_ranks(&self) -> &[usize] {
        &self.connected_ranks
    }

    /// Phase 1: the master receives the remote participant's rank count and
    /// box map on the peer channel. A no-op on slaves (they get the map by
    /// broadcast in phase 2) and on solo participants.
    pub fn communicate_bounding_box(&mut self) -> Result<(), CoupleError> {
        match self.role {
            Role::Solo | Role::Slave => Ok(()),
            Role::Master => {
                assert_eq!(
                    self.state,
                    State::Fresh,
                    "the remote box map is received exactly once"
                );
                let peer = self.peer.as_ref().expect("master holds a peer channel");
                let remote_size = peer.recv_count()?;
                self.remote_size = remote_size;
                self.remote_boxes = placeholder_map(remote_size, self.mesh.dimensions());
                peer.recv_box_map(&mut self.remote_boxes, self.mesh.dimensions())?;
                trace!(remote_size, mesh = self.mesh.name(), "received remote box map");
                self.state = State::BoxesReceived;
                Ok(())
            }
        }
    }

    /// Phase 2: build the local box, distribute the remote map, intersect,
    /// and return the feedback map to the remote master.
    ///
    /// Must follow [`communicate_bounding_box`](Self::communicate_bounding_box)
    /// on the master.
    pub fn compute_bounding_box(&mut self) -> Result<(), CoupleError> {
        assert_ne!(
            self.state,
            State::Computed,
            "connectivity is computed exactly once"
        );
        // TODO: implement connectivity for solo participants; until then the
        // local box is still built but no protocol runs.
        self.prepare_bounding_box();

        match self.role {
            Role::Solo => {}
            Role::Master => self.compute_as_master()?,
            Role::Slave => self.compute_as_slave()?,
        }
        self.state = State::Computed;
        Ok(())
    }

    fn compute_as_master(&mut self) -> Result<(), CoupleError> {
        assert_eq!(
            self.state,
            State::BoxesReceived,
            "phase 1 must run before phase 2 on the master"
        );
        assert_eq!(self.intra.rank(), 0, "the master is rank 0");
        assert!(self.intra.size() > 1, "a master implies at least one slave");

        self.intra.broadcast_count(self.remote_size)?;
        self.intra.broadcast_box_map(&self.remote_boxes)?;

        self.connected_ranks = self.overlapping_remote_ranks();

        let mut feedback_map = FeedbackMap::new();
        for slave in 1..self.intra.size() {
            feedback_map.insert(slave, vec![-1]);
        }
        if !self.connected_ranks.is_empty() {
            feedback_map.insert(
                0,
                self.connected_ranks.iter().map(|&r| r as i32).collect(),
            );
        }

        // Ascending slave order, regardless of network arrival order.
        for slave in 1..self.intra.size() {
            let k = self.intra.recv_count_from(slave)?;
            if k > 0 {
                let ids = self.intra.recv_ids_from(slave, k)?;
                feedback_map.insert(slave, ids);
            }
        }

        if feedback_map.is_empty() {
            warn!(
                mesh = self.mesh.name(),
                "feedback map is empty: no rank overlaps the remote participant"
            );
        }
        let peer = self.peer.as_ref().expect("master holds a peer channel");
        peer.send_count(feedback_map.len())?;
        if !feedback_map.is_empty() {
            peer.send_feedback_map(&feedback_map)?;
        }
        trace!(
            entries = feedback_map.len(),
            mesh = self.mesh.name(),
            "sent feedback map to remote master"
        );
        Ok(())
    }

    fn compute_as_slave(&mut self) -> Result<(), CoupleError> {
        self.remote_size = self.intra.broadcast_recv_count()?;
        self.remote_boxes = placeholder_map(self.remote_size, self.mesh.dimensions());
        self.intra
            .broadcast_recv_box_map(&mut self.remote_boxes, self.mesh.dimensions())?;

        self.connected_ranks = self.overlapping_remote_ranks();

        self.intra.send_count_to(0, self.connected_ranks.len())?;
        // An empty list is announced by its count only; the payload never
        // goes on the wire.
        if !self.connected_ranks.is_empty() {
            let ids: Vec<i32> = self.connected_ranks.iter().map(|&r| r as i32).collect();
            self.intra.send_ids_to(0, &ids)?;
        }
        Ok(())
    }

    /// Remote ranks overlapping the local box, in ascending rank order so
    /// feedback lists are reproducible across runs.
    fn overlapping_remote_ranks(&self) -> Vec<usize> {
        self.remote_boxes
            .iter()
            .filter(|(_, bb)| self.local_box.overlaps(bb))
            .map(|(&rank, _)| rank)
            .collect()
    }

    /// Merge the boxes of the attached mappings' far-side meshes, then dilate
    /// by `safety_factor * longest_edge`.
    ///
    /// An all-empty merge (no mapping attached, or only vertex-free meshes)
    /// collapses to the origin, so the floored dilation leaves a tiny box
    /// there; remote boxes away from the origin then overlap nothing.
    fn prepare_bounding_box(&mut self) {
        assert!(
            self.safety_factor >= 0.0,
            "safety factor must be non-negative"
        );
        let dimensions = self.mesh.dimensions();
        let mut bb = BoundingBox::empty(dimensions);
        if let Some(mapping) = &self.from_mapping {
            bb.merge(&mapping.output_mesh().bounding_box());
        }
        if let Some(mapping) = &self.to_mapping {
            bb.merge(&mapping.input_mesh().bounding_box());
        }
        if bb.is_empty() {
            bb = BoundingBox::from_extents(vec![Extent::new(0.0, 0.0); dimensions]);
        }
        let margin = self.safety_factor * bb.longest_edge();
        bb.inflate(margin);
        debug!(mesh = self.mesh.name(), bbox = ?bb, "dilated local bounding box");
        self.local_box = bb;
    }
}

fn placeholder_map(size: usize, dimensions: usize) -> BoxMap {
    let mut map = BoxMap::new();
    for rank in 0..size {
        map.insert(rank, BoundingBox::placeholder(dimensions));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::communicator::{CommTag, NoComm};
    use crate::geometry::bbox::Extent;

    fn bb(extents: &[(f64, f64)]) -> BoundingBox {
        BoundingBox::from_extents(extents.iter().map(|&(lo, hi)| Extent::new(lo, hi)).collect())
    }

    fn solo_partition(
        mesh: Mesh,
        safety_factor: f64,
    ) -> ReceivedBoxPartition<NoComm> {
        let intra = IntraChannel::new(Arc::new(NoComm), CommTag::new(0x3000));
        ReceivedBoxPartition::new(
            Arc::new(mesh),
            PartitionConfig { safety_factor },
            intra,
            None,
        )
    }

    #[test]
    fn local_box_is_union_of_mapping_boxes_without_dilation() {
        let own = Mesh::new("own", 2);
        let mut partition = solo_partition(own, 0.0);

        let from_far = Arc::new(Mesh::with_vertices("a", 2, vec![0.0, 0.0, 1.0, 1.0]));
        let to_far = Arc::new(Mesh::with_vertices("b", 2, vec![2.0, 0.0, 3.0, 0.5]));
        partition.set_from_mapping(Arc::new(Mapping::new(from_far.clone(), from_far)));
        partition.set_to_mapping(Arc::new(Mapping::new(to_far.clone(), to_far)));

        partition.compute_bounding_box().unwrap();
        assert_eq!(partition.local_bounding_box(), &bb(&[(0.0, 3.0), (0.0, 1.0)]));
    }

    #[test]
    fn safety_factor_dilates_by_longest_edge() {
        let own = Mesh::new("own", 1);
        let mut partition = solo_partition(own, 0.5);

        let far = Arc::new(Mesh::with_vertices("far", 1, vec![0.0, 2.0]));
        partition.set_from_mapping(Arc::new(Mapping::new(far.clone(), far)));

        partition.compute_bounding_box().unwrap();
        assert_eq!(partition.local_bounding_box(), &bb(&[(-1.0, 3.0)]));

        // The dilation reaches a remote box that the raw mapping box misses.
        partition.remote_boxes.insert(0, bb(&[(2.5, 3.0)]));
        assert_eq!(partition.overlapping_remote_ranks(), vec![0]);
    }

    #[test]
    fn no_mappings_leave_a_tiny_box_around_the_origin() {
        let own = Mesh::new("own", 2);
        let mut partition = solo_partition(own, 1.0);

        partition.compute_bounding_box().unwrap();
        assert_eq!(
            partition.local_bounding_box(),
            &bb(&[(-1e-6, 1e-6), (-1e-6, 1e-6)])
        );

        partition.remote_boxes.insert(0, bb(&[(1.0, 2.0), (1.0, 2.0)]));
        assert!(partition.overlapping_remote_ranks().is_empty());
    }

    #[test]
    #[should_panic(expected = "safety factor must be non-negative")]
    fn negative_safety_factor_panics() {
        let _ = solo_partition(Mesh::new("own", 2), -0.1);
    }

    #[test]
    fn solo_phases_are_no_ops_on_the_wire() {
        let mut partition = solo_partition(Mesh::new("own", 2), 0.5);
        assert_eq!(partition.role(), Role::Solo);
        partition.communicate_bounding_box().unwrap();
        partition.compute_bounding_box().unwrap();
        assert!(partition.connected_ranks().is_empty());
        assert_eq!(partition.remote_size(), 0);
    }
}
