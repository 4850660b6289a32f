//! Blocking typed channels for the connectivity protocol.
//!
//! [`PeerChannel`] is the point-to-point link between the two participant
//! masters; [`IntraChannel`] is the master-rooted link inside one
//! participant. Both speak the same stream discipline:
//! - counts travel ahead of payloads, so the receiver of every message knows
//!   its exact byte length up front;
//! - map entries stream in ascending rank order;
//! - a zero-length id list is announced by its count but its payload is
//!   never put on the wire, and receivers must mirror that asymmetry.
//!
//! Each logical stream (scalars, id lists, box entries, feedback entries)
//! gets its own tag derived from the channel's base tag, so several channels
//! can share one communicator.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytemuck::{cast_slice, cast_slice_mut, Zeroable};

use crate::comm::communicator::{CommTag, Communicator};
use crate::comm::wire::{decode_box, encode_box, WireCount, WireExtent, WireId, WireRank};
use crate::couple_error::CoupleError;
use crate::geometry::bbox::BoundingBox;

/// Rank → bounding box, for every rank of one participant.
///
/// A `BTreeMap` so iteration (and therefore every wire stream built from it)
/// is ascending by rank on every rank that holds a copy.
pub type BoxMap = BTreeMap<usize, BoundingBox>;

/// Local rank → list of overlapping remote ranks.
///
/// A single `-1` element is the no-overlap sentinel a master seeds into
/// slave slots that report nothing; consumers treat it as an empty list.
pub type FeedbackMap = BTreeMap<usize, Vec<i32>>;

/// Per-stream tags derived from a channel's base tag.
#[derive(Copy, Clone, Debug)]
pub struct ChannelTags {
    /// Scalar counts (map sizes, rank counts, feedback lengths).
    pub scalar: CommTag,
    /// Flat id lists (slave feedback payloads).
    pub ids: CommTag,
    /// Box-map entry stream (ranks and extents).
    pub boxes: CommTag,
    /// Feedback-map entry stream.
    pub feedback: CommTag,
}

impl ChannelTags {
    /// Construct tags from a base, assigning deterministic offsets per stream.
    #[inline]
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            scalar: base,
            ids: base.offset(1),
            boxes: base.offset(2),
            feedback: base.offset(3),
        }
    }
}

// --- raw helpers shared by both channel types ---

fn recv_exact<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
    buf: &mut [u8],
) -> Result<(), CoupleError> {
    let raw = comm.recv(peer, tag, buf.len())?;
    if raw.len() != buf.len() {
        return Err(CoupleError::BufferSizeMismatch {
            peer,
            expected: buf.len(),
            got: raw.len(),
        });
    }
    buf.copy_from_slice(&raw);
    Ok(())
}

fn send_count_raw<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
    n: usize,
) -> Result<(), CoupleError> {
    comm.send(peer, tag, cast_slice(&[WireCount::from_usize(n)]))
}

fn recv_count_raw<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
) -> Result<usize, CoupleError> {
    let mut rec = [WireCount::zeroed()];
    recv_exact(comm, peer, tag, cast_slice_mut(&mut rec))?;
    Ok(rec[0].to_usize())
}

fn send_ids_raw<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
    ids: &[i32],
) -> Result<(), CoupleError> {
    let records: Vec<WireId> = ids.iter().map(|&id| WireId::new(id)).collect();
    comm.send(peer, tag, cast_slice(&records))
}

fn recv_ids_raw<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
    len: usize,
) -> Result<Vec<i32>, CoupleError> {
    let mut records = vec![WireId::zeroed(); len];
    recv_exact(comm, peer, tag, cast_slice_mut(&mut records))?;
    Ok(records.iter().map(|r| r.get()).collect())
}

/// Stream a full box map: count, then `(rank, extents)` ascending by rank.
fn send_box_map_stream<C: Communicator>(
    comm: &C,
    peer: usize,
    tags: &ChannelTags,
    map: &BoxMap,
) -> Result<(), CoupleError> {
    send_count_raw(comm, peer, tags.scalar, map.len())?;
    for (&rank, bb) in map {
        comm.send(peer, tags.boxes, cast_slice(&[WireRank::from_usize(rank)]))?;
        comm.send(peer, tags.boxes, cast_slice(&encode_box(bb)))?;
    }
    Ok(())
}

/// Receive a box map in place. `map` must be pre-sized with placeholder
/// boxes for every expected rank; each wire entry overwrites its slot.
fn recv_box_map_stream<C: Communicator>(
    comm: &C,
    peer: usize,
    tags: &ChannelTags,
    map: &mut BoxMap,
    dimensions: usize,
) -> Result<(), CoupleError> {
    let n = recv_count_raw(comm, peer, tags.scalar)?;
    if n != map.len() {
        return Err(CoupleError::BoxMapSizeMismatch {
            expected: map.len(),
            got: n,
        });
    }
    for _ in 0..n {
        let mut rank_rec = [WireRank::zeroed()];
        recv_exact(comm, peer, tags.boxes, cast_slice_mut(&mut rank_rec))?;
        let rank = rank_rec[0].to_usize();
        let mut extent_recs = vec![WireExtent::zeroed(); dimensions];
        recv_exact(comm, peer, tags.boxes, cast_slice_mut(&mut extent_recs))?;
        match map.get_mut(&rank) {
            Some(slot) => *slot = decode_box(&extent_recs),
            None => return Err(CoupleError::UnknownBoxMapRank { rank }),
        }
    }
    Ok(())
}

/// Stream a full feedback map: count, then `(rank, k, ids?)` ascending by
/// rank, omitting the id payload when `k == 0`.
fn send_feedback_map_stream<C: Communicator>(
    comm: &C,
    peer: usize,
    tags: &ChannelTags,
    map: &FeedbackMap,
) -> Result<(), CoupleError> {
    send_count_raw(comm, peer, tags.scalar, map.len())?;
    for (&rank, ids) in map {
        comm.send(peer, tags.feedback, cast_slice(&[WireRank::from_usize(rank)]))?;
        comm.send(
            peer,
            tags.feedback,
            cast_slice(&[WireCount::from_usize(ids.len())]),
        )?;
        if !ids.is_empty() {
            let records: Vec<WireId> = ids.iter().map(|&id| WireId::new(id)).collect();
            comm.send(peer, tags.feedback, cast_slice(&records))?;
        }
    }
    Ok(())
}

fn recv_feedback_map_stream<C: Communicator>(
    comm: &C,
    peer: usize,
    tags: &ChannelTags,
) -> Result<FeedbackMap, CoupleError> {
    let n = recv_count_raw(comm, peer, tags.scalar)?;
    let mut map = FeedbackMap::new();
    for _ in 0..n {
        let mut rank_rec = [WireRank::zeroed()];
        recv_exact(comm, peer, tags.feedback, cast_slice_mut(&mut rank_rec))?;
        let mut count_rec = [WireCount::zeroed()];
        recv_exact(comm, peer, tags.feedback, cast_slice_mut(&mut count_rec))?;
        let k = count_rec[0].to_usize();
        let ids = if k > 0 {
            let mut records = vec![WireId::zeroed(); k];
            recv_exact(comm, peer, tags.feedback, cast_slice_mut(&mut records))?;
            records.iter().map(|r| r.get()).collect()
        } else {
            Vec::new()
        };
        map.insert(rank_rec[0].to_usize(), ids);
    }
    Ok(map)
}

/// Point-to-point typed link against one fixed peer rank (the
/// inter-participant master↔master channel).
pub struct PeerChannel<C: Communicator> {
    comm: Arc<C>,
    peer: usize,
    tags: ChannelTags,
}

impl<C: Communicator> PeerChannel<C> {
    pub fn new(comm: Arc<C>, peer: usize, base: CommTag) -> Self {
        Self {
            comm,
            peer,
            tags: ChannelTags::from_base(base),
        }
    }

    #[inline]
    pub fn peer(&self) -> usize {
        self.peer
    }

    pub fn send_count(&self, n: usize) -> Result<(), CoupleError> {
        send_count_raw(&*self.comm, self.peer, self.tags.scalar, n)
    }

    pub fn recv_count(&self) -> Result<usize, CoupleError> {
        recv_count_raw(&*self.comm, self.peer, self.tags.scalar)
    }

    pub fn send_ids(&self, ids: &[i32]) -> Result<(), CoupleError> {
        send_ids_raw(&*self.comm, self.peer, self.tags.ids, ids)
    }

    pub fn recv_ids(&self, len: usize) -> Result<Vec<i32>, CoupleError> {
        recv_ids_raw(&*self.comm, self.peer, self.tags.ids, len)
    }

    pub fn send_box_map(&self, map: &BoxMap) -> Result<(), CoupleError> {
        send_box_map_stream(&*self.comm, self.peer, &self.tags, map)
    }

    /// Receive a box map in place; `map` must be pre-sized with placeholder
    /// boxes keying every expected rank.
    pub fn recv_box_map(
        &self,
        map: &mut BoxMap,
        dimensions: usize,
    ) -> Result<(), CoupleError> {
        recv_box_map_stream(&*self.comm, self.peer, &self.tags, map, dimensions)
    }

    pub fn send_feedback_map(&self, map: &FeedbackMap) -> Result<(), CoupleError> {
        send_feedback_map_stream(&*self.comm, self.peer, &self.tags, map)
    }

    pub fn recv_feedback_map(&self) -> Result<FeedbackMap, CoupleError> {
        recv_feedback_map_stream(&*self.comm, self.peer, &self.tags)
    }
}

/// Master-rooted typed link inside one participant.
///
/// Rank 0 is always the root. Broadcasts are a point-to-point fan-out in
/// ascending rank order, which keeps delivery deterministic on transports
/// without a native collective.
pub struct IntraChannel<C: Communicator> {
    comm: Arc<C>,
    tags: ChannelTags,
}

impl<C: Communicator> IntraChannel<C> {
    pub fn new(comm: Arc<C>, base: CommTag) -> Self {
        Self {
            comm,
            tags: ChannelTags::from_base(base),
        }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.comm.size()
    }

    /// Root side: fan a count out to every other rank.
    pub fn broadcast_count(&self, n: usize) -> Result<(), CoupleError> {
        debug_assert_eq!(self.rank(), 0, "only the root broadcasts");
        for dest in 1..self.size() {
            send_count_raw(&*self.comm, dest, self.tags.scalar, n)?;
        }
        Ok(())
    }

    /// Non-root side: receive a broadcast count from the root.
    pub fn broadcast_recv_count(&self) -> Result<usize, CoupleError> {
        debug_assert_ne!(self.rank(), 0, "the root does not receive its own broadcast");
        recv_count_raw(&*self.comm, 0, self.tags.scalar)
    }

    /// Root side: fan a box map out to every other rank.
    pub fn broadcast_box_map(&self, map: &BoxMap) -> Result<(), CoupleError> {
        debug_assert_eq!(self.rank(), 0, "only the root broadcasts");
        for dest in 1..self.size() {
            send_box_map_stream(&*self.comm, dest, &self.tags, map)?;
        }
        Ok(())
    }

    /// Non-root side: receive a broadcast box map in place; `map` must be
    /// pre-sized with placeholder boxes.
    pub fn broadcast_recv_box_map(
        &self,
        map: &mut BoxMap,
        dimensions: usize,
    ) -> Result<(), CoupleError> {
        debug_assert_ne!(self.rank(), 0, "the root does not receive its own broadcast");
        recv_box_map_stream(&*self.comm, 0, &self.tags, map, dimensions)
    }

    pub fn send_count_to(&self, dest: usize, n: usize) -> Result<(), CoupleError> {
        send_count_raw(&*self.comm, dest, self.tags.scalar, n)
    }

    pub fn recv_count_from(&self, source: usize) -> Result<usize, CoupleError> {
        recv_count_raw(&*self.comm, source, self.tags.scalar)
    }

    pub fn send_ids_to(&self, dest: usize, ids: &[i32]) -> Result<(), CoupleError> {
        send_ids_raw(&*self.comm, dest, self.tags.ids, ids)
    }

    pub fn recv_ids_from(&self, source: usize, len: usize) -> Result<Vec<i32>, CoupleError> {
        recv_ids_raw(&*self.comm, source, self.tags.ids, len)
    }
}
