//! Fixed little-endian wire records for the connectivity protocol.
//!
//! All multi-byte integers are **little-endian** on the wire: stored pre-LE
//! with `.to_le()` and decoded with `::from_le()`. Floating-point extents
//! travel as the LE bit pattern of the `f64`, which round-trips every value
//! including the infinities used by the empty-box sentinel.

use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

use crate::geometry::bbox::{BoundingBox, Extent};

/// Defines a `u32` wire record holding a pre-LE value converted to and from
/// a host `usize`.
macro_rules! wire_u32 {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Pod, Zeroable)]
        pub struct $name(u32);

        impl $name {
            pub fn from_usize(v: usize) -> Self {
                Self((v as u32).to_le())
            }

            pub fn to_usize(self) -> usize {
                u32::from_le(self.0) as usize
            }
        }
    };
}

wire_u32! {
    /// Entry count preceding a box-map or feedback-map stream, and the
    /// length prefix announcing every id list.
    WireCount
}

wire_u32! {
    /// A rank identifier keying a map entry. Always non-negative on the wire.
    WireRank
}

/// One feedback-list element: a remote rank, or `-1` for the no-overlap
/// sentinel a master seeds into unanswered slave slots.
#[repr(transparent)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireId {
    pub id_le: i32,
}
impl WireId {
    pub fn new(id: i32) -> Self {
        Self { id_le: id.to_le() }
    }
    pub fn get(&self) -> i32 {
        i32::from_le(self.id_le)
    }
}

/// One axis extent as LE `f64` bit patterns.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireExtent {
    pub min_bits_le: u64,
    pub max_bits_le: u64,
}
impl WireExtent {
    pub fn of(e: Extent) -> Self {
        Self {
            min_bits_le: e.min.to_bits().to_le(),
            max_bits_le: e.max.to_bits().to_le(),
        }
    }
    pub fn get(&self) -> Extent {
        Extent::new(
            f64::from_bits(u64::from_le(self.min_bits_le)),
            f64::from_bits(u64::from_le(self.max_bits_le)),
        )
    }
}

/// Encode a box as one wire record per axis.
pub fn encode_box(bb: &BoundingBox) -> Vec<WireExtent> {
    bb.extents().iter().map(|&e| WireExtent::of(e)).collect()
}

/// Decode a box from one wire record per axis.
pub fn decode_box(records: &[WireExtent]) -> BoundingBox {
    BoundingBox::from_extents(records.iter().map(|r| r.get()).collect())
}

// Compile-time layout checks; Pod/Zeroable ensures no uninit padding when
// cast to bytes.
const _: () = {
    assert!(size_of::<WireCount>() == 4);
    assert!(size_of::<WireRank>() == 4);
    assert!(size_of::<WireId>() == 4);
    assert!(size_of::<WireExtent>() == 16);
};

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{cast_slice, cast_slice_mut};

    #[test]
    fn roundtrip_extent_records() {
        let v = vec![
            WireExtent::of(Extent::new(-1.5, 2.25)),
            WireExtent::of(Extent::new(f64::INFINITY, f64::NEG_INFINITY)),
        ];
        let bytes: Vec<u8> = cast_slice(&v).to_vec();
        let mut out = vec![WireExtent::zeroed(); v.len()];
        cast_slice_mut(&mut out).copy_from_slice(&bytes);
        assert_eq!(out[0].get(), Extent::new(-1.5, 2.25));
        assert_eq!(out[1].get().min, f64::INFINITY);
        assert_eq!(out[1].get().max, f64::NEG_INFINITY);
    }

    #[test]
    fn roundtrip_box() {
        let bb = BoundingBox::from_extents(vec![
            Extent::new(0.0, 1.0),
            Extent::new(-3.0, 3.0),
            Extent::new(0.5, 0.5),
        ]);
        assert_eq!(decode_box(&encode_box(&bb)), bb);
    }

    #[test]
    fn sentinel_id_survives_the_wire() {
        let id = WireId::new(-1);
        let bytes: Vec<u8> = cast_slice(&[id]).to_vec();
        let mut out = [WireId::zeroed()];
        cast_slice_mut(&mut out).copy_from_slice(&bytes);
        assert_eq!(out[0].get(), -1);
    }

    #[test]
    fn count_and_rank_are_u32_le() {
        assert_eq!(WireCount::from_usize(7).to_usize(), 7);
        assert_eq!(WireRank::from_usize(12).to_usize(), 12);
        let bytes: Vec<u8> = cast_slice(&[WireCount::from_usize(0x0102_0304)]).to_vec();
        assert_eq!(bytes, vec![0x04, 0x03, 0x02, 0x01]);
    }
}
