//! Axis-aligned bounding boxes with runtime dimensionality.
//!
//! Every rank of a participant publishes one box per coupled mesh; the
//! partition protocol intersects local boxes against the received remote
//! boxes to discover connectivity. Two sentinel shapes exist alongside valid
//! boxes (`min <= max` per axis):
//! - the *empty* box (`[+inf, -inf]` per axis), the identity of [`merge`] and
//!   the starting point of local box construction;
//! - the *placeholder* box (`[-1, -1]` per axis), used to pre-size box maps
//!   before an in-place receive.
//!
//! [`overlaps`] tolerates both: a sentinel never overlaps a valid box.
//!
//! [`merge`]: BoundingBox::merge
//! [`overlaps`]: BoundingBox::overlaps

use serde::{Deserialize, Serialize};

/// One closed interval `[min, max]` along a coordinate axis.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min: f64,
    pub max: f64,
}

impl Extent {
    #[inline]
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Interval length; negative for sentinel extents where `max < min`.
    #[inline]
    pub fn length(&self) -> f64 {
        self.max - self.min
    }
}

/// Floor applied to [`BoundingBox::longest_edge`] so safety-factor dilation
/// stays non-zero even for degenerate (point or line) merged boxes.
pub const MIN_EDGE_LENGTH: f64 = 1e-6;

/// Axis-aligned box in `D` dimensions.
///
/// `D` is fixed per coupled mesh at runtime (2 or 3 for real meshes; 1 is
/// permitted and useful in tests), so extents live in a `Vec` rather than a
/// const-generic array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    extents: Vec<Extent>,
}

impl BoundingBox {
    /// Empty box: `[+inf, -inf]` per axis.
    ///
    /// Merging any valid box into it yields that box; it overlaps nothing.
    pub fn empty(dimensions: usize) -> Self {
        Self {
            extents: vec![Extent::new(f64::INFINITY, f64::NEG_INFINITY); dimensions],
        }
    }

    /// Placeholder box (`[-1, -1]` per axis) used to pre-size box maps before
    /// an in-place receive. Every placeholder is overwritten by the codec.
    pub fn placeholder(dimensions: usize) -> Self {
        Self {
            extents: vec![Extent::new(-1.0, -1.0); dimensions],
        }
    }

    pub fn from_extents(extents: Vec<Extent>) -> Self {
        Self { extents }
    }

    #[inline]
    pub fn dimensions(&self) -> usize {
        self.extents.len()
    }

    #[inline]
    pub fn extents(&self) -> &[Extent] {
        &self.extents
    }

    #[inline]
    pub fn extent(&self, axis: usize) -> Extent {
        self.extents[axis]
    }

    /// True when any axis is inverted (`min > max`), i.e. the box is one of
    /// the sentinels and contains no point.
    pub fn is_empty(&self) -> bool {
        self.extents.iter().any(|e| e.min > e.max)
    }

    /// Componentwise union: min of mins, max of maxes, per axis.
    pub fn merge(&mut self, other: &BoundingBox) {
        debug_assert_eq!(self.extents.len(), other.extents.len());
        for (e, o) in self.extents.iter_mut().zip(&other.extents) {
            if e.min > o.min {
                e.min = o.min;
            }
            if e.max < o.max {
                e.max = o.max;
            }
        }
    }

    /// Longest edge over all axes, floored at [`MIN_EDGE_LENGTH`].
    pub fn longest_edge(&self) -> f64 {
        let mut longest = MIN_EDGE_LENGTH;
        for e in &self.extents {
            longest = longest.max(e.length());
        }
        longest
    }

    /// Grow every axis symmetrically by `margin`.
    pub fn inflate(&mut self, margin: f64) {
        for e in &mut self.extents {
            e.min -= margin;
            e.max += margin;
        }
    }

    /// Closed-interval overlap test: the boxes overlap iff their projections
    /// overlap on every axis, with boundary touch counting as overlap.
    ///
    /// An axis is disjoint only when *both* endpoints of one extent lie
    /// strictly below the lower endpoint of the other; checking both
    /// endpoints keeps sentinel extents (`max < min`) from ever overlapping
    /// a valid box. Symmetric in its arguments.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        debug_assert_eq!(self.extents.len(), other.extents.len());
        for (a, b) in self.extents.iter().zip(&other.extents) {
            if (a.min < b.min && a.max < b.min) || (b.min < a.min && b.max < a.min) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bb(extents: &[(f64, f64)]) -> BoundingBox {
        BoundingBox::from_extents(extents.iter().map(|&(lo, hi)| Extent::new(lo, hi)).collect())
    }

    #[test]
    fn merge_into_empty_yields_other() {
        let mut acc = BoundingBox::empty(2);
        let other = bb(&[(0.0, 1.0), (-2.0, 3.0)]);
        acc.merge(&other);
        assert_eq!(acc, other);
    }

    #[test]
    fn merge_is_componentwise_union() {
        let mut acc = bb(&[(0.0, 1.0), (0.0, 1.0)]);
        acc.merge(&bb(&[(-1.0, 0.5), (0.5, 2.0)]));
        assert_eq!(acc, bb(&[(-1.0, 1.0), (0.0, 2.0)]));
    }

    #[test]
    fn longest_edge_floors_degenerate_boxes() {
        let point = bb(&[(3.0, 3.0), (4.0, 4.0)]);
        assert_eq!(point.longest_edge(), MIN_EDGE_LENGTH);
        let line = bb(&[(0.0, 2.0), (1.0, 1.0)]);
        assert_eq!(line.longest_edge(), 2.0);
    }

    #[test]
    fn inflate_is_symmetric_per_axis() {
        let mut b = bb(&[(0.0, 2.0)]);
        b.inflate(1.0);
        assert_eq!(b, bb(&[(-1.0, 3.0)]));
    }

    #[test]
    fn boundary_touch_counts_as_overlap() {
        assert!(bb(&[(0.0, 1.0)]).overlaps(&bb(&[(1.0, 2.0)])));
    }

    #[test]
    fn strictly_disjoint_boxes_do_not_overlap() {
        assert!(!bb(&[(0.0, 1.0), (0.0, 1.0)]).overlaps(&bb(&[(2.0, 3.0), (0.0, 1.0)])));
    }

    #[test]
    fn empty_sentinel_overlaps_nothing() {
        let empty = BoundingBox::empty(3);
        let valid = bb(&[(-10.0, 10.0), (-10.0, 10.0), (-10.0, 10.0)]);
        assert!(!empty.overlaps(&valid));
        assert!(!valid.overlaps(&empty));
    }

    fn arb_box(dim: usize) -> impl Strategy<Value = BoundingBox> {
        proptest::collection::vec((-100.0f64..100.0, 0.0f64..50.0), dim).prop_map(|axes| {
            BoundingBox::from_extents(
                axes.into_iter()
                    .map(|(lo, len)| Extent::new(lo, lo + len))
                    .collect(),
            )
        })
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a in arb_box(3), b in arb_box(3)) {
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }

        #[test]
        fn every_valid_box_overlaps_itself(a in arb_box(2)) {
            prop_assert!(a.overlaps(&a));
        }

        #[test]
        fn empty_never_overlaps_valid(a in arb_box(2)) {
            prop_assert!(!BoundingBox::empty(2).overlaps(&a));
        }
    }
}
