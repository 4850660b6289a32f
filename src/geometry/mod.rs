//! Geometry types for partition intersection tests.

pub mod bbox;

pub use bbox::{BoundingBox, Extent};
