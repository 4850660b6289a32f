//! Mesh and mapping collaborators of the partition protocol.
//!
//! The partition never mutates these; it reads a dimension and a bounding box
//! from each attached mesh. The partition driver guarantees that meshes and
//! mappings outlive the partition instance, which the `Arc` handles make
//! explicit.

use std::sync::Arc;

use crate::geometry::bbox::{BoundingBox, Extent};

/// A participant-local mesh: a name, a spatial dimension, and flat vertex
/// coordinates (`dimensions` values per vertex).
#[derive(Clone, Debug)]
pub struct Mesh {
    name: String,
    dimensions: usize,
    vertices: Vec<f64>,
}

impl Mesh {
    pub fn new(name: impl Into<String>, dimensions: usize) -> Self {
        assert!(dimensions > 0, "mesh dimension must be positive");
        Self {
            name: name.into(),
            dimensions,
            vertices: Vec::new(),
        }
    }

    /// Build a mesh from flat vertex coordinates, `dimensions` values per vertex.
    pub fn with_vertices(
        name: impl Into<String>,
        dimensions: usize,
        vertices: Vec<f64>,
    ) -> Self {
        assert!(dimensions > 0, "mesh dimension must be positive");
        assert_eq!(
            vertices.len() % dimensions,
            0,
            "vertex coordinates must be a multiple of the dimension"
        );
        Self {
            name: name.into(),
            dimensions,
            vertices,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.dimensions
    }

    pub fn add_vertex(&mut self, coords: &[f64]) {
        assert_eq!(coords.len(), self.dimensions, "coordinate arity mismatch");
        self.vertices.extend_from_slice(coords);
    }

    /// Axis-aligned bounding box of the vertex set; the empty sentinel when
    /// the mesh holds no vertices yet.
    pub fn bounding_box(&self) -> BoundingBox {
        let mut extents =
            vec![Extent::new(f64::INFINITY, f64::NEG_INFINITY); self.dimensions];
        for vertex in self.vertices.chunks_exact(self.dimensions) {
            for (e, &c) in extents.iter_mut().zip(vertex) {
                if e.min > c {
                    e.min = c;
                }
                if e.max < c {
                    e.max = c;
                }
            }
        }
        BoundingBox::from_extents(extents)
    }
}

/// A data mapping between two meshes.
///
/// The partition only consults the mesh on the far side of each attached
/// mapping: the *output* mesh of a from-mapping and the *input* mesh of a
/// to-mapping.
#[derive(Clone, Debug)]
pub struct Mapping {
    input: Arc<Mesh>,
    output: Arc<Mesh>,
}

impl Mapping {
    pub fn new(input: Arc<Mesh>, output: Arc<Mesh>) -> Self {
        assert_eq!(
            input.dimensions(),
            output.dimensions(),
            "mapped meshes must share a dimension"
        );
        Self { input, output }
    }

    #[inline]
    pub fn input_mesh(&self) -> &Arc<Mesh> {
        &self.input
    }

    #[inline]
    pub fn output_mesh(&self) -> &Arc<Mesh> {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::bbox::Extent;

    #[test]
    fn bounding_box_covers_all_vertices() {
        let mesh = Mesh::with_vertices("fluid", 2, vec![0.0, 1.0, 2.0, -1.0, 1.0, 3.0]);
        let bb = mesh.bounding_box();
        assert_eq!(bb.extent(0), Extent::new(0.0, 2.0));
        assert_eq!(bb.extent(1), Extent::new(-1.0, 3.0));
    }

    #[test]
    fn empty_mesh_yields_empty_sentinel() {
        let mesh = Mesh::new("solid", 3);
        let bb = mesh.bounding_box();
        for d in 0..3 {
            assert_eq!(bb.extent(d).min, f64::INFINITY);
            assert_eq!(bb.extent(d).max, f64::NEG_INFINITY);
        }
    }

    #[test]
    fn incremental_vertices_extend_the_box() {
        let mut mesh = Mesh::new("probe", 2);
        mesh.add_vertex(&[1.0, 1.0]);
        mesh.add_vertex(&[-2.0, 4.0]);
        let bb = mesh.bounding_box();
        assert_eq!(bb.extent(0), Extent::new(-2.0, 1.0));
        assert_eq!(bb.extent(1), Extent::new(1.0, 4.0));
    }
}
