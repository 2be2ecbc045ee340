//! Abstract triangle mesh access for the kd-tree.

use anyhow::Result;
use nalgebra::Point3;

use crate::utils::types::Real;

/// Indexed access to a bag of triangles.
///
/// The kd-tree only ever reads through this trait, so any mesh representation
/// can back it without copying vertex data.
pub trait TriangleSoup {
    fn num_triangles(&self) -> usize;

    fn num_vertices(&self) -> usize;

    /// The vertex indices of triangle `triangle_idx`.
    fn triangle(&self, triangle_idx: usize) -> [u32; 3];

    /// The position of corner `corner` (0..3) of triangle `triangle_idx`.
    fn vertex(&self, triangle_idx: usize, corner: usize) -> Point3<Real>;
}

/// A plain indexed triangle mesh.
#[derive(Debug, Clone)]
pub struct IndexedMesh {
    positions: Vec<Point3<Real>>,
    indices: Vec<u32>,
}

impl IndexedMesh {
    /// Creates a mesh from positions and a flat index list, three indices per
    /// triangle.
    ///
    /// ## Errors
    /// Returns an error if the index list length is not a multiple of three
    /// or any index is out of range.
    pub fn new(positions: Vec<[Real; 3]>, indices: Vec<u32>) -> Result<Self> {
        if indices.len() % 3 != 0 {
            return Err(anyhow::Error::msg(
                "Index list length must be a multiple of three",
            ));
        }
        if let Some(&idx) = indices.iter().find(|&&idx| idx as usize >= positions.len()) {
            return Err(anyhow::Error::msg(format!(
                "Vertex index {idx} out of range for {} vertices",
                positions.len()
            )));
        }

        Ok(Self {
            positions: positions.into_iter().map(Point3::from).collect(),
            indices,
        })
    }
}

impl TriangleSoup for IndexedMesh {
    fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    fn triangle(&self, triangle_idx: usize) -> [u32; 3] {
        let i = triangle_idx * 3;
        [self.indices[i], self.indices[i + 1], self.indices[i + 2]]
    }

    fn vertex(&self, triangle_idx: usize, corner: usize) -> Point3<Real> {
        self.positions[self.indices[triangle_idx * 3 + corner] as usize]
    }
}
