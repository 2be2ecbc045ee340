// Type aliases for data values.

/// Floating point precision of the geometric kernels.
///
/// The Delaunay predicates assume at least `f64`.
pub type Real = f64;

pub type Vertex3 = [Real; 3];
pub type Tetrahedron3 = [Vertex3; 4];

// Type aliases for data indices.
// This is to know, when a function accepts or returns a usize, what it is for.
pub type VertexIdx = usize;
pub type TetraIdx = usize;
