pub(crate) mod flips;
pub(crate) mod mesh;
pub mod tetrahedron;

pub(crate) use mesh::TetMesh;
pub use tetrahedron::Tetrahedron;
