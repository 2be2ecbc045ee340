//! # fita
//!
//! Flip-based Incremental Tetrahedralization Algorithms: a 3D Delaunay
//! tetrahedralization built by incremental insertion and bistellar flips,
//! plus an SAH kd-tree answering closest-hit segment/triangle queries.
#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::missing_const_for_fn)]

pub use kdtree::{KdTree, KdTreeConfig, TraceDesc, TraceHit};
pub use soup::{IndexedMesh, TriangleSoup};
pub use tetds::Tetrahedron;
pub use tetrahedralization::Tetrahedralization;
pub use utils::aabb::BoundingBox;
pub use utils::types::{Real, Vertex3};

pub mod intersection;
pub mod kdtree;
mod predicates;
mod soup;
mod tetds;
pub mod tetrahedralization;
mod utils;
