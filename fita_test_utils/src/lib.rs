//! utils for fita tests
#![forbid(unsafe_code)]
#![deny(unused)]
#![warn(clippy::all, clippy::missing_const_for_fn)]

use rand::{distr::Uniform, prelude::Distribution};
use rand_distr::UnitSphere;
use std::ops::RangeInclusive;

pub type Vertex3 = [f64; 3];

/// Samples `n` vertices in 3D space from the [Uniform] distribution.
///
/// If no range is specified, the unit-cube centered around the origin is used, `[-0.5, 0.5]`.
pub fn sample_vertices_3d(n: usize, range: Option<RangeInclusive<f64>>) -> Vec<Vertex3> {
    let mut rng = rand::rng();
    let range = range.unwrap_or(-0.5..=0.5);
    let uniform = Uniform::try_from(range).expect("Expected range with a greater start then end");

    let mut vertices: Vec<[f64; 3]> = Vec::with_capacity(n);
    for _ in 0..n {
        let x = uniform.sample(&mut rng);
        let y = uniform.sample(&mut rng);
        let z = uniform.sample(&mut rng);

        vertices.push([x, y, z]);
    }

    vertices
}

/// Samples `n` unit directions, i.e. points on the unit sphere.
///
/// Useful to aim rays at a mesh from all around it.
pub fn sample_directions(n: usize) -> Vec<Vertex3> {
    let mut rng = rand::rng();

    let mut directions: Vec<[f64; 3]> = Vec::with_capacity(n);
    for _ in 0..n {
        directions.push(UnitSphere.sample(&mut rng));
    }

    directions
}
