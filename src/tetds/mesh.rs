//! The growing tetrahedron slot array and the point-location walk.

use nalgebra::Point3;

use super::tetrahedron::Tetrahedron;
use crate::predicates::orient;
use crate::utils::types::{Real, TetraIdx};

/// A dense array of tetrahedra with stable indices.
///
/// Slots are never removed: destroyed tetrahedra are marked invalid in place
/// so that every surviving neighbor index stays valid across flips. Consumers
/// filter on [`Tetrahedron::is_valid`].
#[derive(Debug, Default)]
pub struct TetMesh {
    pub(crate) tets: Vec<Tetrahedron>,
}

impl TetMesh {
    pub const fn new() -> Self {
        Self { tets: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.tets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tets.is_empty()
    }

    pub fn tetrahedra(&self) -> &[Tetrahedron] {
        &self.tets
    }

    pub(crate) fn push(&mut self, t: Tetrahedron) -> TetraIdx {
        self.tets.push(t);
        self.tets.len() - 1
    }

    /// Appends an invalid slot and returns its index.
    pub(crate) fn append_slot(&mut self) -> TetraIdx {
        self.push(Tetrahedron::default())
    }

    /// Unlinks every live neighbor's back-pointer to `idx`, then marks the
    /// slot invalid.
    pub(crate) fn destroy(&mut self, idx: TetraIdx) {
        let t = self.tets[idx];
        for f in 0..4 {
            let n_idx = t.neighbors[f];
            if n_idx >= 0 {
                let n = &self.tets[n_idx as usize];
                if !n.is_valid() {
                    continue;
                }
                if let Some(sf) = n.shared_face(&t, true) {
                    self.tets[n_idx as usize].neighbors[sf] = -1;
                }
            }
        }

        self.tets[idx].mark_invalid();
    }

    /// Given a tetrahedron and a face, ensures the potential adjacent
    /// tetrahedron sharing that face points back to the given tetrahedron.
    pub(crate) fn adjust_neighbor_vicinity(&mut self, i_t: TetraIdx, f: usize) {
        let t = self.tets[i_t];
        debug_assert!(t.is_valid());

        let n_idx = t.neighbors[f];
        if n_idx >= 0 {
            let [a, b, c] = t.face_vertices(f);
            let n = &self.tets[n_idx as usize];
            if n.is_valid() {
                // the neighbor sees the face in reverse order
                if let Some(sf) = n.face_from_vertices(a, c, b) {
                    self.tets[n_idx as usize].neighbors[sf] = i_t as i32;
                }
            }
        }
    }

    /// Whether every neighbor link of `idx` is mutual and crosses a shared
    /// face with opposing windings.
    pub(crate) fn check_neighbors(&self, idx: TetraIdx, vertices: &[Point3<Real>]) -> bool {
        let t = &self.tets[idx];
        for f in 0..4 {
            if t.neighbors[f] >= 0 {
                let neighbor = &self.tets[t.neighbors[f] as usize];
                if !neighbor.is_valid() {
                    return false;
                }

                let Some(sf) = neighbor.shared_face(t, true) else {
                    return false;
                };

                // the interface faces must wind in opposite directions
                if t.same_orientation(f, neighbor, sf, vertices) {
                    return false;
                }

                if neighbor.neighbors[sf] != idx as i32 {
                    return false;
                }
            }
        }
        true
    }

    /// Returns the index of the tetrahedron containing `p`, or `None` if no
    /// tetrahedron contains it.
    ///
    /// Walks from `source_t` towards `p`, stepping through the face the point
    /// lies in front of. Dead ends (possible on meshes with transient
    /// inconsistencies) restart the walk from an arbitrary unvisited slot.
    pub(crate) fn walk(
        &self,
        p: &Point3<Real>,
        source_t: TetraIdx,
        vertices: &[Point3<Real>],
    ) -> Option<TetraIdx> {
        if source_t >= self.tets.len() {
            return None;
        }

        let mut visited = vec![false; self.tets.len()];
        let mut t = source_t;

        loop {
            let tetrahedron = &self.tets[t];
            visited[t] = true;
            let mut step = false;

            if tetrahedron.is_valid() {
                if tetrahedron.contains_point(p, vertices) {
                    return Some(t);
                }

                // pick an adjacent neighbor such that p lies on the positive
                // side of their shared face
                for f in 0..4 {
                    let n = tetrahedron.neighbors[f];
                    if n >= 0 && !visited[n as usize] {
                        let [a, b, c] = tetrahedron.face_vertices(f);
                        if orient(
                            &vertices[a as usize],
                            &vertices[b as usize],
                            &vertices[c as usize],
                            p,
                        ) > 0.0
                        {
                            t = n as usize;
                            step = true;
                            break;
                        }
                    }
                }
            }

            if !step {
                // dead end: retry from another source tetrahedron
                match visited.iter().position(|&v| !v) {
                    Some(unvisited) => t = unvisited,
                    None => return None,
                }
            }
        }
    }
}
