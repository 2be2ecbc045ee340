//! The tetrahedron record and its face-table topology operations.

use anyhow::Result;
use nalgebra::Point3;

use crate::predicates::{
    coplanar, orient, triangle_area, FACE_ORIENTATION_EPSILON, PLANE_SIDE_EPSILON,
};
use crate::utils::types::Real;

/// Slot value marking "no vertex" / "no neighbor".
pub(crate) const INVALID: i32 = -1;

/// The face table every tetrahedron starts out with. Individual rows may be
/// reversed in place by [`Tetrahedron::fix_face_orientations`] so that each
/// face winds outward.
const CANONICAL_FACES: [[usize; 3]; 4] = [[0, 1, 2], [0, 3, 1], [1, 3, 2], [2, 3, 0]];

/// A tetrahedron within a [`TetMesh`](super::mesh::TetMesh).
///
/// `v` holds four indices into the vertex list, `neighbors[f]` the index of
/// the tetrahedron sharing face `f` and `face[f]` the positions into `v`
/// spanning face `f`, wound so the face normal points away from the opposite
/// vertex. A `v[i] < 0` marks the whole slot as invalid; invalid slots stay
/// in place so that surviving neighbor indices remain stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tetrahedron {
    pub(crate) v: [i32; 4],
    pub(crate) neighbors: [i32; 4],
    pub(crate) face: [[usize; 3]; 4],
}

impl Default for Tetrahedron {
    fn default() -> Self {
        Self {
            v: [INVALID; 4],
            neighbors: [INVALID; 4],
            face: CANONICAL_FACES,
        }
    }
}

impl Tetrahedron {
    pub fn is_valid(&self) -> bool {
        self.v.iter().all(|&v| v >= 0)
    }

    pub fn contains_vertex(&self, vert: i32) -> bool {
        self.v.contains(&vert)
    }

    /// The vertex indices of face `f`, in the face's winding order.
    pub fn face_vertices(&self, f: usize) -> [i32; 3] {
        [
            self.v[self.face[f][0]],
            self.v[self.face[f][1]],
            self.v[self.face[f][2]],
        ]
    }

    /// Resets the slot to the invalid state.
    pub(crate) fn mark_invalid(&mut self) {
        self.v = [INVALID; 4];
        self.neighbors = [INVALID; 4];
        self.face = CANONICAL_FACES;
    }

    /// The face spanned by the (unordered) vertex set `{a, b, c}`, if any.
    pub(crate) fn face_from_vertices(&self, a: i32, b: i32, c: i32) -> Option<usize> {
        for i in 0..4 {
            let mut check = 0u8;
            for j in 0..3 {
                let v = self.v[self.face[i][j]];
                if v == a || v == b || v == c {
                    check |= 1 << j;
                }
            }
            if check == 0b111 {
                return Some(i);
            }
        }
        None
    }

    /// Like [`Self::face_from_vertices`] for lookups the topology guarantees
    /// to succeed.
    pub(crate) fn require_face(&self, a: i32, b: i32, c: i32) -> Result<usize> {
        self.face_from_vertices(a, b, c).ok_or_else(|| {
            anyhow::Error::msg(format!("No face ({a}, {b}, {c}) in tetrahedron {self}"))
        })
    }

    /// The one vertex not incident to face `f`.
    pub(crate) fn vertex_outside_face(&self, f: usize) -> i32 {
        let mut check = 0u8;
        for j in 0..3 {
            check |= 1 << self.face[f][j];
        }
        match check {
            0b1110 => self.v[0],
            0b1101 => self.v[1],
            0b1011 => self.v[2],
            0b0111 => self.v[3],
            _ => INVALID,
        }
    }

    /// Finds a face of `self` spanning the same vertex set as a face of
    /// `other`.
    ///
    /// With `reversed` the windings must oppose (tetrahedra adjacent across a
    /// conventional interface); without it they must match (tetrahedra
    /// overlapping the same space, as transients do during a 3->2 flip).
    /// Returns the face index within `self`.
    pub(crate) fn shared_face(&self, other: &Tetrahedron, reversed: bool) -> Option<usize> {
        for i in 0..4 {
            let verts = other.face_vertices(i);
            if let Some(face) = self.face_from_vertices(verts[0], verts[2], verts[1]) {
                let own_verts = self.face_vertices(face);
                let same = same_winding(&verts, &own_verts);
                if reversed == same {
                    continue;
                }
                return Some(face);
            }
        }
        None
    }

    pub(crate) fn require_shared_face(&self, other: &Tetrahedron, reversed: bool) -> Result<usize> {
        self.shared_face(other, reversed)
            .ok_or_else(|| anyhow::Error::msg("Tetrahedra share no face"))
    }

    pub(crate) fn adjacent_to(&self, other: &Tetrahedron) -> bool {
        self.shared_face(other, true).is_some()
    }

    pub(crate) fn reverse_face(&mut self, f: usize) {
        self.face[f].swap(0, 2);
    }

    /// The area of face `f` by its canonical vertex triple; the current
    /// winding in `face` does not matter for areas.
    pub(crate) fn face_area(&self, f: usize, vertices: &[Point3<Real>]) -> Real {
        let [i, j, k] = CANONICAL_FACES[f];
        triangle_area(
            &vertices[self.v[i] as usize],
            &vertices[self.v[j] as usize],
            &vertices[self.v[k] as usize],
        )
    }

    /// A tetrahedron is flat if its 4 vertices lie in the same plane.
    /// A flat tetrahedron has no circumsphere.
    pub(crate) fn is_flat(&self, vertices: &[Point3<Real>]) -> bool {
        coplanar(
            &vertices[self.v[0] as usize],
            &vertices[self.v[1] as usize],
            &vertices[self.v[2] as usize],
            &vertices[self.v[3] as usize],
        )
    }

    /// The area-weighted incenter. Unlike the centroid it stays well clear of
    /// the faces in thin tetrahedra, which keeps the orientation test stable.
    fn incenter(&self, vertices: &[Point3<Real>]) -> Point3<Real> {
        // each vertex weighted by the area of its opposite face
        let weights = [
            self.face_area(2, vertices),
            self.face_area(3, vertices),
            self.face_area(1, vertices),
            self.face_area(0, vertices),
        ];
        let total: Real = weights.iter().sum();

        let mut c = nalgebra::Vector3::zeros();
        for i in 0..4 {
            c += vertices[self.v[i] as usize].coords * (weights[i] / total);
        }
        Point3::from(c)
    }

    /// Reverses any face whose normal points at the interior reference point,
    /// so that every face winds outward. A no-op on flat tetrahedra, where
    /// there is no interior to test against.
    pub(crate) fn fix_face_orientations(&mut self, vertices: &[Point3<Real>]) {
        if self.is_flat(vertices) {
            return;
        }
        let c = self.incenter(vertices);

        for f in 0..4 {
            let [a, b, cc] = self.face_vertices(f);
            let va = &vertices[a as usize];
            let vb = &vertices[b as usize];
            let vc = &vertices[cc as usize];

            let normal = (vc - va).cross(&(vb - va)).normalize();
            let d = normal.dot(&va.coords);
            let dist_to_plane = normal.dot(&c.coords) - d;
            if dist_to_plane > FACE_ORIENTATION_EPSILON {
                // the reference point must be behind the plane
                self.reverse_face(f);
            }
        }
    }

    /// Whether the interior reference point lies behind every face.
    pub(crate) fn check_face_orientations(&self, vertices: &[Point3<Real>]) -> bool {
        if self.is_flat(vertices) {
            return true;
        }
        let c = self.incenter(vertices);

        for f in 0..4 {
            let [a, b, cc] = self.face_vertices(f);
            if orient(
                &vertices[a as usize],
                &vertices[b as usize],
                &vertices[cc as usize],
                &c,
            ) > 0.0
            {
                return false;
            }
        }
        true
    }

    /// Whether `p` lies on or behind every face plane. A flat tetrahedron
    /// never contains any point.
    pub(crate) fn contains_point(&self, p: &Point3<Real>, vertices: &[Point3<Real>]) -> bool {
        if self.is_flat(vertices) {
            return false;
        }

        for f in 0..4 {
            let [a, b, c] = self.face_vertices(f);
            let va = &vertices[a as usize];
            let vb = &vertices[b as usize];
            let vc = &vertices[c as usize];

            let n = (vc - va).cross(&(vb - va)).normalize();
            let d = n.dot(&va.coords);
            let dist_to_plane = n.dot(&p.coords) - d;
            if dist_to_plane > PLANE_SIDE_EPSILON {
                return false;
            }
        }
        true
    }

    /// Whether `face` of `self` and `other_face` of `other` have normals
    /// pointing in the same direction.
    pub(crate) fn same_orientation(
        &self,
        face: usize,
        other: &Tetrahedron,
        other_face: usize,
        vertices: &[Point3<Real>],
    ) -> bool {
        let [a1, b1, c1] = self.face_vertices(face);
        let [a2, b2, c2] = other.face_vertices(other_face);

        let n1 = (&vertices[b1 as usize] - &vertices[a1 as usize])
            .cross(&(&vertices[c1 as usize] - &vertices[a1 as usize]));
        let n2 = (&vertices[b2 as usize] - &vertices[a2 as usize])
            .cross(&(&vertices[c2 as usize] - &vertices[a2 as usize]));
        n1.dot(&n2) > 0.0
    }
}

/// Whether `v2` is a cyclic rotation of `v1` (and not a reflection). Lets us
/// compare the winding of two faces sharing a vertex set without computing
/// normals.
pub(crate) fn same_winding(v1: &[i32; 3], v2: &[i32; 3]) -> bool {
    let Some(mut offset2) = v2.iter().position(|&v| v == v1[0]) else {
        // sequences are not even the same
        return false;
    };
    for offset1 in 1..3 {
        offset2 = (offset2 + 1) % 3;
        if v1[offset1] != v2[offset2] {
            return false;
        }
    }
    true
}

impl std::fmt::Display for Tetrahedron {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.v[0], self.v[1], self.v[2], self.v[3]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_tetrahedron() -> (Tetrahedron, Vec<Point3<Real>>) {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let t = Tetrahedron {
            v: [0, 1, 2, 3],
            ..Default::default()
        };
        (t, vertices)
    }

    #[test]
    fn test_validity() {
        let (t, _) = unit_tetrahedron();
        assert!(t.is_valid());
        assert!(!Tetrahedron::default().is_valid());

        let mut t = t;
        t.mark_invalid();
        assert!(!t.is_valid());
        assert_eq!(t.face, CANONICAL_FACES);
    }

    #[test]
    fn test_face_lookups() {
        let (t, _) = unit_tetrahedron();

        assert_eq!(t.face_vertices(0), [0, 1, 2]);
        assert_eq!(t.face_from_vertices(2, 0, 1), Some(0));
        assert_eq!(t.face_from_vertices(1, 3, 2), Some(2));
        assert_eq!(t.face_from_vertices(0, 1, 9), None);

        for f in 0..4 {
            let outside = t.vertex_outside_face(f);
            assert!(!t.face_vertices(f).contains(&outside));
        }
    }

    #[test]
    fn test_same_winding() {
        assert!(same_winding(&[0, 1, 2], &[1, 2, 0]));
        assert!(same_winding(&[0, 1, 2], &[2, 0, 1]));
        assert!(!same_winding(&[0, 1, 2], &[2, 1, 0]));
        assert!(!same_winding(&[0, 1, 2], &[3, 4, 5]));
    }

    #[test]
    fn test_shared_face() {
        let (t, _) = unit_tetrahedron();
        // shares face {1, 2, 3} with t, declared in reverse winding:
        // t's face 2 winds (1, 3, 2), other's face 0 winds (1, 2, 3)
        let other = Tetrahedron {
            v: [1, 2, 3, 4],
            ..Default::default()
        };

        let f = t.shared_face(&other, true);
        assert!(f.is_some());
        assert_eq!(t.face_from_vertices(1, 2, 3), f);
        assert!(t.adjacent_to(&other));

        // the same-winding variant must not match across this interface
        assert_eq!(t.shared_face(&other, false), None);
    }

    #[test]
    fn test_fix_face_orientations_is_idempotent() {
        let (mut t, vertices) = unit_tetrahedron();
        t.fix_face_orientations(&vertices);
        assert!(t.check_face_orientations(&vertices));

        let fixed = t;
        t.fix_face_orientations(&vertices);
        assert_eq!(t, fixed);
    }

    #[test]
    fn test_contains_point() {
        let (mut t, vertices) = unit_tetrahedron();
        t.fix_face_orientations(&vertices);

        assert!(t.contains_point(&Point3::new(0.2, 0.2, 0.2), &vertices));
        // on a face
        assert!(t.contains_point(&Point3::new(0.2, 0.2, 0.0), &vertices));
        assert!(!t.contains_point(&Point3::new(1.0, 1.0, 1.0), &vertices));
    }

    #[test]
    fn test_flat_tetrahedron() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let t = Tetrahedron {
            v: [0, 1, 2, 3],
            ..Default::default()
        };

        assert!(t.is_flat(&vertices));
        assert!(!t.contains_point(&Point3::new(0.5, 0.5, 0.0), &vertices));
    }
}
