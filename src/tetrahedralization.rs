use anyhow::Result;
use nalgebra::Point3;
use rayon::prelude::*;

use crate::predicates::{in_sphere, orient};
use crate::tetds::{TetMesh, Tetrahedron};
use crate::utils::aabb::BoundingBox;
use crate::utils::types::{Real, TetraIdx, Tetrahedron3, Vertex3, VertexIdx};

/// A 3D Delaunay tetrahedralization built by incremental insertion and
/// bistellar flips.
///
/// ```
/// use fita::Tetrahedralization;
///
/// let points = vec![
///     [0.0, 0.0, 0.0],
///     [1.0, 0.0, 0.0],
///     [0.0, 1.0, 0.0],
///     [0.0, 0.0, 1.0],
/// ];
///
/// let mut tetrahedralization = Tetrahedralization::new(false);
/// tetrahedralization.tetrahedralize(&points).unwrap();
/// assert_eq!(tetrahedralization.num_valid_tets(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Tetrahedralization {
    mesh: TetMesh,
    vertices: Vec<Point3<Real>>,
    /// Number of caller-supplied points; the bounding tetrahedron corners
    /// appended during construction live at indices `>= num_user_points`
    num_user_points: usize,
    /// Keep the bounding tetrahedron corners (and every tetrahedron using
    /// them) in the output instead of destroying them
    keep_bounding_tetrahedron: bool,
}

/// Build a [`Tetrahedralization`] from a slice of points.
///
/// ## Example
/// ```
/// # use fita::tetrahedralize;
/// tetrahedralize!(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
/// // keeping the bounding tetrahedron corners
/// tetrahedralize!(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]], keep_bounding = true);
/// ```
#[macro_export]
macro_rules! tetrahedralize {
    ($points:expr) => {{
        let mut tetrahedralization = $crate::Tetrahedralization::new(false);
        let _ = tetrahedralization.tetrahedralize($points);
        tetrahedralization
    }};
    ($points:expr, keep_bounding = $keep:expr) => {{
        let mut tetrahedralization = $crate::Tetrahedralization::new($keep);
        let _ = tetrahedralization.tetrahedralize($points);
        tetrahedralization
    }};
}

/// Generates a regular tetrahedron wrapping the bounding sphere, appending
/// its four corners to the vertex list.
fn containing_tetrahedron(
    center: &Point3<Real>,
    radius: Real,
    vertices: &mut Vec<Point3<Real>>,
) -> Tetrahedron {
    // for a regular tetrahedron of edge length l: radius = l / sqrt(24)
    let l = radius * 24.0_f64.sqrt();

    let h1 = 30.0_f64.to_radians().tan() * l / 2.0;
    let h2 = 60.0_f64.to_radians().sin() * l - h1;
    let margin = l * 0.005;

    let p1 = Point3::new(
        center.x - l / 2.0 - margin,
        center.y + radius + margin,
        center.z - h1 - margin,
    );
    let p2 = Point3::new(
        center.x + l / 2.0 + margin,
        center.y + radius + margin,
        center.z - h1 - margin,
    );
    let p3 = Point3::new(center.x, center.y + radius + margin, center.z + h2 + margin);
    let p4 = Point3::new(center.x, center.y + radius - h1 - h2 + margin, center.z);

    let first = vertices.len() as i32;
    vertices.extend([p1, p2, p3, p4]);

    Tetrahedron {
        v: [first, first + 1, first + 2, first + 3],
        ..Default::default()
    }
}

impl Tetrahedralization {
    pub const fn new(keep_bounding_tetrahedron: bool) -> Self {
        Self {
            mesh: TetMesh::new(),
            vertices: Vec::new(),
            num_user_points: 0,
            keep_bounding_tetrahedron,
        }
    }

    /// All vertices, including the bounding tetrahedron corners at indices
    /// `>= num_user_points`.
    pub fn vertices(&self) -> &[Point3<Real>] {
        &self.vertices
    }

    /// The full tetrahedron slot array, including invalid slots; filter on
    /// [`Tetrahedron::is_valid`].
    pub fn tetrahedra(&self) -> &[Tetrahedron] {
        self.mesh.tetrahedra()
    }

    pub fn num_tets(&self) -> usize {
        self.mesh.len()
    }

    pub fn num_valid_tets(&self) -> usize {
        self.mesh.tetrahedra().iter().filter(|t| t.is_valid()).count()
    }

    pub const fn num_user_points(&self) -> usize {
        self.num_user_points
    }

    /// The valid tetrahedra as point tuples, i.e. `[[f64; 3]; 4]`.
    pub fn tets(&self) -> Vec<Tetrahedron3> {
        self.mesh
            .tetrahedra()
            .iter()
            .filter(|t| t.is_valid())
            .map(|t| {
                t.v.map(|vi| {
                    let p = &self.vertices[vi as usize];
                    [p.x, p.y, p.z]
                })
            })
            .collect()
    }

    /// Computes the Delaunay tetrahedralization of `points`.
    ///
    /// The resulting tetrahedra (including invalidated slots, which callers
    /// skip via [`Tetrahedron::is_valid`]) are available through
    /// [`Self::tetrahedra`].
    ///
    /// ## Errors
    /// Returns an error if no point is supplied, or if point location fails
    /// on a degenerate intermediate mesh; the partial output is retained.
    pub fn tetrahedralize(&mut self, points: &[Vertex3]) -> Result<()> {
        if points.is_empty() {
            return Err(anyhow::Error::msg(
                "Needs at least 1 point to compute a tetrahedralization",
            ));
        }

        self.mesh = TetMesh::new();
        self.vertices = points.iter().map(|&p| Point3::from(p)).collect();
        self.num_user_points = points.len();

        let bounds = BoundingBox::from_points(self.vertices.iter());
        let (center, mut radius) = bounds.bounding_sphere();
        // avoid a too tight bound, the containing tetrahedron's faces should
        // wrap all the points
        radius *= 2.0;
        if points.len() < 2 {
            // not enough points to define a volume, give it a fixed radius
            radius = 1.0;
        }

        log::debug!(
            "tetrahedralizing {} points, bounding sphere radius {}",
            points.len(),
            radius
        );

        let big_t = containing_tetrahedron(&center, radius, &mut self.vertices);
        let slot = self.mesh.push(big_t);
        self.mesh.tets[slot].fix_face_orientations(&self.vertices);

        for point_idx in 0..self.num_user_points {
            self.insert_one_point(point_idx)?;
        }

        if !self.keep_bounding_tetrahedron {
            // delete all tetrahedra containing one of the additional vertices
            // inserted for the containing tetrahedron
            for i in 0..self.mesh.len() {
                let t = &self.mesh.tets[i];
                if t.is_valid() && t.v.iter().any(|&v| v as usize >= self.num_user_points) {
                    self.mesh.destroy(i);
                }
            }
        }

        log::debug!(
            "tetrahedralization finished: {} valid tetrahedra in {} slots",
            self.num_valid_tets(),
            self.num_tets()
        );

        Ok(())
    }

    /// Locates the tetrahedron containing point `point_idx`, splits it with a
    /// 1->4 flip and restores the local Delaunay property by draining a stack
    /// of interfaces to repair.
    fn insert_one_point(&mut self, point_idx: VertexIdx) -> Result<()> {
        let p = self.vertices[point_idx];

        let Some(t) = self.mesh.walk(&p, 0, &self.vertices) else {
            log::error!("Point location failed for vertex {point_idx}");
            return Err(anyhow::Error::msg(format!(
                "No tetrahedron contains point {point_idx}"
            )));
        };

        // re-inserting an existing vertex would degenerate the mesh
        if self.mesh.tets[t]
            .v
            .iter()
            .any(|&vi| self.vertices[vi as usize] == p)
        {
            log::debug!("Skipping duplicate vertex {point_idx}");
            return Ok(());
        }

        let results = self.mesh.flip14(point_idx as i32, t, &self.vertices)?;

        let mut stack: Vec<TetraIdx> = results.to_vec();
        while let Some(i_t) = stack.pop() {
            // t = { a, b, c, p }
            let t = self.mesh.tets[i_t];
            if !t.is_valid() {
                // might have been invalidated by another flip
                continue;
            }

            // find the face opposite the inserted point
            let Some(face) = (0..4).find(|&f| t.vertex_outside_face(f) == point_idx as i32) else {
                continue;
            };

            // get the adjacent tetrahedron having a, b, c as a facet
            let i_ta = t.neighbors[face];
            if i_ta < 0 {
                continue;
            }
            let ta = self.mesh.tets[i_ta as usize];

            let [a, b, c] = t.face_vertices(face);
            let Some(shared_face) = ta.face_from_vertices(a, c, b) else {
                continue;
            };
            // the opposed vertex can equal point_idx in a degenerate case
            // where both tetrahedra cover the same space; the flip machinery
            // resolves it through further (flat) flips
            let opposed_vertex = ta.vertex_outside_face(shared_face);
            let p_d = self.vertices[opposed_vertex as usize];

            // flip if d lies inside the circumsphere of t, probing both
            // vertex orders so the in-sphere orientation precondition holds
            let t0 = self.vertices[t.v[0] as usize];
            let t1 = self.vertices[t.v[2] as usize];
            let t2 = self.vertices[t.v[1] as usize];
            let t3 = self.vertices[t.v[3] as usize];

            let do_flip = t.is_flat(&self.vertices) // a flat tetrahedron is never valid, always flip
                || (orient(&t0, &t1, &t2, &t3) >= 0.0 && in_sphere(&t0, &t1, &t2, &t3, &p_d) > 0.0)
                || (orient(&t0, &t2, &t1, &t3) >= 0.0 && in_sphere(&t0, &t2, &t1, &t3, &p_d) > 0.0);

            if do_flip {
                self.mesh
                    .flip(i_t, i_ta as usize, point_idx as i32, &self.vertices, &mut stack)?;
            }
        }

        Ok(())
    }

    /// Checks the empty-sphere property: no user point may lie strictly
    /// inside the circumsphere of any valid tetrahedron. Flat tetrahedra
    /// count as violations, since they have no circumsphere at all.
    ///
    /// Returns whether the tetrahedralization is Delaunay, along with the
    /// fraction of unviolated tetrahedra.
    pub fn is_delaunay(&self) -> (bool, f64) {
        let mut num_valid = 0usize;
        let mut num_violated = 0usize;

        for t in self.mesh.tetrahedra() {
            if !t.is_valid() {
                continue;
            }
            num_valid += 1;
            if self.is_tet_violated(t) {
                log::error!("Non Delaunay tetrahedron: {t}");
                num_violated += 1;
            }
        }

        if num_valid == 0 {
            return (true, 1.0);
        }
        (
            num_violated == 0,
            1.0 - num_violated as f64 / num_valid as f64,
        )
    }

    /// [`Self::is_delaunay`] in parallel using [`rayon`]. Returns the
    /// fraction of unviolated tetrahedra.
    #[must_use]
    pub fn par_is_delaunay(&self) -> f64 {
        let valid: Vec<&Tetrahedron> = self
            .mesh
            .tetrahedra()
            .iter()
            .filter(|t| t.is_valid())
            .collect();
        if valid.is_empty() {
            return 1.0;
        }

        let num_violated = valid
            .par_iter()
            .filter(|t| self.is_tet_violated(t))
            .count();

        1.0 - num_violated as f64 / valid.len() as f64
    }

    fn is_tet_violated(&self, t: &Tetrahedron) -> bool {
        if t.is_flat(&self.vertices) {
            return true;
        }

        // order the tetrahedron vertices so the in-sphere base plane holds
        // its orientation precondition
        let mut a = self.vertices[t.v[0] as usize];
        let mut b = self.vertices[t.v[2] as usize];
        let c = self.vertices[t.v[1] as usize];
        let d = self.vertices[t.v[3] as usize];
        if orient(&a, &b, &c, &d) < 0.0 {
            core::mem::swap(&mut a, &mut b);
        }

        for v_idx in 0..self.num_user_points {
            if t.contains_vertex(v_idx as i32) {
                continue;
            }
            if in_sphere(&a, &b, &c, &d, &self.vertices[v_idx]) > 0.0 {
                return true;
            }
        }
        false
    }

    /// Checks soundness of the tetrahedral graph: every valid tetrahedron
    /// must have four distinct vertices and every neighbor link must be
    /// mutual across a shared face with opposing windings.
    pub fn is_sound(&self) -> bool {
        for (i, t) in self.mesh.tetrahedra().iter().enumerate() {
            if !t.is_valid() {
                continue;
            }
            let mut v = t.v;
            v.sort_unstable();
            if v.windows(2).any(|w| w[0] == w[1]) {
                log::error!("Tetrahedron {t} at slot {i} has repeated vertices");
                return false;
            }
            if !self.mesh.check_neighbors(i, &self.vertices) {
                log::error!("Tetrahedralization is not sound at slot {i}");
                return false;
            }
        }
        true
    }
}

impl std::fmt::Display for Tetrahedralization {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Tetrahedralization with {} vertices and {} tets",
            self.vertices.len(),
            self.mesh.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fita_test_utils::sample_vertices_3d;

    fn verify_tetrahedralization(tetrahedralization: &Tetrahedralization) {
        let (delaunay, regularity) = tetrahedralization.is_delaunay();
        assert!(delaunay, "regularity {regularity} < 1.0");
        assert!(tetrahedralization.is_sound());
    }

    #[test]
    fn test_single_tetrahedron() {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];

        let tetrahedralization = tetrahedralize!(&points);
        assert_eq!(tetrahedralization.num_valid_tets(), 1);

        let t = tetrahedralization
            .tetrahedra()
            .iter()
            .find(|t| t.is_valid())
            .unwrap();
        for vi in 0..4 {
            assert!(t.contains_vertex(vi));
        }

        verify_tetrahedralization(&tetrahedralization);
    }

    #[test]
    fn test_single_point() {
        // a single point spans no volume, but must not fail either
        let mut tetrahedralization = Tetrahedralization::new(false);
        tetrahedralization.tetrahedralize(&[[0.5, 0.5, 0.5]]).unwrap();
        assert_eq!(tetrahedralization.num_valid_tets(), 0);
    }

    #[test]
    fn test_empty_input_fails() {
        let mut tetrahedralization = Tetrahedralization::new(false);
        assert!(tetrahedralization.tetrahedralize(&[]).is_err());
    }

    #[test]
    fn test_keep_bounding_tetrahedron() {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];

        let tetrahedralization = tetrahedralize!(&points, keep_bounding = true);

        // the corner vertices survive, and so do the tetrahedra using them
        assert_eq!(tetrahedralization.vertices().len(), 8);
        assert!(tetrahedralization
            .tetrahedra()
            .iter()
            .filter(|t| t.is_valid())
            .any(|t| t.v.iter().any(|&v| v >= 4)));
        assert!(tetrahedralization.num_valid_tets() > 1);
    }

    #[test]
    fn test_cube_corners() {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
        ];

        let mut tetrahedralization = Tetrahedralization::new(false);
        tetrahedralization.tetrahedralize(&points).unwrap();

        // the cube tetrahedralizes into 5 or 6 tetrahedra depending on how
        // the cospherical ties break
        let num_valid = tetrahedralization.num_valid_tets();
        assert!(
            (5..=6).contains(&num_valid),
            "Expected 5 or 6 tetrahedra, got {num_valid}"
        );

        verify_tetrahedralization(&tetrahedralization);
    }

    #[test]
    fn test_cospherical_points() {
        // four points on the unit circle plus the north pole; construction
        // must survive the degeneracy
        let points = vec![
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];

        let mut tetrahedralization = Tetrahedralization::new(false);
        tetrahedralization.tetrahedralize(&points).unwrap();

        assert!(tetrahedralization.num_valid_tets() >= 1);
        verify_tetrahedralization(&tetrahedralization);
    }

    #[test]
    fn test_point_on_face() {
        // the fifth point sits right on an edge of the first tetrahedron's
        // base face, driving the flat-tetrahedron repair path
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.5, 0.5, 0.0],
        ];

        let mut tetrahedralization = Tetrahedralization::new(false);
        tetrahedralization.tetrahedralize(&points).unwrap();

        assert!(tetrahedralization.num_valid_tets() >= 2);
        verify_tetrahedralization(&tetrahedralization);
    }

    #[test]
    fn test_duplicate_point_is_skipped() {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0], // duplicate of the second point
        ];

        let mut tetrahedralization = Tetrahedralization::new(false);
        tetrahedralization.tetrahedralize(&points).unwrap();

        assert_eq!(tetrahedralization.num_valid_tets(), 1);
        verify_tetrahedralization(&tetrahedralization);
    }

    #[test]
    fn test_delaunay_3d() {
        for n in [4, 5, 10, 50] {
            let points = sample_vertices_3d(n, Some(-5.0..=5.0));

            let mut tetrahedralization = Tetrahedralization::new(false);
            let result = tetrahedralization.tetrahedralize(&points);

            match result {
                Ok(_) => (),
                Err(e) => {
                    log::error!("Error: {}", e);
                }
            }

            verify_tetrahedralization(&tetrahedralization);
        }
    }

    #[test]
    fn test_parallel_regularity_matches() {
        let points = sample_vertices_3d(50, Some(-5.0..=5.0));

        let mut tetrahedralization = Tetrahedralization::new(false);
        tetrahedralization.tetrahedralize(&points).unwrap();

        let (_, regularity) = tetrahedralization.is_delaunay();
        assert_eq!(tetrahedralization.par_is_delaunay(), regularity);
    }

    #[test]
    fn test_tets_dump() {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];

        let tetrahedralization = tetrahedralize!(&points);
        let tets = tetrahedralization.tets();
        assert_eq!(tets.len(), 1);

        let mut corners: Vec<Vertex3> = tets[0].to_vec();
        corners.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(
            corners,
            vec![
                [0.0, 0.0, 0.0],
                [0.0, 0.0, 1.0],
                [0.0, 1.0, 0.0],
                [1.0, 0.0, 0.0],
            ]
        );
    }
}
