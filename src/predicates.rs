//! Geometric predicates.
//!
//! All predicates operate on double precision points and clamp the underlying
//! determinant to zero inside a small absolute tolerance band, so that callers
//! can branch on exact-zero results for the degenerate configurations
//! (coplanarity, cosphericality) the flip machinery cares about.

use nalgebra::{Matrix4, Matrix5, Point3};

use crate::utils::types::Real;

/// Tolerance band of [orient].
pub(crate) const ORIENT_EPSILON: Real = 1e-3;
/// Tolerance band of [in_sphere].
pub(crate) const IN_SPHERE_EPSILON: Real = 1e-4;
/// Signed plane distance below which a point counts as lying on a face plane.
pub(crate) const PLANE_SIDE_EPSILON: Real = 1e-4;
/// Signed plane distance above which a face is considered wrongly oriented.
pub(crate) const FACE_ORIENTATION_EPSILON: Real = 1e-1;

/// Determines whether `p` is above the plane defined by `a`, `b`, `c`
/// (`> 0`), below (`< 0`) or on the plane (`== 0`).
///
/// The test follows the left-hand rule: clockwise order = up.
pub fn orient(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>, p: &Point3<Real>) -> Real {
    let m = Matrix4::new(
        a.x, a.y, a.z, 1.0, //
        b.x, b.y, b.z, 1.0, //
        c.x, c.y, c.z, 1.0, //
        p.x, p.y, p.z, 1.0,
    );

    let det = m.determinant();
    if det < -ORIENT_EPSILON || det > ORIENT_EPSILON {
        return det;
    }
    0.0
}

/// Returns `> 0` if `p` is inside the sphere described by `a`, `b`, `c`, `d`,
/// `< 0` outside, `== 0` on the sphere.
///
/// Callers must ensure `orient(a, b, c, d) >= 0` beforehand, otherwise the
/// sign of the result is flipped.
pub fn in_sphere(
    a: &Point3<Real>,
    b: &Point3<Real>,
    c: &Point3<Real>,
    d: &Point3<Real>,
    p: &Point3<Real>,
) -> Real {
    debug_assert!(orient(a, b, c, d) >= 0.0);

    let m = Matrix5::new(
        a.x, a.y, a.z, a.coords.norm_squared(), 1.0, //
        b.x, b.y, b.z, b.coords.norm_squared(), 1.0, //
        c.x, c.y, c.z, c.coords.norm_squared(), 1.0, //
        d.x, d.y, d.z, d.coords.norm_squared(), 1.0, //
        p.x, p.y, p.z, p.coords.norm_squared(), 1.0,
    );

    let det = m.determinant();
    if det < -IN_SPHERE_EPSILON || det > IN_SPHERE_EPSILON {
        return det;
    }
    0.0
}

/// Whether 4 points are coplanar.
pub fn coplanar(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>, d: &Point3<Real>) -> bool {
    orient(a, b, c, d) == 0.0
}

pub(crate) fn triangle_area(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> Real {
    0.5 * (b - a).cross(&(c - a)).norm()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orient() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);

        // left-hand rule: (a, b, c) is counter-clockwise seen from +z,
        // so a point above the plane is reported as below
        assert!(orient(&a, &b, &c, &Point3::new(0.2, 0.2, 1.0)) < 0.0);
        assert!(orient(&a, &c, &b, &Point3::new(0.2, 0.2, 1.0)) > 0.0);
        assert_eq!(orient(&a, &b, &c, &Point3::new(0.7, 0.1, 0.0)), 0.0);
    }

    #[test]
    fn test_orient_clamps_near_coplanar() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        let p = Point3::new(0.3, 0.3, 1e-5);

        assert_eq!(orient(&a, &b, &c, &p), 0.0);
    }

    #[test]
    fn test_in_sphere() {
        // (a, b, c, d) ordered such that orient(a, b, c, d) >= 0
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(0.0, 1.0, 0.0);
        let c = Point3::new(1.0, 0.0, 0.0);
        let d = Point3::new(0.0, 0.0, 1.0);
        assert!(orient(&a, &b, &c, &d) >= 0.0);

        // circumsphere center is (0.5, 0.5, 0.5)
        assert!(in_sphere(&a, &b, &c, &d, &Point3::new(0.5, 0.5, 0.5)) > 0.0);
        assert!(in_sphere(&a, &b, &c, &d, &Point3::new(2.0, 2.0, 2.0)) < 0.0);
        assert_eq!(in_sphere(&a, &b, &c, &d, &Point3::new(1.0, 1.0, 0.0)), 0.0);
    }

    #[test]
    fn test_coplanar() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);

        assert!(coplanar(&a, &b, &c, &Point3::new(3.0, -2.0, 0.0)));
        assert!(!coplanar(&a, &b, &c, &Point3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_triangle_area() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);

        assert!((triangle_area(&a, &b, &c) - 0.5).abs() < 1e-12);
    }
}
