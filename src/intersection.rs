//! Segment / triangle intersection routines, plus the segment clipper used by
//! the kd-tree traversal.

use nalgebra::{Point3, Vector3};

use crate::utils::types::Real;

/// Slack on the segment parameter, so hits right on an endpoint still count.
const LENGTH_EPSILON: Real = 1e-4;

/// Intersects segment `p -> q` against triangle `(a, b, c)`.
///
/// Only triangles whose vertices appear in clockwise order from `p` are hit.
/// On success returns `(t, v, w)` with `t` in `[0, 1]` along the segment and
/// `(v, w)` the barycentric coordinates of the hit with respect to `b` and `c`.
pub fn segment_triangle_intersect_single_sided(
    p: &Point3<Real>,
    q: &Point3<Real>,
    a: &Point3<Real>,
    b: &Point3<Real>,
    c: &Point3<Real>,
) -> Option<(Real, Real, Real)> {
    let ab = b - a;
    let ac = c - a;
    let qp = p - q;
    let n = ab.cross(&ac);

    // test that the segment points against the triangle normal
    let d = qp.dot(&n);
    if d <= 0.0 {
        return None;
    }

    let ap = p - a;
    let t = ap.dot(&n);
    if t < 0.0 || t > d {
        return None;
    }

    // the signed tetrahedral volumes against the edges must all be positive
    let e = qp.cross(&ap);
    let v = ac.dot(&e);
    if v < 0.0 || v > d {
        return None;
    }
    let w = -ab.dot(&e);
    if w < 0.0 || v + w > d {
        return None;
    }

    let ood = 1.0 / d;
    Some((t * ood, v * ood, w * ood))
}

/// Intersects the ray `p + t * dir` against triangle `(a, b, c)`, accepting
/// hits on either side of the triangle. `t` is accepted in `[min_t, max_t]`.
pub fn ray_triangle_intersect_double_sided(
    p: &Point3<Real>,
    dir: &Vector3<Real>,
    min_t: Real,
    max_t: Real,
    a: &Point3<Real>,
    b: &Point3<Real>,
    c: &Point3<Real>,
    epsilon: Real,
) -> Option<(Real, Real, Real)> {
    let edge1 = b - a;
    let edge2 = c - a;

    let pvec = dir.cross(&edge2);
    let det = edge1.dot(&pvec);
    if det > -epsilon && det < epsilon {
        // segment parallel to the triangle plane
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = p - a;

    let v = tvec.dot(&pvec) * inv_det;
    if !(0.0..=1.0).contains(&v) {
        return None;
    }

    let qvec = tvec.cross(&edge1);
    let w = dir.dot(&qvec) * inv_det;
    if w < 0.0 || v + w > 1.0 {
        return None;
    }

    let t = edge2.dot(&qvec) * inv_det;
    if t >= min_t && t <= max_t {
        Some((t, v, w))
    } else {
        None
    }
}

/// Intersects segment `p -> q` against triangle `(a, b, c)`, accepting hits on
/// either side of the triangle.
///
/// On success returns `(t, v, w)` with `t` in `[0, 1]` along the segment.
/// `epsilon` rejects segments (nearly) parallel to the triangle plane.
pub fn segment_triangle_intersect_double_sided(
    p: &Point3<Real>,
    q: &Point3<Real>,
    a: &Point3<Real>,
    b: &Point3<Real>,
    c: &Point3<Real>,
    epsilon: Real,
) -> Option<(Real, Real, Real)> {
    let dir = q - p;
    ray_triangle_intersect_double_sided(
        p,
        &dir,
        -LENGTH_EPSILON,
        1.0 + LENGTH_EPSILON,
        a,
        b,
        c,
        epsilon,
    )
}

/// Clips segment `a -> b` against the box `[min, max]`.
///
/// Returns the surviving parametric range `(t0, t1)` within `[0, 1]`, or
/// `None` if the segment misses the box entirely.
pub(crate) fn clip_segment(
    a: &Point3<Real>,
    b: &Point3<Real>,
    min: &Point3<Real>,
    max: &Point3<Real>,
) -> Option<(Real, Real)> {
    let d = b - a;
    let mut t0: Real = 0.0;
    let mut t1: Real = 1.0;

    for axis in 0..3 {
        if d[axis].abs() < Real::EPSILON {
            // segment parallel to the slab: inside or out entirely
            if a[axis] < min[axis] || a[axis] > max[axis] {
                return None;
            }
        } else {
            let inv = 1.0 / d[axis];
            let mut t_near = (min[axis] - a[axis]) * inv;
            let mut t_far = (max[axis] - a[axis]) * inv;
            if t_near > t_far {
                core::mem::swap(&mut t_near, &mut t_far);
            }
            t0 = t0.max(t_near);
            t1 = t1.min(t_far);
            if t0 > t1 {
                return None;
            }
        }
    }

    Some((t0, t1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_sided_hit_and_cull() {
        // normal points towards +z, the side the segment comes from
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);

        let p = Point3::new(0.25, 0.25, 1.0);
        let q = Point3::new(0.25, 0.25, -1.0);

        let (t, v, w) = segment_triangle_intersect_single_sided(&p, &q, &a, &b, &c).unwrap();
        assert!((t - 0.5).abs() < 1e-12);
        assert!((v - 0.25).abs() < 1e-12);
        assert!((w - 0.25).abs() < 1e-12);

        // same segment from the other side is culled
        assert!(segment_triangle_intersect_single_sided(&q, &p, &a, &b, &c).is_none());
    }

    #[test]
    fn test_double_sided_hits_both_sides() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(0.0, 1.0, 0.0);
        let c = Point3::new(1.0, 0.0, 0.0);

        let p = Point3::new(0.25, 0.25, 1.0);
        let q = Point3::new(0.25, 0.25, -1.0);

        let (t, _, _) = segment_triangle_intersect_double_sided(&p, &q, &a, &b, &c, 1e-5).unwrap();
        assert!((t - 0.5).abs() < 1e-12);

        let (t, _, _) = segment_triangle_intersect_double_sided(&q, &p, &a, &b, &c, 1e-5).unwrap();
        assert!((t - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_double_sided_rejects_short_and_parallel() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(0.0, 1.0, 0.0);
        let c = Point3::new(1.0, 0.0, 0.0);

        // segment ends before the plane
        let p = Point3::new(0.25, 0.25, 1.0);
        let q = Point3::new(0.25, 0.25, 0.5);
        assert!(segment_triangle_intersect_double_sided(&p, &q, &a, &b, &c, 1e-5).is_none());

        // segment parallel to the plane
        let p = Point3::new(0.0, 0.0, 1.0);
        let q = Point3::new(1.0, 1.0, 1.0);
        assert!(segment_triangle_intersect_double_sided(&p, &q, &a, &b, &c, 1e-5).is_none());
    }

    #[test]
    fn test_clip_segment() {
        let min = Point3::new(0.0, 0.0, 0.0);
        let max = Point3::new(1.0, 1.0, 1.0);

        // crossing segment
        let (t0, t1) = clip_segment(
            &Point3::new(0.5, 0.5, -1.0),
            &Point3::new(0.5, 0.5, 2.0),
            &min,
            &max,
        )
        .unwrap();
        assert!((t0 - 1.0 / 3.0).abs() < 1e-12);
        assert!((t1 - 2.0 / 3.0).abs() < 1e-12);

        // fully inside
        let (t0, t1) = clip_segment(
            &Point3::new(0.2, 0.2, 0.2),
            &Point3::new(0.8, 0.8, 0.8),
            &min,
            &max,
        )
        .unwrap();
        assert_eq!((t0, t1), (0.0, 1.0));

        // miss
        assert!(clip_segment(
            &Point3::new(2.0, 2.0, -1.0),
            &Point3::new(2.0, 2.0, 2.0),
            &min,
            &max,
        )
        .is_none());
    }
}
