//! Stack-based closest-hit traversal.

use nalgebra::Point3;
use rayon::prelude::*;

use super::KdTree;
use crate::intersection::{
    clip_segment, segment_triangle_intersect_double_sided, segment_triangle_intersect_single_sided,
};
use crate::soup::TriangleSoup;
use crate::utils::types::Real;

/// Traversal stack capacity; ample for trees up to depth 49, and the stack
/// grows past it rather than overflow.
const MAX_TRAVERSAL_DEPTH: usize = 50;

/// Below this direction component the segment runs parallel to a split plane.
const RAY_PARALLEL_EPSILON: Real = 1e-12;

/// Plane-parallel rejection threshold handed to the double sided triangle
/// test.
const DOUBLE_SIDED_EPSILON: Real = 1e-5;

/// A closest-hit query along the segment `start -> end`.
#[derive(Debug, Clone)]
pub struct TraceDesc {
    pub start: Point3<Real>,
    pub end: Point3<Real>,
    /// Accept hits on back faces too.
    pub double_sided: bool,
    /// Stop at the first hit found, not necessarily the closest.
    pub test_only: bool,
}

/// A segment/triangle intersection reported by [`KdTree::trace_closest`].
#[derive(Debug, Clone, PartialEq)]
pub struct TraceHit {
    pub triangle_index: usize,
    /// The vertex indices of the hit triangle.
    pub indices: [u32; 3],
    /// Hit parameter in `[0, 1]` along the segment.
    pub t: Real,
    /// Barycentric coordinates of the hit within the triangle.
    pub v: Real,
    pub w: Real,
}

impl KdTree {
    /// Finds the closest triangle intersected by the segment of `trace`, or
    /// `None` on a miss.
    ///
    /// Read-only over the tree and the mesh, so it is safe to call
    /// concurrently from many threads; the traversal stack is local per call.
    pub fn trace_closest<S: TriangleSoup>(&self, trace: &TraceDesc, soup: &S) -> Option<TraceHit> {
        if self.pool().is_empty() {
            return None;
        }

        // clip the segment against the root box, rejecting early on a miss
        let bounds = self.bounds();
        let (t_enter, t_exit) =
            clip_segment(&trace.start, &trace.end, bounds.min(), bounds.max())?;
        let dir = trace.end - trace.start;

        let mut stack: Vec<(u32, Real, Real)> = Vec::with_capacity(MAX_TRAVERSAL_DEPTH);
        stack.push((self.root(), t_enter, t_exit));

        let mut best: Option<TraceHit> = None;
        let mut t_limit = t_exit;

        while let Some((mut node_id, t_min, mut t_max)) = stack.pop() {
            if best.is_some() && t_limit < t_min {
                // a hit closer than this whole subtree is already known
                continue;
            }

            // descend to a leaf, pushing the far side of every crossed plane
            loop {
                let node = self.pool().node(node_id);
                if node.is_leaf() {
                    break;
                }

                let axis = node.split_axis;
                let pos = node.split_pos;

                if dir[axis].abs() < RAY_PARALLEL_EPSILON {
                    // parallel to the split plane: stay on the origin's side
                    node_id = if trace.start[axis] <= pos {
                        node.left_child()
                    } else {
                        node.right_child()
                    };
                    continue;
                }

                let t_split = (pos - trace.start[axis]) / dir[axis];

                let below_first = trace.start[axis] < pos
                    || (trace.start[axis] == pos && dir[axis] <= 0.0);
                let (near, far) = if below_first {
                    (node.left_child(), node.right_child())
                } else {
                    (node.right_child(), node.left_child())
                };

                if t_split > t_max || t_split <= 0.0 {
                    node_id = near;
                } else if t_split < t_min {
                    node_id = far;
                } else {
                    stack.push((far, t_split, t_max));
                    node_id = near;
                    t_max = t_split;
                }
            }

            let node = self.pool().node(node_id);
            for &tri in &node.triangles {
                let a = soup.vertex(tri as usize, 0);
                let b = soup.vertex(tri as usize, 1);
                let c = soup.vertex(tri as usize, 2);

                let hit = if trace.double_sided {
                    segment_triangle_intersect_double_sided(
                        &trace.start,
                        &trace.end,
                        &a,
                        &b,
                        &c,
                        DOUBLE_SIDED_EPSILON,
                    )
                } else {
                    segment_triangle_intersect_single_sided(&trace.start, &trace.end, &a, &b, &c)
                };

                if let Some((t, v, w)) = hit {
                    if best.as_ref().map_or(true, |h| t < h.t) {
                        best = Some(TraceHit {
                            triangle_index: tri as usize,
                            indices: soup.triangle(tri as usize),
                            t,
                            v,
                            w,
                        });
                        // shrink the active range so farther subtrees are
                        // skipped outright
                        t_limit = t;

                        if trace.test_only {
                            return best;
                        }
                    }
                }
            }
        }

        best
    }

    /// Runs many independent queries across [`rayon`]'s thread pool.
    pub fn trace_closest_batch<S: TriangleSoup + Sync>(
        &self,
        traces: &[TraceDesc],
        soup: &S,
    ) -> Vec<Option<TraceHit>> {
        traces
            .par_iter()
            .map(|trace| self.trace_closest(trace, soup))
            .collect()
    }
}
