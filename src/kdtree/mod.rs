//! An SAH kd-tree over a triangle soup, answering closest-hit segment
//! queries.

mod pool;
mod trace;

pub use trace::{TraceDesc, TraceHit};

use anyhow::Result;
use nalgebra::{Point3, Vector3};

use crate::soup::TriangleSoup;
use crate::utils::aabb::BoundingBox;
use crate::utils::types::Real;
use pool::NodePool;

/// Build-time tuning knobs of the [`KdTree`].
#[derive(Debug, Clone)]
pub struct KdTreeConfig {
    /// Cost of traversing an internal node.
    pub cost_traverse: Real,
    /// Cost of intersecting a triangle.
    pub cost_intersect: Real,
    /// Fractional discount on splits that cut off empty space.
    pub empty_bonus: Real,
    /// Recursion stops at this depth.
    pub max_depth: usize,
    /// Recursion stops once a node holds this many triangles or fewer.
    pub max_tris_per_leaf: usize,
    /// Below this triangle count splits are chosen by surface-area heuristic,
    /// above it by the cheaper centroid median.
    pub heuristic_switch_threshold: usize,
}

impl Default for KdTreeConfig {
    fn default() -> Self {
        Self {
            cost_traverse: 1.0,
            cost_intersect: 80.0,
            empty_bonus: 0.2,
            max_depth: 30,
            max_tris_per_leaf: 8,
            heuristic_switch_threshold: 512,
        }
    }
}

/// Per-triangle data precomputed once before the build recursion.
struct TriangleBounds {
    bounds: BoundingBox,
    centroid: Point3<Real>,
}

/// A kd-tree over the triangles of a [`TriangleSoup`].
///
/// Construction is single-threaded; once built the tree is immutable and
/// [`KdTree::trace_closest`] is safe to call from many threads at once.
///
/// ```
/// use fita::{IndexedMesh, KdTree, KdTreeConfig, TraceDesc};
/// use nalgebra::Point3;
///
/// let mesh = IndexedMesh::new(
///     vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
///     vec![0, 1, 2],
/// )
/// .unwrap();
/// let tree = KdTree::build(&mesh, KdTreeConfig::default()).unwrap();
///
/// let trace = TraceDesc {
///     start: Point3::new(0.25, 0.25, 1.0),
///     end: Point3::new(0.25, 0.25, -1.0),
///     double_sided: true,
///     test_only: false,
/// };
/// let hit = tree.trace_closest(&trace, &mesh).unwrap();
/// assert_eq!(hit.triangle_index, 0);
/// ```
#[derive(Debug)]
pub struct KdTree {
    pool: NodePool,
    root: u32,
    bounds: BoundingBox,
}

impl KdTree {
    /// Builds the tree over every triangle of `soup`.
    ///
    /// ## Errors
    /// Returns an error if the soup contains no triangles.
    pub fn build<S: TriangleSoup>(soup: &S, config: KdTreeConfig) -> Result<Self> {
        let num_triangles = soup.num_triangles();
        if num_triangles == 0 {
            return Err(anyhow::Error::msg("Cannot build a kd-tree over zero triangles"));
        }

        let mut bounds = BoundingBox::new();
        let mut triangle_bounds = Vec::with_capacity(num_triangles);
        for t in 0..num_triangles {
            let mut tb = BoundingBox::new();
            let mut centroid = Vector3::zeros();
            for corner in 0..3 {
                let v = soup.vertex(t, corner);
                tb.expand(&v);
                centroid += v.coords;
            }
            bounds.expand_box(&tb);
            triangle_bounds.push(TriangleBounds {
                bounds: tb,
                centroid: Point3::from(centroid / 3.0),
            });
        }

        let mut pool = NodePool::new();
        let root = pool.create_node();
        build_r(
            &mut pool,
            root,
            (0..num_triangles as u32).collect(),
            0,
            &bounds,
            &triangle_bounds,
            &config,
        );

        log::debug!(
            "kd-tree built: {} nodes over {} triangles",
            pool.len(),
            num_triangles
        );

        Ok(Self { pool, root, bounds })
    }

    /// [`KdTree::build`] with explicit leaf criteria and default costs.
    pub fn build_with_limits<S: TriangleSoup>(
        soup: &S,
        max_depth: usize,
        max_tris_per_leaf: usize,
    ) -> Result<Self> {
        Self::build(
            soup,
            KdTreeConfig {
                max_depth,
                max_tris_per_leaf,
                ..Default::default()
            },
        )
    }

    /// The root bounding box enclosing every triangle.
    pub const fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Tears the tree down, releasing all node memory at once. Subsequent
    /// traces report no hit.
    pub fn release(&mut self) {
        self.pool.free_all();
    }

    pub(crate) const fn pool(&self) -> &NodePool {
        &self.pool
    }

    pub(crate) const fn root(&self) -> u32 {
        self.root
    }
}

fn build_r(
    pool: &mut NodePool,
    node: u32,
    triangle_indices: Vec<u32>,
    depth: usize,
    bounds: &BoundingBox,
    triangle_bounds: &[TriangleBounds],
    config: &KdTreeConfig,
) {
    if depth >= config.max_depth || triangle_indices.len() <= config.max_tris_per_leaf {
        pool.node_mut(node).triangles = triangle_indices;
        return;
    }

    let axis = bounds.longest_axis();
    let split = if triangle_indices.len() < config.heuristic_switch_threshold {
        find_splitter_sah(triangle_bounds, &triangle_indices, axis, bounds, config)
    } else {
        find_splitter_median(triangle_bounds, &triangle_indices, axis)
    };

    let Some(split_pos) = split else {
        // no split is worth it, store the triangles as a leaf
        pool.node_mut(node).triangles = triangle_indices;
        return;
    };

    // triangles straddling the plane land on both sides
    let mut left_triangles = Vec::new();
    let mut right_triangles = Vec::new();
    for &t in &triangle_indices {
        let tb = &triangle_bounds[t as usize].bounds;
        if tb.min()[axis] <= split_pos {
            left_triangles.push(t);
        }
        if tb.max()[axis] >= split_pos {
            right_triangles.push(t);
        }
    }

    if left_triangles.len() == triangle_indices.len()
        && right_triangles.len() == triangle_indices.len()
    {
        // every triangle straddles the plane, splitting cannot make progress
        pool.node_mut(node).triangles = triangle_indices;
        return;
    }

    let children = pool.alloc_children();
    {
        let n = pool.node_mut(node);
        n.split_axis = axis;
        n.split_pos = split_pos;
        n.children = children as i32;
    }

    let (left_bounds, right_bounds) = bounds.split_at(axis, split_pos);
    build_r(
        pool,
        children,
        left_triangles,
        depth + 1,
        &left_bounds,
        triangle_bounds,
        config,
    );
    build_r(
        pool,
        children + 1,
        right_triangles,
        depth + 1,
        &right_bounds,
        triangle_bounds,
        config,
    );
}

/// Picks the cheapest split plane among the triangle AABB boundaries along
/// `axis` under the surface-area heuristic, or `None` when keeping the node a
/// leaf is cheaper.
fn find_splitter_sah(
    triangle_bounds: &[TriangleBounds],
    triangle_indices: &[u32],
    axis: usize,
    node_bounds: &BoundingBox,
    config: &KdTreeConfig,
) -> Option<Real> {
    let total_area = node_bounds.surface_area();
    if total_area <= 0.0 {
        return None;
    }
    let inv_total_area = 1.0 / total_area;
    let num_triangles = triangle_indices.len();

    // candidate planes: the unique triangle bound extremes, sorted once
    let mut mins = Vec::with_capacity(num_triangles);
    let mut maxs = Vec::with_capacity(num_triangles);
    for &t in triangle_indices {
        let tb = &triangle_bounds[t as usize].bounds;
        mins.push(tb.min()[axis]);
        maxs.push(tb.max()[axis]);
    }
    mins.sort_by(Real::total_cmp);
    maxs.sort_by(Real::total_cmp);

    let mut candidates: Vec<Real> = mins.iter().chain(maxs.iter()).copied().collect();
    candidates.sort_by(Real::total_cmp);
    candidates.dedup();

    let mut best: Option<(Real, Real)> = None; // (cost, position)
    for &pos in &candidates {
        if pos <= node_bounds.min()[axis] || pos >= node_bounds.max()[axis] {
            continue;
        }

        let num_left = mins.partition_point(|&m| m <= pos);
        let num_right = num_triangles - maxs.partition_point(|&m| m < pos);

        let (left_bounds, right_bounds) = node_bounds.split_at(axis, pos);
        let p_left = left_bounds.surface_area() * inv_total_area;
        let p_right = right_bounds.surface_area() * inv_total_area;

        let bonus = if num_left == 0 || num_right == 0 {
            config.empty_bonus
        } else {
            0.0
        };
        let cost = config.cost_traverse
            + config.cost_intersect
                * (1.0 - bonus)
                * (p_left * num_left as Real + p_right * num_right as Real);

        if best.map_or(true, |(best_cost, _)| cost < best_cost) {
            best = Some((cost, pos));
        }
    }

    let (best_cost, best_pos) = best?;
    // splitting must beat testing every triangle right here
    if best_cost < config.cost_intersect * num_triangles as Real {
        Some(best_pos)
    } else {
        None
    }
}

/// The median of the triangle centroid projections along `axis`.
fn find_splitter_median(
    triangle_bounds: &[TriangleBounds],
    triangle_indices: &[u32],
    axis: usize,
) -> Option<Real> {
    let mut centroids: Vec<Real> = triangle_indices
        .iter()
        .map(|&t| triangle_bounds[t as usize].centroid[axis])
        .collect();
    centroids.sort_by(Real::total_cmp);
    Some(centroids[centroids.len() / 2])
}
