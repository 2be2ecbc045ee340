use nalgebra::Point3;

use super::types::Real;

/// An axis-aligned bounding box.
///
/// Starts out empty (inverted bounds) and grows via [`BoundingBox::expand`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min: Point3<Real>,
    max: Point3<Real>,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundingBox {
    pub fn new() -> Self {
        Self {
            min: Point3::new(Real::INFINITY, Real::INFINITY, Real::INFINITY),
            max: Point3::new(-Real::INFINITY, -Real::INFINITY, -Real::INFINITY),
        }
    }

    pub fn from_points<'a, I: IntoIterator<Item = &'a Point3<Real>>>(points: I) -> Self {
        let mut bounds = Self::new();
        for p in points {
            bounds.expand(p);
        }
        bounds
    }

    pub fn is_empty(&self) -> bool {
        self.min[0] > self.max[0] || self.min[1] > self.max[1] || self.min[2] > self.max[2]
    }

    pub const fn min(&self) -> &Point3<Real> {
        &self.min
    }

    pub const fn max(&self) -> &Point3<Real> {
        &self.max
    }

    /// Grows the box to contain `p`.
    pub fn expand(&mut self, p: &Point3<Real>) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
    }

    /// Grows the box to contain `other`.
    pub fn expand_box(&mut self, other: &BoundingBox) {
        self.expand(&other.min);
        self.expand(&other.max);
    }

    pub fn center(&self) -> Point3<Real> {
        Point3::from((self.min.coords + self.max.coords) * 0.5)
    }

    /// The sphere centered at the box center passing through its corners.
    pub fn bounding_sphere(&self) -> (Point3<Real>, Real) {
        let center = self.center();
        let radius = (self.max - center).norm();
        (center, radius)
    }

    pub fn surface_area(&self) -> Real {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.max - self.min;
        2.0 * (d[0] * d[1] + d[0] * d[2] + d[1] * d[2])
    }

    /// Cuts the box in two along `axis` at `pos`.
    pub(crate) fn split_at(&self, axis: usize, pos: Real) -> (BoundingBox, BoundingBox) {
        let mut left = *self;
        let mut right = *self;
        left.max[axis] = pos;
        right.min[axis] = pos;
        (left, right)
    }

    /// The axis along which the box extends the most.
    pub fn longest_axis(&self) -> usize {
        let d = self.max - self.min;
        if d[0] >= d[1] && d[0] >= d[2] {
            0
        } else if d[1] >= d[2] {
            1
        } else {
            2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand() {
        let mut bounds = BoundingBox::new();
        assert!(bounds.is_empty());

        bounds.expand(&Point3::new(-1.0, 0.0, 2.0));
        bounds.expand(&Point3::new(3.0, -2.0, 0.5));

        assert!(!bounds.is_empty());
        assert_eq!(bounds.min(), &Point3::new(-1.0, -2.0, 0.5));
        assert_eq!(bounds.max(), &Point3::new(3.0, 0.0, 2.0));
        assert_eq!(bounds.longest_axis(), 0);
    }

    #[test]
    fn test_surface_area() {
        let mut bounds = BoundingBox::new();
        bounds.expand(&Point3::new(0.0, 0.0, 0.0));
        bounds.expand(&Point3::new(2.0, 3.0, 4.0));

        assert_eq!(bounds.surface_area(), 2.0 * (6.0 + 8.0 + 12.0));
    }

    #[test]
    fn test_bounding_sphere() {
        let mut bounds = BoundingBox::new();
        bounds.expand(&Point3::new(-1.0, -1.0, -1.0));
        bounds.expand(&Point3::new(1.0, 1.0, 1.0));

        let (center, radius) = bounds.bounding_sphere();
        assert_eq!(center, Point3::new(0.0, 0.0, 0.0));
        assert!((radius - 3.0f64.sqrt()).abs() < 1e-12);
    }
}
