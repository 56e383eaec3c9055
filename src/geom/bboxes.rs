use crate::geom::Axis;
use crate::geom::point::Point;
use crate::geom::vector::Vector;

/// Direction components below this are treated as parallel to the slab.
const PARALLEL_EPS: f64 = 1e-15;

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// The tightest box holding all points `pts`. Panics on an empty slice.
    pub fn of_points(pts: &[Point]) -> Self {
        let mut min = pts[0];
        let mut max = pts[0];
        for p in &pts[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }
        Self { min, max }
    }

    /// Componentwise union with another box.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Point::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Point::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Extent of the box along one axis.
    pub fn extent(&self, axis: Axis) -> f64 {
        self.max.axis(axis) - self.min.axis(axis)
    }

    /// The part of this box below `split` along `axis`.
    pub fn clipped_below(&self, axis: Axis, split: f64) -> Self {
        let mut clipped = *self;
        clipped.max.set_axis(axis, split);
        clipped
    }

    /// The part of this box above `split` along `axis`.
    pub fn clipped_above(&self, axis: Axis, split: f64) -> Self {
        let mut clipped = *self;
        clipped.min.set_axis(axis, split);
        clipped
    }

    /// Intersects a ray with the box using the slab method.
    ///
    /// Returns the signed entry and exit distances along the ray. The entry
    /// distance is negative when the origin lies inside the box; callers
    /// rely on that to distinguish internal from external origins.
    pub fn ray_span(&self, origin: Point, direction: Vector) -> Option<(f64, f64)> {
        let mut entry = f64::NEG_INFINITY;
        let mut exit = f64::INFINITY;

        for axis in Axis::ALL {
            let o = origin.axis(axis);
            let d = direction.axis(axis);
            let lo = self.min.axis(axis);
            let hi = self.max.axis(axis);

            if d.abs() < PARALLEL_EPS {
                // Ray parallel to this slab: must already be between the planes
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }

            let t1 = (lo - o) / d;
            let t2 = (hi - o) / d;
            let (near, far) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
            entry = entry.max(near);
            exit = exit.min(far);
            if entry > exit {
                return None;
            }
        }

        if exit < 0.0 {
            return None; // box entirely behind the ray
        }
        Some((entry, exit))
    }
}
