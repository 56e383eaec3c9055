use crate::geom::MIN_HIT_DISTANCE;
use crate::geom::bboxes::BoundingBox;
use crate::{Point, Vector};

/// A receiver sphere.
///
/// Receivers are observers: a ray piercing the sphere records a field
/// contribution but is never terminated or deflected by it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RxSphere {
    pub center: Point,
    pub radius: f64,
    /// Index of the receiver this sphere belongs to.
    pub receiver: usize,
}

impl RxSphere {
    pub fn new(center: Point, radius: f64, receiver: usize) -> Self {
        Self {
            center,
            radius,
            receiver,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let r = Vector::new(self.radius, self.radius, self.radius);
        BoundingBox::new(self.center + -r, self.center + r)
    }

    /// Nearest forward intersection with the sphere surface.
    ///
    /// Solves |origin + t*direction - center|^2 = r^2 and returns the
    /// smaller root above the hit-distance guard. A ray starting inside the
    /// sphere hits the surface on its way out.
    pub fn intersect(&self, origin: Point, direction: Vector) -> Option<(f64, Point)> {
        let oc = origin - self.center;
        // direction is unit length, so the quadratic coefficient is 1
        let half_b = oc.dot(direction);
        let c = oc.dot(oc) - self.radius * self.radius;
        let discriminant = half_b * half_b - c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrt_d = discriminant.sqrt();
        let t1 = -half_b - sqrt_d;
        let t2 = -half_b + sqrt_d;

        let t = if t1 >= MIN_HIT_DISTANCE {
            t1
        } else if t2 >= MIN_HIT_DISTANCE {
            t2
        } else {
            return None;
        };
        Some((t, origin + direction * t))
    }

    /// Closest-approach distance between the ray line and the sphere
    /// center (the impact parameter).
    ///
    /// Recorded as the receiver offset of a piercing; rays from
    /// neighbouring angular cells with the same offset sample the same
    /// annulus of the sphere.
    pub fn closest_approach(&self, origin: Point, direction: Vector) -> f64 {
        let oc = origin - self.center;
        let t_ca = -oc.dot(direction);
        (oc + direction * t_ca).length()
    }
}
