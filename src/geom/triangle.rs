use crate::geom::MIN_HIT_DISTANCE;
use crate::geom::bboxes::BoundingBox;
use crate::{Point, Vector};

/// Determinant threshold below which the ray is parallel to the triangle.
const PARALLEL_EPS: f64 = 1e-12;

/// A triangular occluder with an outward unit normal.
///
/// Both faces reflect; the normal is flipped against the incoming ray by
/// the field kernels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Point,
    pub b: Point,
    pub c: Point,
    pub normal: Vector,
}

impl Triangle {
    /// Creates a triangle, normalizing the supplied normal.
    ///
    /// When the supplied normal has (near) zero length the normal is
    /// recomputed from the vertex winding. Returns None when neither yields
    /// a usable normal (collinear vertices).
    pub fn new(a: Point, b: Point, c: Point, normal: Vector) -> Option<Self> {
        let normal = normal
            .normalize()
            .or_else(|| Vector::normal(a, b, c))?;
        Some(Self { a, b, c, normal })
    }

    /// Componentwise min/max of the three vertices.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::of_points(&[self.a, self.b, self.c])
    }

    /// Barycenter of the three vertices.
    pub fn center(&self) -> Point {
        Point::new(
            (self.a.x + self.b.x + self.c.x) / 3.0,
            (self.a.y + self.b.y + self.c.y) / 3.0,
            (self.a.z + self.b.z + self.c.z) / 3.0,
        )
    }

    /// Möller-Trumbore ray intersection without back-face culling.
    ///
    /// Returns the forward distance and the hit position. Hits closer than
    /// `MIN_HIT_DISTANCE` are rejected so a reflected ray cannot re-hit the
    /// surface it just left.
    pub fn intersect(&self, origin: Point, direction: Vector) -> Option<(f64, Point)> {
        let edge1 = self.b - self.a;
        let edge2 = self.c - self.a;
        let pvec = direction.cross(edge2);
        let det = edge1.dot(pvec);

        if det.abs() < PARALLEL_EPS {
            return None;
        }
        let inv_det = 1.0 / det;

        let tvec = origin - self.a;
        let u = tvec.dot(pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let qvec = tvec.cross(edge1);
        let v = direction.dot(qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(qvec) * inv_det;
        if t < MIN_HIT_DISTANCE {
            return None;
        }
        Some((t, origin + direction * t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy_triangle() -> Triangle {
        Triangle::new(
            Point::new(0., 0., 0.),
            Point::new(2., 0., 0.),
            Point::new(0., 2., 0.),
            Vector::new(0., 0., 1.),
        )
        .unwrap()
    }

    #[test]
    fn test_new_normalizes_normal() {
        let t = Triangle::new(
            Point::new(0., 0., 0.),
            Point::new(1., 0., 0.),
            Point::new(0., 1., 0.),
            Vector::new(0., 0., 7.),
        )
        .unwrap();
        assert!(t.normal.is_close(&Vector::new(0., 0., 1.)));
    }

    #[test]
    fn test_new_recomputes_zero_normal() {
        let t = Triangle::new(
            Point::new(0., 0., 0.),
            Point::new(1., 0., 0.),
            Point::new(0., 1., 0.),
            Vector::new(0., 0., 0.),
        )
        .unwrap();
        assert!(t.normal.is_close(&Vector::new(0., 0., 1.)));
    }

    #[test]
    fn test_new_rejects_collinear() {
        let t = Triangle::new(
            Point::new(0., 0., 0.),
            Point::new(1., 0., 0.),
            Point::new(2., 0., 0.),
            Vector::new(0., 0., 0.),
        );
        assert!(t.is_none());
    }

    #[test]
    fn test_bounding_box_and_center() {
        let t = xy_triangle();
        let bbox = t.bounding_box();
        assert!(bbox.min.is_close(&Point::new(0., 0., 0.)));
        assert!(bbox.max.is_close(&Point::new(2., 2., 0.)));
        assert!(t.center().is_close(&Point::new(2. / 3., 2. / 3., 0.)));
    }

    #[test]
    fn test_intersect_front_and_back() {
        let t = xy_triangle();
        // From above (against the normal)
        let hit = t.intersect(Point::new(0.5, 0.5, 3.), Vector::new(0., 0., -1.));
        assert!(hit.is_some());
        let (dist, pos) = hit.unwrap();
        assert!((dist - 3.0).abs() < 1e-12);
        assert!(pos.is_close(&Point::new(0.5, 0.5, 0.)));
        // From below (with the normal): no back-face culling
        let hit = t.intersect(Point::new(0.5, 0.5, -3.), Vector::new(0., 0., 1.));
        assert!(hit.is_some());
    }

    #[test]
    fn test_intersect_miss() {
        let t = xy_triangle();
        let hit = t.intersect(Point::new(5., 5., 3.), Vector::new(0., 0., -1.));
        assert!(hit.is_none());
        // Parallel ray
        let hit = t.intersect(Point::new(0.5, 0.5, 3.), Vector::new(1., 0., 0.));
        assert!(hit.is_none());
    }

    #[test]
    fn test_intersect_behind() {
        let t = xy_triangle();
        let hit = t.intersect(Point::new(0.5, 0.5, 3.), Vector::new(0., 0., 1.));
        assert!(hit.is_none());
    }

    #[test]
    fn test_no_self_intersection() {
        let t = xy_triangle();
        // Origin on the surface, grazing distance below the guard
        let hit = t.intersect(Point::new(0.5, 0.5, 0.), Vector::new(0., 0., -1.));
        assert!(hit.is_none());
    }
}
