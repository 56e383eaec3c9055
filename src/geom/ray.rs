//! Rays and their launch bookkeeping.
//!
//! A ray remembers where it is in its bounce chain: freshly launched from
//! the transmitter, just past its first reflection, or deeper. The ordered
//! sequence of reflecting triangles (the path signature) identifies the
//! physical multipath a contribution belongs to.

use crate::{Point, Vector};

/// Position of a ray within its bounce chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayState {
    /// Launched from the transmitter, no reflection yet.
    Start,
    /// At its first reflection point.
    FirstReflect,
    /// Spawned by a reflection.
    MoreReflect,
}

/// Ordered sequence of scene indices of the triangles a ray reflected off.
///
/// Rays that traverse the same triangle sequence belong to the same
/// physical multipath and their contributions are combined coherently,
/// so equality and hashing must be cheap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PathSignature(Vec<u32>);

impl PathSignature {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, triangle: u32) {
        self.0.push(triangle);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

/// A ray with the state carried through the bounce recursion.
#[derive(Debug, Clone)]
pub struct Ray {
    /// Origin point of the ray.
    pub origin: Point,
    /// Unit direction vector.
    pub direction: Vector,
    /// Solid angle of the angular cell this ray was launched from, in
    /// steradians. Shared unchanged by all rays of the bounce chain.
    pub unit_surface_area: f64,
    pub state: RayState,
    /// Last reflection position. Equals the origin until the first bounce.
    pub prev_point: Point,
    /// Cumulative path length from the transmitter up to `prev_point`.
    pub prev_mileage: f64,
    pub path: PathSignature,
}

impl Ray {
    /// Creates a transmitter-launched ray.
    ///
    /// The direction is normalized; a zero direction yields None.
    pub fn launch(origin: Point, direction: Vector, unit_surface_area: f64) -> Option<Self> {
        let direction = direction.normalize()?;
        Some(Self {
            origin,
            direction,
            unit_surface_area,
            state: RayState::Start,
            prev_point: origin,
            prev_mileage: 0.0,
            path: PathSignature::new(),
        })
    }

    /// Returns the point along the ray at parameter t.
    pub fn point_at(&self, t: f64) -> Point {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_normalizes() {
        let ray = Ray::launch(Point::new(0., 0., 0.), Vector::new(0., 3., 0.), 0.1).unwrap();
        assert!(ray.direction.is_close(&Vector::new(0., 1., 0.)));
        assert_eq!(ray.state, RayState::Start);
        assert_eq!(ray.prev_mileage, 0.0);
        assert!(ray.path.is_empty());
    }

    #[test]
    fn test_launch_zero_direction() {
        assert!(Ray::launch(Point::new(0., 0., 0.), Vector::new(0., 0., 0.), 0.1).is_none());
    }

    #[test]
    fn test_point_at() {
        let ray = Ray::launch(Point::new(1., 0., 0.), Vector::new(1., 0., 0.), 0.1).unwrap();
        assert!(ray.point_at(5.0).is_close(&Point::new(6., 0., 0.)));
    }

    #[test]
    fn test_path_signature_identity() {
        let mut pa = PathSignature::new();
        let mut pb = PathSignature::new();
        pa.push(3);
        pa.push(7);
        pb.push(3);
        pb.push(7);
        assert_eq!(pa, pb);
        pb.push(1);
        assert_ne!(pa, pb);
        assert_eq!(pb.len(), 3);
        assert_eq!(pb.as_slice(), &[3, 7, 1]);
    }
}
