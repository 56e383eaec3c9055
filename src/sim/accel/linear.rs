//! Brute-force accelerator.
//!
//! Scans every scene member for every ray. Slow but obviously correct; it
//! doubles as the oracle the k-d tree is tested against.

use std::collections::BTreeMap;

use crate::geom::ray::Ray;
use crate::sim::accel::{Accelerator, Hit, RayQuery, RxCrossing};
use crate::sim::scene::SceneGeometry;

#[derive(Debug, Clone, Copy, Default)]
pub struct LinearScan;

impl LinearScan {
    pub fn new() -> Self {
        Self
    }
}

impl Accelerator for LinearScan {
    fn intersect(&self, scene: &[SceneGeometry], ray: &Ray) -> RayQuery {
        let mut occluder: Option<Hit> = None;
        // Nearest crossing per receiver, ordered by receiver index
        let mut crossings: BTreeMap<usize, RxCrossing> = BTreeMap::new();

        for (index, geometry) in scene.iter().enumerate() {
            match geometry {
                SceneGeometry::Triangle(triangle) => {
                    if let Some((distance, position)) =
                        triangle.intersect(ray.origin, ray.direction)
                    {
                        let closer = occluder.map_or(true, |h| distance < h.distance);
                        if closer {
                            occluder = Some(Hit {
                                distance,
                                position,
                                normal: triangle.normal,
                                geometry: index,
                            });
                        }
                    }
                }
                SceneGeometry::Receiver(sphere) => {
                    if let Some((distance, _)) = sphere.intersect(ray.origin, ray.direction) {
                        let crossing = RxCrossing {
                            receiver: sphere.receiver,
                            distance,
                            offset: sphere.closest_approach(ray.origin, ray.direction),
                            radius: sphere.radius,
                        };
                        crossings
                            .entry(sphere.receiver)
                            .and_modify(|c| {
                                if crossing.distance < c.distance {
                                    *c = crossing;
                                }
                            })
                            .or_insert(crossing);
                    }
                }
            }
        }

        let receivers = crossings
            .into_values()
            .filter(|c| occluder.map_or(true, |h| c.distance < h.distance))
            .collect();

        RayQuery {
            occluder,
            receivers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::sphere::RxSphere;
    use crate::geom::triangle::Triangle;
    use crate::{Point, Vector};

    fn wall_at_x(x: f64) -> Triangle {
        Triangle::new(
            Point::new(x, -10., -10.),
            Point::new(x, 10., -10.),
            Point::new(x, 0., 10.),
            Vector::new(-1., 0., 0.),
        )
        .unwrap()
    }

    fn ray_x() -> Ray {
        Ray::launch(Point::new(0., 0., 0.), Vector::new(1., 0., 0.), 0.1).unwrap()
    }

    #[test]
    fn test_nearest_occluder_wins() {
        let scene = vec![
            SceneGeometry::Triangle(wall_at_x(8.0)),
            SceneGeometry::Triangle(wall_at_x(3.0)),
        ];
        let query = LinearScan::new().intersect(&scene, &ray_x());
        let hit = query.occluder.unwrap();
        assert!((hit.distance - 3.0).abs() < 1e-9);
        assert_eq!(hit.geometry, 1);
    }

    #[test]
    fn test_receivers_before_occluder_only() {
        let scene = vec![
            SceneGeometry::Receiver(RxSphere::new(Point::new(2., 0., 0.), 0.5, 0)),
            SceneGeometry::Triangle(wall_at_x(5.0)),
            SceneGeometry::Receiver(RxSphere::new(Point::new(8., 0., 0.), 0.5, 1)),
        ];
        let query = LinearScan::new().intersect(&scene, &ray_x());
        assert!(query.occluder.is_some());
        assert_eq!(query.receivers.len(), 1);
        assert_eq!(query.receivers[0].receiver, 0);
        assert!((query.receivers[0].distance - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_all_receivers_without_occluder() {
        let scene = vec![
            SceneGeometry::Receiver(RxSphere::new(Point::new(2., 0., 0.), 0.5, 0)),
            SceneGeometry::Receiver(RxSphere::new(Point::new(8., 0., 0.), 0.5, 1)),
        ];
        let query = LinearScan::new().intersect(&scene, &ray_x());
        assert!(query.occluder.is_none());
        assert_eq!(query.receivers.len(), 2);
    }

    #[test]
    fn test_offset_is_closest_approach() {
        // Ray passes 0.3 above the sphere center
        let scene = vec![SceneGeometry::Receiver(RxSphere::new(
            Point::new(5., 0., -0.3),
            0.5,
            0,
        ))];
        let query = LinearScan::new().intersect(&scene, &ray_x());
        let crossing = &query.receivers[0];
        assert!((crossing.offset - 0.3).abs() < 1e-9);
        assert!((crossing.radius - 0.5).abs() < 1e-12);
    }
}
