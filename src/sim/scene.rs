//! Indexed scene store shared by the accelerators.

use crate::geom::bboxes::BoundingBox;
use crate::geom::sphere::RxSphere;
use crate::geom::triangle::Triangle;

/// A scene member: a reflecting triangle or an observing receiver sphere.
///
/// The variant tag is what traversal uses to decide occluder vs observer;
/// accelerators reference members by their index in the scene vector, and
/// that index is also the stable identifier recorded in path signatures.
#[derive(Debug, Clone)]
pub enum SceneGeometry {
    Triangle(Triangle),
    Receiver(RxSphere),
}

impl SceneGeometry {
    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            SceneGeometry::Triangle(t) => t.bounding_box(),
            SceneGeometry::Receiver(s) => s.bounding_box(),
        }
    }
}

/// Union of the bounding boxes of all scene members.
pub fn scene_bounds(scene: &[SceneGeometry]) -> Option<BoundingBox> {
    let mut bounds: Option<BoundingBox> = None;
    for geometry in scene {
        let bbox = geometry.bounding_box();
        bounds = Some(match bounds {
            Some(b) => b.union(&bbox),
            None => bbox,
        });
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Point, Vector};

    #[test]
    fn test_scene_bounds() {
        let scene = vec![
            SceneGeometry::Triangle(
                Triangle::new(
                    Point::new(0., 0., 0.),
                    Point::new(1., 0., 0.),
                    Point::new(0., 1., 0.),
                    Vector::new(0., 0., 1.),
                )
                .unwrap(),
            ),
            SceneGeometry::Receiver(RxSphere::new(Point::new(5., 5., 5.), 1.0, 0)),
        ];
        let bounds = scene_bounds(&scene).unwrap();
        assert!(bounds.min.is_close(&Point::new(0., 0., 0.)));
        assert!(bounds.max.is_close(&Point::new(6., 6., 6.)));
    }

    #[test]
    fn test_empty_scene_bounds() {
        assert!(scene_bounds(&[]).is_none());
    }
}
