//! Spatial acceleration structures.
//!
//! Both accelerators answer the same query: for a ray, the nearest occluder
//! hit (if any) together with every receiver sphere the ray pierces before
//! that hit.

pub mod kdtree;
pub mod linear;

use crate::error::SimError;
use crate::geom::ray::Ray;
use crate::sim::scene::SceneGeometry;
use crate::{Point, Vector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use kdtree::KdTree;
pub use linear::LinearScan;

/// The nearest occluder intersection of a ray.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    /// Forward distance along the ray.
    pub distance: f64,
    /// Position of the hit.
    pub position: Point,
    /// Outward normal of the hit triangle.
    pub normal: Vector,
    /// Scene index of the hit triangle.
    pub geometry: usize,
}

/// A receiver sphere pierced by a ray.
#[derive(Debug, Clone, Copy)]
pub struct RxCrossing {
    /// Receiver index (registration order).
    pub receiver: usize,
    /// Forward distance to the sphere surface.
    pub distance: f64,
    /// Distance from the surface hit position to the sphere center.
    pub offset: f64,
    /// Sphere radius.
    pub radius: f64,
}

/// Result of intersecting one ray against the scene.
#[derive(Debug, Clone, Default)]
pub struct RayQuery {
    /// Nearest triangle hit, if any.
    pub occluder: Option<Hit>,
    /// Receiver crossings strictly before the occluder (or all crossings
    /// when there is no occluder), one per receiver, nearest kept.
    pub receivers: Vec<RxCrossing>,
}

/// Shared intersection contract of all accelerators.
pub trait Accelerator: Send + Sync {
    fn intersect(&self, scene: &[SceneGeometry], ray: &Ray) -> RayQuery;
}

/// Accelerator variants selectable on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceleratorKind {
    /// Brute-force scan over all scene members.
    Linear,
    /// SAH-split k-d tree.
    KdTree,
}

impl FromStr for AcceleratorKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(AcceleratorKind::Linear),
            "kdtree" | "kd-tree" => Ok(AcceleratorKind::KdTree),
            other => Err(SimError::UnknownAccelerator(other.to_string())),
        }
    }
}

impl fmt::Display for AcceleratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceleratorKind::Linear => write!(f, "linear"),
            AcceleratorKind::KdTree => write!(f, "kdtree"),
        }
    }
}
