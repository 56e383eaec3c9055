//! The ray launcher.
//!
//! The transmitter's unit sphere is tiled into angular cells based on the
//! configured ray spacing; one ray is cast per cell. Each ray is traced
//! recursively through specular reflections up to the bounce limit, and
//! every receiver-sphere piercing records a complex field contribution
//! into that receiver's bucket, keyed by the multipath signature.

use std::collections::HashMap;
use std::f64::consts::PI;

use rayon::prelude::*;
use tracing::{error, info};

use crate::Point;
use crate::Vector;
use crate::geom::ray::{PathSignature, Ray, RayState};
use crate::sim::accel::{Accelerator, Hit};
use crate::sim::field::{FieldContext, FieldVector, mirror_direction};
use crate::sim::rays::config::Parameters;
use crate::sim::scene::SceneGeometry;

/// Width of the receiver-offset quantisation bucket in metres.
const OFFSET_BUCKET: f64 = 1e-3;

/// Bucket key: multipath signature plus quantised receiver offset.
///
/// Rays from neighbouring angular cells that traverse the same triangle
/// sequence and pierce the receiver at (almost) the same offset are the
/// same physical contribution; the key collapses them to one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ContributionKey {
    path: PathSignature,
    offset_bucket: i64,
}

#[derive(Debug, Clone, Copy)]
struct Contribution {
    offset: f64,
    field: FieldVector,
}

/// Replacement rule for colliding contributions: the smaller offset wins,
/// ties broken by total float order on the field components. Total order
/// makes merging worker maps commutative and associative.
fn replaces(new: &Contribution, old: &Contribution) -> bool {
    let key = |c: &Contribution| {
        [
            c.offset,
            c.field.x.re,
            c.field.x.im,
            c.field.y.re,
            c.field.y.im,
            c.field.z.re,
            c.field.z.im,
        ]
    };
    let new_key = key(new);
    let old_key = key(old);
    for (n, o) in new_key.iter().zip(old_key.iter()) {
        match n.total_cmp(o) {
            std::cmp::Ordering::Less => return true,
            std::cmp::Ordering::Greater => return false,
            std::cmp::Ordering::Equal => {}
        }
    }
    false
}

/// Accumulated field contributions of one receiver.
#[derive(Debug, Clone, Default)]
pub struct RxFields {
    fields: HashMap<ContributionKey, Contribution>,
}

impl RxFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one contribution under its path and offset.
    pub fn record(&mut self, path: &PathSignature, offset: f64, field: FieldVector) {
        let key = ContributionKey {
            path: path.clone(),
            offset_bucket: (offset / OFFSET_BUCKET).round() as i64,
        };
        let contribution = Contribution { offset, field };
        self.fields
            .entry(key)
            .and_modify(|existing| {
                if replaces(&contribution, existing) {
                    *existing = contribution;
                }
            })
            .or_insert(contribution);
    }

    /// Merges the bucket of another worker into this one.
    pub fn merge(&mut self, other: RxFields) {
        for (key, contribution) in other.fields {
            self.fields
                .entry(key)
                .and_modify(|existing| {
                    if replaces(&contribution, existing) {
                        *existing = contribution;
                    }
                })
                .or_insert(contribution);
        }
    }

    /// Coherent sum over all recorded multipath contributions.
    pub fn sum(&self) -> FieldVector {
        self.fields
            .values()
            .fold(FieldVector::ZERO, |acc, c| acc + c.field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Solid angle of the angular cell bounded by the given azimuth and
/// elevation limits (radians).
pub fn cell_solid_angle(theta1: f64, theta2: f64, phi1: f64, phi2: f64) -> f64 {
    (theta2 - theta1) * (phi1.cos() - phi2.cos())
}

/// One simulation run over a frozen scene.
pub struct Simulation<'a> {
    scene: &'a [SceneGeometry],
    accelerator: &'a dyn Accelerator,
    ctx: FieldContext,
    params: &'a Parameters,
    tx_point: Point,
    num_receivers: usize,
}

impl<'a> Simulation<'a> {
    pub fn new(
        scene: &'a [SceneGeometry],
        accelerator: &'a dyn Accelerator,
        ctx: FieldContext,
        params: &'a Parameters,
        tx_point: Point,
        num_receivers: usize,
    ) -> Self {
        Self {
            scene,
            accelerator,
            ctx,
            params,
            tx_point,
            num_receivers,
        }
    }

    /// Launches one ray per angular cell and returns the per-receiver
    /// buckets.
    ///
    /// The azimuth rows are independent, so they fan out over a thread
    /// pool; each worker accumulates into its own buckets and the maps are
    /// merged afterwards with an order-independent rule.
    pub fn run(&self) -> Vec<RxFields> {
        let n_theta = (360.0 / self.params.ray_spacing).round() as usize;
        let n_phi = (180.0 / self.params.ray_spacing).round() as usize;
        info!(
            rays = n_theta * n_phi,
            receivers = self.num_receivers,
            "ray launch started"
        );

        let make_buckets = || vec![RxFields::new(); self.num_receivers];
        let buckets = (0..n_theta)
            .into_par_iter()
            .fold(make_buckets, |mut buckets, i| {
                for j in 0..n_phi {
                    let theta = i as f64 * 2.0 * PI / n_theta as f64;
                    let phi = (j as f64 + 0.5) * PI / n_phi as f64;

                    let theta1 = i as f64 * 2.0 * PI / n_theta as f64;
                    let theta2 = (i + 1) as f64 * 2.0 * PI / n_theta as f64;
                    let phi1 = j as f64 * PI / n_phi as f64;
                    let phi2 = (j + 1) as f64 * PI / n_phi as f64;
                    let unit_surface_area = cell_solid_angle(theta1, theta2, phi1, phi2);

                    let direction = Vector::new(
                        phi.sin() * theta.cos(),
                        phi.sin() * theta.sin(),
                        phi.cos(),
                    );
                    if let Some(ray) = Ray::launch(self.tx_point, direction, unit_surface_area) {
                        self.trace(ray, 0, None, &mut buckets);
                    }
                }
                buckets
            })
            .reduce(make_buckets, |mut merged, worker| {
                for (into, from) in merged.iter_mut().zip(worker) {
                    into.merge(from);
                }
                merged
            });

        info!("ray launch finished");
        buckets
    }

    fn trace(
        &self,
        ray: Ray,
        depth: u32,
        incident: Option<FieldVector>,
        buckets: &mut [RxFields],
    ) {
        let query = self.accelerator.intersect(self.scene, &ray);

        for crossing in &query.receivers {
            let field = match (ray.state, incident.as_ref()) {
                (RayState::Start, None) => self.ctx.launch_field(ray.direction, crossing.distance),
                (RayState::MoreReflect, Some(ei)) => {
                    match self.ctx.transport(&ray, crossing.distance, ei) {
                        Some(field) => field,
                        None => {
                            error!("degenerate transport basis, contribution dropped");
                            continue;
                        }
                    }
                }
                _ => {
                    // Must not happen for launcher-produced rays
                    error!(state = ?ray.state, "invalid ray state at receiver crossing");
                    debug_assert!(false, "invalid ray state at receiver crossing");
                    continue;
                }
            };

            // Receiver-sphere area correction: an under-sampled ray must
            // not contribute more than the sphere can physically capture
            let mileage = ray.prev_mileage + crossing.distance;
            let projection_area = ray.unit_surface_area * mileage * mileage;
            let sphere_area = PI * crossing.radius * crossing.radius;
            let field = if projection_area < sphere_area {
                field * (projection_area / sphere_area).sqrt()
            } else {
                field
            };

            buckets[crossing.receiver].record(&ray.path, crossing.offset, field);
        }

        if depth >= self.params.max_reflections {
            return;
        }
        let Some(hit) = query.occluder else {
            return; // ray left the scene
        };

        match ray.state {
            RayState::Start => {
                let incident = self.ctx.launch_field(ray.direction, hit.distance);
                let mut ray = ray;
                ray.state = RayState::FirstReflect;
                let Some(reflected) = self.ctx.reflect(&ray, &hit, &incident) else {
                    error!("degenerate reflection basis, ray dropped");
                    return;
                };
                if let Some(next) = spawn_reflection(&ray, &hit, hit.distance) {
                    self.trace(next, depth + 1, Some(reflected), buckets);
                }
            }
            RayState::MoreReflect => {
                let Some(ei) = incident else {
                    error!("missing incident field in reflected ray, ray dropped");
                    debug_assert!(false, "missing incident field in reflected ray");
                    return;
                };
                let Some(at_hit) = self.ctx.transport(&ray, hit.distance, &ei) else {
                    error!("degenerate transport basis, ray dropped");
                    return;
                };
                let Some(reflected) = self.ctx.reflect(&ray, &hit, &at_hit) else {
                    error!("degenerate reflection basis, ray dropped");
                    return;
                };
                if let Some(next) = spawn_reflection(&ray, &hit, ray.prev_mileage + hit.distance) {
                    self.trace(next, depth + 1, Some(reflected), buckets);
                }
            }
            RayState::FirstReflect => {
                // Must not happen for launcher-produced rays
                error!("ray traced in FirstReflect state, ray dropped");
                debug_assert!(false, "ray traced in FirstReflect state");
            }
        }
    }
}

/// Spawns the specularly reflected continuation of a ray.
fn spawn_reflection(ray: &Ray, hit: &Hit, mileage: f64) -> Option<Ray> {
    let direction = mirror_direction(ray.direction, hit.normal).normalize()?;
    let mut path = ray.path.clone();
    path.push(hit.geometry as u32);
    Some(Ray {
        origin: hit.position,
        direction,
        unit_surface_area: ray.unit_surface_area,
        state: RayState::MoreReflect,
        prev_point: hit.position,
        prev_mileage: mileage,
        path,
    })
}
