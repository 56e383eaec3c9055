//! Simulation session façade.
//!
//! A session owns the scene, the transmitter, the receivers and the
//! parameters, and orchestrates preprocess -> simulate -> read-out. The
//! public operations never panic; failures come back as [`SimError`].

use std::path::Path;

use tracing::info;

use crate::Point;
use crate::error::SimError;
use crate::geom::sphere::RxSphere;
use crate::geom::triangle::Triangle;
use crate::sim::accel::{Accelerator, AcceleratorKind, KdTree, LinearScan};
use crate::sim::field::FieldContext;
use crate::sim::rays::config::Parameters;
use crate::sim::rays::simulation::{RxFields, Simulation};
use crate::sim::scene::SceneGeometry;

/// Received power reported for a receiver with zero accumulated field,
/// relative to the transmit power (dB).
const ZERO_FIELD_FLOOR_DB: f64 = 250.0;

pub struct Session {
    scene: Vec<SceneGeometry>,
    method: AcceleratorKind,
    tx_point: Point,
    tx_power_dbm: f64,
    rx_points: Vec<Point>,
    rx_radius: f64,
    parameters: Parameters,
    fields: Vec<RxFields>,
    /// Set once simulate has run; triangle geometry and parameters are
    /// frozen from then on. Receivers may still be added for another run.
    frozen: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            scene: Vec::new(),
            method: AcceleratorKind::KdTree,
            tx_point: Point::new(0., 0., 0.),
            tx_power_dbm: 0.0,
            rx_points: Vec::new(),
            rx_radius: 1.0,
            parameters: Parameters::new(),
            fields: Vec::new(),
            frozen: false,
        }
    }

    fn check_mutable(&self) -> Result<(), SimError> {
        if self.frozen {
            Err(SimError::SceneFrozen)
        } else {
            Ok(())
        }
    }

    /// Registers one triangle.
    pub fn add_triangle(&mut self, triangle: Triangle) -> Result<(), SimError> {
        self.check_mutable()?;
        self.scene.push(SceneGeometry::Triangle(triangle));
        Ok(())
    }

    /// Registers a batch of triangles.
    pub fn add_triangles(
        &mut self,
        triangles: impl IntoIterator<Item = Triangle>,
    ) -> Result<(), SimError> {
        self.check_mutable()?;
        self.scene
            .extend(triangles.into_iter().map(SceneGeometry::Triangle));
        Ok(())
    }

    /// Loads a binary STL model into the scene.
    ///
    /// The scene is untouched when the file is unreadable or malformed.
    /// Returns the number of triangles added.
    pub fn load_stl(&mut self, path: &Path) -> Result<usize, SimError> {
        self.check_mutable()?;
        let triangles = crate::io::stl::read_stl_binary(path)?;
        let count = triangles.len();
        self.scene
            .extend(triangles.into_iter().map(SceneGeometry::Triangle));
        info!(count, path = %path.display(), "loaded STL model");
        Ok(count)
    }

    /// Selects the accelerator variant used by the next simulate call.
    pub fn set_accelerator(&mut self, method: AcceleratorKind) -> Result<(), SimError> {
        self.check_mutable()?;
        self.method = method;
        Ok(())
    }

    /// Places the transmitter.
    pub fn set_tx(&mut self, point: Point, power_dbm: f64) -> Result<(), SimError> {
        self.check_mutable()?;
        self.tx_point = point;
        self.tx_power_dbm = power_dbm;
        Ok(())
    }

    /// Places the receivers. Allowed even after a simulate run.
    pub fn set_rx_points(&mut self, points: Vec<Point>, radius: f64) -> Result<(), SimError> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(SimError::InvalidParameter {
                name: "rx_radius",
                reason: format!("must be positive, got {radius}"),
            });
        }
        self.rx_points = points;
        self.rx_radius = radius;
        Ok(())
    }

    pub fn set_parameters(&mut self, parameters: Parameters) -> Result<(), SimError> {
        self.check_mutable()?;
        parameters.validate()?;
        self.parameters = parameters;
        Ok(())
    }

    pub fn num_triangles(&self) -> usize {
        self.scene.len()
    }

    /// Traces the whole launch tiling and accumulates receiver fields.
    pub fn simulate(&mut self) -> Result<(), SimError> {
        self.parameters.validate()?;
        self.frozen = true;

        // Attach receiver spheres behind the triangles; their scene indices
        // stay clear of the path-signature triangle indices
        let num_triangles = self.scene.len();
        for (receiver, point) in self.rx_points.iter().enumerate() {
            self.scene.push(SceneGeometry::Receiver(RxSphere::new(
                *point,
                self.rx_radius,
                receiver,
            )));
        }

        let ctx = FieldContext::new(
            self.parameters.frequency,
            self.tx_power_dbm,
            self.parameters.permittivity,
            self.parameters.conductivity,
        );

        info!(method = %self.method, geometries = self.scene.len(), "preprocessing started");
        let accelerator: Box<dyn Accelerator> = match self.method {
            AcceleratorKind::Linear => Box::new(LinearScan::new()),
            AcceleratorKind::KdTree => Box::new(KdTree::build(&self.scene)),
        };
        info!("preprocessing finished");

        let simulation = Simulation::new(
            &self.scene,
            accelerator.as_ref(),
            ctx,
            &self.parameters,
            self.tx_point,
            self.rx_points.len(),
        );
        self.fields = simulation.run();

        // Detach the spheres so another simulate (with more receivers)
        // starts from the triangle-only scene
        self.scene.truncate(num_triangles);
        Ok(())
    }

    /// Received power per receiver, in registration order.
    ///
    /// A receiver whose field sum is exactly zero reports the floor value
    /// `tx_power - 250` dBm. Empty before the first simulate call.
    pub fn rx_powers(&self) -> Vec<f64> {
        let ctx = FieldContext::new(
            self.parameters.frequency,
            self.tx_power_dbm,
            self.parameters.permittivity,
            self.parameters.conductivity,
        );
        self.fields
            .iter()
            .map(|bucket| {
                let sum = bucket.sum();
                if sum.is_zero() {
                    self.tx_power_dbm - ZERO_FIELD_FLOOR_DB
                } else {
                    ctx.power_dbm(&sum)
                }
            })
            .collect()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vector;

    fn ground_triangle() -> Triangle {
        Triangle::new(
            Point::new(-1., -1., 0.),
            Point::new(1., -1., 0.),
            Point::new(0., 1., 0.),
            Vector::new(0., 0., 1.),
        )
        .unwrap()
    }

    #[test]
    fn test_no_receivers_reads_empty() {
        let mut session = Session::new();
        session.add_triangle(ground_triangle()).unwrap();
        session.simulate().unwrap();
        assert!(session.rx_powers().is_empty());
    }

    #[test]
    fn test_powers_empty_before_simulate() {
        let session = Session::new();
        assert!(session.rx_powers().is_empty());
    }

    #[test]
    fn test_frozen_after_simulate() {
        let mut session = Session::new();
        session.add_triangle(ground_triangle()).unwrap();
        session.simulate().unwrap();

        let err = session.add_triangle(ground_triangle()).unwrap_err();
        assert!(matches!(err, SimError::SceneFrozen));
        let err = session.set_parameters(Parameters::new()).unwrap_err();
        assert!(matches!(err, SimError::SceneFrozen));
        let err = session.set_tx(Point::new(0., 0., 0.), 10.0).unwrap_err();
        assert!(matches!(err, SimError::SceneFrozen));
        // Receivers may still be added
        assert!(
            session
                .set_rx_points(vec![Point::new(5., 0., 0.)], 1.0)
                .is_ok()
        );
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let mut session = Session::new();
        let mut params = Parameters::new();
        params.frequency = -900.0;
        assert!(session.set_parameters(params).is_err());
    }

    #[test]
    fn test_invalid_radius_rejected() {
        let mut session = Session::new();
        let err = session
            .set_rx_points(vec![Point::new(1., 0., 0.)], 0.0)
            .unwrap_err();
        assert!(matches!(
            err,
            SimError::InvalidParameter {
                name: "rx_radius",
                ..
            }
        ));
    }

    #[test]
    fn test_scene_restored_after_simulate() {
        let mut session = Session::new();
        session.add_triangle(ground_triangle()).unwrap();
        session
            .set_rx_points(vec![Point::new(5., 0., 0.)], 1.0)
            .unwrap();
        let mut params = Parameters::new();
        params.ray_spacing = 10.0; // keep the test fast
        session.set_parameters(params).unwrap();
        session.simulate().unwrap();
        assert_eq!(session.num_triangles(), 1);
        assert_eq!(session.rx_powers().len(), 1);
    }
}
