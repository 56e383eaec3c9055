//! Complex field arithmetic and the propagation kernels.
//!
//! Fields are complex 3-vectors in V/m. A launched ray carries the field of
//! an idealised vertically polarised dipole; reflections apply Fresnel
//! coefficients in a ray-local basis and straight segments apply spherical
//! wave divergence and phase delay.

use num_complex::Complex64;
use std::f64::consts::PI;
use std::ops::{Add, AddAssign, Mul};

use crate::Vector;
use crate::geom::matrix::Matrix;
use crate::geom::ray::{Ray, RayState};
use crate::sim::accel::Hit;

/// Speed of light in m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
/// Free-space wave impedance in Ohm.
pub const FREE_SPACE_IMPEDANCE: f64 = 377.0;
/// Components below this are treated as degenerate when picking bases.
const DEGENERATE_EPS: f64 = 1e-5;

/// Euler-form complex number: `mag * (cos(phase) + i*sin(phase))`.
pub fn euler(magnitude: f64, phase: f64) -> Complex64 {
    Complex64::from_polar(magnitude, phase)
}

/// A complex 3-vector field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldVector {
    pub x: Complex64,
    pub y: Complex64,
    pub z: Complex64,
}

impl FieldVector {
    pub const ZERO: FieldVector = FieldVector {
        x: Complex64::new(0.0, 0.0),
        y: Complex64::new(0.0, 0.0),
        z: Complex64::new(0.0, 0.0),
    };

    /// Sum of squared real and imaginary parts of all components.
    pub fn norm_sqr(&self) -> f64 {
        self.x.norm_sqr() + self.y.norm_sqr() + self.z.norm_sqr()
    }

    /// True only for the exact zero field.
    pub fn is_zero(&self) -> bool {
        self.x == Complex64::new(0.0, 0.0)
            && self.y == Complex64::new(0.0, 0.0)
            && self.z == Complex64::new(0.0, 0.0)
    }
}

impl Default for FieldVector {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for FieldVector {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl AddAssign for FieldVector {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

// Real scaling (used by the receiver area correction)
impl Mul<f64> for FieldVector {
    type Output = Self;
    fn mul(self, scale: f64) -> Self {
        Self {
            x: self.x * scale,
            y: self.y * scale,
            z: self.z * scale,
        }
    }
}

// Complex scalar times real vector yields a complex vector
impl Mul<Vector> for Complex64 {
    type Output = FieldVector;
    fn mul(self, v: Vector) -> FieldVector {
        FieldVector {
            x: self * v.dx,
            y: self * v.dy,
            z: self * v.dz,
        }
    }
}

// Real matrix applied to each complex component independently
impl Mul<FieldVector> for Matrix {
    type Output = FieldVector;
    fn mul(self, v: FieldVector) -> FieldVector {
        let r0 = self.row(0);
        let r1 = self.row(1);
        let r2 = self.row(2);
        FieldVector {
            x: v.x * r0[0] + v.y * r0[1] + v.z * r0[2],
            y: v.x * r1[0] + v.y * r1[1] + v.z * r1[2],
            z: v.x * r2[0] + v.y * r2[1] + v.z * r2[2],
        }
    }
}

/// Frequency- and material-dependent context shared by all kernels.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext {
    /// Wavelength in metres.
    pub lambda: f64,
    /// Wavenumber 2*pi/lambda.
    pub k: f64,
    /// Transmit power in dBm.
    pub tx_power_dbm: f64,
    /// Relative permittivity of all surfaces.
    pub permittivity: f64,
    /// Conductivity of all surfaces in S/m.
    pub conductivity: f64,
}

impl FieldContext {
    pub fn new(
        frequency_mhz: f64,
        tx_power_dbm: f64,
        permittivity: f64,
        conductivity: f64,
    ) -> Self {
        let lambda = SPEED_OF_LIGHT / (frequency_mhz * 1e6);
        Self {
            lambda,
            k: 2.0 * PI / lambda,
            tx_power_dbm,
            permittivity,
            conductivity,
        }
    }

    /// Transmit power in Watt.
    pub fn tx_power_watts(&self) -> f64 {
        10f64.powf(self.tx_power_dbm / 10.0 - 3.0)
    }

    /// Fresnel reflection coefficients at grazing angle `psi`.
    ///
    /// Returns `(R_H, R_V)` for horizontal and vertical polarisation.
    pub fn fresnel(&self, psi: f64) -> (Complex64, Complex64) {
        // Complex relative permittivity of a lossy surface
        let epsilon = Complex64::new(
            self.permittivity,
            -60.0 * self.lambda * self.conductivity,
        );
        let eta = (epsilon - psi.cos() * psi.cos()).sqrt();
        let sin_psi = Complex64::new(psi.sin(), 0.0);
        let rh = (epsilon * sin_psi - eta) / (epsilon * sin_psi + eta);
        let rv = (sin_psi - eta) / (sin_psi + eta);
        (rh, rv)
    }

    /// Field of the transmitter dipole at `distance` along `direction`.
    ///
    /// The theta/phi frame vectors are deliberately left unnormalised:
    /// their sin(phi) length encodes the dipole radiation pattern.
    pub fn launch_field(&self, direction: Vector, distance: f64) -> FieldVector {
        let mut phi_v = Vector::new(0., 0., 1.).cross(direction);
        if phi_v.length() < DEGENERATE_EPS {
            // Zenith-pointing ray: the polarisation azimuth is arbitrary
            phi_v = Vector::new(1., 0., 0.);
        }
        let theta_v = phi_v.cross(direction);

        let magnitude =
            (self.tx_power_watts() * FREE_SPACE_IMPEDANCE / (2.0 * PI)).sqrt() / distance;
        let e_theta = euler(magnitude, -self.k * distance);
        e_theta * theta_v
    }

    /// Transports `incident` over a straight segment of length `distance`
    /// following a reflection.
    ///
    /// Applies the spherical-wave divergence `s1 / (s1 + s)` and the phase
    /// delay of the segment. Returns None for a degenerate basis.
    pub fn transport(&self, ray: &Ray, distance: f64, incident: &FieldVector) -> Option<FieldVector> {
        let (alpha, beta) = segment_basis(ray.direction)?;
        let local = decompose(incident, alpha, beta, ray.direction)?;

        let factor = ray.prev_mileage / (ray.prev_mileage + distance);
        let phase = euler(factor, -self.k * distance);
        let e_alpha = local.x * phase;
        let e_beta = local.y * phase;
        Some(e_alpha * alpha + e_beta * beta)
    }

    /// Specular reflection of `incident` at `hit`.
    ///
    /// On the first bounce the amplitude and phase are carried unchanged
    /// (the launch field already accounts for the path); later bounces
    /// apply the segment factor from the previous reflection point.
    /// Returns None for a `Start` ray or a degenerate basis.
    pub fn reflect(&self, ray: &Ray, hit: &Hit, incident: &FieldVector) -> Option<FieldVector> {
        let nl = facing_normal(hit.normal, ray.direction);
        let axi = ray.direction;
        let axr = axi - nl * (2.0 * nl.dot(axi));

        // Grazing angle: half the angle between incident and reflected
        let psi = axi.dot(axr).clamp(-1.0, 1.0).acos() / 2.0;
        let (rh, rv) = self.fresnel(psi);

        let (alpha1, beta1, alpha2, beta2) = reflection_basis(axi, axr)?;
        let local = decompose(incident, alpha1, beta1, axi)?;

        let (e_alpha, e_beta) = match ray.state {
            RayState::FirstReflect => (local.x * rv, local.y * rh),
            RayState::MoreReflect => {
                let s2 = (hit.position - ray.prev_point).length();
                let factor = ray.prev_mileage / (ray.prev_mileage + s2);
                let phase = euler(factor, -self.k * s2);
                (local.x * rv * phase, local.y * rh * phase)
            }
            RayState::Start => return None,
        };
        Some(e_alpha * alpha2 + e_beta * beta2)
    }

    /// Received power in dBm of the coherently summed field.
    pub fn power_dbm(&self, field: &FieldVector) -> f64 {
        let watt = self.lambda * self.lambda / (8.0 * PI * FREE_SPACE_IMPEDANCE)
            * field.norm_sqr();
        10.0 * watt.log10() + 30.0
    }
}

/// Flips `normal` so it faces against `direction`.
pub fn facing_normal(normal: Vector, direction: Vector) -> Vector {
    if normal.dot(direction) < 0.0 {
        normal
    } else {
        -normal
    }
}

/// Mirror direction of `direction` at a surface with normal `normal`.
pub fn mirror_direction(direction: Vector, normal: Vector) -> Vector {
    let nl = facing_normal(normal, direction);
    direction - nl * (2.0 * nl.dot(direction))
}

/// Deterministic axis seed for a basis perpendicular to `direction`.
fn seed_cross(direction: Vector) -> Vector {
    if direction.dx.abs() > 0.1 {
        Vector::new(0., 1., 0.).cross(direction)
    } else {
        Vector::new(1., 0., 0.).cross(direction)
    }
}

/// Orthonormal pair spanning the plane perpendicular to `direction`.
fn segment_basis(direction: Vector) -> Option<(Vector, Vector)> {
    let alpha = seed_cross(direction).normalize()?;
    let beta = direction.cross(alpha).normalize()?;
    Some((alpha, beta))
}

/// Bases before and after a reflection sharing the cross-incidence axis.
fn reflection_basis(axi: Vector, axr: Vector) -> Option<(Vector, Vector, Vector, Vector)> {
    let mut alpha1 = axi.cross(axr);
    if alpha1.dx.abs() < DEGENERATE_EPS
        && alpha1.dy.abs() < DEGENERATE_EPS
        && alpha1.dz.abs() < DEGENERATE_EPS
    {
        // Ray perpendicular to the wall
        alpha1 = seed_cross(axi);
    }
    let alpha1 = alpha1.normalize()?;
    let beta1 = axi.cross(alpha1).normalize()?;
    let alpha2 = alpha1;
    let beta2 = axr.cross(alpha2).normalize()?;
    Some((alpha1, beta1, alpha2, beta2))
}

/// Expresses `field` in the `(alpha, beta, direction)` basis.
fn decompose(
    field: &FieldVector,
    alpha: Vector,
    beta: Vector,
    direction: Vector,
) -> Option<FieldVector> {
    let h = Matrix::from_columns(alpha, beta, direction);
    let inverse = h.inverse()?;
    Some(inverse * *field)
}
