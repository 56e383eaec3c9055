use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Ray-tracing parameters.
///
/// Spatial units are metres, `ray_spacing` is in degrees and `frequency`
/// in MHz. `max_reflections = 0` traces direct paths only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameters {
    /// Relative permittivity of all surfaces (e.g. 5.0 for concrete).
    pub permittivity: f64,
    /// Surface conductivity in S/m.
    pub conductivity: f64,
    /// Bounce limit.
    pub max_reflections: u32,
    /// Angular cell size of the launch tiling in degrees.
    pub ray_spacing: f64,
    /// Carrier frequency in MHz.
    pub frequency: f64,
}

impl Parameters {
    pub fn new() -> Self {
        Self {
            permittivity: 5.0,
            conductivity: 0.01,
            max_reflections: 3,
            ray_spacing: 1.0,
            frequency: 900.0,
        }
    }

    /// Checks value ranges; returns the first violation found.
    pub fn validate(&self) -> Result<(), SimError> {
        fn reject(name: &'static str, reason: String) -> Result<(), SimError> {
            Err(SimError::InvalidParameter { name, reason })
        }

        if !self.frequency.is_finite() || self.frequency <= 0.0 {
            return reject("frequency", format!("must be positive, got {}", self.frequency));
        }
        if !self.ray_spacing.is_finite() || self.ray_spacing <= 0.0 || self.ray_spacing > 180.0 {
            return reject(
                "ray_spacing",
                format!("must be in (0, 180] degrees, got {}", self.ray_spacing),
            );
        }
        if !self.permittivity.is_finite() {
            return reject("permittivity", "must be finite".to_string());
        }
        if !self.conductivity.is_finite() || self.conductivity < 0.0 {
            return reject(
                "conductivity",
                format!("must be non-negative, got {}", self.conductivity),
            );
        }
        Ok(())
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new()
    }
}
