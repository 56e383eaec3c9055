//! Error types for the simulator's public surface.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by session operations.
///
/// Internal numeric degeneracies (near-singular bases, grazing hits) are
/// handled by epsilon guards and deterministic fallbacks; they never surface
/// here.
#[derive(Debug, Error)]
pub enum SimError {
    /// The model file could not be opened or read.
    #[error("cannot read model file {}: {source}", path.display())]
    InputIo {
        /// Path of the file that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The model file was readable but structurally invalid.
    #[error("malformed STL file {}: {reason}", path.display())]
    MalformedStl {
        /// Path of the offending file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A simulation parameter was out of its valid range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Name of the parameter.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The requested accelerator variant does not exist.
    #[error("unknown accelerator variant: {0}")]
    UnknownAccelerator(String),

    /// Geometry or parameters were mutated after the simulation started.
    #[error("scene is frozen after simulation start")]
    SceneFrozen,
}
