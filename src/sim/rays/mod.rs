//! Ray launching and field accumulation.

pub mod config;
pub mod simulation;

pub use config::Parameters;
pub use simulation::{RxFields, Simulation};
