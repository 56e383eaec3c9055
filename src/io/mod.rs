//! File I/O for scene models.

pub mod stl;

pub use stl::{read_stl_binary, write_stl_binary};
