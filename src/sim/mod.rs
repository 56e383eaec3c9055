pub mod accel;
pub mod field;
pub mod rays;
pub mod scene;
pub mod session;
