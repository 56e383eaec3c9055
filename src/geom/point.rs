use crate::Vector;
use crate::geom::{Axis, EPS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns true if both points are very close to each other.
    pub fn is_close(&self, other: &Self) -> bool {
        (self.x - other.x).abs() < EPS
            && (self.y - other.y).abs() < EPS
            && (self.z - other.z).abs() < EPS
    }

    /// Returns the coordinate along the given axis.
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Overwrites the coordinate along the given axis.
    pub fn set_axis(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
    }

    /// Straight-line distance to another point.
    pub fn distance(&self, other: &Self) -> f64 {
        (*other - *self).length()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prec = f.precision().unwrap_or(2); // Default 2 decimals
        write!(
            f,
            "Point({:.prec$}, {:.prec$}, {:.prec$})",
            self.x,
            self.y,
            self.z,
            prec = prec
        )
    }
}

// Implement +
impl Add<Vector> for Point {
    type Output = Point;
    fn add(self, other: Vector) -> Self {
        Self {
            x: self.x + other.dx,
            y: self.y + other.dy,
            z: self.z + other.dz,
        }
    }
}

// Implement - (difference of two points is a vector)
impl Sub for Point {
    type Output = Vector;
    fn sub(self, other: Point) -> Vector {
        Vector {
            dx: self.x - other.x,
            dy: self.y - other.y,
            dz: self.z - other.z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_close() {
        let pa = Point::new(5., 5., 5.);
        let pb = Point::new(5.00000000000001, 5., 5.);
        let pc = Point::new(5.0001, 5., 5.);
        assert!(pa.is_close(&pb));
        assert!(!pa.is_close(&pc));
    }

    #[test]
    fn test_axis_access() {
        let mut p = Point::new(1., 2., 3.);
        assert_eq!(p.axis(Axis::X), 1.);
        assert_eq!(p.axis(Axis::Y), 2.);
        assert_eq!(p.axis(Axis::Z), 3.);
        p.set_axis(Axis::Y, 9.);
        assert_eq!(p.axis(Axis::Y), 9.);
    }

    #[test]
    fn test_sub_gives_vector() {
        let pa = Point::new(1., 2., 3.);
        let pb = Point::new(0., 0., 1.);
        let v = pa - pb;
        assert!(v.is_close(&Vector::new(1., 2., 2.)));
    }

    #[test]
    fn test_add_vector() {
        let p = Point::new(1., 1., 1.);
        let moved = p + Vector::new(0.5, -1.0, 2.0);
        assert!(moved.is_close(&Point::new(1.5, 0.0, 3.0)));
    }

    #[test]
    fn test_distance() {
        let pa = Point::new(0., 0., 0.);
        let pb = Point::new(3., 4., 0.);
        assert!((pa.distance(&pb) - 5.0).abs() < EPS);
    }
}
