//! Positions in world space

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

use super::Vector3D;

/// A position in world space, in meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Build a point from an `[x, y, z]` triple (the config file layout)
    pub fn from_array(xyz: [f32; 3]) -> Self {
        Self::new(xyz[0], xyz[1], xyz[2])
    }
}

impl Add<Vector3D> for Point3D {
    type Output = Point3D;

    fn add(self, rhs: Vector3D) -> Self::Output {
        Point3D::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// The displacement that carries `rhs` onto `self`
impl Sub for Point3D {
    type Output = Vector3D;

    fn sub(self, rhs: Self) -> Self::Output {
        Vector3D::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::fmt::Display for Point3D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_then_add_returns_to_target() {
        let from = Point3D::new(1.0, 2.0, 3.0);
        let to = Point3D::new(-4.0, 0.5, 10.0);
        let moved = from + (to - from);
        assert!((moved.x - to.x).abs() < 0.0001);
        assert!((moved.y - to.y).abs() < 0.0001);
        assert!((moved.z - to.z).abs() < 0.0001);
    }

    #[test]
    fn test_from_array_and_display() {
        let point = Point3D::from_array([1.0, -0.5, 2.25]);
        assert_eq!(point, Point3D::new(1.0, -0.5, 2.25));
        assert_eq!(point.to_string(), "(1.000, -0.500, 2.250)");
    }
}
