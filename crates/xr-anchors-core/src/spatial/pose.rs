//! Tracked pose of an anchor (position + orientation, no scale)

use serde::{Deserialize, Serialize};

use super::{Point3D, Quaternion, Vector3D};

/// Position and orientation of an anchor in world space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point3D,
    pub rotation: Quaternion,
}

impl Pose {
    pub fn new(position: Point3D, rotation: Quaternion) -> Self {
        Self {
            position,
            rotation: rotation.normalize(),
        }
    }

    pub fn identity() -> Self {
        Self::default()
    }

    /// Pose at `position` with no rotation
    pub fn from_position(position: Point3D) -> Self {
        Self {
            position,
            rotation: Quaternion::IDENTITY,
        }
    }

    /// The same pose moved by `offset`; orientation is kept.
    pub fn translated(&self, offset: Vector3D) -> Self {
        Self {
            position: self.position + offset,
            rotation: self.rotation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translated_keeps_rotation() {
        let rotation = Quaternion::new(0.0, 0.5, 0.0, 0.8660254);
        let pose = Pose::new(Point3D::new(1.0, 0.0, 0.0), rotation);
        let moved = pose.translated(Vector3D::new(0.0, 2.0, 0.0));
        assert_eq!(moved.position, Point3D::new(1.0, 2.0, 0.0));
        assert_eq!(moved.rotation, pose.rotation);
    }

    #[test]
    fn test_new_normalizes_rotation() {
        let pose = Pose::new(Point3D::default(), Quaternion::new(0.0, 0.0, 0.0, 2.0));
        assert_eq!(pose.rotation, Quaternion::IDENTITY);
    }
}
