//! Spatial primitives for anchor poses
//!
//! World space is right-handed:
//! - X: Right (+) / Left (-)
//! - Y: Up (+) / Down (-)
//! - Z: Forward (+) / Backward (-)

mod point3d;
mod pose;
mod quaternion;
mod vector3d;

pub use point3d::Point3D;
pub use pose::Pose;
pub use quaternion::Quaternion;
pub use vector3d::Vector3D;
