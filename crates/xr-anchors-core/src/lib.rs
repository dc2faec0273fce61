//! Anchor lifecycle coordination for XR applications.
//!
//! This crate owns the part of a spatial-anchor application that is not
//! engine glue:
//! - spatial primitives for anchor poses
//! - the [`AnchorHost`] collaborator trait a platform implements
//! - durable storage of persisted anchor identifiers
//! - the [`AnchorCoordinator`] that creates, localizes, persists, reloads
//!   and erases anchors
//! - relative placement of content against a reference anchor
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use xr_anchors_core::{AnchorCoordinator, CoordinatorConfig, FileIdentifierStore, Pose};
//!
//! let coordinator = AnchorCoordinator::new(
//!     Arc::new(my_host),
//!     Arc::new(FileIdentifierStore::new("anchors.json")),
//!     CoordinatorConfig::default(),
//! )?;
//!
//! let created = coordinator.create_anchor(Pose::identity(), true).await?;
//! let report = coordinator.reload_persisted_anchors().await?;
//! ```

mod cancel;
pub mod coordinator;
pub mod host;
pub mod placement;
pub mod spatial;
pub mod store;
pub mod types;

pub use coordinator::{
    AnchorCoordinator, CoordinatorConfig, CreatedAnchor, EraseReport, LocalizeFailure,
    PersistOutcome, ReloadReport,
};
pub use host::{AnchorHost, LiveAnchor, UnboundAnchor};
pub use placement::ContentPlacer;
pub use spatial::{Point3D, Pose, Quaternion, Vector3D};
pub use store::{FileIdentifierStore, IdentifierStore, MemoryIdentifierStore};
pub use types::{AnchorError, AnchorId, AnchorRecord, AnchorState, HostStatus, Result};
