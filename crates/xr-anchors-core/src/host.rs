//! Host platform collaborator.
//!
//! The coordinator never talks to an engine or XR runtime directly. A host
//! implements [`AnchorHost`] on top of whatever provides anchor primitives
//! (a vendor SDK, a simulator, a test fake) and the coordinator drives the
//! lifecycle through it.

use async_trait::async_trait;

use crate::spatial::Pose;
use crate::types::{AnchorId, HostStatus};

/// A live, in-scene anchor owned by the host.
///
/// Tracking state is observed by polling; the coordinator checks
/// `is_created() && is_localized()` once per scheduler tick.
pub trait LiveAnchor: Clone + Send + Sync + 'static {
    fn id(&self) -> AnchorId;

    fn is_created(&self) -> bool;

    fn is_localized(&self) -> bool;

    /// Current tracked pose
    fn pose(&self) -> Pose;
}

/// An anchor loaded from host storage that is not yet attached to a live object.
pub trait UnboundAnchor: Send + Sync + 'static {
    fn id(&self) -> AnchorId;
}

/// Anchor primitives and persistence provided by the host platform.
#[async_trait]
pub trait AnchorHost: Send + Sync + 'static {
    type Handle: LiveAnchor;
    type Unbound: UnboundAnchor;

    /// Whether the platform is ready to service anchor operations
    fn is_ready(&self) -> bool {
        true
    }

    /// Instantiate an anchor at `pose`. Creation and localization complete
    /// later and are observed through the returned handle.
    fn create_anchor_at(&self, pose: Pose) -> Self::Handle;

    /// Save the anchor so it can be loaded by id in a later session.
    async fn save(&self, handle: &Self::Handle) -> Result<(), HostStatus>;

    /// Load every anchor in `ids` in a single batch.
    async fn load_unbound(&self, ids: &[AnchorId]) -> Result<Vec<Self::Unbound>, HostStatus>;

    /// Resolve the pose of one unbound anchor.
    async fn localize(&self, anchor: &Self::Unbound) -> Result<Pose, HostStatus>;

    /// Attach a localized unbound anchor to a newly instantiated live object at `pose`.
    fn bind_to(&self, anchor: Self::Unbound, pose: Pose) -> Self::Handle;

    /// Erase the given anchors from host storage.
    async fn erase(&self, handles: &[Self::Handle], ids: &[AnchorId]) -> Result<(), HostStatus>;

    /// Destroy the in-scene representation. Host storage is not touched.
    fn release(&self, handle: &Self::Handle);
}
