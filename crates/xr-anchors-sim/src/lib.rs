//! Simulated anchor host.
//!
//! Stands in for an XR runtime during development: anchors localize after a
//! few polls, saved poses live in a [`HostVault`] that can outlive a session,
//! and every host operation can be made to fail or to take time so the
//! coordinator's partial-success and out-of-order paths can be exercised.

mod host;
mod vault;


pub use host::{status, SimConfig, SimHandle, SimUnbound, SimulatedHost};
pub use vault::HostVault;
