//! Spatial anchor lifecycle coordination.
//!
//! Re-exports the workspace crates under one name:
//! - the coordinator, host traits and data model from `xr-anchors-core`
//! - [`config`] for TOML configuration
//! - [`sim`] for the simulated host platform
//! - [`cli`] for the line commands driven by the `anchor-demo` binary

pub mod cli;

pub use xr_anchors_core::*;

pub mod config {
    pub use xr_anchors_config::*;
}

pub mod sim {
    pub use xr_anchors_sim::*;
}
