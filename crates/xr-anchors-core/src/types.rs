//! Common types shared by the coordinator, the host traits and the stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::spatial::Pose;

/// Stable identifier of an anchor, shared with the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorId(pub Uuid);

impl AnchorId {
    /// Fresh random identifier. Hosts call this when they instantiate an anchor.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for AnchorId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Status code reported by the host platform alongside a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostStatus(pub i32);

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.0)
    }
}

/// Lifecycle stage of an anchor.
///
/// Ordered so that a later stage compares greater; a record only moves
/// forward through these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorState {
    /// Instantiated, waiting for the host to report created and localized
    Pending,
    /// Tracked by the host and present in the active set
    Localized,
    /// Saved by the host and recorded in the persisted identifier set
    Persisted,
}

impl fmt::Display for AnchorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AnchorState::Pending => "pending",
            AnchorState::Localized => "localized",
            AnchorState::Persisted => "persisted",
        };
        f.write_str(label)
    }
}

/// Snapshot of one anchor as the coordinator sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub id: AnchorId,
    pub pose: Pose,
    pub state: AnchorState,
    pub persisted: bool,
    pub created_at: DateTime<Utc>,
    /// Set when the anchor reached `Localized`
    pub localized_at: Option<DateTime<Utc>>,
}

impl AnchorRecord {
    pub fn pending(id: AnchorId, pose: Pose) -> Self {
        Self {
            id,
            pose,
            state: AnchorState::Pending,
            persisted: false,
            created_at: Utc::now(),
            localized_at: None,
        }
    }

    /// Move to `next`. Returns false and leaves the record untouched when
    /// `next` is not strictly ahead of the current state.
    pub fn advance(&mut self, next: AnchorState) -> bool {
        if next <= self.state {
            return false;
        }
        if next >= AnchorState::Localized && self.localized_at.is_none() {
            self.localized_at = Some(Utc::now());
        }
        if next == AnchorState::Persisted {
            self.persisted = true;
        }
        self.state = next;
        true
    }
}

/// Error types for anchor lifecycle operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnchorError {
    #[error("Host platform is not available")]
    HostUnavailable,

    #[error("Saving anchor failed with {0}")]
    SaveFailed(HostStatus),

    #[error("Loading persisted anchors failed with {0}")]
    LoadFailed(HostStatus),

    #[error("Localizing anchor {id} failed with {status}")]
    LocalizeFailed { id: AnchorId, status: HostStatus },

    #[error("Erasing persisted anchors failed with {0}")]
    EraseFailed(HostStatus),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Anchor did not localize within {0:?}")]
    Timeout(Duration),

    #[error("Identifier store error: {0}")]
    Store(String),
}

impl AnchorError {
    /// Wrap an identifier store failure, keeping the full context chain.
    pub fn store(err: anyhow::Error) -> Self {
        AnchorError::Store(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, AnchorError>;
