//! Host-side anchor storage for the simulator

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use xr_anchors_core::{AnchorId, Pose};

/// Saved anchor poses, keyed by id, optionally mirrored to a JSON file.
///
/// Share one vault between two [`SimulatedHost`](crate::SimulatedHost)s to
/// model a restart: the second host can load what the first one saved.
#[derive(Debug, Default)]
pub struct HostVault {
    poses: Mutex<BTreeMap<AnchorId, Pose>>,
    path: Option<PathBuf>,
}

impl HostVault {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a file-backed vault, reading any poses already saved there.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let poses = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read host vault {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Malformed host vault {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            poses: Mutex::new(poses),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, id: &AnchorId) -> Option<Pose> {
        self.lock().get(id).copied()
    }

    pub fn contains(&self, id: &AnchorId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, id: AnchorId, pose: Pose) -> Result<()> {
        let mut poses = self.lock();
        poses.insert(id, pose);
        self.flush(&poses)
    }

    /// Remove every id in `ids`; returns how many were present.
    pub fn remove_all<'a>(&self, ids: impl IntoIterator<Item = &'a AnchorId>) -> Result<usize> {
        let mut poses = self.lock();
        let removed = ids
            .into_iter()
            .filter(|id| poses.remove(id).is_some())
            .count();
        self.flush(&poses)?;
        Ok(removed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<AnchorId, Pose>> {
        self.poses.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn flush(&self, poses: &BTreeMap<AnchorId, Pose>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(poses).context("Failed to serialize host vault")?;
        std::fs::write(path, body)
            .with_context(|| format!("Failed to write host vault {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xr_anchors_core::Point3D;

    #[test]
    fn test_file_vault_reopens_with_saved_poses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        let id = AnchorId::new_v4();
        let pose = Pose::from_position(Point3D::new(1.0, 2.0, 3.0));

        HostVault::open(&path).unwrap().insert(id, pose).unwrap();
        let reopened = HostVault::open(&path).unwrap();

        assert_eq!(reopened.get(&id), Some(pose));
    }

    #[test]
    fn test_remove_all_counts_present_ids() {
        let vault = HostVault::in_memory();
        let kept = AnchorId::new_v4();
        let gone = AnchorId::new_v4();
        vault.insert(kept, Pose::identity()).unwrap();
        vault.insert(gone, Pose::identity()).unwrap();

        let removed = vault.remove_all([&gone, &AnchorId::new_v4()]).unwrap();

        assert_eq!(removed, 1);
        assert!(vault.contains(&kept));
        assert!(!vault.contains(&gone));
    }
}
