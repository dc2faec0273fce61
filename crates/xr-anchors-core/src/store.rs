//! Durable storage for the persisted identifier set.
//!
//! The coordinator keeps the set in memory for the session and writes it
//! through an [`IdentifierStore`] after every change, so it survives process
//! restarts. Two backends ship with the crate: an in-memory store for tests
//! and embedding, and a JSON file store.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::types::AnchorId;

/// Key-value style persistence for anchor identifiers.
pub trait IdentifierStore: Send + Sync + 'static {
    /// Read the full identifier set. A store that was never written is empty.
    fn load(&self) -> Result<BTreeSet<AnchorId>>;

    /// Replace the stored set with `ids`.
    fn save(&self, ids: &BTreeSet<AnchorId>) -> Result<()>;
}

/// Identifier store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryIdentifierStore {
    ids: Mutex<BTreeSet<AnchorId>>,
}

impl MemoryIdentifierStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with identifiers, as if saved by an earlier session
    pub fn with_ids(ids: impl IntoIterator<Item = AnchorId>) -> Self {
        Self {
            ids: Mutex::new(ids.into_iter().collect()),
        }
    }
}

impl IdentifierStore for MemoryIdentifierStore {
    fn load(&self) -> Result<BTreeSet<AnchorId>> {
        let ids = self
            .ids
            .lock()
            .map_err(|_| anyhow::anyhow!("identifier store lock poisoned"))?;
        Ok(ids.clone())
    }

    fn save(&self, ids: &BTreeSet<AnchorId>) -> Result<()> {
        let mut stored = self
            .ids
            .lock()
            .map_err(|_| anyhow::anyhow!("identifier store lock poisoned"))?;
        *stored = ids.clone();
        Ok(())
    }
}

/// Identifier store backed by a JSON file holding an array of UUID strings.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so readers never observe a half-written set.
#[derive(Debug, Clone)]
pub struct FileIdentifierStore {
    path: PathBuf,
}

impl FileIdentifierStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentifierStore for FileIdentifierStore {
    fn load(&self) -> Result<BTreeSet<AnchorId>> {
        if !self.path.exists() {
            return Ok(BTreeSet::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read identifier store {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(BTreeSet::new());
        }
        let ids: Vec<AnchorId> = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed identifier store {}", self.path.display()))?;
        Ok(ids.into_iter().collect())
    }

    fn save(&self, ids: &BTreeSet<AnchorId>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create store directory {}", dir.display()))?;

        let body = serde_json::to_string_pretty(&ids.iter().collect::<Vec<_>>())
            .context("Failed to serialize anchor identifiers")?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .context("Failed to create temporary identifier file")?;
        tmp.write_all(body.as_bytes())
            .context("Failed to write anchor identifiers")?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_replaces_contents() {
        let a = AnchorId::new_v4();
        let b = AnchorId::new_v4();
        let store = MemoryIdentifierStore::with_ids([a]);

        store.save(&BTreeSet::from([b])).unwrap();

        assert_eq!(store.load().unwrap(), BTreeSet::from([b]));
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentifierStore::new(dir.path().join("anchors.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("anchors.json");
        let ids: BTreeSet<AnchorId> = (0..3).map(|_| AnchorId::new_v4()).collect();

        FileIdentifierStore::new(&path).save(&ids).unwrap();
        let reopened = FileIdentifierStore::new(&path);

        assert_eq!(reopened.load().unwrap(), ids);
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anchors.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileIdentifierStore::new(&path).load().unwrap_err();
        assert!(format!("{:#}", err).contains("Malformed identifier store"));
    }
}
