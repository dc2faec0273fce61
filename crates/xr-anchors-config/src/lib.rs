//! Configuration for xr-anchors.
//!
//! Settings are read from a TOML file. Every section and every key is
//! optional; anything missing falls back to its default.
//!
//! ```toml
//! [coordinator]
//! poll_interval_ms = 11
//! localize_timeout_ms = 30000   # 0 waits indefinitely
//! erase_unbound_identifiers = false
//!
//! [store]
//! path = "/var/lib/xr-anchors/anchors.json"
//!
//! [logging]
//! level = "info"
//!
//! [placement]
//! base_point = [0.0, 0.0, 0.0]
//! ```

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable that points at an explicit config file
pub const CONFIG_ENV_VAR: &str = "XR_ANCHORS_CONFIG";

const CONFIG_FILE_NAME: &str = "config.toml";
const STORE_FILE_NAME: &str = "anchors.json";

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub coordinator: CoordinatorSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
    pub placement: PlacementSettings,
}

/// Anchor lifecycle coordinator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    /// Milliseconds between checks of a pending anchor
    pub poll_interval_ms: u64,
    /// Milliseconds to wait for localization; 0 disables the bound
    pub localize_timeout_ms: u64,
    /// Erase persisted ids from earlier sessions along with session anchors
    pub erase_unbound_identifiers: bool,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 11,
            localize_timeout_ms: 30_000,
            erase_unbound_identifiers: false,
        }
    }
}

/// Persisted identifier store settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Identifier file; defaults to `anchors.json` in the platform data dir
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Reference placement settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementSettings {
    /// Point on the placed content that is brought onto the reference anchor
    pub base_point: [f32; 3],
    /// Pose of the content before placement, as `[x, y, z]`
    pub content_position: [f32; 3],
}

impl AppConfig {
    /// Load configuration from `$XR_ANCHORS_CONFIG`, or the platform config
    /// directory, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        if let Ok(explicit) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&explicit));
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(raw).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.coordinator.poll_interval_ms == 0 {
            bail!("coordinator.poll_interval_ms must be greater than zero");
        }
        if self.logging.level.trim().is_empty() {
            bail!("logging.level must not be empty");
        }
        Ok(())
    }

    /// Identifier store location: the configured path, else the platform
    /// data directory, else the working directory.
    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| data_dir().join(STORE_FILE_NAME))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "xr-anchors", "xr-anchors")
}

/// Default location of `config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Platform data directory, or `.` when the platform has none
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.coordinator.poll_interval_ms, 11);
        assert_eq!(config.coordinator.localize_timeout_ms, 30_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml_str(
            r#"
            [coordinator]
            localize_timeout_ms = 0
            erase_unbound_identifiers = true

            [placement]
            base_point = [1.0, 0.5, -2.0]
            "#,
        )
        .unwrap();

        assert_eq!(config.coordinator.poll_interval_ms, 11);
        assert_eq!(config.coordinator.localize_timeout_ms, 0);
        assert!(config.coordinator.erase_unbound_identifiers);
        assert_eq!(config.placement.base_point, [1.0, 0.5, -2.0]);
        assert_eq!(config.placement.content_position, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let err = AppConfig::from_toml_str("[coordinator]\npoll_interval_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn test_explicit_store_path_wins() {
        let config = AppConfig::from_toml_str("[store]\npath = \"/tmp/ids.json\"\n").unwrap();
        assert_eq!(config.store_path(), PathBuf::from("/tmp/ids.json"));
    }

    #[test]
    #[serial]
    fn test_load_honours_env_var() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        std::env::set_var(CONFIG_ENV_VAR, &path);
        let loaded = AppConfig::load();
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(loaded.unwrap().logging.level, "debug");
    }

    #[test]
    #[serial]
    fn test_load_reports_missing_explicit_file() {
        std::env::set_var(CONFIG_ENV_VAR, "/definitely/not/here.toml");
        let loaded = AppConfig::load();
        std::env::remove_var(CONFIG_ENV_VAR);

        let err = loaded.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
