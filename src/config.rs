//! Host configuration for grafthost
//!
//! Configuration is loaded from `~/.grafthost/config.json` when present,
//! falling back to defaults, with `GRAFTHOST_*` environment variables
//! taking precedence over both.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How archive-packaged units expose their code to the loader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveMode {
    /// Extract the archive into a staging directory once, then load from
    /// the extracted tree.
    #[default]
    Extract,
    /// Read code straight out of the archive on every load, trading the
    /// one-time extraction cost for a per-read decode cost.
    Mount,
}

/// Top-level host configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directory scanned for plugin units.
    pub plugins_dir: String,

    /// How archive units are made loadable.
    pub archive_mode: ArchiveMode,

    /// Extraction root for `ArchiveMode::Extract`. `None` means a fresh
    /// temporary directory per run.
    pub staging_dir: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            plugins_dir: default_plugins_dir(),
            archive_mode: ArchiveMode::default(),
            staging_dir: None,
        }
    }
}

impl HostConfig {
    /// Path of the config file (`~/.grafthost/config.json`).
    pub fn path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".grafthost")
            .join("config.json")
    }

    /// Load configuration from disk, falling back to defaults, then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::path();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `GRAFTHOST_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("GRAFTHOST_PLUGINS_DIR") {
            self.plugins_dir = dir;
        }
        if let Ok(mode) = std::env::var("GRAFTHOST_ARCHIVE_MODE") {
            match mode.to_lowercase().as_str() {
                "extract" => self.archive_mode = ArchiveMode::Extract,
                "mount" => self.archive_mode = ArchiveMode::Mount,
                other => {
                    tracing::warn!(mode = %other, "Unknown GRAFTHOST_ARCHIVE_MODE, keeping configured value");
                }
            }
        }
        if let Ok(dir) = std::env::var("GRAFTHOST_STAGING_DIR") {
            self.staging_dir = Some(dir);
        }
    }

    /// Plugins directory with a leading `~` expanded to the home directory.
    pub fn plugins_path(&self) -> PathBuf {
        expand_home(&self.plugins_dir)
    }
}

fn default_plugins_dir() -> String {
    "~/.grafthost/plugins".to_string()
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
