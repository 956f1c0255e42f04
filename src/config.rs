//! Server configuration.
//!
//! Values come from three tiers, lowest to highest priority: built-in
//! defaults, a YAML config file, and CLI flags (applied by `main`).
//! The config file is `$PRESS_SHIFT_CONFIG` if set, otherwise
//! `~/.press-shift/config.yaml`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,
    /// Port for the HTTP API.
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("press-shift.db"),
            port: 3000,
        }
    }
}

impl AppConfig {
    /// Discover the config file path from the environment or home directory.
    pub fn discover_path() -> Option<PathBuf> {
        std::env::var("PRESS_SHIFT_CONFIG")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".press-shift").join("config.yaml")))
    }

    /// Load configuration, falling back to defaults when no file exists.
    /// An explicitly given path that cannot be read is an error; a missing
    /// discovered path is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(p) => (Some(p.to_path_buf()), true),
            None => (Self::discover_path(), false),
        };

        let Some(path) = path else {
            return Ok(Self::default());
        };

        if !path.exists() {
            if required {
                anyhow::bail!("config file not found: {}", path.display());
            }
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }
}
