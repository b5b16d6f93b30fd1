//! Configuration management.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Application configuration.
///
/// Stored as a flat JSON document. Keys missing from the file take their
/// default value, so older or hand-written files still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Image used for new sessions.
    pub docker_image: String,
    /// Quality preselected for new sessions.
    pub default_quality: String,
    /// Host directory bound to `/output` in file mode. Empty means unset.
    pub output_directory: String,
    /// Let the daemon remove containers once they stop.
    pub auto_remove_containers: bool,
    /// Container names are `{container_prefix}-{sequence}`.
    pub container_prefix: String,
    /// Docker socket path. Local defaults are used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_socket: Option<String>,
    /// Directory the build context is generated into.
    pub build_directory: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docker_image: "streamlink-tor".to_string(),
            default_quality: "480p".to_string(),
            output_directory: String::new(),
            auto_remove_containers: true,
            container_prefix: "streamlink-session".to_string(),
            docker_socket: None,
            build_directory: PathBuf::from("./docker_build"),
        }
    }
}

impl Config {
    /// Find and load configuration.
    ///
    /// `explicit` wins over the platform config directory. When neither is
    /// available the defaults are used and nothing will be saved. Never
    /// fails.
    #[must_use]
    pub fn locate(explicit: Option<PathBuf>) -> (Self, Option<PathBuf>) {
        Self::resolve(explicit, Self::config_path)
    }

    fn resolve(
        explicit: Option<PathBuf>,
        default_path: impl FnOnce() -> Result<PathBuf>,
    ) -> (Self, Option<PathBuf>) {
        let path = match explicit {
            Some(path) => Some(path),
            None => default_path()
                .inspect_err(|e| tracing::warn!("{e}; using default configuration"))
                .ok(),
        };
        let config = path
            .as_deref()
            .map_or_else(Self::default, Self::load_or_default);
        (config, path)
    }

    /// Load configuration from `path`, falling back to defaults.
    ///
    /// A missing file is not an error. A file that cannot be read or parsed
    /// is logged and replaced by defaults.
    #[must_use]
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }

        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), "error loading config: {e}");
                Self::default()
            }
        }
    }

    /// Load configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn config_path() -> Result<PathBuf> {
        ProjectDirs::from("", "", "streamdock")
            .map(|dirs| dirs.config_dir().join("config.json"))
            .ok_or_else(|| Error::Config("could not determine config directory".into()))
    }

    /// Output directory, if one is configured.
    #[must_use]
    pub fn output_dir(&self) -> Option<&str> {
        let dir = self.output_directory.trim();
        (!dir.is_empty()).then_some(dir)
    }
}
