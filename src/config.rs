//! Settings read from `ppatch.toml`.
//!
//! Every field is optional; a missing file means all defaults.

use std::path::{Path, PathBuf};

use error_set::error_set;
use serde::Deserialize;
use tracing::debug;

/// Looked up at the repository root when no `--config` is given
pub const CONFIG_FILE: &str = "ppatch.toml";

error_set! {
    /// Errors from loading the configuration file
    ConfigError := {
        #[display("Failed to read {path}: {message}")]
        ReadFailed { path: String, message: String },
        #[display("Invalid configuration in {path}: {message}")]
        Invalid { path: String, message: String },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where exported patches and traced files go, relative to the repository
    pub patch_dir: PathBuf,
    /// Record mismatches as conflicts instead of halting
    pub tolerate_conflicts: bool,
    /// Extension of the provenance sidecar, without the dot
    pub sidecar_extension: String,
    /// Extension given to the output of a halted trace
    pub partial_suffix: String,
    /// Default log filter when neither `PPATCH_LOG` nor `-v` is given
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            patch_dir: PathBuf::from("patches"),
            tolerate_conflicts: false,
            sidecar_extension: "ppatch".to_string(),
            partial_suffix: "partial".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load an explicit configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = toml::from_str(&text).map_err(|e| ConfigError::Invalid {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Load `ppatch.toml` from `repo`, or the defaults when there is none.
    pub fn discover(repo: &Path) -> Result<Self, ConfigError> {
        let path = repo.join(CONFIG_FILE);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}
