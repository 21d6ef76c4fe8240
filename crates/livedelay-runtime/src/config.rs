//! Runtime configuration: defaults < TOML file < CLI flags.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use livedelay_core::MAX_QUEUE_SIZE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Control socket path.
    pub socket_path: String,
    /// Preference file holding the preferred delay.
    pub preference_path: PathBuf,
    /// Maximum number of simultaneously withheld items.
    pub capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            preference_path: config_dir().join("preferences.json"),
            capacity: MAX_QUEUE_SIZE,
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path(), false),
        };
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply CLI overrides.
    #[must_use]
    pub fn with_socket_path(mut self, socket_path: Option<String>) -> Self {
        if let Some(path) = socket_path {
            self.socket_path = path;
        }
        self
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: Option<usize>) -> Self {
        if let Some(capacity) = capacity {
            self.capacity = capacity;
        }
        self
    }
}

/// `$XDG_CONFIG_HOME/livedelay`, else `$HOME/.config/livedelay`.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
        if !dir.is_empty() {
            return PathBuf::from(dir).join("livedelay");
        }
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".config").join("livedelay")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default socket path using $USER for per-user isolation.
pub fn default_socket_path() -> String {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return format!("{dir}/livedelay/livedelay.sock");
    }
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    format!("/tmp/livedelay-{user}/livedelay.sock")
}
