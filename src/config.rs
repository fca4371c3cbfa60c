//! Persisted application configuration.
//!
//! A small JSON file in the home directory holding the ssh target and
//! the selected display window. A fresh install (or an unreadable file)
//! yields the placeholder target, which the engine reports as
//! `SetupRequired` until the user points it at a real host.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::engine::DisplayWindow;
use crate::source::Target;

const CONFIG_FILE_NAME: &str = ".vramwatch.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode config: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("home directory is not set")]
    NoHome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub user: String,
    pub host: String,
    #[serde(default)]
    pub window: DisplayWindow,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user: Target::PLACEHOLDER_USER.to_string(),
            host: Target::PLACEHOLDER_HOST.to_string(),
            window: DisplayWindow::default(),
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = std::env::var_os("HOME").ok_or(ConfigError::NoHome)?;
        Ok(PathBuf::from(home).join(CONFIG_FILE_NAME))
    }

    /// Load the config, falling back to the placeholder default on any
    /// read or parse problem.
    pub fn load() -> Self {
        match Self::default_path() {
            Ok(path) => Self::load_from(&path),
            Err(err) => {
                warn!(error = %err, "using default config");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(error = %err, "config file unreadable; using default");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn target(&self) -> Target {
        Target::new(self.user.clone(), self.host.clone())
    }
}
