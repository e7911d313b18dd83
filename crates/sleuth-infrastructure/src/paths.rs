//! Unified path management for sleuth files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/sleuth/            # Config directory
//! └── config.toml              # Client configuration
//!
//! ~/.local/share/sleuth/       # Data directory (overridable)
//! ├── state/                   # Persisted sessions and message histories
//! └── logs/                    # Application logs
//!     └── sleuth.log.YYYY-MM-DD
//! ```

use sleuth_core::error::{Result, SleuthError};
use std::path::PathBuf;

const APP_DIR_NAME: &str = "sleuth";

/// Resolves every on-disk location the client uses.
#[derive(Debug, Clone, Default)]
pub struct SleuthPaths {
    data_dir_override: Option<PathBuf>,
}

impl SleuthPaths {
    /// Creates a resolver; `data_dir_override` replaces the platform data
    /// directory when set.
    pub fn new(data_dir_override: Option<PathBuf>) -> Self {
        Self { data_dir_override }
    }

    /// Returns the sleuth configuration directory (e.g. `~/.config/sleuth/`).
    pub fn config_dir(&self) -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or_else(|| SleuthError::config("Cannot determine config directory"))
    }

    /// Returns the path to the main configuration file.
    pub fn config_file(&self) -> Result<PathBuf> {
        Ok(self.config_dir()?.join("config.toml"))
    }

    /// Returns the data directory (e.g. `~/.local/share/sleuth/`).
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir_override {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or_else(|| SleuthError::config("Cannot determine data directory"))
    }

    /// Directory holding the persisted key/value state.
    pub fn state_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("state"))
    }

    pub fn logs_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_drives_data_paths() {
        let paths = SleuthPaths::new(Some(PathBuf::from("/tmp/sleuth-test")));
        assert_eq!(paths.data_dir().unwrap(), PathBuf::from("/tmp/sleuth-test"));
        assert_eq!(
            paths.state_dir().unwrap(),
            PathBuf::from("/tmp/sleuth-test/state")
        );
        assert_eq!(
            paths.logs_dir().unwrap(),
            PathBuf::from("/tmp/sleuth-test/logs")
        );
    }

    #[test]
    fn test_config_file_name() {
        let paths = SleuthPaths::default();
        if let Ok(file) = paths.config_file() {
            assert!(file.ends_with("sleuth/config.toml"));
        }
    }
}
