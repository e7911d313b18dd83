//! Configuration loading.
//!
//! Precedence, lowest to highest: built-in defaults, `config.toml`,
//! environment variables (`SLEUTH_BACKEND_URL`, `SLEUTH_DATA_DIR`), and
//! whatever the front end applies on top (command-line flags).

use sleuth_core::config::SleuthConfig;
use sleuth_core::error::{Result, SleuthError};
use std::path::{Path, PathBuf};

use crate::paths::SleuthPaths;
use crate::storage::AtomicFile;

pub const ENV_BACKEND_URL: &str = "SLEUTH_BACKEND_URL";
pub const ENV_DATA_DIR: &str = "SLEUTH_DATA_DIR";

const CONFIG_TEMPLATE: &str = r#"# Sleuth client configuration

[backend]
# Base URL of the analysis service
base_url = "http://127.0.0.1:8000"
request_timeout_secs = 60

[polling]
# Seconds between preparation status checks
interval_secs = 3

[storage]
# data_dir = "/path/to/sleuth-data"
"#;

/// Reads `config.toml`.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
}

impl ConfigService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Uses the platform config location (`~/.config/sleuth/config.toml`).
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(SleuthPaths::default().config_file()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the configuration file.
    ///
    /// A missing or empty file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the file exists but is not valid TOML for
    /// [`SleuthConfig`].
    pub fn load(&self) -> Result<SleuthConfig> {
        let content = match AtomicFile::new(self.path.clone()).load()? {
            Some(content) if !content.trim().is_empty() => content,
            _ => {
                tracing::debug!(path = %self.path.display(), "[ConfigService] No config file, using defaults");
                return Ok(SleuthConfig::default());
            }
        };

        toml::from_str(&content).map_err(|e| {
            SleuthError::config(format!(
                "Failed to parse configuration file at {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Loads the file and applies environment overrides from the process
    /// environment.
    pub fn load_with_env(&self) -> Result<SleuthConfig> {
        let mut config = self.load()?;
        apply_env_overrides(&mut config, |name| std::env::var(name).ok());
        Ok(config)
    }

    /// Writes a commented template if no configuration file exists yet.
    ///
    /// Returns `true` if a file was created.
    pub fn ensure_exists(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        AtomicFile::new(self.path.clone()).save(CONFIG_TEMPLATE)?;
        tracing::info!(path = %self.path.display(), "[ConfigService] Created config template");
        Ok(true)
    }
}

/// Applies environment overrides using `lookup` to read variables.
///
/// Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut SleuthConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(url) = non_empty(ENV_BACKEND_URL) {
        config.backend.base_url = url;
    }
    if let Some(dir) = non_empty(ENV_DATA_DIR) {
        config.storage.data_dir = Some(PathBuf::from(dir));
    }
}
