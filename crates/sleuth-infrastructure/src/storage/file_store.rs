//! Directory-backed key/value store.
//!
//! Directory structure:
//! ```text
//! base_dir/
//! ├── sessions.json
//! ├── messages.<session-id-1>.json
//! └── messages.<session-id-2>.json
//! ```

use async_trait::async_trait;
use sleuth_core::error::{Result, SleuthError};
use sleuth_core::state::KeyValueStore;
use std::path::{Path, PathBuf};

use super::atomic_file::AtomicFile;

const FILE_EXTENSION: &str = "json";

/// Stores each key as one file, written atomically.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    base_dir: PathBuf,
}

impl FileKeyValueStore {
    /// Creates a store rooted at `base_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_for(&self, key: &str) -> Result<AtomicFile> {
        validate_key(key)?;
        Ok(AtomicFile::new(
            self.base_dir.join(format!("{key}.{FILE_EXTENSION}")),
        ))
    }
}

/// Keys become file names, so only a conservative character set is allowed
/// and nothing that could escape the base directory.
fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(SleuthError::invalid_input(format!(
            "storage key '{key}' contains unsupported characters"
        )))
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SleuthError::internal(format!("Failed to join storage task: {}", e)))?
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let file = self.file_for(key)?;
        run_blocking(move || file.load()).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let file = self.file_for(key)?;
        let value = value.to_string();
        run_blocking(move || file.save(&value)).await?;
        tracing::trace!(key, "[FileKeyValueStore] Wrote key");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let file = self.file_for(key)?;
        run_blocking(move || file.remove()).await
    }
}
