//! Atomic text file operations.
//!
//! Every write goes to a temporary sibling file which is fsynced and then
//! renamed over the target, so readers observe either the old or the new
//! contents, never a torn write.

use sleuth_core::error::{Result, SleuthError};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

/// A handle to a text file that is replaced atomically on save.
///
/// Provides:
/// - **Atomicity**: Updates are all-or-nothing via tmp file + atomic rename
/// - **Isolation**: An exclusive lock file serializes writers across processes
/// - **Durability**: Explicit fsync before rename
#[derive(Debug, Clone)]
pub struct AtomicFile {
    path: PathBuf,
}

impl AtomicFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file contents.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(String))`: File exists
    /// - `Ok(None)`: File doesn't exist
    /// - `Err`: Failed to read the file
    pub fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the file contents atomically.
    pub fn save(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let _lock = FileLock::acquire(&self.path)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(contents.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        Ok(())
    }

    /// Deletes the file and its lock file. A missing file is not an error.
    pub fn remove(&self) -> Result<()> {
        let lock = FileLock::acquire(&self.path)?;
        remove_if_present(&self.path)?;
        lock.unlink()
    }

    /// Temporary path in the same directory, unique per write.
    fn temp_path(&self) -> Result<PathBuf> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| SleuthError::io("Path has no parent directory"))?;
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| SleuthError::io("Path has no file name"))?;

        let tmp_name = format!(
            ".{}.{}.tmp",
            file_name.to_string_lossy(),
            uuid::Uuid::new_v4().simple()
        );
        Ok(parent.join(tmp_name))
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Exclusive lock held for the duration of a write.
///
/// The lock lives in a `<file>.lock` sibling. Removing a file also unlinks
/// its lock, so acquisition re-checks that the locked handle is still the
/// file on disk and retries otherwise.
struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let mut lock_name = path.as_os_str().to_owned();
        lock_name.push(".lock");
        let lock_path = PathBuf::from(lock_name);

        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        loop {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(&lock_path)?;

            #[cfg(unix)]
            {
                use fs2::FileExt;
                file.lock_exclusive()
                    .map_err(|e| SleuthError::io(format!("Failed to acquire lock: {}", e)))?;
            }

            if is_same_file(&file, &lock_path)? {
                return Ok(FileLock {
                    file,
                    path: lock_path,
                });
            }
        }
    }

    /// Deletes the lock file, then releases the lock.
    fn unlink(self) -> Result<()> {
        remove_if_present(&self.path)?;
        drop(self.file);
        Ok(())
    }
}

#[cfg(unix)]
fn is_same_file(file: &File, path: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn is_same_file(_file: &File, _path: &Path) -> Result<bool> {
    Ok(true)
}
