//! JSON-file-based storage backend.
//!
//! Stores each key in a separate file under a configurable directory
//! (default: `$XDG_DATA_HOME/foodcart-rs/`).

use core::future::{self, Future};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::error::{FoodCartError, Result};

/// Application name used for the XDG data directory.
const APP_NAME: &str = "foodcart-rs";

/// Extension appended to every key.
const VALUE_EXTENSION: &str = "json";

/// Sentinel file used for cross-process file locking.
const LOCK_FILE: &str = "storage.lock";

/// Longest accepted key.
const MAX_KEY_LEN: usize = 64;

/// File-backed storage that persists each key as its own file.
///
/// # Concurrency
///
/// Thread safety within a single process is provided by an in-process
/// [`Mutex`]. Cross-process safety is achieved via an advisory file lock
/// on `storage.lock` (using [`std::fs::File::lock`] /
/// [`std::fs::File::lock_shared`]).
///
/// Reads acquire a shared lock, writes an exclusive one. Writes go to a
/// temporary file that is then renamed over the target, so a crash never
/// leaves a half-written value behind.
///
/// # File layout
///
/// ```text
/// <dir>/
///   storage.lock          (cross-process lock sentinel)
///   cart.json
///   checkout-session.json
/// ```
///
/// Keys are restricted to ASCII letters, digits, `.`, `_` and `-` so they
/// map to plain file names.
#[derive(Debug)]
pub struct FileStorage {
    /// Root directory containing all value files.
    dir: PathBuf,
    /// Mutex serializing concurrent in-process access.
    lock: Mutex<()>,
    /// Sentinel file for cross-process advisory locking.
    lock_file: fs::File,
}

impl FileStorage {
    /// Creates a new file storage rooted at the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist. Also
    /// opens (or creates) the `storage.lock` sentinel file used for
    /// cross-process advisory locking.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the lock
    /// file cannot be opened.
    #[inline]
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).map_err(storage_io_error)?;
        let lock_file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))
            .map_err(storage_io_error)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
            lock_file,
        })
    }

    /// Returns the default XDG-compliant data directory for this application.
    ///
    /// On Linux: `$XDG_DATA_HOME/foodcart-rs/` (typically
    /// `~/.local/share/foodcart-rs/`).
    ///
    /// # Errors
    ///
    /// Returns an error if the platform data directory cannot be determined.
    #[inline]
    pub fn default_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|data_path| data_path.join(APP_NAME))
            .ok_or_else(|| {
                FoodCartError::Storage("could not determine platform data directory".into())
            })
    }

    // ── Private helpers ─────────────────────────────────────────────

    /// Returns the file path for a key, rejecting keys that are not plain
    /// file names.
    fn path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key.len() <= MAX_KEY_LEN
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if valid {
            Ok(self.dir.join(format!("{key}.{VALUE_EXTENSION}")))
        } else {
            Err(FoodCartError::Storage(
                format!("invalid storage key `{key}`").into(),
            ))
        }
    }

    /// Acquires an in-process mutex guard and a shared (read) file lock,
    /// executes `op`, then releases the file lock.
    fn with_shared_lock<R, F: FnOnce() -> Result<R>>(&self, op: F) -> Result<R> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_poison_error(&err))?;
        self.lock_file.lock_shared().map_err(storage_io_error)?;
        let result = op();
        // Only surface the unlock error when the operation succeeded;
        // otherwise the original error is more useful.
        if let Err(err) = self.lock_file.unlock()
            && result.is_ok()
        {
            return Err(storage_io_error(err));
        }
        result
    }

    /// Acquires an in-process mutex guard and an exclusive (write) file
    /// lock, executes `op`, then releases the file lock.
    fn with_exclusive_lock<R, F: FnOnce() -> Result<R>>(&self, op: F) -> Result<R> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_poison_error(&err))?;
        self.lock_file.lock().map_err(storage_io_error)?;
        let result = op();
        if let Err(err) = self.lock_file.unlock()
            && result.is_ok()
        {
            return Err(storage_io_error(err));
        }
        result
    }

    /// Reads a value. Returns `None` if the file does not exist.
    fn read_value(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key)?;
        self.with_shared_lock(|| match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(storage_io_error(err)),
        })
    }

    /// Atomically writes a value (write-to-tmp then rename).
    fn write_value(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path(key)?;
        let tmp_path = path.with_extension(format!("{VALUE_EXTENSION}.tmp"));
        self.with_exclusive_lock(|| {
            fs::write(&tmp_path, value).map_err(storage_io_error)?;
            fs::rename(&tmp_path, &path).map_err(storage_io_error)
        })
    }

    /// Deletes a value; a missing file is not an error.
    fn remove_value(&self, key: &str) -> Result<()> {
        let path = self.path(key)?;
        self.with_exclusive_lock(|| match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_io_error(err)),
        })
    }
}

// ── Free-standing helpers ───────────────────────────────────────────────

/// Wraps an I/O error into a [`FoodCartError::Storage`].
fn storage_io_error(err: std::io::Error) -> FoodCartError {
    FoodCartError::Storage(Box::new(err))
}

/// Wraps a mutex poison error into a [`FoodCartError::Storage`].
fn lock_poison_error<T>(err: &std::sync::PoisonError<T>) -> FoodCartError {
    FoodCartError::Storage(err.to_string().into())
}

// ── Storage implementation ──────────────────────────────────────────────

impl super::Storage for FileStorage {
    #[inline]
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send {
        future::ready(self.read_value(key))
    }

    #[inline]
    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.write_value(key, &value))
    }

    #[inline]
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.remove_value(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    /// Helper to create a [`FileStorage`] in a temporary directory.
    fn temp_storage() -> (FileStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        (storage, dir)
    }

    #[test]
    fn lockfile_created_on_construction() {
        let (storage, _dir) = temp_storage();
        assert!(storage.dir.join(LOCK_FILE).exists());
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let _storage = FileStorage::new(nested.clone()).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn rejects_path_like_keys() {
        let (storage, _dir) = temp_storage();
        assert!(storage.path("../escape").is_err());
        assert!(storage.path("a/b").is_err());
        assert!(storage.path("").is_err());
        assert!(storage.path(".hidden").is_err());
        assert!(storage.path("cart").is_ok());
        assert!(storage.path("checkout-session").is_ok());
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let (storage, _dir) = temp_storage();
        assert!(storage.get("cart").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_get_remove_lifecycle() {
        let (storage, dir) = temp_storage();
        storage
            .set("cart", r#"{"items":[]}"#.to_owned())
            .await
            .unwrap();
        assert!(dir.path().join("cart.json").exists());
        assert_eq!(
            storage.get("cart").await.unwrap().as_deref(),
            Some(r#"{"items":[]}"#)
        );

        storage.remove("cart").await.unwrap();
        assert!(storage.get("cart").await.unwrap().is_none());
        assert!(!dir.path().join("cart.json").exists());
    }

    #[tokio::test]
    async fn remove_missing_is_ok() {
        let (storage, _dir) = temp_storage();
        storage.remove("never-written").await.unwrap();
    }

    #[tokio::test]
    async fn no_tmp_file_left_after_write() {
        let (storage, dir) = temp_storage();
        storage.set("cart", "1".to_owned()).await.unwrap();
        storage.set("cart", "2".to_owned()).await.unwrap();
        assert!(!dir.path().join("cart.json.tmp").exists());
        assert_eq!(storage.get("cart").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
            storage.set("cart", "persisted".to_owned()).await.unwrap();
        }
        let reopened = FileStorage::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(
            reopened.get("cart").await.unwrap().as_deref(),
            Some("persisted")
        );
    }

    #[test]
    fn concurrent_writes_are_safe() {
        use alloc::sync::Arc;
        use std::thread;

        let (storage, _dir) = temp_storage();
        let shared = Arc::new(storage);
        let num_threads: usize = 8;

        let handles: Vec<_> = (0..num_threads)
            .map(|thread_idx| {
                let storage = Arc::clone(&shared);
                thread::spawn(move || {
                    let key = format!("key-{thread_idx}");
                    storage.write_value(&key, &thread_idx.to_string()).unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for thread_idx in 0..num_threads {
            let value = shared.read_value(&format!("key-{thread_idx}")).unwrap();
            assert_eq!(value, Some(thread_idx.to_string()));
        }
    }
}
