//! Pluggable key/value storage backends for persisting cart state.
//!
//! The cart only needs three operations on string values, so the trait is
//! deliberately small. Implementations decide where the bytes go: memory
//! for tests, one JSON file per key on disk for the CLI, or a platform
//! key/value store when embedded in an app.

#[cfg(feature = "storage-file")]
mod file;
mod memory;

#[cfg(feature = "storage-file")]
pub use file::FileStorage;
pub use memory::InMemoryStorage;

use core::future::Future;

use crate::error::Result;

/// Async key/value storage backend.
///
/// All methods take `&self`; implementations should use interior
/// mutability (e.g. `Mutex`) for thread-safe mutation. The cart holds the
/// backend behind an `Arc` and calls it from a background task, hence the
/// `'static` bound.
pub trait Storage: core::fmt::Debug + Send + Sync + 'static {
    /// Returns the value stored under `key`.
    ///
    /// Returns `Ok(None)` if nothing is stored under the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to read.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to write.
    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<()>> + Send;

    /// Removes the value stored under `key`. Removing a missing key is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to write.
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}
