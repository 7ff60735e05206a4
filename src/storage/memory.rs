//! In-memory storage backend for testing.
//!
//! Provides [`InMemoryStorage`], a thread-safe in-memory implementation of
//! [`super::Storage`]. Ideal for unit tests and for running the cart in
//! memory-only mode.

use core::future::{self, Future};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{FoodCartError, Result};

/// Thread-safe in-memory key/value storage.
///
/// # Example
///
/// ```rust
/// use foodcart_rs::cart::Cart;
/// use foodcart_rs::storage::InMemoryStorage;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> foodcart_rs::error::Result<()> {
/// let cart = Cart::builder().storage(InMemoryStorage::new()).build()?;
/// assert_eq!(cart.item_count(), 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    /// Stored values behind a single mutex for thread-safe interior mutability.
    inner: Mutex<HashMap<String, String>>,
}

impl InMemoryStorage {
    /// Creates a new empty in-memory storage.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage pre-populated with one value.
    #[inline]
    #[must_use]
    pub fn with_entry<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        let mut map = HashMap::new();
        let _previous = map.insert(key.into(), value.into());
        Self {
            inner: Mutex::new(map),
        }
    }

    /// Returns the number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the inner lock is poisoned.
    #[inline]
    pub fn len(&self) -> Result<usize> {
        self.with_lock(|map| map.len())
    }

    /// Returns `true` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the inner lock is poisoned.
    #[inline]
    pub fn is_empty(&self) -> Result<bool> {
        self.with_lock(|map| map.is_empty())
    }

    /// Acquires the inner lock and applies a closure.
    fn with_lock<R>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> R) -> Result<R> {
        let mut inner = self.inner.lock().map_err(|err| lock_error(&err))?;
        Ok(f(&mut inner))
    }
}

/// Wraps a mutex poison error.
fn lock_error<T>(err: &std::sync::PoisonError<T>) -> FoodCartError {
    FoodCartError::Storage(err.to_string().into())
}

impl super::Storage for InMemoryStorage {
    #[inline]
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send {
        future::ready(self.with_lock(|map| map.get(key).cloned()))
    }

    #[inline]
    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.with_lock(|map| {
            let _previous = map.insert(key.to_owned(), value);
        }))
    }

    #[inline]
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.with_lock(|map| {
            let _previous = map.remove(key);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[tokio::test]
    async fn get_missing_is_none() {
        let s = InMemoryStorage::new();
        assert!(s.get("cart").await.unwrap().is_none());
        assert!(s.is_empty().unwrap());
    }

    #[tokio::test]
    async fn set_then_get() {
        let s = InMemoryStorage::new();
        s.set("cart", "{}".to_owned()).await.unwrap();
        assert_eq!(s.get("cart").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(s.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn set_overwrites() {
        let s = InMemoryStorage::with_entry("cart", "old");
        s.set("cart", "new".to_owned()).await.unwrap();
        assert_eq!(s.get("cart").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn remove_deletes_and_tolerates_missing() {
        let s = InMemoryStorage::with_entry("cart", "{}");
        s.remove("cart").await.unwrap();
        assert!(s.get("cart").await.unwrap().is_none());
        s.remove("cart").await.unwrap();
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let s = InMemoryStorage::new();
        s.set("cart", "a".to_owned()).await.unwrap();
        s.set("checkout-session", "b".to_owned()).await.unwrap();
        s.remove("cart").await.unwrap();
        assert_eq!(
            s.get("checkout-session").await.unwrap().as_deref(),
            Some("b")
        );
    }
}
