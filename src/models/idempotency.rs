//! Idempotency keys for order submission.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-generated token that lets the order backend collapse duplicate
/// submissions of the same checkout.
///
/// One key is generated per checkout session and reused for every retry of
/// that session. The format is `<unix microseconds>-<32 hex digits>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Generates a fresh key from the current time and a random suffix.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        let micros = Utc::now().timestamp_micros();
        Self(format!("{micros}-{}", Uuid::new_v4().simple()))
    }

    /// Wraps a previously issued key, e.g. one restored from storage.
    #[inline]
    #[must_use]
    pub const fn from_existing(value: String) -> Self {
        Self(value)
    }

    /// Returns the key as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for IdempotencyKey {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
