//! Error types for the cart and checkout core.

/// Infrastructure errors: storage, serialization and backend transport.
#[derive(Debug, thiserror::Error)]
pub enum FoodCartError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage backend failed.
    #[error("storage error: {0}")]
    Storage(Box<dyn core::error::Error + Send + Sync>),

    /// HTTP transport failed before a response was received.
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status and no usable body.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or a placeholder when it could not be read.
        message: String,
    },

    /// The backend understood the request and refused it.
    #[error("order rejected: {message}")]
    Rejected {
        /// Message reported by the backend, passed through verbatim.
        message: String,
    },

    /// The configured backend base URL could not be parsed.
    #[cfg(feature = "http")]
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// A component that spawns background work was built outside a Tokio runtime.
    #[error("no Tokio runtime available: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = FoodCartError> = core::result::Result<T, E>;

/// What is wrong with a single cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LineItemDefect {
    /// The product identifier is empty.
    #[error("product id is empty")]
    EmptyId,
    /// The product identifier contains characters outside the allowed set
    /// or is too long.
    #[error("product id is malformed")]
    MalformedId,
    /// The unit price is below zero.
    #[error("unit price is negative")]
    NegativePrice,
}

/// Local validation failures, detected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The cart has no lines.
    #[error("cart is empty")]
    EmptyCart,
    /// The cart is not bound to a merchant.
    #[error("cart is not bound to a merchant")]
    MissingMerchant,
    /// A line item cannot be sent to the backend.
    #[error("invalid line item `{product_id}`: {reason}")]
    InvalidLineItem {
        /// Raw product identifier of the offending line.
        product_id: String,
        /// Why the line was rejected.
        reason: LineItemDefect,
    },
}

/// Outcome of a failed [`crate::checkout::CheckoutSession::submit`] call.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// The cart failed local validation; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The backend refused the order (merchant closed, item unavailable, ...).
    #[error("order rejected: {message}")]
    Rejected {
        /// Backend message, shown to the user as-is.
        message: String,
    },

    /// No usable response was received. Re-sending with the same
    /// idempotency key is safe.
    #[error("order submission failed, safe to retry: {0}")]
    Transport(FoodCartError),

    /// Another submission of this checkout session is still awaiting the
    /// backend.
    #[error("a submission for this checkout is already in progress")]
    InFlight,
}

impl CheckoutError {
    /// Returns `true` if re-sending the unchanged request may succeed.
    #[inline]
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(*self, Self::Transport(_))
    }
}

impl From<FoodCartError> for CheckoutError {
    #[inline]
    fn from(err: FoodCartError) -> Self {
        match err {
            FoodCartError::Rejected { message } => Self::Rejected { message },
            other @ (FoodCartError::Serialization(_)
            | FoodCartError::Storage(_)
            | FoodCartError::Api { .. }
            | FoodCartError::Runtime(_)) => Self::Transport(other),
            #[cfg(feature = "http")]
            other @ (FoodCartError::Http(_) | FoodCartError::InvalidBaseUrl(_)) => {
                Self::Transport(other)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_from_serde_json() {
        let serde_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err = FoodCartError::from(serde_err);
        assert!(matches!(err, FoodCartError::Serialization(_)));
        assert!(err.to_string().contains("serialization error"));
    }

    #[test]
    fn storage_error_display() {
        let inner = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only fs");
        let err = FoodCartError::Storage(Box::new(inner));
        let msg = err.to_string();
        assert!(msg.contains("storage error"));
        assert!(msg.contains("read-only fs"));
    }

    #[test]
    fn invalid_line_item_display_names_product() {
        let err = ValidationError::InvalidLineItem {
            product_id: "bad id".to_owned(),
            reason: LineItemDefect::MalformedId,
        };
        assert_eq!(
            err.to_string(),
            "invalid line item `bad id`: product id is malformed"
        );
    }

    #[test]
    fn rejected_backend_error_maps_to_rejected_checkout() {
        let err = CheckoutError::from(FoodCartError::Rejected {
            message: "Restaurant is closed".to_owned(),
        });
        assert!(matches!(err, CheckoutError::Rejected { ref message } if message == "Restaurant is closed"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn api_error_maps_to_retryable_transport() {
        let err = CheckoutError::from(FoodCartError::Api {
            status: 503,
            message: "upstream unavailable".to_owned(),
        });
        assert!(matches!(err, CheckoutError::Transport(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn validation_error_is_not_retryable() {
        let err = CheckoutError::from(ValidationError::EmptyCart);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "cart is empty");
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FoodCartError>();
        assert_send_sync::<CheckoutError>();
    }
}
