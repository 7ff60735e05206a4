//! Order-creation backends.
//!
//! [`OrderBackend`] is the single call checkout depends on. A compliant
//! backend creates at most one order per [`crate::models::IdempotencyKey`]
//! within its retention window; repeated requests with the same key return
//! the order created by the first one.

#[cfg(feature = "http")]
mod http;
mod memory;

#[cfg(feature = "http")]
pub use http::{OrderClient, OrderClientBuilder};
pub use memory::{DEFAULT_KEY_TTL, InMemoryOrderBackend};

use core::future::Future;

use crate::error::Result;
use crate::models::{CreateOrderRequest, OrderConfirmation};

/// Creates orders.
pub trait OrderBackend: core::fmt::Debug + Send + Sync {
    /// Submits an order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::FoodCartError::Rejected`] when the backend
    /// refuses the order for a business reason. Any other error means no
    /// usable answer was received and the same request may be re-sent.
    fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> impl Future<Output = Result<OrderConfirmation>> + Send;
}
