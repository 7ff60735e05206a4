//! In-process order backend.
//!
//! [`InMemoryOrderBackend`] implements the idempotency guarantee the
//! checkout flow relies on: the first request for a key creates an order,
//! later requests with the same key get that order back. It also lets
//! tests close merchants and lose responses on the way back.

use core::future::{self, Future};
use core::time::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};

use super::OrderBackend;
use crate::error::{FoodCartError, Result};
use crate::models::{
    CreateOrderRequest, IdempotencyKey, MerchantId, OrderConfirmation, OrderEnvelope, OrderId,
};

/// How long a key is remembered unless overridden with
/// [`InMemoryOrderBackend::with_ttl`].
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Message returned for orders against a closed merchant.
const CLOSED_MESSAGE: &str = "Restaurant is closed";

/// Order created for an idempotency key.
#[derive(Debug, Clone)]
struct KeyRecord {
    /// Confirmation replayed for repeated requests.
    confirmation: OrderConfirmation,
    /// When the order was created.
    created_at: DateTime<Utc>,
}

/// Mutable state behind the backend's lock.
#[derive(Debug, Default)]
struct Ledger {
    /// Orders by the key that created them.
    by_key: HashMap<IdempotencyKey, KeyRecord>,
    /// Every order ever created, in creation order.
    orders: Vec<CreateOrderRequest>,
    /// Merchants that reject orders.
    closed: HashSet<MerchantId>,
    /// Responses still to be lost after the order is recorded.
    responses_to_drop: usize,
}

/// Reference order backend keeping everything in memory.
#[derive(Debug)]
pub struct InMemoryOrderBackend {
    /// Orders, keys and failure switches.
    ledger: Mutex<Ledger>,
    /// Key retention window.
    ttl: TimeDelta,
}

impl Default for InMemoryOrderBackend {
    #[inline]
    fn default() -> Self {
        Self::with_ttl(DEFAULT_KEY_TTL)
    }
}

impl InMemoryOrderBackend {
    /// Creates a backend that remembers keys for [`DEFAULT_KEY_TTL`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that remembers keys for `ttl`. After that a
    /// request with the same key creates a new order.
    #[inline]
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Makes every following order for `merchant_id` fail with a
    /// business rejection.
    ///
    /// # Errors
    ///
    /// Returns an error if the inner lock is poisoned.
    #[inline]
    pub fn close_merchant(&self, merchant_id: MerchantId) -> Result<()> {
        let mut ledger = self.lock()?;
        let _newly_closed = ledger.closed.insert(merchant_id);
        Ok(())
    }

    /// Records the next `count` orders but answers each with a transport
    /// error, as if the response was lost.
    ///
    /// # Errors
    ///
    /// Returns an error if the inner lock is poisoned.
    #[inline]
    pub fn drop_next_responses(&self, count: usize) -> Result<()> {
        self.lock()?.responses_to_drop = count;
        Ok(())
    }

    /// Number of orders actually created.
    ///
    /// # Errors
    ///
    /// Returns an error if the inner lock is poisoned.
    #[inline]
    pub fn order_count(&self) -> Result<usize> {
        Ok(self.lock()?.orders.len())
    }

    /// Requests that created orders, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the inner lock is poisoned.
    #[inline]
    pub fn orders(&self) -> Result<Vec<CreateOrderRequest>> {
        Ok(self.lock()?.orders.clone())
    }

    /// Acquires the ledger lock.
    fn lock(&self) -> Result<MutexGuard<'_, Ledger>> {
        self.ledger
            .lock()
            .map_err(|err| FoodCartError::Storage(err.to_string().into()))
    }

    /// Creates or replays the order for the request's key.
    fn place(&self, request: &CreateOrderRequest) -> Result<OrderConfirmation> {
        let mut ledger = self.lock()?;
        let now = Utc::now();
        let ttl = self.ttl;
        ledger
            .by_key
            .retain(|_key, record| now.signed_duration_since(record.created_at) < ttl);

        // A known key replays its order even if the merchant closed since.
        let confirmation = if let Some(record) = ledger.by_key.get(&request.idempotency_key) {
            tracing::debug!(order = %record.confirmation.id, "replaying order for known key");
            record.confirmation.clone()
        } else {
            if ledger.closed.contains(&request.merchant_id) {
                tracing::debug!(merchant = %request.merchant_id, "merchant closed, rejecting order");
                return OrderEnvelope::rejected(CLOSED_MESSAGE).into_result(409);
            }
            let sequence = ledger.orders.len().saturating_add(1);
            let confirmation = OrderConfirmation {
                id: OrderId::new(format!("ord-{sequence:06}")),
                total_price: Some(request.total_price),
            };
            let _previous = ledger.by_key.insert(
                request.idempotency_key.clone(),
                KeyRecord {
                    confirmation: confirmation.clone(),
                    created_at: now,
                },
            );
            ledger.orders.push(request.clone());
            tracing::debug!(order = %confirmation.id, "order created");
            confirmation
        };

        if ledger.responses_to_drop > 0 {
            ledger.responses_to_drop -= 1;
            return Err(FoodCartError::Api {
                status: 504,
                message: "response lost".to_owned(),
            });
        }
        OrderEnvelope::accepted(confirmation).into_result(201)
    }
}

impl OrderBackend for InMemoryOrderBackend {
    #[inline]
    fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> impl Future<Output = Result<OrderConfirmation>> + Send {
        future::ready(self.place(request))
    }
}
