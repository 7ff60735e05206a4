//! Checkout: validate the cart and submit it exactly once.
//!
//! A [`CheckoutSession`] corresponds to one checkout screen. It owns a
//! single [`IdempotencyKey`] for its whole life, so any number of retries
//! (after timeouts, lost responses or a double tap) collapse into one order
//! on a compliant backend.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;

use crate::backend::OrderBackend;
use crate::cart::Cart;
use crate::error::{CheckoutError, LineItemDefect, ValidationError};
use crate::models::{
    CartSnapshot, CreateOrderRequest, DeliveryLocation, IdempotencyKey, MerchantId, OrderId,
    OrderLine,
};
use crate::storage::Storage;

/// Longest product identifier accepted by [`validate`].
const MAX_PRODUCT_ID_LEN: usize = 128;

/// What the customer gets back once the order exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    /// Backend order identifier.
    pub order_id: OrderId,
    /// Charged total: the backend's figure when it sent one, otherwise the
    /// cart total that was submitted.
    pub total: Decimal,
    /// Key the order was submitted under.
    pub idempotency_key: IdempotencyKey,
}

/// Where a checkout session stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CheckoutState {
    /// Nothing submitted yet.
    #[default]
    Ready,
    /// A submission is awaiting the backend.
    Submitting,
    /// The order exists; further submits return this receipt.
    Succeeded(OrderReceipt),
    /// The last attempt failed; the next submit tries again.
    Failed {
        /// Error shown to the user.
        message: String,
        /// Whether re-sending the same request may succeed.
        retryable: bool,
    },
}

/// Checks that a cart can be turned into an order request.
///
/// # Errors
///
/// Returns the first problem found: an empty cart, a missing merchant
/// binding, or a line whose product id or price cannot be sent.
#[inline]
pub fn validate(snapshot: &CartSnapshot) -> Result<(), ValidationError> {
    if snapshot.items.is_empty() {
        return Err(ValidationError::EmptyCart);
    }
    if snapshot
        .merchant_id
        .as_ref()
        .is_none_or(MerchantId::is_blank)
    {
        return Err(ValidationError::MissingMerchant);
    }
    for line in &snapshot.items {
        let id = line.item.id.as_inner();
        let defect = if id.is_empty() {
            Some(LineItemDefect::EmptyId)
        } else if !is_well_formed_id(id) {
            Some(LineItemDefect::MalformedId)
        } else if line.item.unit_price < Decimal::ZERO {
            Some(LineItemDefect::NegativePrice)
        } else {
            None
        };
        if let Some(reason) = defect {
            return Err(ValidationError::InvalidLineItem {
                product_id: id.to_owned(),
                reason,
            });
        }
    }
    Ok(())
}

/// ASCII letters, digits and `-_.:`, at most [`MAX_PRODUCT_ID_LEN`] bytes.
fn is_well_formed_id(id: &str) -> bool {
    id.len() <= MAX_PRODUCT_ID_LEN
        && id
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b':'))
}

/// Builds the wire request from a validated snapshot.
fn build_request(
    snapshot: &CartSnapshot,
    key: &IdempotencyKey,
    delivery_location: Option<DeliveryLocation>,
) -> Result<CreateOrderRequest, ValidationError> {
    let merchant_id = snapshot
        .merchant_id
        .clone()
        .ok_or(ValidationError::MissingMerchant)?;
    Ok(CreateOrderRequest {
        idempotency_key: key.clone(),
        merchant_id,
        items: snapshot
            .items
            .iter()
            .map(|line| OrderLine {
                product_id: line.item.id.clone(),
                quantity: line.quantity,
                name: line.item.name.clone(),
            })
            .collect(),
        total_price: snapshot.total(),
        delivery_location,
        coupon_code: snapshot.coupon_code.clone(),
    })
}

/// One checkout attempt sequence sharing a single idempotency key.
#[derive(Debug)]
pub struct CheckoutSession<B> {
    /// Where orders are created.
    backend: B,
    /// Key reused for every attempt of this session.
    key: IdempotencyKey,
    /// Current state, never held across an await.
    state: Mutex<CheckoutState>,
}

impl<B: OrderBackend> CheckoutSession<B> {
    /// Starts a session with a freshly generated key.
    #[inline]
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_key(backend, IdempotencyKey::generate())
    }

    /// Resumes a session under a key issued earlier, e.g. one saved before
    /// the process restarted.
    #[inline]
    #[must_use]
    pub const fn with_key(backend: B, key: IdempotencyKey) -> Self {
        Self {
            backend,
            key,
            state: Mutex::new(CheckoutState::Ready),
        }
    }

    /// The key every attempt of this session is sent with.
    #[inline]
    #[must_use]
    pub const fn idempotency_key(&self) -> &IdempotencyKey {
        &self.key
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> CheckoutState {
        self.lock().clone()
    }

    /// The backend orders are sent to.
    #[inline]
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Validates the cart and submits it.
    ///
    /// On success the cart is cleared and the receipt is kept; later calls
    /// return it without contacting the backend. On failure the cart and
    /// the key are left alone so the call can simply be repeated. Dropping
    /// the returned future mid-flight (a timeout, an aborted task) leaves
    /// the session in a retryable [`CheckoutState::Failed`].
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::InFlight`] if another call is still waiting.
    /// - [`CheckoutError::Validation`] if the cart cannot be sent.
    /// - [`CheckoutError::Rejected`] if the backend refused the order.
    /// - [`CheckoutError::Transport`] if no usable answer arrived; retrying
    ///   is safe.
    #[inline]
    #[tracing::instrument(skip_all, fields(key = %self.key))]
    pub async fn submit<S: Storage>(
        &self,
        cart: &Cart<S>,
        delivery_location: Option<DeliveryLocation>,
    ) -> Result<OrderReceipt, CheckoutError> {
        let request = {
            let mut state = self.lock();
            if *state == CheckoutState::Submitting {
                tracing::debug!("submission already in flight");
                return Err(CheckoutError::InFlight);
            }
            if let CheckoutState::Succeeded(receipt) = state.clone() {
                tracing::debug!(order = %receipt.order_id, "already submitted, returning receipt");
                return Ok(receipt);
            }

            let snapshot = cart.snapshot();
            let prepared = validate(&snapshot)
                .and_then(|()| build_request(&snapshot, &self.key, delivery_location));
            match prepared {
                Ok(request) => {
                    *state = CheckoutState::Submitting;
                    request
                }
                Err(err) => {
                    tracing::debug!(error = %err, "cart failed validation");
                    *state = CheckoutState::Failed {
                        message: err.to_string(),
                        retryable: false,
                    };
                    return Err(CheckoutError::Validation(err));
                }
            }
        };

        tracing::debug!(lines = request.items.len(), total = %request.total_price, "submitting order");
        let guard = SubmitGuard::arm(&self.state);
        let outcome = self.backend.create_order(&request).await;
        guard.disarm();

        let mut state = self.lock();
        match outcome {
            Ok(confirmation) => {
                let receipt = OrderReceipt {
                    order_id: confirmation.id,
                    total: confirmation.total_price.unwrap_or(request.total_price),
                    idempotency_key: self.key.clone(),
                };
                tracing::debug!(order = %receipt.order_id, "order placed");
                *state = CheckoutState::Succeeded(receipt.clone());
                drop(state);
                cart.clear_cart();
                Ok(receipt)
            }
            Err(err) => {
                let checkout_err = CheckoutError::from(err);
                let retryable = checkout_err.is_retryable();
                tracing::warn!(error = %checkout_err, retryable, "order submission failed");
                *state = CheckoutState::Failed {
                    message: checkout_err.to_string(),
                    retryable,
                };
                Err(checkout_err)
            }
        }
    }

    /// Locks the state; a poisoned lock still holds a valid state.
    fn lock(&self) -> MutexGuard<'_, CheckoutState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Message recorded when a submission is dropped before the backend answered.
const INTERRUPTED_MESSAGE: &str = "submission was interrupted before the backend answered";

/// Moves a session out of [`CheckoutState::Submitting`] if the submit
/// future is dropped mid-await.
#[derive(Debug)]
struct SubmitGuard<'state> {
    /// State to reset; `None` once disarmed.
    state: Option<&'state Mutex<CheckoutState>>,
}

impl<'state> SubmitGuard<'state> {
    /// Starts guarding `state`.
    const fn arm(state: &'state Mutex<CheckoutState>) -> Self {
        Self { state: Some(state) }
    }

    /// The await completed; the caller records the outcome itself.
    fn disarm(mut self) {
        self.state = None;
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            tracing::warn!("order submission interrupted; the next submit retries");
            *state.lock().unwrap_or_else(PoisonError::into_inner) = CheckoutState::Failed {
                message: INTERRUPTED_MESSAGE.to_owned(),
                retryable: true,
            };
        }
    }
}
