//! The customer's cart.
//!
//! [`Cart`] owns the current [`CartSnapshot`] together with the
//! [`ConflictResolver`] that guards merchant switches. Mutations are
//! synchronous and never fail from the caller's point of view; every
//! applied mutation queues the new snapshot for a background writer that
//! persists it through the configured [`Storage`] backend.
//!
//! A [`Cart`] must be built inside a Tokio runtime because the writer is
//! spawned on it.

mod persist;

pub use persist::PersistErrorHook;

use alloc::sync::Arc;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use tokio::runtime::Handle;

use self::persist::PersistQueue;
use crate::error::{FoodCartError, Result};
use crate::models::{CartSnapshot, MenuItemRef, MerchantId, ProductId};
use crate::resolver::{ConflictResolver, PendingConflict, ResolverState};
use crate::storage::Storage;

/// Storage key the cart snapshot is persisted under.
pub const CART_KEY: &str = "cart";

/// Result of [`Cart::hydrate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hydration {
    /// A valid persisted cart was loaded.
    Restored,
    /// Nothing was persisted, or the store could not be read.
    Empty,
    /// The persisted value was unreadable or inconsistent and was dropped.
    Discarded,
}

/// Everything guarded by the cart lock.
#[derive(Debug, Default)]
struct CartState {
    /// Current contents.
    snapshot: CartSnapshot,
    /// Merchant-switch workflow.
    resolver: ConflictResolver,
}

/// Builder for [`Cart`].
pub struct CartBuilder<S> {
    /// Persistence backend.
    storage: Option<S>,
    /// Failure callback for background writes.
    on_persist_error: Option<PersistErrorHook>,
}

impl<S: core::fmt::Debug> core::fmt::Debug for CartBuilder<S> {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CartBuilder")
            .field("storage", &self.storage)
            .field("custom_error_hook", &self.on_persist_error.is_some())
            .finish()
    }
}

impl<S: Storage> CartBuilder<S> {
    /// Sets the storage backend the cart persists to.
    #[inline]
    #[must_use]
    pub fn storage(mut self, storage: S) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Installs a callback invoked whenever a background write fails.
    ///
    /// The default callback logs a warning. Failures never reach the
    /// caller of a mutation; the in-memory cart stays authoritative.
    #[inline]
    #[must_use]
    pub fn on_persist_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FoodCartError) + Send + Sync + 'static,
    {
        self.on_persist_error = Some(Arc::new(hook));
        self
    }

    /// Builds the cart and spawns its persistence writer.
    ///
    /// The cart starts empty; call [`Cart::hydrate`] to load the persisted
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`FoodCartError::Runtime`] when called outside a Tokio
    /// runtime, and [`FoodCartError::Storage`] if no storage was set.
    #[inline]
    pub fn build(self) -> Result<Cart<S>> {
        let runtime = Handle::try_current()?;
        let storage = Arc::new(self.storage.ok_or_else(|| {
            FoodCartError::Storage("no storage backend configured for the cart".into())
        })?);
        let hook: PersistErrorHook = match self.on_persist_error {
            Some(hook) => hook,
            None => Arc::new(persist::log_persist_error),
        };
        let queue = PersistQueue::spawn(&runtime, Arc::clone(&storage), hook);
        tracing::debug!("cart persistence writer started");
        Ok(Cart {
            state: Mutex::new(CartState::default()),
            storage,
            queue,
        })
    }
}

/// Single-merchant shopping cart with background persistence.
///
/// All methods take `&self`; share the cart between tasks with an `Arc`.
pub struct Cart<S> {
    /// Contents and resolver, mutated under one lock.
    state: Mutex<CartState>,
    /// Backend shared with the writer task.
    storage: Arc<S>,
    /// Queue into the writer task.
    queue: PersistQueue,
}

impl<S: core::fmt::Debug> core::fmt::Debug for Cart<S> {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cart")
            .field("storage", &self.storage)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl<S: Storage> Cart<S> {
    /// Creates a new builder.
    #[inline]
    #[must_use]
    pub const fn builder() -> CartBuilder<S> {
        CartBuilder {
            storage: None,
            on_persist_error: None,
        }
    }

    /// The storage backend this cart persists to.
    #[inline]
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Adds one unit of `item` sold by `merchant_id`.
    ///
    /// See [`Cart::add_item_with_quantity`].
    #[inline]
    pub fn add_item<N: Into<String>>(
        &self,
        merchant_id: MerchantId,
        merchant_name: N,
        item: MenuItemRef,
    ) {
        self.add_item_with_quantity(merchant_id, merchant_name, item, 1);
    }

    /// Adds `quantity` units of `item` (0 counts as 1).
    ///
    /// If the cart is bound to a different merchant nothing changes; the
    /// add is parked until [`Cart::confirm_switch`] or
    /// [`Cart::cancel_switch`]. A later conflicting add replaces the
    /// parked one.
    #[inline]
    pub fn add_item_with_quantity<N: Into<String>>(
        &self,
        merchant_id: MerchantId,
        merchant_name: N,
        item: MenuItemRef,
        quantity: u32,
    ) {
        let incoming_name = merchant_name.into();
        let mut guard = self.lock();
        let state = &mut *guard;
        if ConflictResolver::is_conflict(state.snapshot.merchant_id.as_ref(), &merchant_id) {
            tracing::debug!(
                from = ?state.snapshot.merchant_id.as_ref().map(MerchantId::as_inner),
                to = %merchant_id,
                "add targets another merchant, awaiting confirmation"
            );
            state.resolver.capture(PendingConflict {
                incoming_item: item,
                incoming_quantity: quantity.max(1),
                incoming_merchant_id: merchant_id,
                incoming_merchant_name: incoming_name,
                existing_merchant_name: state.snapshot.merchant_name.clone().unwrap_or_default(),
            });
            return;
        }
        state
            .snapshot
            .push_or_increment(merchant_id, incoming_name, item, quantity);
        self.queue.save(&state.snapshot);
    }

    /// Removes one unit of the product. Absent products are ignored.
    #[inline]
    pub fn remove_item(&self, item_id: &ProductId) {
        let mut state = self.lock();
        if state.snapshot.decrement(item_id) {
            self.queue.save(&state.snapshot);
        }
    }

    /// Sets the quantity of a line; 0 removes it. Absent products are ignored.
    #[inline]
    pub fn update_quantity(&self, item_id: &ProductId, quantity: u32) {
        let mut state = self.lock();
        if state.snapshot.set_quantity(item_id, quantity) {
            self.queue.save(&state.snapshot);
        }
    }

    /// Empties the cart, deletes the persisted snapshot and drops any
    /// pending merchant switch.
    #[inline]
    pub fn clear_cart(&self) {
        let mut state = self.lock();
        state.snapshot = CartSnapshot::default();
        let _had_conflict = state.resolver.discard();
        self.queue.remove();
        tracing::debug!("cart cleared");
    }

    /// Stores a coupon code after trimming and upper-casing it; blank or
    /// `None` removes the coupon.
    ///
    /// A coupon belongs to the merchant the cart is bound to, so the call
    /// does nothing while the cart is empty: the code is dropped, not kept
    /// for a later first add.
    #[inline]
    pub fn set_coupon_code(&self, code: Option<&str>) {
        let mut state = self.lock();
        if state.snapshot.is_empty() {
            return;
        }
        state.snapshot.set_coupon(code);
        self.queue.save(&state.snapshot);
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Sum of `unit_price * quantity`.
    #[inline]
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lock().snapshot.total()
    }

    /// Sum of quantities.
    #[inline]
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lock().snapshot.item_count()
    }

    /// A copy of the current contents.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.lock().snapshot.clone()
    }

    // ── Merchant switch ─────────────────────────────────────────────

    /// The parked cross-merchant add, if any.
    #[inline]
    #[must_use]
    pub fn pending_conflict(&self) -> Option<PendingConflict> {
        self.lock().resolver.pending().cloned()
    }

    /// Whether a merchant switch awaits a decision.
    #[inline]
    #[must_use]
    pub fn resolver_state(&self) -> ResolverState {
        self.lock().resolver.state()
    }

    /// Replaces the cart with the parked item, bound to its merchant.
    ///
    /// Clearing and re-adding happen under one lock and produce a single
    /// write. Returns `false` if nothing was pending.
    #[inline]
    pub fn confirm_switch(&self) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(conflict) = state.resolver.take() else {
            return false;
        };
        tracing::debug!(to = %conflict.incoming_merchant_id, "merchant switch confirmed");
        state.snapshot = CartSnapshot::default();
        state.snapshot.push_or_increment(
            conflict.incoming_merchant_id,
            conflict.incoming_merchant_name,
            conflict.incoming_item,
            conflict.incoming_quantity,
        );
        self.queue.save(&state.snapshot);
        true
    }

    /// Drops the parked add and leaves the cart untouched. Returns `false`
    /// if nothing was pending.
    #[inline]
    pub fn cancel_switch(&self) -> bool {
        let cancelled = self.lock().resolver.discard();
        if cancelled {
            tracing::debug!("merchant switch cancelled");
        }
        cancelled
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Loads the persisted snapshot into the cart.
    ///
    /// Meant to run once at startup, before any mutation. A value that
    /// does not parse or breaks the cart invariants is discarded and
    /// deleted. A failed read is logged and treated as an empty cart.
    #[inline]
    #[tracing::instrument(skip_all)]
    pub async fn hydrate(&self) -> Hydration {
        let raw = match self.storage.get(CART_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Hydration::Empty,
            Err(err) => {
                tracing::warn!(error = %err, "could not read persisted cart, starting empty");
                return Hydration::Empty;
            }
        };

        let mut state = self.lock();
        match serde_json::from_str::<CartSnapshot>(&raw) {
            Ok(snapshot) if snapshot.is_consistent() => {
                tracing::debug!(lines = snapshot.items.len(), "restored persisted cart");
                state.snapshot = snapshot;
                Hydration::Restored
            }
            Ok(_) => {
                tracing::warn!("persisted cart violates invariants, discarding");
                state.snapshot = CartSnapshot::default();
                self.queue.remove();
                Hydration::Discarded
            }
            Err(err) => {
                tracing::warn!(error = %err, "persisted cart is not valid JSON, discarding");
                state.snapshot = CartSnapshot::default();
                self.queue.remove();
                Hydration::Discarded
            }
        }
    }

    /// Waits until every write queued so far has reached storage.
    #[inline]
    pub async fn flush(&self) {
        self.queue.flush().await;
    }

    /// Locks the cart state; a poisoned lock still holds a valid cart.
    fn lock(&self) -> MutexGuard<'_, CartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
