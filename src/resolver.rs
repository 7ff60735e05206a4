//! Merchant-conflict resolution.
//!
//! A cart belongs to one merchant at a time. When an add targets a
//! different merchant, the add is parked in a [`ConflictResolver`] until
//! the user either confirms the switch (the cart is replaced) or cancels
//! it (the cart stays as it was).
//!
//! The resolver is a plain value; [`crate::cart::Cart`] embeds it under its
//! own lock so a confirm can clear and re-add atomically.

use crate::models::{MenuItemRef, MerchantId};

/// Whether a merchant switch is waiting for a decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolverState {
    /// No conflict is pending.
    #[default]
    Idle,
    /// An add for another merchant awaits confirm or cancel.
    PendingConfirmation,
}

/// The add that was parked because it targets another merchant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConflict {
    /// Item the user tried to add.
    pub incoming_item: MenuItemRef,
    /// Requested quantity, at least 1.
    pub incoming_quantity: u32,
    /// Merchant the item belongs to.
    pub incoming_merchant_id: MerchantId,
    /// Display name of that merchant.
    pub incoming_merchant_name: String,
    /// Display name of the merchant the cart is currently bound to.
    pub existing_merchant_name: String,
}

impl PendingConflict {
    /// Text for the "replace your cart?" dialog.
    #[inline]
    #[must_use]
    pub fn prompt(&self) -> SwitchPrompt {
        SwitchPrompt {
            old_merchant_name: self.existing_merchant_name.clone(),
            new_merchant_name: self.incoming_merchant_name.clone(),
        }
    }
}

/// What the confirmation dialog shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchPrompt {
    /// Merchant whose items would be discarded.
    pub old_merchant_name: String,
    /// Merchant the cart would switch to.
    pub new_merchant_name: String,
}

/// Two-state machine guarding merchant switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictResolver {
    /// Parked add, present only in [`ResolverState::PendingConfirmation`].
    pending: Option<PendingConflict>,
}

impl ConflictResolver {
    /// Creates an idle resolver.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Returns `true` when adding for `incoming` requires confirmation,
    /// i.e. the cart is bound to some other merchant. An unbound cart
    /// never conflicts.
    #[inline]
    #[must_use]
    pub fn is_conflict(bound: Option<&MerchantId>, incoming: &MerchantId) -> bool {
        bound.is_some_and(|current| current != incoming)
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ResolverState {
        if self.pending.is_some() {
            ResolverState::PendingConfirmation
        } else {
            ResolverState::Idle
        }
    }

    /// The parked add, if any.
    #[inline]
    #[must_use]
    pub const fn pending(&self) -> Option<&PendingConflict> {
        self.pending.as_ref()
    }

    /// Parks a conflicting add. Replaces any conflict already pending.
    #[inline]
    pub fn capture(&mut self, conflict: PendingConflict) {
        if let Some(previous) = self.pending.replace(conflict) {
            tracing::debug!(
                merchant = %previous.incoming_merchant_id,
                "superseded pending merchant switch"
            );
        }
    }

    /// Removes and returns the parked add so the caller can apply it.
    #[inline]
    pub const fn take(&mut self) -> Option<PendingConflict> {
        self.pending.take()
    }

    /// Drops the parked add. Returns `false` if nothing was pending.
    #[inline]
    pub fn discard(&mut self) -> bool {
        self.pending.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::ProductId;

    fn conflict(merchant: &str) -> PendingConflict {
        PendingConflict {
            incoming_item: MenuItemRef::new(ProductId::from("b1"), "Burger", Decimal::new(5, 0)),
            incoming_quantity: 1,
            incoming_merchant_id: MerchantId::from(merchant),
            incoming_merchant_name: format!("Merchant {merchant}"),
            existing_merchant_name: "Pizza Place".to_owned(),
        }
    }

    #[test]
    fn empty_cart_never_conflicts() {
        assert!(!ConflictResolver::is_conflict(None, &MerchantId::from("m2")));
    }

    #[test]
    fn same_merchant_does_not_conflict() {
        let bound = MerchantId::from("m1");
        assert!(!ConflictResolver::is_conflict(Some(&bound), &MerchantId::from("m1")));
        assert!(ConflictResolver::is_conflict(Some(&bound), &MerchantId::from("m2")));
    }

    #[test]
    fn capture_moves_to_pending() {
        let mut resolver = ConflictResolver::new();
        assert_eq!(resolver.state(), ResolverState::Idle);
        resolver.capture(conflict("m2"));
        assert_eq!(resolver.state(), ResolverState::PendingConfirmation);
        assert_eq!(
            resolver.pending().unwrap().prompt(),
            SwitchPrompt {
                old_merchant_name: "Pizza Place".to_owned(),
                new_merchant_name: "Merchant m2".to_owned(),
            }
        );
    }

    #[test]
    fn latest_conflict_wins() {
        let mut resolver = ConflictResolver::new();
        resolver.capture(conflict("m2"));
        resolver.capture(conflict("m3"));
        let taken = resolver.take().unwrap();
        assert_eq!(taken.incoming_merchant_id, MerchantId::from("m3"));
        assert_eq!(resolver.state(), ResolverState::Idle);
    }

    #[test]
    fn discard_without_pending_is_noop() {
        let mut resolver = ConflictResolver::new();
        assert!(!resolver.discard());
        assert!(resolver.take().is_none());
        resolver.capture(conflict("m2"));
        assert!(resolver.discard());
        assert_eq!(resolver.state(), ResolverState::Idle);
    }
}
