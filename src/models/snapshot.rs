//! Value form of the cart: what is persisted and what checkout reads.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CartLine, MenuItemRef, MerchantId, ProductId};

/// Complete cart state.
///
/// `merchant_id` is `None` exactly when `items` is empty; the merchant
/// name and coupon code follow the binding and are dropped together with
/// it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    /// Merchant the cart is bound to.
    #[serde(default)]
    pub merchant_id: Option<MerchantId>,
    /// Display name of the bound merchant.
    #[serde(default)]
    pub merchant_name: Option<String>,
    /// Lines in insertion order.
    #[serde(default)]
    pub items: Vec<CartLine>,
    /// Normalized coupon code.
    #[serde(default)]
    pub coupon_code: Option<String>,
}

impl CartSnapshot {
    /// Sum of `unit_price * quantity` over all lines.
    #[inline]
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartLine::line_total).sum()
    }

    /// Sum of quantities over all lines.
    #[inline]
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Returns `true` if the cart has no lines.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Looks up the line for a product.
    #[inline]
    #[must_use]
    pub fn line(&self, id: &ProductId) -> Option<&CartLine> {
        self.items.iter().find(|line| line.item.id == *id)
    }

    /// Checks the structural invariants a persisted snapshot must satisfy:
    /// binding present iff lines present, no name or coupon without a
    /// binding, no zero quantities, no duplicate product ids.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        if self.merchant_id.is_some() == self.items.is_empty() {
            return false;
        }
        if self.merchant_id.is_none()
            && (self.merchant_name.is_some() || self.coupon_code.is_some())
        {
            return false;
        }
        if self.items.iter().any(|line| line.quantity == 0) {
            return false;
        }
        let mut seen = std::collections::HashSet::with_capacity(self.items.len());
        self.items.iter().all(|line| seen.insert(&line.item.id))
    }

    // ── Mutations used by the cart ──────────────────────────────────

    /// Appends a line or bumps the existing one. Binds the merchant when
    /// the cart was empty. The caller has already ruled out a merchant
    /// mismatch.
    pub(crate) fn push_or_increment(
        &mut self,
        merchant_id: MerchantId,
        merchant_name: String,
        item: MenuItemRef,
        quantity: u32,
    ) {
        let units = quantity.max(1);
        if self.items.is_empty() {
            self.merchant_id = Some(merchant_id);
            self.merchant_name = Some(merchant_name);
        }
        if let Some(line) = self.items.iter_mut().find(|line| line.item.id == item.id) {
            line.quantity = line.quantity.saturating_add(units);
        } else {
            self.items.push(CartLine {
                item,
                quantity: units,
            });
        }
    }

    /// Removes one unit of the product. Returns `false` if it is not in
    /// the cart.
    pub(crate) fn decrement(&mut self, id: &ProductId) -> bool {
        let Some(position) = self.items.iter().position(|line| line.item.id == *id) else {
            return false;
        };
        let emptied = self.items.get_mut(position).is_some_and(|line| {
            line.quantity = line.quantity.saturating_sub(1);
            line.quantity == 0
        });
        if emptied {
            let _removed = self.items.remove(position);
        }
        self.release_binding_if_empty();
        true
    }

    /// Sets a line's quantity; 0 removes the line. Returns `false` if the
    /// product is not in the cart.
    pub(crate) fn set_quantity(&mut self, id: &ProductId, quantity: u32) -> bool {
        let Some(position) = self.items.iter().position(|line| line.item.id == *id) else {
            return false;
        };
        if quantity == 0 {
            let _removed = self.items.remove(position);
            self.release_binding_if_empty();
        } else if let Some(line) = self.items.get_mut(position) {
            line.quantity = quantity;
        }
        true
    }

    /// Stores a normalized coupon code.
    pub(crate) fn set_coupon(&mut self, code: Option<&str>) {
        self.coupon_code = code.and_then(normalize_coupon_code);
    }

    /// Drops the merchant binding and coupon once the last line is gone.
    fn release_binding_if_empty(&mut self) {
        if self.items.is_empty() {
            self.merchant_id = None;
            self.merchant_name = None;
            self.coupon_code = None;
        }
    }
}

/// Trims and upper-cases a coupon code; blank input yields `None`.
#[inline]
#[must_use]
pub fn normalize_coupon_code(code: &str) -> Option<String> {
    let trimmed = code.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, price: i64) -> MenuItemRef {
        MenuItemRef::new(ProductId::from(id), format!("Item {id}"), Decimal::new(price, 0))
    }

    fn bound_cart() -> CartSnapshot {
        let mut cart = CartSnapshot::default();
        cart.push_or_increment(MerchantId::from("m1"), "Pizza Place".to_owned(), item("p1", 10), 1);
        cart
    }

    #[test]
    fn first_push_binds_merchant() {
        let cart = bound_cart();
        assert_eq!(cart.merchant_id, Some(MerchantId::from("m1")));
        assert_eq!(cart.merchant_name.as_deref(), Some("Pizza Place"));
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total(), Decimal::new(10, 0));
    }

    #[test]
    fn repeated_push_keeps_first_snapshot() {
        let mut cart = bound_cart();
        let mut renamed = item("p1", 99);
        renamed.name = "Renamed".to_owned();
        cart.push_or_increment(MerchantId::from("m1"), "Pizza Place".to_owned(), renamed, 2);
        let line = cart.line(&ProductId::from("p1")).unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.item.name, "Item p1");
        assert_eq!(cart.total(), Decimal::new(30, 0));
    }

    #[test]
    fn zero_quantity_push_counts_as_one() {
        let mut cart = CartSnapshot::default();
        cart.push_or_increment(MerchantId::from("m1"), "M".to_owned(), item("p1", 4), 0);
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn decrement_last_unit_releases_binding_and_coupon() {
        let mut cart = bound_cart();
        cart.set_coupon(Some("save10"));
        assert!(cart.decrement(&ProductId::from("p1")));
        assert_eq!(cart, CartSnapshot::default());
    }

    #[test]
    fn decrement_unknown_is_noop() {
        let mut cart = bound_cart();
        assert!(!cart.decrement(&ProductId::from("nope")));
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn set_quantity_zero_removes_line() {
        let mut cart = bound_cart();
        cart.push_or_increment(MerchantId::from("m1"), "Pizza Place".to_owned(), item("p2", 3), 4);
        assert!(cart.set_quantity(&ProductId::from("p2"), 0));
        assert!(cart.line(&ProductId::from("p2")).is_none());
        assert!(cart.merchant_id.is_some());
        assert!(cart.set_quantity(&ProductId::from("p1"), 5));
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn coupon_is_normalized() {
        assert_eq!(normalize_coupon_code("  welcome50 "), Some("WELCOME50".to_owned()));
        assert_eq!(normalize_coupon_code("   "), None);
    }

    #[test]
    fn consistency_checks() {
        assert!(CartSnapshot::default().is_consistent());
        assert!(bound_cart().is_consistent());

        let mut unbound_lines = bound_cart();
        unbound_lines.merchant_id = None;
        assert!(!unbound_lines.is_consistent());

        let mut zero = bound_cart();
        if let Some(line) = zero.items.first_mut() {
            line.quantity = 0;
        }
        assert!(!zero.is_consistent());

        let mut dup = bound_cart();
        let first = dup.items.first().cloned().unwrap();
        dup.items.push(first);
        assert!(!dup.is_consistent());

        let orphan_coupon = CartSnapshot {
            coupon_code: Some("X".to_owned()),
            ..CartSnapshot::default()
        };
        assert!(!orphan_coupon.is_consistent());
    }

    #[test]
    fn deserialize_persisted_shape() {
        let json = r#"{
            "merchantId": "m1",
            "merchantName": "Pizza Place",
            "items": [{"item": {"id": "p1", "name": "Margherita", "unitPrice": 10}, "quantity": 2}],
            "couponCode": "X"
        }"#;
        let cart: CartSnapshot = serde_json::from_str(json).unwrap();
        assert!(cart.is_consistent());
        assert_eq!(cart.total(), Decimal::new(20, 0));
    }
}
