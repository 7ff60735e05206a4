//! Cart line model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::MenuItemRef;

/// A menu item together with how many units the customer wants.
///
/// The quantity is at least 1 for any line held by a cart; a line that
/// would drop to 0 is removed instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Snapshot of the item taken when it was first added.
    pub item: MenuItemRef,
    /// Number of units.
    pub quantity: u32,
}

impl CartLine {
    /// `unit_price * quantity`.
    #[inline]
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.item.unit_price * Decimal::from(self.quantity)
    }
}
