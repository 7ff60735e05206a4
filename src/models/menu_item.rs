//! Menu item snapshot captured when an item is added to the cart.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ProductId;

/// Dietary marker shown next to a dish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FoodType {
    /// Vegetarian.
    Veg,
    /// Contains meat or fish.
    NonVeg,
    /// Contains egg, otherwise vegetarian.
    Egg,
    /// The merchant did not say.
    #[default]
    Unspecified,
}

/// Immutable snapshot of a purchasable item at add-time.
///
/// The cart owns one of these per line. Adding an item whose id is already
/// in the cart keeps the original snapshot and only bumps the quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemRef {
    /// Merchant-scoped product identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Price of one unit.
    pub unit_price: Decimal,
    /// Price before discount, when the menu shows a strike-through price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    /// Image reference (URL or asset key).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    /// Menu category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Dietary marker.
    #[serde(default)]
    pub food_type: FoodType,
    /// Whether the merchant listed the item as available.
    #[serde(default = "available_by_default")]
    pub available: bool,
}

/// Serde default for [`MenuItemRef::available`].
const fn available_by_default() -> bool {
    true
}

impl MenuItemRef {
    /// Creates an available item with only the required fields set.
    #[inline]
    #[must_use]
    pub fn new<T: Into<String>>(id: ProductId, name: T, unit_price: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            unit_price,
            original_price: None,
            image_ref: None,
            category: None,
            food_type: FoodType::Unspecified,
            available: true,
        }
    }

    /// Sets the pre-discount price.
    #[inline]
    #[must_use]
    pub const fn original_price(mut self, price: Decimal) -> Self {
        self.original_price = Some(price);
        self
    }

    /// Sets the image reference.
    #[inline]
    #[must_use]
    pub fn image_ref<T: Into<String>>(mut self, image: T) -> Self {
        self.image_ref = Some(image.into());
        self
    }

    /// Sets the menu category.
    #[inline]
    #[must_use]
    pub fn category<T: Into<String>>(mut self, category: T) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the dietary marker.
    #[inline]
    #[must_use]
    pub const fn food_type(mut self, food_type: FoodType) -> Self {
        self.food_type = food_type;
        self
    }

    /// Sets the availability flag.
    #[inline]
    #[must_use]
    pub const fn available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_minimal_item_fills_defaults() {
        let json = r#"{"id":"p1","name":"Paneer Tikka","unitPrice":"249.50"}"#;
        let item: MenuItemRef = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, ProductId::from("p1"));
        assert_eq!(item.unit_price, Decimal::new(24_950, 2));
        assert_eq!(item.food_type, FoodType::Unspecified);
        assert!(item.available);
        assert!(item.original_price.is_none());
    }

    #[test]
    fn builder_setters() {
        let item = MenuItemRef::new(ProductId::from("p2"), "Egg Roll", Decimal::new(80, 0))
            .original_price(Decimal::new(100, 0))
            .category("Rolls")
            .image_ref("img/egg-roll.png")
            .food_type(FoodType::Egg)
            .available(false);
        assert_eq!(item.original_price, Some(Decimal::new(100, 0)));
        assert_eq!(item.category.as_deref(), Some("Rolls"));
        assert_eq!(item.image_ref.as_deref(), Some("img/egg-roll.png"));
        assert_eq!(item.food_type, FoodType::Egg);
        assert!(!item.available);
    }

    #[test]
    fn food_type_uses_camel_case() {
        let json = serde_json::to_string(&FoodType::NonVeg).unwrap();
        assert_eq!(json, r#""nonVeg""#);
    }
}
