//! Data models for the cart and the order-creation wire contract.
//!
//! This module contains the cart value types, newtype ID wrappers, the
//! idempotency key, and the request/response shapes exchanged with the
//! order backend.

mod cart_line;
mod idempotency;
mod ids;
mod menu_item;
mod order;
mod snapshot;

pub use cart_line::CartLine;
pub use idempotency::IdempotencyKey;
pub use ids::{MerchantId, OrderId, ProductId};
pub use menu_item::{FoodType, MenuItemRef};
pub use order::{
    CreateOrderRequest, DeliveryLocation, OrderConfirmation, OrderEnvelope, OrderLine,
};
pub use rust_decimal::Decimal;
pub use snapshot::{CartSnapshot, normalize_coupon_code};
