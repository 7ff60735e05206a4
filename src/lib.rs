//! Cart and order-submission core for a food-ordering client.
//!
//! The crate owns the customer's cart (one merchant at a time), persists it
//! through a pluggable [`storage::Storage`] backend, resolves cross-merchant
//! adds through an explicit confirm/cancel step, and submits checkouts to an
//! [`backend::OrderBackend`] with a session-stable idempotency key.
//!
//! ```no_run
//! use foodcart_rs::cart::Cart;
//! use foodcart_rs::models::{MenuItemRef, MerchantId, ProductId};
//! use foodcart_rs::storage::InMemoryStorage;
//! use rust_decimal::Decimal;
//!
//! # async fn demo() -> foodcart_rs::error::Result<()> {
//! let cart = Cart::builder().storage(InMemoryStorage::new()).build()?;
//! let _hydration = cart.hydrate().await;
//! cart.add_item(
//!     MerchantId::new("m1".to_owned()),
//!     "Pizza Place",
//!     MenuItemRef::new(ProductId::new("p1".to_owned()), "Margherita", Decimal::new(10, 0)),
//! );
//! assert_eq!(cart.item_count(), 1);
//! # Ok(())
//! # }
//! ```

extern crate alloc;

pub mod backend;
pub mod cart;
pub mod checkout;
pub mod error;
pub mod models;
pub mod resolver;
pub mod storage;
