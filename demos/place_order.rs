//! Walks through a full order against the in-memory backend: fill a cart,
//! hit a merchant conflict, lose a response and retry under the same key.
//!
//! Run with `cargo run --example place_order`.

use std::io::{self, Write as _};

use foodcart_rs::backend::InMemoryOrderBackend;
use foodcart_rs::cart::Cart;
use foodcart_rs::checkout::CheckoutSession;
use foodcart_rs::models::{Decimal, FoodType, MenuItemRef, MerchantId, ProductId};
use foodcart_rs::storage::InMemoryStorage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn core::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();
    let mut out = io::stdout().lock();

    let cart = Cart::builder().storage(InMemoryStorage::new()).build()?;
    let _hydration = cart.hydrate().await;

    let margherita = MenuItemRef::new(ProductId::from("p1"), "Margherita", Decimal::new(10, 0))
        .food_type(FoodType::Veg);
    cart.add_item(MerchantId::from("m1"), "Pizza Place", margherita.clone());
    cart.add_item(MerchantId::from("m1"), "Pizza Place", margherita);
    writeln!(out, "cart total: {}", cart.total())?;

    let burger = MenuItemRef::new(ProductId::from("b1"), "Smash Burger", Decimal::new(5, 0));
    cart.add_item(MerchantId::from("m2"), "Burger Barn", burger);
    if let Some(conflict) = cart.pending_conflict() {
        let prompt = conflict.prompt();
        writeln!(
            out,
            "switch from {} to {}? yes",
            prompt.old_merchant_name, prompt.new_merchant_name
        )?;
        let _switched = cart.confirm_switch();
    }
    cart.set_coupon_code(Some(" welcome50 "));
    writeln!(out, "cart total after switch: {}", cart.total())?;

    let backend = InMemoryOrderBackend::new();
    backend.drop_next_responses(1)?;
    let session = CheckoutSession::new(backend);

    if let Err(err) = session.submit(&cart, None).await {
        writeln!(out, "first attempt failed (retryable: {}): {err}", err.is_retryable())?;
    }
    let receipt = session.submit(&cart, None).await?;
    writeln!(
        out,
        "placed {} for {} under key {}; orders created: {}",
        receipt.order_id,
        receipt.total,
        receipt.idempotency_key,
        session.backend().order_count()?
    )?;

    cart.flush().await;
    Ok(())
}
