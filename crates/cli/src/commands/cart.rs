//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! shopfront cart show
//! shopfront cart add 6428ebc6b53d0d0e4a4f5f1c
//! shopfront cart set 6428ebc6b53d0d0e4a4f5f1c 3
//! shopfront cart dec 6428ebc6b53d0d0e4a4f5f1c
//! ```

use shopfront_core::ProductId;
use shopfront_sync::{EntityKind, MutationOutcome, Product, ShopfrontConfig};

use super::{CliError, Session, print};

/// Quantity changes a cart command can request.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// One more.
    Increment,
    /// One fewer, never below one.
    Decrement,
}

/// Print the cart.
pub async fn show(config: &ShopfrontConfig) -> Result<(), CliError> {
    let session = Session::open(config, EntityKind::Cart).await?;
    print(&session.finish(None, |engine| engine.cart().unwrap_or_default())?)
}

/// Add one of a product to the cart.
pub async fn add(config: &ShopfrontConfig, product_id: &str) -> Result<(), CliError> {
    let session = Session::open(config, EntityKind::Cart).await?;
    let outcome = session
        .engine()
        .add_to_cart(Product::from_id(ProductId::new(product_id)))
        .await;
    finish(session, outcome)
}

/// Set the absolute quantity of a line. Values below one become one.
pub async fn set(config: &ShopfrontConfig, product_id: &str, quantity: i64) -> Result<(), CliError> {
    let session = Session::open(config, EntityKind::Cart).await?;
    let outcome = session
        .engine()
        .set_cart_quantity(&ProductId::new(product_id), quantity)
        .await;
    finish(session, outcome)
}

/// Step a line's quantity up or down.
pub async fn step(config: &ShopfrontConfig, product_id: &str, step: Step) -> Result<(), CliError> {
    let session = Session::open(config, EntityKind::Cart).await?;
    let product_id = ProductId::new(product_id);
    let outcome = match step {
        Step::Increment => session.engine().increment_cart_quantity(&product_id).await,
        Step::Decrement => session.engine().decrement_cart_quantity(&product_id).await,
    };
    finish(session, outcome)
}

/// Remove a line from the cart.
pub async fn remove(config: &ShopfrontConfig, product_id: &str) -> Result<(), CliError> {
    let session = Session::open(config, EntityKind::Cart).await?;
    let outcome = session
        .engine()
        .remove_from_cart(&ProductId::new(product_id))
        .await;
    finish(session, outcome)
}

fn finish(session: Session, outcome: MutationOutcome) -> Result<(), CliError> {
    print(&session.finish(Some(outcome), |engine| engine.cart().unwrap_or_default())?)
}
