//! Wishlist commands.
//!
//! # Usage
//!
//! ```bash
//! shopfront wishlist show
//! shopfront wishlist add 6428ebc6b53d0d0e4a4f5f1c
//! shopfront wishlist toggle 6428ebc6b53d0d0e4a4f5f1c
//! ```

use shopfront_core::ProductId;
use shopfront_sync::{EntityKind, Product, ShopfrontConfig};

use super::{CliError, Session, print};

/// Print the wishlist.
pub async fn show(config: &ShopfrontConfig) -> Result<(), CliError> {
    let session = Session::open(config, EntityKind::Wishlist).await?;
    print(&session.finish(None, |engine| engine.wishlist())?)
}

/// Add a product to the wishlist.
pub async fn add(config: &ShopfrontConfig, product_id: &str) -> Result<(), CliError> {
    let session = Session::open(config, EntityKind::Wishlist).await?;
    let outcome = session
        .engine()
        .add_to_wishlist(Product::from_id(ProductId::new(product_id)))
        .await;
    print(&session.finish(Some(outcome), |engine| engine.wishlist())?)
}

/// Remove a product from the wishlist.
pub async fn remove(config: &ShopfrontConfig, product_id: &str) -> Result<(), CliError> {
    let session = Session::open(config, EntityKind::Wishlist).await?;
    let outcome = session
        .engine()
        .remove_from_wishlist(&ProductId::new(product_id))
        .await;
    print(&session.finish(Some(outcome), |engine| engine.wishlist())?)
}

/// Add the product if it is not listed, remove it if it is.
pub async fn toggle(config: &ShopfrontConfig, product_id: &str) -> Result<(), CliError> {
    let session = Session::open(config, EntityKind::Wishlist).await?;
    let outcome = session
        .engine()
        .toggle_wishlist(Product::from_id(ProductId::new(product_id)))
        .await;
    print(&session.finish(Some(outcome), |engine| engine.wishlist())?)
}
