//! Wire payloads of the remote store and their conversion to domain types.
//!
//! The wire types are deliberately lenient: every field the display layer
//! can live without is optional, so a malformed response degrades to blank
//! fields rather than a parse failure.

use rust_decimal::Decimal;
use serde::Deserialize;
use shopfront_core::{CartId, ProductId};
use tracing::warn;

use crate::model::{Cart, CartLine, Product};

// =============================================================================
// Wire Types
// =============================================================================

/// Response envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub num_of_cart_items: Option<u32>,
}

/// Error body returned with non-success statuses.
#[derive(Debug, Default, Deserialize)]
pub struct WireError {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireProduct {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image_cover: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub category: Option<WireCategory>,
}

#[derive(Debug, Deserialize)]
pub struct WireCategory {
    #[serde(default)]
    pub name: Option<String>,
}

/// A product that is either populated or just its ID.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireProductRef {
    Populated(WireProduct),
    Id(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCart {
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub products: Vec<WireCartLine>,
    #[serde(default)]
    pub total_cart_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct WireCartLine {
    pub product: WireProductRef,
    #[serde(default)]
    pub count: Option<u32>,
    /// Line price as reported by the store.
    #[serde(default)]
    pub price: Option<Decimal>,
}

// =============================================================================
// Conversions
// =============================================================================

pub fn convert_product(product: WireProductRef) -> Product {
    match product {
        WireProductRef::Populated(product) => Product {
            id: ProductId::new(product.id),
            title: product.title.unwrap_or_default(),
            image_cover: product.image_cover,
            price: product.price,
            category: product.category.and_then(|c| c.name),
        },
        WireProductRef::Id(id) => Product::from_id(ProductId::new(id)),
    }
}

pub fn convert_wishlist(envelope: Envelope<Vec<WireProductRef>>) -> Vec<Product> {
    envelope
        .data
        .unwrap_or_default()
        .into_iter()
        .map(convert_product)
        .collect()
}

pub fn convert_cart(envelope: Envelope<WireCart>) -> Cart {
    let Some(wire) = envelope.data else {
        warn!("Cart response has no data, treating as empty cart");
        return Cart::default();
    };

    let lines: Vec<CartLine> = wire
        .products
        .into_iter()
        .map(|line| {
            let product = convert_product(line.product);
            let quantity = line.count.unwrap_or(1);
            let line_total = line.price.unwrap_or_else(|| {
                product.price.unwrap_or(Decimal::ZERO) * Decimal::from(quantity)
            });
            CartLine {
                product,
                quantity,
                line_total,
            }
        })
        .collect();

    let mut cart = Cart {
        id: wire.id.map(CartId::new),
        lines,
        item_count: 0,
        subtotal: Decimal::ZERO,
    };
    cart.recompute_totals();

    // Server-computed totals win over local arithmetic.
    if let Some(count) = envelope.num_of_cart_items {
        cart.item_count = count;
    }
    if let Some(total) = wire.total_cart_price {
        cart.subtotal = total;
    }
    cart
}
