//! Pure optimistic-apply functions.
//!
//! Each function computes the presumed result of a mutation from the live
//! mirror value. They never touch the mirror themselves; the coordinator
//! writes whatever they return.
//!
//! Membership operations are idempotent on the value they are given: adding
//! a product that is already present, or removing one that is absent,
//! returns the value unchanged.

use rust_decimal::Decimal;
use shopfront_core::{ProductId, Quantity};

use crate::model::{Cart, CartLine, EntityCollection, Product};

/// Wishlist add: append `product` unless it is already listed.
#[must_use]
pub fn wishlist_add(current: Option<&EntityCollection>, product: &Product) -> EntityCollection {
    let mut products = wishlist_of(current);
    if !products.iter().any(|item| item.id == product.id) {
        products.push(product.clone());
    }
    EntityCollection::Wishlist(products)
}

/// Wishlist remove: drop `product_id` if listed.
#[must_use]
pub fn wishlist_remove(
    current: Option<&EntityCollection>,
    product_id: &ProductId,
) -> EntityCollection {
    let mut products = wishlist_of(current);
    products.retain(|item| &item.id != product_id);
    EntityCollection::Wishlist(products)
}

/// Cart quantity change: set the line's absolute quantity and rescale its
/// total by the line's unit price. An absent line is left to the server.
#[must_use]
pub fn cart_set_quantity(
    current: Option<&EntityCollection>,
    product_id: &ProductId,
    quantity: Quantity,
) -> EntityCollection {
    let mut cart = cart_of(current);
    if let Some(line) = cart
        .lines
        .iter_mut()
        .find(|line| &line.product.id == product_id)
    {
        let unit_price = line
            .unit_price()
            .or(line.product.price)
            .unwrap_or(Decimal::ZERO);
        line.quantity = quantity.get();
        line.line_total = unit_price * Decimal::from(quantity.get());
        cart.recompute_totals();
    }
    EntityCollection::Cart(cart)
}

/// Cart line removal.
#[must_use]
pub fn cart_remove(current: Option<&EntityCollection>, product_id: &ProductId) -> EntityCollection {
    let mut cart = cart_of(current);
    let before = cart.lines.len();
    cart.lines.retain(|line| &line.product.id != product_id);
    if cart.lines.len() != before {
        cart.recompute_totals();
    }
    EntityCollection::Cart(cart)
}

/// Cart add: a new line of one, or one more of an existing line.
#[must_use]
pub fn cart_add(current: Option<&EntityCollection>, product: &Product) -> EntityCollection {
    let mut cart = cart_of(current);
    if let Some(line) = cart
        .lines
        .iter_mut()
        .find(|line| line.product.id == product.id)
    {
        let unit_price = line
            .unit_price()
            .or(product.price)
            .unwrap_or(Decimal::ZERO);
        line.quantity = line.quantity.saturating_add(1);
        line.line_total = unit_price * Decimal::from(line.quantity);
    } else {
        cart.lines.push(CartLine {
            product: product.clone(),
            quantity: 1,
            line_total: product.price.unwrap_or(Decimal::ZERO),
        });
    }
    cart.recompute_totals();
    EntityCollection::Cart(cart)
}

fn wishlist_of(current: Option<&EntityCollection>) -> Vec<Product> {
    current
        .and_then(EntityCollection::as_wishlist)
        .map(<[Product]>::to_vec)
        .unwrap_or_default()
}

fn cart_of(current: Option<&EntityCollection>) -> Cart {
    current
        .and_then(EntityCollection::as_cart)
        .cloned()
        .unwrap_or_default()
}
