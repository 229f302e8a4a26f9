//! Domain types mirrored from the remote store.
//!
//! These types provide a clean, ergonomic API separate from the raw wire
//! payloads the remote store returns (see `remote::conversions`).

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopfront_core::{CartId, IdentityScope, ProductId};

// =============================================================================
// Product Types
// =============================================================================

/// A product reference as it appears in a wishlist or cart line.
///
/// Everything but the ID is optional; a response missing fields degrades to
/// blank display data instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Remote product ID.
    pub id: ProductId,
    /// Product title.
    #[serde(default)]
    pub title: String,
    /// Cover image URL.
    #[serde(default)]
    pub image_cover: Option<String>,
    /// Unit price.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Category display name.
    #[serde(default)]
    pub category: Option<String>,
}

impl Product {
    /// A product known only by its ID.
    #[must_use]
    pub fn from_id(id: ProductId) -> Self {
        Self {
            id,
            title: String::new(),
            image_cover: None,
            price: None,
            category: None,
        }
    }
}

// =============================================================================
// Cart Types
// =============================================================================

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The product on this line.
    pub product: Product,
    /// Line quantity.
    pub quantity: u32,
    /// Total price of the line (unit price times quantity).
    pub line_total: Decimal,
}

impl CartLine {
    /// Unit price derived from the line total, if the quantity is non-zero.
    #[must_use]
    pub fn unit_price(&self) -> Option<Decimal> {
        if self.quantity == 0 {
            return None;
        }
        Some(self.line_total / Decimal::from(self.quantity))
    }
}

/// The cart aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cart {
    /// Remote cart ID (absent until the remote store creates one).
    pub id: Option<CartId>,
    /// Cart lines in display order.
    pub lines: Vec<CartLine>,
    /// Total item quantity across all lines.
    pub item_count: u32,
    /// Sum of all line totals.
    pub subtotal: Decimal,
}

impl Cart {
    /// Find the line for a product.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.product.id == product_id)
    }

    /// Recompute `item_count` and `subtotal` from the lines.
    pub fn recompute_totals(&mut self) {
        self.item_count = self
            .lines
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity));
        self.subtotal = self.lines.iter().map(|line| line.line_total).sum();
    }
}

// =============================================================================
// Mirror Keys
// =============================================================================

/// The kind of collection a mirror entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Ordered list of wishlisted products.
    Wishlist,
    /// The cart aggregate.
    Cart,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wishlist => f.write_str("wishlist"),
            Self::Cart => f.write_str("cart"),
        }
    }
}

/// A mirrored collection value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EntityCollection {
    /// Wishlist contents.
    Wishlist(Vec<Product>),
    /// Cart contents.
    Cart(Cart),
}

impl EntityCollection {
    /// The kind of this collection.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Wishlist(_) => EntityKind::Wishlist,
            Self::Cart(_) => EntityKind::Cart,
        }
    }

    /// Borrow the wishlist, if this is one.
    #[must_use]
    pub fn as_wishlist(&self) -> Option<&[Product]> {
        match self {
            Self::Wishlist(products) => Some(products),
            Self::Cart(_) => None,
        }
    }

    /// Borrow the cart, if this is one.
    #[must_use]
    pub const fn as_cart(&self) -> Option<&Cart> {
        match self {
            Self::Cart(cart) => Some(cart),
            Self::Wishlist(_) => None,
        }
    }
}

/// Key of a mirror entry: the collection kind within one identity scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MirrorKey {
    /// Collection kind.
    pub kind: EntityKind,
    /// Identity scope the entry belongs to.
    pub scope: IdentityScope,
}

impl MirrorKey {
    /// Build a key.
    #[must_use]
    pub const fn new(kind: EntityKind, scope: IdentityScope) -> Self {
        Self { kind, scope }
    }
}

impl fmt::Display for MirrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.scope)
    }
}
