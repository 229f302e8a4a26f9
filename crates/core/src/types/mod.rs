//! Core types for the storefront mirror.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod identity;
pub mod quantity;

pub use id::*;
pub use identity::{IdentityScope, IdentityToken};
pub use quantity::{Quantity, QuantityError};
