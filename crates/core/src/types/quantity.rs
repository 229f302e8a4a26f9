//! Absolute cart line quantity.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Quantity`] strictly.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The value is below the minimum of one.
    #[error("quantity must be at least {min} (got {value})")]
    BelowMinimum {
        /// Minimum allowed quantity.
        min: u32,
        /// The rejected value.
        value: i64,
    },
    /// The value does not fit into a `u32`.
    #[error("quantity {0} is too large")]
    TooLarge(i64),
}

/// An absolute cart line quantity, always at least one.
///
/// Quantity changes always carry the target quantity rather than a delta.
/// A cart line can never be decremented to zero through a quantity change;
/// removing a line is a separate operation.
///
/// ## Examples
///
/// ```
/// use shopfront_core::Quantity;
///
/// assert_eq!(Quantity::clamped(0).get(), 1);
/// assert_eq!(Quantity::clamped(-4).get(), 1);
/// assert_eq!(Quantity::clamped(3).get(), 3);
/// assert!(Quantity::try_from(0_i64).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// The smallest quantity a cart line may hold.
    pub const MIN: Self = Self(1);

    /// Build a quantity, clamping anything below one up to one.
    ///
    /// Values above `u32::MAX` saturate.
    #[must_use]
    pub fn clamped(value: i64) -> Self {
        if value < 1 {
            return Self::MIN;
        }
        Self(u32::try_from(value).unwrap_or(u32::MAX))
    }

    /// Build a quantity from an unsigned value, returning `None` for zero.
    #[must_use]
    pub const fn new(value: u32) -> Option<Self> {
        if value == 0 { None } else { Some(Self(value)) }
    }

    /// The raw quantity.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// One more than this quantity (saturating).
    #[must_use]
    pub const fn incremented(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// One less than this quantity, never below one.
    #[must_use]
    pub const fn decremented(self) -> Self {
        if self.0 <= 1 { Self::MIN } else { Self(self.0 - 1) }
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::MIN
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 1 {
            return Err(QuantityError::BelowMinimum {
                min: Self::MIN.0,
                value,
            });
        }
        u32::try_from(value)
            .map(Self)
            .map_err(|_| QuantityError::TooLarge(value))
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
