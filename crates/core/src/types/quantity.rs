//! Cart and order line quantities.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when constructing a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity must be at least 1")]
    Zero,
    #[error("quantity is too large")]
    Overflow,
}

/// A line quantity of at least one unit.
///
/// A zero quantity is never stored; setting a cart line to zero deletes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(1);

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::Zero` if `n` is zero.
    pub const fn new(n: u32) -> Result<Self, QuantityError> {
        if n == 0 {
            return Err(QuantityError::Zero);
        }
        Ok(Self(n))
    }

    /// The number of units.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// One more unit than this quantity.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::Overflow` at `u32::MAX`.
    pub const fn incremented(self) -> Result<Self, QuantityError> {
        match self.0.checked_add(1) {
            Some(n) => Ok(Self(n)),
            None => Err(QuantityError::Overflow),
        }
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        Self::new(n)
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
