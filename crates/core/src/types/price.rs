//! Decimal money types.
//!
//! Three types, deliberately not interconvertible:
//!
//! - [`Price`] - a non-negative unit price, either a product's current catalog
//!   price or the frozen price copied onto an order line.
//! - [`LiveTotal`] - a cart total recomputed from current catalog prices on
//!   every read. It floats with catalog changes and is never persisted.
//! - [`FrozenTotal`] - an order total computed once at checkout from frozen
//!   prices and stored as-is afterwards.
//!
//! All arithmetic is exact, checked `Decimal`; rounding to currency precision
//! happens only in the `display()` helpers. Line amounts and totals report
//! [`MoneyOverflow`] instead of panicking when they leave `Decimal`'s range.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Quantity;

/// Decimal places used when formatting money for display.
const CURRENCY_DP: u32 = 2;

/// Errors that can occur when constructing a price.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),
}

/// A money computation exceeded the representable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("money amount out of range")]
pub struct MoneyOverflow;

/// A non-negative unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price, rejecting negative amounts.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if `amount` is below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Create a price from a whole number of cents.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if `cents` is below zero.
    pub fn from_cents(cents: i64) -> Result<Self, PriceError> {
        Self::new(Decimal::new(cents, CURRENCY_DP))
    }

    /// The exact amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the price is strictly greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Price of `quantity` units at this price.
    ///
    /// # Errors
    ///
    /// Returns `MoneyOverflow` if the product is out of range.
    pub fn line_amount(&self, quantity: Quantity) -> Result<Decimal, MoneyOverflow> {
        self.0
            .checked_mul(Decimal::from(quantity.get()))
            .ok_or(MoneyOverflow)
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        format_money(self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

/// A cart total computed from current catalog prices.
///
/// Recompute it on every read; it has no meaning once the catalog changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct LiveTotal(Decimal);

impl LiveTotal {
    /// Sum `price × quantity` over cart lines priced at current catalog prices.
    ///
    /// # Errors
    ///
    /// Returns `MoneyOverflow` if a line or the running sum is out of range.
    pub fn from_lines<I>(lines: I) -> Result<Self, MoneyOverflow>
    where
        I: IntoIterator<Item = (Price, Quantity)>,
    {
        sum_lines(lines).map(Self)
    }

    /// The exact, unrounded amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Format for display, rounded to cents.
    #[must_use]
    pub fn display(&self) -> String {
        format_money(self.0)
    }
}

/// An order total frozen at checkout time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrozenTotal(Decimal);

impl FrozenTotal {
    /// Sum `price × quantity` over lines whose prices have been frozen.
    ///
    /// # Errors
    ///
    /// Returns `MoneyOverflow` if a line or the running sum is out of range.
    pub fn from_lines<I>(lines: I) -> Result<Self, MoneyOverflow>
    where
        I: IntoIterator<Item = (Price, Quantity)>,
    {
        sum_lines(lines).map(Self)
    }

    /// Rehydrate a total previously written to the store.
    #[must_use]
    pub const fn from_stored(amount: Decimal) -> Self {
        Self(amount)
    }

    /// The exact amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Format for display, rounded to cents.
    #[must_use]
    pub fn display(&self) -> String {
        format_money(self.0)
    }
}

fn sum_lines<I>(lines: I) -> Result<Decimal, MoneyOverflow>
where
    I: IntoIterator<Item = (Price, Quantity)>,
{
    lines.into_iter().try_fold(Decimal::ZERO, |acc, (price, quantity)| {
        acc.checked_add(price.line_amount(quantity)?)
            .ok_or(MoneyOverflow)
    })
}

fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero);
    format!("${rounded:.2}")
}
