//! Cart types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tidepool_core::{CartItemId, LiveTotal, MoneyOverflow, ProductId, Quantity, UserId};

use super::Product;

/// One row of a user's cart. Unique per (user, product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
}

/// A cart row joined with its product's current catalog data.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub item: CartItem,
    pub product: Product,
}

/// Cart display data: lines plus derived totals.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total: LiveTotal,
    pub item_count: u32,
}

impl CartView {
    /// Build the view, deriving the live total and unit count from the lines.
    ///
    /// # Errors
    ///
    /// Returns `MoneyOverflow` if the total is out of range.
    pub fn from_lines(lines: Vec<CartLine>) -> Result<Self, MoneyOverflow> {
        let total =
            LiveTotal::from_lines(lines.iter().map(|l| (l.product.price, l.item.quantity)))?;
        let item_count = lines
            .iter()
            .fold(0_u32, |acc, l| acc.saturating_add(l.item.quantity.get()));
        Ok(Self {
            lines,
            total,
            item_count,
        })
    }
}
