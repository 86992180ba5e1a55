//! Catalog product types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tidepool_core::{Price, ProductId};

/// A purchasable product (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display name (at least two characters).
    pub name: String,
    /// Optional long-form description.
    pub description: Option<String>,
    /// Current catalog price.
    pub price: Price,
    /// Units on hand. Read at add-to-cart time, never reserved.
    pub stock: u32,
    /// Optional free-form category.
    pub category: Option<String>,
    /// Optional absolute image URL.
    pub image_url: Option<String>,
    /// When the product was first listed.
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Whether at least one unit is on hand.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Unvalidated product fields, as submitted by an admin or a seed file.
///
/// Numeric fields are kept wide so that out-of-range values reach
/// validation and get a field-level error instead of a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}
