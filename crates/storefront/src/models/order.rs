//! Order types.
//!
//! Orders are immutable apart from `status`. Order items carry their own
//! frozen price so later catalog changes never reach them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use tidepool_core::{
    FrozenTotal, MoneyOverflow, OrderId, OrderItemId, OrderStatus, Price, ProductId, Quantity,
    UserId,
};

/// A placed order (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub shipping_address: String,
    /// Frozen at checkout, never recomputed.
    pub total_amount: FrozenTotal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// One line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// May dangle if the product was later deleted from the catalog.
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// Price at purchase.
    pub price: Price,
}

impl OrderItem {
    /// `price × quantity` at the frozen price.
    ///
    /// # Errors
    ///
    /// Returns `MoneyOverflow` if the amount is out of range.
    pub fn line_total(&self) -> Result<Decimal, MoneyOverflow> {
        self.price.line_amount(self.quantity)
    }
}

/// An order item with its product's display name, if the product still exists.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub item: OrderItem,
    pub product_name: Option<String>,
}

/// An order with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderLine>,
}

impl OrderDetails {
    /// Sum of the stored lines at their frozen prices.
    ///
    /// Equals `order.total_amount` for every fully written order.
    ///
    /// # Errors
    ///
    /// Returns `MoneyOverflow` if the sum is out of range.
    pub fn items_total(&self) -> Result<FrozenTotal, MoneyOverflow> {
        FrozenTotal::from_lines(self.items.iter().map(|l| (l.item.price, l.item.quantity)))
    }
}
