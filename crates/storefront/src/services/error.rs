//! Service error taxonomy.

use thiserror::Error;

use tidepool_core::{InvalidTransition, MoneyOverflow, OrderId, OrderStatus};

use crate::db::RepositoryError;

/// How far a checkout got before it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStage {
    /// The order exists but some of its lines were not written.
    OrderItems,
    /// All lines exist but the cart still holds the purchased items.
    CartClearing,
}

impl std::fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrderItems => write!(f, "order items"),
            Self::CartClearing => write!(f, "cart clearing"),
        }
    }
}

/// Errors returned by the storefront services.
///
/// `Validation`, `Unauthenticated` and `Forbidden` are always raised before
/// any write, so they never leave partial effects behind.
#[derive(Debug, Error)]
pub enum ShopError {
    /// A user-correctable input problem on one field.
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// No user identity was supplied for a user-scoped operation.
    #[error("sign in required")]
    Unauthenticated,

    /// Role or ownership check failed.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Checkout was attempted with nothing in the cart.
    #[error("your cart is empty")]
    EmptyCart,

    /// The order was created but a later checkout step failed. Resume it
    /// with the order id instead of checking out again.
    #[error("order {order_id} was placed but {stage} did not complete")]
    CheckoutPartialFailure {
        order_id: OrderId,
        stage: CheckoutStage,
        #[source]
        source: RepositoryError,
    },

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The order status change is not allowed from the current status.
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The record store failed or could not be reached.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[from] RepositoryError),
}

impl ShopError {
    /// Shorthand for a field-level validation error.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Whether the operation left an order behind that can be resumed.
    #[must_use]
    pub const fn is_resumable(&self) -> bool {
        matches!(self, Self::CheckoutPartialFailure { .. })
    }

    /// The order id of a partially completed checkout.
    #[must_use]
    pub const fn partial_order_id(&self) -> Option<OrderId> {
        match self {
            Self::CheckoutPartialFailure { order_id, .. } => Some(*order_id),
            _ => None,
        }
    }
}

impl From<InvalidTransition> for ShopError {
    fn from(e: InvalidTransition) -> Self {
        Self::InvalidTransition {
            from: e.from,
            to: e.to,
        }
    }
}

/// A cart whose quantities and prices add up past the money range is fixed by
/// lowering quantities.
impl From<MoneyOverflow> for ShopError {
    fn from(_: MoneyOverflow) -> Self {
        Self::validation("quantity", "cart total is too large")
    }
}

/// Result type alias for `ShopError`.
pub type ShopResult<T> = std::result::Result<T, ShopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_names_field() {
        let err = ShopError::validation("price", "must be greater than zero");
        assert_eq!(err.to_string(), "price: must be greater than zero");
    }

    #[test]
    fn test_partial_failure_is_resumable() {
        let order_id = OrderId::generate();
        let err = ShopError::CheckoutPartialFailure {
            order_id,
            stage: CheckoutStage::OrderItems,
            source: RepositoryError::Unavailable("down".to_string()),
        };
        assert!(err.is_resumable());
        assert_eq!(err.partial_order_id(), Some(order_id));

        let total = ShopError::BackendUnavailable(RepositoryError::NotFound);
        assert!(!total.is_resumable());
        assert_eq!(total.partial_order_id(), None);
    }

    #[test]
    fn test_money_overflow_is_a_quantity_error() {
        let err = ShopError::from(MoneyOverflow);
        assert!(matches!(err, ShopError::Validation { field: "quantity", .. }));
    }

    #[test]
    fn test_invalid_transition_conversion() {
        let err: ShopError = OrderStatus::Delivered
            .transition(OrderStatus::Pending)
            .map_err(ShopError::from)
            .unwrap_err();
        assert!(matches!(
            err,
            ShopError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Pending
            }
        ));
    }
}
