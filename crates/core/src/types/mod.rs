//! Core types for Tidepool Market.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod quantity;
pub mod status;

pub use id::*;
pub use price::{FrozenTotal, LiveTotal, MoneyOverflow, Price, PriceError};
pub use quantity::{Quantity, QuantityError};
pub use status::{InvalidTransition, OrderStatus, ParseOrderStatusError};
