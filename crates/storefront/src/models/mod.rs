//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from database row types. The
//! store adapters in [`crate::db`] convert to and from them.

pub mod cart;
pub mod order;
pub mod product;

pub use cart::{CartItem, CartLine, CartView};
pub use order::{Order, OrderDetails, OrderItem, OrderLine};
pub use product::{Product, ProductInput};
