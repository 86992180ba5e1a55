//! Record-store port and its adapters.
//!
//! The services never talk to a database directly. They go through the
//! [`Store`] trait, a plain CRUD + filter surface over four record types:
//!
//! ## Tables
//!
//! - `products` - Catalog
//! - `cart_items` - Per-user cart rows, `UNIQUE(user_id, product_id)`
//! - `orders` - Placed orders, immutable apart from `status`
//! - `order_items` - Frozen order lines, `UNIQUE(order_id, product_id)`
//!
//! ## Adapters
//!
//! - [`postgres::PgStore`] - `PostgreSQL` via sqlx
//! - [`memory::InMemoryStore`] - process-local tables for development and
//!   tests, with per-operation failure injection
//!
//! The port is not transactional. Multi-step operations (checkout) are
//! written as sagas on top of it.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p tidepool-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use tidepool_core::{CartItemId, OrderId, OrderStatus, ProductId, Quantity, UserId};

use crate::models::{CartItem, Order, OrderItem, Product};

pub use memory::{InMemoryStore, StoreOp};
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate order line).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The backend could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence operations the storefront services need.
///
/// Object-safe so services can hold an `Arc<dyn Store>` regardless of
/// adapter. Every method is a single round trip; none of them spans
/// more than one table except `delete_product`, which cascades to cart rows.
#[async_trait]
pub trait Store: Send + Sync {
    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    // --- products ---

    /// All products, newest first.
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError>;
    /// Load a product by id.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
    /// Load every product whose id is in `ids`. Missing ids are skipped.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;
    /// Insert a fully-formed product.
    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError>;
    /// Overwrite an existing product. Returns false if it does not exist.
    async fn update_product(&self, product: &Product) -> Result<bool, RepositoryError>;
    /// Delete a product and any cart rows pointing at it. Order items are
    /// left untouched. Returns false if nothing was deleted.
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;

    // --- cart ---

    /// A user's cart rows, oldest first.
    async fn list_cart_items(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError>;
    /// Load a cart row by id.
    async fn get_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError>;
    /// Insert `item`, or if a row for (`item.user_id`, `item.product_id`)
    /// exists, add `item.quantity` to it. Returns the stored row.
    async fn upsert_cart_item(&self, item: &CartItem) -> Result<CartItem, RepositoryError>;
    /// Overwrite a row's quantity. Returns the updated row, or `None` if it
    /// does not exist.
    async fn set_cart_item_quantity(
        &self,
        id: CartItemId,
        quantity: Quantity,
    ) -> Result<Option<CartItem>, RepositoryError>;
    /// Delete the given rows, restricted to `user_id`. Absent rows are
    /// ignored. Returns the number of rows deleted.
    async fn delete_cart_items(
        &self,
        user_id: UserId,
        ids: &[CartItemId],
    ) -> Result<u64, RepositoryError>;
    /// Delete every cart row of a user. Returns the number of rows deleted.
    async fn clear_cart(&self, user_id: UserId) -> Result<u64, RepositoryError>;

    // --- orders ---

    /// Insert a fully-formed order.
    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError>;
    /// Load an order by id.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;
    /// Orders newest first, optionally filtered to one user.
    async fn list_orders(&self, user_id: Option<UserId>) -> Result<Vec<Order>, RepositoryError>;
    /// Set `status = to` only if it is currently `from`. Returns whether the
    /// row was updated.
    async fn update_order_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError>;
    /// Insert order lines as one batch: either all rows are written or none.
    async fn insert_order_items(&self, items: &[OrderItem]) -> Result<(), RepositoryError>;
    /// Lines of the given orders.
    async fn list_order_items(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<OrderItem>, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
