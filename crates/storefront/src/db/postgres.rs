//! `PostgreSQL` store.
//!
//! Queries are checked at runtime rather than with `query!` macros, so the
//! crate builds without a live database. Row types decode the raw columns and
//! are converted into validated domain types; a value that fails validation
//! is reported as `RepositoryError::DataCorruption`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use uuid::Uuid;

use tidepool_core::{
    CartItemId, FrozenTotal, OrderId, OrderItemId, OrderStatus, Price, ProductId, Quantity,
    UserId,
};

use super::{RepositoryError, Store};
use crate::models::{CartItem, Order, OrderItem, Product};

/// Embedded schema migrations (`crates/storefront/migrations/`).
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, stock, category, image_url, created_at";
const CART_ITEM_COLUMNS: &str = "id, user_id, product_id, quantity, created_at";
const ORDER_COLUMNS: &str = "id, user_id, total_amount, shipping_address, status, created_at";
const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, price";

/// [`Store`] backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock: i32,
    category: Option<String>,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        let price = Price::new(r.price)
            .map_err(|e| RepositoryError::DataCorruption(format!("product {}: {e}", r.id)))?;
        let stock = u32::try_from(r.stock).map_err(|_| {
            RepositoryError::DataCorruption(format!("product {}: negative stock", r.id))
        })?;

        Ok(Self {
            id: r.id,
            name: r.name,
            description: r.description,
            price,
            stock,
            category: r.category,
            image_url: r.image_url,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    user_id: UserId,
    product_id: ProductId,
    quantity: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(r: CartItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            product_id: r.product_id,
            quantity: decode_quantity(r.quantity)?,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    total_amount: Decimal,
    shipping_address: String,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(r: OrderRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            shipping_address: r.shipping_address,
            total_amount: FrozenTotal::from_stored(r.total_amount),
            status: r.status,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    quantity: i32,
    price: Decimal,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(r: OrderItemRow) -> Result<Self, Self::Error> {
        let price = Price::new(r.price)
            .map_err(|e| RepositoryError::DataCorruption(format!("order item {}: {e}", r.id)))?;
        Ok(Self {
            id: r.id,
            order_id: r.order_id,
            product_id: r.product_id,
            quantity: decode_quantity(r.quantity)?,
            price,
        })
    }
}

fn decode_quantity(raw: i32) -> Result<Quantity, RepositoryError> {
    u32::try_from(raw)
        .ok()
        .and_then(|n| Quantity::new(n).ok())
        .ok_or_else(|| RepositoryError::DataCorruption(format!("invalid quantity {raw}")))
}

fn encode_count(n: u32, what: &str) -> Result<i32, RepositoryError> {
    i32::try_from(n).map_err(|_| RepositoryError::Conflict(format!("{what} out of range: {n}")))
}

/// Map constraint violations to `Conflict`, everything else to `Database`.
fn map_write_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && (db_err.is_unique_violation()
            || db_err.is_foreign_key_violation()
            || db_err.is_check_violation())
    {
        return RepositoryError::Conflict(db_err.message().to_owned());
    }
    RepositoryError::Database(e)
}

fn convert_rows<R, T>(rows: Vec<R>) -> Result<Vec<T>, RepositoryError>
where
    T: TryFrom<R, Error = RepositoryError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// =============================================================================
// Store Implementation
// =============================================================================

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        convert_rows(rows)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Product::try_from).transpose()
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        convert_rows(rows)
    }

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO products (id, name, description, price, stock, category, image_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(encode_count(product.stock, "stock")?)
        .bind(&product.category)
        .bind(&product.image_url)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products
            SET name = $2, description = $3, price = $4, stock = $5,
                category = $6, image_url = $7
            WHERE id = $1
            ",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(encode_count(product.stock, "stock")?)
        .bind(&product.category)
        .bind(&product.image_url)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        // cart_items.product_id cascades; order_items has no foreign key.
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_cart_items(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows: Vec<CartItemRow> = sqlx::query_as(&format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        convert_rows(rows)
    }

    async fn get_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError> {
        let row: Option<CartItemRow> = sqlx::query_as(&format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CartItem::try_from).transpose()
    }

    async fn upsert_cart_item(&self, item: &CartItem) -> Result<CartItem, RepositoryError> {
        let row: CartItemRow = sqlx::query_as(&format!(
            r"
            INSERT INTO cart_items (id, user_id, product_id, quantity, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            RETURNING {CART_ITEM_COLUMNS}
            "
        ))
        .bind(item.id)
        .bind(item.user_id)
        .bind(item.product_id)
        .bind(encode_count(item.quantity.get(), "quantity")?)
        .bind(item.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;
        CartItem::try_from(row)
    }

    async fn set_cart_item_quantity(
        &self,
        id: CartItemId,
        quantity: Quantity,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row: Option<CartItemRow> = sqlx::query_as(&format!(
            "UPDATE cart_items SET quantity = $2 WHERE id = $1 RETURNING {CART_ITEM_COLUMNS}"
        ))
        .bind(id)
        .bind(encode_count(quantity.get(), "quantity")?)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;
        row.map(CartItem::try_from).transpose()
    }

    async fn delete_cart_items(
        &self,
        user_id: UserId,
        ids: &[CartItemId],
    ) -> Result<u64, RepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Uuid> = ids.iter().map(CartItemId::as_uuid).collect();
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND id = ANY($2)")
            .bind(user_id)
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO orders (id, user_id, total_amount, shipping_address, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.total_amount.amount())
        .bind(&order.shipping_address)
        .bind(order.status)
        .bind(order.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Order::from))
    }

    async fn list_orders(&self, user_id: Option<UserId>) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE $1::uuid IS NULL OR user_id = $1
            ORDER BY created_at DESC, id
            "
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE orders SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from)
            .bind(to)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_order_items(&self, items: &[OrderItem]) -> Result<(), RepositoryError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut ids = Vec::with_capacity(items.len());
        let mut order_ids = Vec::with_capacity(items.len());
        let mut product_ids = Vec::with_capacity(items.len());
        let mut quantities = Vec::with_capacity(items.len());
        let mut prices = Vec::with_capacity(items.len());
        for item in items {
            ids.push(item.id.as_uuid());
            order_ids.push(item.order_id.as_uuid());
            product_ids.push(item.product_id.as_uuid());
            quantities.push(encode_count(item.quantity.get(), "quantity")?);
            prices.push(item.price.amount());
        }

        // One statement, so the batch commits or fails as a unit.
        sqlx::query(
            r"
            INSERT INTO order_items (id, order_id, product_id, quantity, price)
            SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::uuid[], $4::int4[], $5::numeric[])
            ",
        )
        .bind(ids)
        .bind(order_ids)
        .bind(product_ids)
        .bind(quantities)
        .bind(prices)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn list_order_items(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<OrderItem>, RepositoryError> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = order_ids.iter().map(OrderId::as_uuid).collect();
        let rows: Vec<OrderItemRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        convert_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_quantity_rejects_non_positive() {
        assert!(decode_quantity(0).is_err());
        assert!(decode_quantity(-3).is_err());
        assert_eq!(decode_quantity(4).map(|q| q.get()).ok(), Some(4));
    }

    #[test]
    fn test_encode_count_range() {
        assert_eq!(encode_count(7, "stock").ok(), Some(7));
        assert!(matches!(
            encode_count(u32::MAX, "stock"),
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[test]
    fn test_product_row_with_negative_stock_is_corrupt() {
        let row = ProductRow {
            id: ProductId::generate(),
            name: "Sea glass".to_string(),
            description: None,
            price: Decimal::ONE,
            stock: -1,
            category: None,
            image_url: None,
            created_at: Utc::now(),
        };
        assert!(matches!(
            Product::try_from(row),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
