//! In-memory store for development and tests.
//!
//! Enforces the same keys and constraints as the `PostgreSQL` schema:
//! `UNIQUE(user_id, product_id)` on cart rows, `UNIQUE(order_id, product_id)`
//! on order lines, order lines must reference an existing order, and product
//! deletes cascade to cart rows only.
//!
//! Any operation can be made to fail on demand with [`InMemoryStore::fail_next`]
//! or [`InMemoryStore::fail_always`], which is how the checkout saga's
//! partial-failure paths are exercised.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use tidepool_core::{CartItemId, OrderId, OrderStatus, ProductId, Quantity, UserId};

use super::{RepositoryError, Store};
use crate::models::{CartItem, Order, OrderItem, Product};

/// Identifies a [`Store`] method for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Ping,
    ListProducts,
    GetProduct,
    GetProducts,
    InsertProduct,
    UpdateProduct,
    DeleteProduct,
    ListCartItems,
    GetCartItem,
    UpsertCartItem,
    SetCartItemQuantity,
    DeleteCartItems,
    ClearCart,
    InsertOrder,
    GetOrder,
    ListOrders,
    UpdateOrderStatus,
    InsertOrderItems,
    ListOrderItems,
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    Remaining(u32),
    Always,
}

#[derive(Default)]
struct Tables {
    products: Vec<Product>,
    cart_items: Vec<CartItem>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
}

#[derive(Default)]
struct Control {
    faults: HashMap<StoreOp, Fault>,
    calls: HashMap<StoreOp, usize>,
}

/// Process-local [`Store`] implementation.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    control: Mutex<Control>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call to `op` fail with `RepositoryError::Unavailable`.
    ///
    /// Calling this `n` times arms `n` consecutive failures.
    pub async fn fail_next(&self, op: StoreOp) {
        let mut control = self.control.lock().await;
        let fault = match control.faults.get(&op) {
            Some(Fault::Always) => Fault::Always,
            Some(Fault::Remaining(n)) => Fault::Remaining(n.saturating_add(1)),
            None => Fault::Remaining(1),
        };
        control.faults.insert(op, fault);
    }

    /// Make every call to `op` fail until [`Self::heal`] is called.
    pub async fn fail_always(&self, op: StoreOp) {
        self.control.lock().await.faults.insert(op, Fault::Always);
    }

    /// Remove any armed failure for `op`.
    pub async fn heal(&self, op: StoreOp) {
        self.control.lock().await.faults.remove(&op);
    }

    /// Number of times `op` has been called, including failed calls.
    pub async fn call_count(&self, op: StoreOp) -> usize {
        self.control
            .lock()
            .await
            .calls
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    async fn enter(&self, op: StoreOp) -> Result<(), RepositoryError> {
        let mut control = self.control.lock().await;
        *control.calls.entry(op).or_default() += 1;

        let fire = match control.faults.get_mut(&op) {
            Some(Fault::Always) => true,
            Some(Fault::Remaining(n)) => {
                *n = n.saturating_sub(1);
                true
            }
            None => false,
        };
        if matches!(control.faults.get(&op), Some(Fault::Remaining(0))) {
            control.faults.remove(&op);
        }

        if fire {
            return Err(RepositoryError::Unavailable(format!(
                "injected failure in {op:?}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.enter(StoreOp::Ping).await
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        self.enter(StoreOp::ListProducts).await?;
        let tables = self.tables.read().await;
        // Reverse insertion order first so equal timestamps list newest first.
        let mut products: Vec<Product> = tables.products.iter().rev().cloned().collect();
        products.sort_by_key(|p| Reverse(p.created_at));
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.enter(StoreOp::GetProduct).await?;
        let tables = self.tables.read().await;
        Ok(tables.products.iter().find(|p| p.id == id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        self.enter(StoreOp::GetProducts).await?;
        let wanted: HashSet<&ProductId> = ids.iter().collect();
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .iter()
            .filter(|p| wanted.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        self.enter(StoreOp::InsertProduct).await?;
        let mut tables = self.tables.write().await;
        if tables.products.iter().any(|p| p.id == product.id) {
            return Err(RepositoryError::Conflict("product already exists".to_owned()));
        }
        tables.products.push(product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<bool, RepositoryError> {
        self.enter(StoreOp::UpdateProduct).await?;
        let mut tables = self.tables.write().await;
        match tables.products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        self.enter(StoreOp::DeleteProduct).await?;
        let mut tables = self.tables.write().await;
        let before = tables.products.len();
        tables.products.retain(|p| p.id != id);
        let deleted = tables.products.len() != before;
        if deleted {
            tables.cart_items.retain(|i| i.product_id != id);
        }
        Ok(deleted)
    }

    async fn list_cart_items(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        self.enter(StoreOp::ListCartItems).await?;
        let tables = self.tables.read().await;
        let mut items: Vec<CartItem> = tables
            .cart_items
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.created_at);
        Ok(items)
    }

    async fn get_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError> {
        self.enter(StoreOp::GetCartItem).await?;
        let tables = self.tables.read().await;
        Ok(tables.cart_items.iter().find(|i| i.id == id).cloned())
    }

    async fn upsert_cart_item(&self, item: &CartItem) -> Result<CartItem, RepositoryError> {
        self.enter(StoreOp::UpsertCartItem).await?;
        let mut tables = self.tables.write().await;
        if !tables.products.iter().any(|p| p.id == item.product_id) {
            return Err(RepositoryError::Conflict(
                "cart item references a missing product".to_owned(),
            ));
        }

        if let Some(existing) = tables
            .cart_items
            .iter_mut()
            .find(|i| i.user_id == item.user_id && i.product_id == item.product_id)
        {
            let summed = existing
                .quantity
                .get()
                .checked_add(item.quantity.get())
                .ok_or_else(|| RepositoryError::Conflict("cart quantity overflow".to_owned()))?;
            existing.quantity = Quantity::new(summed)
                .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
            return Ok(existing.clone());
        }

        tables.cart_items.push(item.clone());
        Ok(item.clone())
    }

    async fn set_cart_item_quantity(
        &self,
        id: CartItemId,
        quantity: Quantity,
    ) -> Result<Option<CartItem>, RepositoryError> {
        self.enter(StoreOp::SetCartItemQuantity).await?;
        let mut tables = self.tables.write().await;
        Ok(tables
            .cart_items
            .iter_mut()
            .find(|i| i.id == id)
            .map(|item| {
                item.quantity = quantity;
                item.clone()
            }))
    }

    async fn delete_cart_items(
        &self,
        user_id: UserId,
        ids: &[CartItemId],
    ) -> Result<u64, RepositoryError> {
        self.enter(StoreOp::DeleteCartItems).await?;
        let doomed: HashSet<&CartItemId> = ids.iter().collect();
        let mut tables = self.tables.write().await;
        let before = tables.cart_items.len();
        tables
            .cart_items
            .retain(|i| !(i.user_id == user_id && doomed.contains(&i.id)));
        Ok((before - tables.cart_items.len()) as u64)
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        self.enter(StoreOp::ClearCart).await?;
        let mut tables = self.tables.write().await;
        let before = tables.cart_items.len();
        tables.cart_items.retain(|i| i.user_id != user_id);
        Ok((before - tables.cart_items.len()) as u64)
    }

    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        self.enter(StoreOp::InsertOrder).await?;
        let mut tables = self.tables.write().await;
        if tables.orders.iter().any(|o| o.id == order.id) {
            return Err(RepositoryError::Conflict("order already exists".to_owned()));
        }
        tables.orders.push(order.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        self.enter(StoreOp::GetOrder).await?;
        let tables = self.tables.read().await;
        Ok(tables.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders(&self, user_id: Option<UserId>) -> Result<Vec<Order>, RepositoryError> {
        self.enter(StoreOp::ListOrders).await?;
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .iter()
            .rev()
            .filter(|o| user_id.is_none_or(|u| o.user_id == u))
            .cloned()
            .collect();
        orders.sort_by_key(|o| Reverse(o.created_at));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        self.enter(StoreOp::UpdateOrderStatus).await?;
        let mut tables = self.tables.write().await;
        match tables
            .orders
            .iter_mut()
            .find(|o| o.id == id && o.status == from)
        {
            Some(order) => {
                order.status = to;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_order_items(&self, items: &[OrderItem]) -> Result<(), RepositoryError> {
        self.enter(StoreOp::InsertOrderItems).await?;
        let mut tables = self.tables.write().await;

        // Validate the whole batch before writing anything.
        let mut keys: HashSet<(OrderId, ProductId)> = tables
            .order_items
            .iter()
            .map(|i| (i.order_id, i.product_id))
            .collect();
        for item in items {
            if !tables.orders.iter().any(|o| o.id == item.order_id) {
                return Err(RepositoryError::Conflict(format!(
                    "order item references missing order {}",
                    item.order_id
                )));
            }
            if !keys.insert((item.order_id, item.product_id)) {
                return Err(RepositoryError::Conflict(format!(
                    "order {} already has a line for product {}",
                    item.order_id, item.product_id
                )));
            }
        }

        tables.order_items.extend_from_slice(items);
        Ok(())
    }

    async fn list_order_items(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<OrderItem>, RepositoryError> {
        self.enter(StoreOp::ListOrderItems).await?;
        let wanted: HashSet<&OrderId> = order_ids.iter().collect();
        let tables = self.tables.read().await;
        Ok(tables
            .order_items
            .iter()
            .filter(|i| wanted.contains(&i.order_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, Utc};

    use tidepool_core::{FrozenTotal, OrderItemId, Price};

    use super::*;

    fn product(name: &str, offset_secs: i64) -> Product {
        Product {
            id: ProductId::generate(),
            name: name.to_string(),
            description: None,
            price: Price::from_cents(1000).unwrap(),
            stock: 5,
            category: None,
            image_url: None,
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    fn cart_item(user_id: UserId, product_id: ProductId) -> CartItem {
        CartItem {
            id: CartItemId::generate(),
            user_id,
            product_id,
            quantity: Quantity::ONE,
            created_at: Utc::now(),
        }
    }

    fn order(user_id: UserId) -> Order {
        Order {
            id: OrderId::generate(),
            user_id,
            shipping_address: "1 Harbour Road".to_string(),
            total_amount: FrozenTotal::from_stored(rust_decimal::Decimal::ZERO),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_products_listed_newest_first() {
        let store = InMemoryStore::new();
        let old = product("Old", -60);
        let new = product("New", 0);
        store.insert_product(&old).await.unwrap();
        store.insert_product(&new).await.unwrap();

        let names: Vec<String> = store
            .list_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["New", "Old"]);
    }

    #[tokio::test]
    async fn test_upsert_increments_existing_row() {
        let store = InMemoryStore::new();
        let p = product("Kelp", 0);
        store.insert_product(&p).await.unwrap();
        let user = UserId::generate();

        let first = store.upsert_cart_item(&cart_item(user, p.id)).await.unwrap();
        let second = store.upsert_cart_item(&cart_item(user, p.id)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity.get(), 2);
        assert_eq!(store.list_cart_items(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_product_cascades_to_cart_only() {
        let store = InMemoryStore::new();
        let p = product("Driftwood", 0);
        store.insert_product(&p).await.unwrap();
        let user = UserId::generate();
        store.upsert_cart_item(&cart_item(user, p.id)).await.unwrap();
        let o = order(user);
        store.insert_order(&o).await.unwrap();
        store
            .insert_order_items(&[OrderItem {
                id: OrderItemId::generate(),
                order_id: o.id,
                product_id: p.id,
                quantity: Quantity::ONE,
                price: p.price,
            }])
            .await
            .unwrap();

        assert!(store.delete_product(p.id).await.unwrap());
        assert!(store.list_cart_items(user).await.unwrap().is_empty());
        assert_eq!(store.list_order_items(&[o.id]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_order_item_batch_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let o = order(UserId::generate());
        store.insert_order(&o).await.unwrap();
        let product_id = ProductId::generate();
        let line = |product_id| OrderItem {
            id: OrderItemId::generate(),
            order_id: o.id,
            product_id,
            quantity: Quantity::ONE,
            price: Price::ZERO,
        };

        let result = store
            .insert_order_items(&[line(ProductId::generate()), line(product_id), line(product_id)])
            .await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
        assert!(store.list_order_items(&[o.id]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_update_is_compare_and_set() {
        let store = InMemoryStore::new();
        let o = order(UserId::generate());
        store.insert_order(&o).await.unwrap();

        assert!(
            !store
                .update_order_status(o.id, OrderStatus::Processing, OrderStatus::Shipped)
                .await
                .unwrap()
        );
        assert!(
            store
                .update_order_status(o.id, OrderStatus::Pending, OrderStatus::Processing)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_fail_next_fires_once() {
        let store = InMemoryStore::new();
        store.fail_next(StoreOp::Ping).await;

        assert!(matches!(
            store.ping().await,
            Err(RepositoryError::Unavailable(_))
        ));
        assert!(store.ping().await.is_ok());
        assert_eq!(store.call_count(StoreOp::Ping).await, 2);
    }

    #[tokio::test]
    async fn test_fail_always_until_healed() {
        let store = InMemoryStore::new();
        store.fail_always(StoreOp::ListProducts).await;
        assert!(store.list_products().await.is_err());
        assert!(store.list_products().await.is_err());
        store.heal(StoreOp::ListProducts).await;
        assert!(store.list_products().await.is_ok());
    }
}
