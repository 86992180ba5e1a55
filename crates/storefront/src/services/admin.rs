//! Admin mutation surface.
//!
//! Every operation runs [`require_admin`] before it reads or writes
//! anything, so a non-admin caller never causes a mutation.

use std::sync::Arc;

use tracing::{info, instrument};

use tidepool_core::{OrderId, OrderStatus, ProductId};

use super::auth::{Principal, require_admin};
use super::catalog::validate_product;
use super::error::{ShopError, ShopResult};
use super::orders::OrderService;
use crate::db::Store;
use crate::models::{Order, OrderDetails, Product, ProductInput};

/// Staff-only catalog and order management.
#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn Store>,
    orders: OrderService,
}

impl AdminService {
    /// Create a new admin service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, orders: OrderService) -> Self {
        Self { store, orders }
    }

    /// Validate and list a new product.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Forbidden` for non-admins and
    /// `ShopError::Validation` for bad input.
    #[instrument(skip(self, principal, input))]
    pub async fn create_product(
        &self,
        principal: &Principal,
        input: ProductInput,
    ) -> ShopResult<Product> {
        let grant = require_admin(principal)?;
        let product = validate_product(ProductId::generate(), input)?;
        self.store.insert_product(&product).await?;
        info!(admin_id = %grant.admin_id(), product_id = %product.id, "product created");
        Ok(product)
    }

    /// Replace a product's fields. The listing date is kept.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Forbidden`, `ShopError::Validation` or
    /// `ShopError::NotFound`.
    #[instrument(skip(self, principal, input), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        principal: &Principal,
        id: ProductId,
        input: ProductInput,
    ) -> ShopResult<Product> {
        let grant = require_admin(principal)?;
        let mut product = validate_product(id, input)?;
        let existing = self
            .store
            .get_product(id)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("product {id}")))?;
        product.created_at = existing.created_at;

        if !self.store.update_product(&product).await? {
            return Err(ShopError::NotFound(format!("product {id}")));
        }
        info!(admin_id = %grant.admin_id(), "product updated");
        Ok(product)
    }

    /// Delist a product. Cart rows for it go with it; order lines keep their
    /// frozen copy. Deleting a missing product succeeds and returns false.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Forbidden` for non-admins.
    #[instrument(skip(self, principal), fields(product_id = %id))]
    pub async fn delete_product(&self, principal: &Principal, id: ProductId) -> ShopResult<bool> {
        let grant = require_admin(principal)?;
        let deleted = self.store.delete_product(id).await?;
        info!(admin_id = %grant.admin_id(), deleted, "product delete");
        Ok(deleted)
    }

    /// Move an order to a new status.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Forbidden`, `ShopError::NotFound` or
    /// `ShopError::InvalidTransition`.
    pub async fn update_order_status(
        &self,
        principal: &Principal,
        id: OrderId,
        to: OrderStatus,
    ) -> ShopResult<Order> {
        let grant = require_admin(principal)?;
        self.orders.transition(&grant, id, to).await
    }

    /// All orders with lines, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Forbidden` for non-admins.
    pub async fn list_orders(&self, principal: &Principal) -> ShopResult<Vec<OrderDetails>> {
        let grant = require_admin(principal)?;
        self.orders.list_all(&grant).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::{InMemoryStore, StoreOp};
    use tidepool_core::UserId;

    fn service() -> (AdminService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let admin = AdminService::new(store.clone(), OrderService::new(store.clone()));
        (admin, store)
    }

    fn input(name: &str) -> ProductInput {
        ProductInput {
            name: name.to_string(),
            price: Decimal::new(450, 2),
            stock: 3,
            ..ProductInput::default()
        }
    }

    #[tokio::test]
    async fn test_non_admin_never_reaches_store() {
        let (admin, store) = service();
        let customer = Principal::customer(UserId::generate());

        assert!(matches!(
            admin.create_product(&customer, input("Shell Bowl")).await,
            Err(ShopError::Forbidden(_))
        ));
        assert!(matches!(
            admin.delete_product(&Principal::anonymous(), ProductId::generate()).await,
            Err(ShopError::Forbidden(_))
        ));
        assert!(matches!(
            admin.list_orders(&customer).await,
            Err(ShopError::Forbidden(_))
        ));
        assert_eq!(store.call_count(StoreOp::InsertProduct).await, 0);
        assert_eq!(store.call_count(StoreOp::DeleteProduct).await, 0);
        assert_eq!(store.call_count(StoreOp::ListOrders).await, 0);
    }

    #[tokio::test]
    async fn test_update_keeps_created_at() {
        let (admin, store) = service();
        let principal = Principal::admin(UserId::generate());
        let created = admin.create_product(&principal, input("Shell Bowl")).await.unwrap();

        let mut changed = input("Shell Bowl XL");
        changed.price = Decimal::new(900, 2);
        let updated = admin
            .update_product(&principal, created.id, changed)
            .await
            .unwrap();

        assert_eq!(updated.created_at, created.created_at);
        let stored = store.get_product(created.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Shell Bowl XL");
        assert_eq!(stored.price.amount(), Decimal::new(900, 2));
    }

    #[tokio::test]
    async fn test_update_missing_or_invalid() {
        let (admin, _) = service();
        let principal = Principal::admin(UserId::generate());
        assert!(matches!(
            admin
                .update_product(&principal, ProductId::generate(), input("Net Lamp"))
                .await,
            Err(ShopError::NotFound(_))
        ));
        assert!(matches!(
            admin
                .update_product(&principal, ProductId::generate(), input("N"))
                .await,
            Err(ShopError::Validation { field: "name", .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (admin, _) = service();
        let principal = Principal::admin(UserId::generate());
        let created = admin.create_product(&principal, input("Rope Hook")).await.unwrap();

        assert!(admin.delete_product(&principal, created.id).await.unwrap());
        assert!(!admin.delete_product(&principal, created.id).await.unwrap());
    }
}
