//! Per-user cart operations.
//!
//! Every operation is scoped to the caller's own rows. Totals are always
//! recomputed from current catalog prices; nothing about the cart total is
//! stored.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use tidepool_core::{CartItemId, LiveTotal, ProductId, Quantity, UserId};

use super::auth::{Principal, require_user};
use super::error::{ShopError, ShopResult};
use crate::db::Store;
use crate::models::{CartItem, CartLine, CartView};

/// Shopping cart service.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    /// Create a new cart service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The caller's cart with live totals.
    ///
    /// A total past the money range is a `ShopError::Validation` on `quantity`.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Unauthenticated` for anonymous callers and
    /// `ShopError::BackendUnavailable` if the store fails.
    #[instrument(skip(self, principal))]
    pub async fn view(&self, principal: &Principal) -> ShopResult<CartView> {
        let user_id = require_user(principal)?;
        Ok(CartView::from_lines(self.lines(user_id).await?)?)
    }

    /// Add one unit of a product, or increment the existing line.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` for an unknown product and
    /// `ShopError::Validation` (field `stock`) if the resulting quantity would
    /// exceed the units on hand.
    #[instrument(skip(self, principal), fields(product_id = %product_id))]
    pub async fn add_or_increment(
        &self,
        principal: &Principal,
        product_id: ProductId,
    ) -> ShopResult<CartItem> {
        let user_id = require_user(principal)?;
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("product {product_id}")))?;

        let current = self
            .store
            .list_cart_items(user_id)
            .await?
            .into_iter()
            .find(|item| item.product_id == product_id)
            .map_or(0, |item| item.quantity.get());
        let wanted = u64::from(current) + 1;
        if wanted > u64::from(product.stock) {
            return Err(ShopError::validation(
                "stock",
                format!("only {} of {} available", product.stock, product.name),
            ));
        }

        let item = self
            .store
            .upsert_cart_item(&CartItem {
                id: CartItemId::generate(),
                user_id,
                product_id,
                quantity: Quantity::ONE,
                created_at: Utc::now(),
            })
            .await?;
        debug!(cart_item_id = %item.id, quantity = %item.quantity, "cart line updated");
        Ok(item)
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// Returns the updated line, or `None` if the line was removed (or was
    /// already gone and zero was requested).
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Validation` for a negative quantity or when an
    /// increase would exceed stock, `ShopError::NotFound` for an unknown line
    /// and `ShopError::Forbidden` for another user's line.
    #[instrument(skip(self, principal), fields(cart_item_id = %item_id))]
    pub async fn set_quantity(
        &self,
        principal: &Principal,
        item_id: CartItemId,
        quantity: i64,
    ) -> ShopResult<Option<CartItem>> {
        let user_id = require_user(principal)?;
        if quantity < 0 {
            return Err(ShopError::validation("quantity", "cannot be negative"));
        }

        let Some(item) = self.store.get_cart_item(item_id).await? else {
            return if quantity == 0 {
                Ok(None)
            } else {
                Err(ShopError::NotFound(format!("cart item {item_id}")))
            };
        };
        if item.user_id != user_id {
            return Err(ShopError::Forbidden("not your cart".to_string()));
        }

        let quantity = u32::try_from(quantity)
            .map_err(|_| ShopError::validation("quantity", "is too large"))?;
        let Ok(quantity) = Quantity::new(quantity) else {
            self.store.delete_cart_items(user_id, &[item_id]).await?;
            return Ok(None);
        };

        if quantity == item.quantity {
            return Ok(Some(item));
        }
        if quantity > item.quantity {
            let stock = self
                .store
                .get_product(item.product_id)
                .await?
                .map_or(0, |p| p.stock);
            if quantity.get() > stock {
                return Err(ShopError::validation(
                    "quantity",
                    format!("only {stock} available"),
                ));
            }
        }

        // Deleted between the read and the write: treat like a missing line.
        self.store
            .set_cart_item_quantity(item_id, quantity)
            .await?
            .map(Some)
            .ok_or_else(|| ShopError::NotFound(format!("cart item {item_id}")))
    }

    /// Remove a line. Removing an absent line succeeds.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Forbidden` for another user's line.
    #[instrument(skip(self, principal), fields(cart_item_id = %item_id))]
    pub async fn remove(&self, principal: &Principal, item_id: CartItemId) -> ShopResult<()> {
        let user_id = require_user(principal)?;
        if let Some(item) = self.store.get_cart_item(item_id).await?
            && item.user_id != user_id
        {
            return Err(ShopError::Forbidden("not your cart".to_string()));
        }
        self.store.delete_cart_items(user_id, &[item_id]).await?;
        Ok(())
    }

    /// Empty the caller's cart. Returns the number of lines removed.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::BackendUnavailable` if the store fails.
    #[instrument(skip(self, principal))]
    pub async fn clear(&self, principal: &Principal) -> ShopResult<u64> {
        let user_id = require_user(principal)?;
        Ok(self.store.clear_cart(user_id).await?)
    }

    /// Total units in the caller's cart.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::BackendUnavailable` if the store fails.
    pub async fn item_count(&self, principal: &Principal) -> ShopResult<u32> {
        let user_id = require_user(principal)?;
        Ok(self
            .lines(user_id)
            .await?
            .iter()
            .fold(0_u32, |acc, l| acc.saturating_add(l.item.quantity.get())))
    }

    /// Live cart total at current catalog prices.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::BackendUnavailable` if the store fails and
    /// `ShopError::Validation` (field `quantity`) if the total is out of range.
    pub async fn total(&self, principal: &Principal) -> ShopResult<LiveTotal> {
        Ok(self.view(principal).await?.total)
    }

    /// The caller's cart rows joined with their current products, oldest
    /// first. Read-only.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::BackendUnavailable` if the store fails.
    pub async fn snapshot(&self, principal: &Principal) -> ShopResult<Vec<CartLine>> {
        let user_id = require_user(principal)?;
        self.lines(user_id).await
    }

    /// Cart rows joined with their products, oldest first. Rows whose product
    /// no longer exists are skipped.
    pub(crate) async fn lines(&self, user_id: UserId) -> ShopResult<Vec<CartLine>> {
        let items = self.store.list_cart_items(user_id).await?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<ProductId> = items.iter().map(|item| item.product_id).collect();
        let mut products: HashMap<ProductId, _> = self
            .store
            .get_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let product = products.remove(&item.product_id)?;
                Some(CartLine { item, product })
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::InMemoryStore;
    use crate::models::Product;
    use tidepool_core::Price;

    async fn setup(stock: u32) -> (CartService, Arc<InMemoryStore>, Product) {
        let store = Arc::new(InMemoryStore::new());
        let product = Product {
            id: ProductId::generate(),
            name: "Driftwood Frame".to_string(),
            description: None,
            price: Price::from_cents(1250).unwrap(),
            stock,
            category: None,
            image_url: None,
            created_at: Utc::now(),
        };
        store.insert_product(&product).await.unwrap();
        (CartService::new(store.clone()), store, product)
    }

    #[tokio::test]
    async fn test_add_increments_single_line() {
        let (cart, _, product) = setup(5).await;
        let shopper = Principal::customer(UserId::generate());

        cart.add_or_increment(&shopper, product.id).await.unwrap();
        let item = cart.add_or_increment(&shopper, product.id).await.unwrap();

        assert_eq!(item.quantity.get(), 2);
        let view = cart.view(&shopper).await.unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.item_count, 2);
        assert_eq!(view.total.amount(), Decimal::new(2500, 2));
    }

    #[tokio::test]
    async fn test_add_beyond_stock_rejected() {
        let (cart, _, product) = setup(1).await;
        let shopper = Principal::customer(UserId::generate());

        cart.add_or_increment(&shopper, product.id).await.unwrap();
        let err = cart.add_or_increment(&shopper, product.id).await.unwrap_err();
        assert!(matches!(err, ShopError::Validation { field: "stock", .. }));
        assert_eq!(cart.item_count(&shopper).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_anonymous_rejected() {
        let (cart, _, product) = setup(1).await;
        assert!(matches!(
            cart.add_or_increment(&Principal::anonymous(), product.id).await,
            Err(ShopError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_set_quantity_rules() {
        let (cart, _, product) = setup(3).await;
        let shopper = Principal::customer(UserId::generate());
        let item = cart.add_or_increment(&shopper, product.id).await.unwrap();

        assert!(matches!(
            cart.set_quantity(&shopper, item.id, -1).await,
            Err(ShopError::Validation { field: "quantity", .. })
        ));
        assert!(matches!(
            cart.set_quantity(&shopper, item.id, 4).await,
            Err(ShopError::Validation { field: "quantity", .. })
        ));

        let updated = cart.set_quantity(&shopper, item.id, 3).await.unwrap().unwrap();
        assert_eq!(updated.quantity.get(), 3);

        assert!(cart.set_quantity(&shopper, item.id, 0).await.unwrap().is_none());
        assert!(cart.view(&shopper).await.unwrap().lines.is_empty());

        // Gone: zero is a no-op, anything else is not found.
        assert!(cart.set_quantity(&shopper, item.id, 0).await.unwrap().is_none());
        assert!(matches!(
            cart.set_quantity(&shopper, item.id, 1).await,
            Err(ShopError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_decrease_allowed_when_stock_dropped() {
        let (cart, store, mut product) = setup(3).await;
        let shopper = Principal::customer(UserId::generate());
        let item = cart.add_or_increment(&shopper, product.id).await.unwrap();
        cart.set_quantity(&shopper, item.id, 3).await.unwrap();

        product.stock = 0;
        store.update_product(&product).await.unwrap();

        let updated = cart.set_quantity(&shopper, item.id, 2).await.unwrap().unwrap();
        assert_eq!(updated.quantity.get(), 2);
    }

    #[tokio::test]
    async fn test_other_users_lines_are_forbidden() {
        let (cart, _, product) = setup(3).await;
        let owner = Principal::customer(UserId::generate());
        let intruder = Principal::customer(UserId::generate());
        let item = cart.add_or_increment(&owner, product.id).await.unwrap();

        assert!(matches!(
            cart.set_quantity(&intruder, item.id, 2).await,
            Err(ShopError::Forbidden(_))
        ));
        assert!(matches!(
            cart.remove(&intruder, item.id).await,
            Err(ShopError::Forbidden(_))
        ));
        assert_eq!(cart.item_count(&owner).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_absent_line_is_ok() {
        let (cart, _, _) = setup(1).await;
        let shopper = Principal::customer(UserId::generate());
        cart.remove(&shopper, CartItemId::generate()).await.unwrap();
    }

    #[tokio::test]
    async fn test_total_follows_catalog_price() {
        let (cart, store, mut product) = setup(5).await;
        let shopper = Principal::customer(UserId::generate());
        cart.add_or_increment(&shopper, product.id).await.unwrap();

        product.price = Price::from_cents(2000).unwrap();
        store.update_product(&product).await.unwrap();

        assert_eq!(cart.total(&shopper).await.unwrap().amount(), Decimal::new(2000, 2));
    }

    #[tokio::test]
    async fn test_deleted_product_drops_from_view() {
        let (cart, store, product) = setup(5).await;
        let shopper = Principal::customer(UserId::generate());
        cart.add_or_increment(&shopper, product.id).await.unwrap();

        store.delete_product(product.id).await.unwrap();
        let view = cart.view(&shopper).await.unwrap();
        assert!(view.lines.is_empty());
        assert_eq!(view.total.amount(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_clear_counts_rows() {
        let (cart, _, product) = setup(5).await;
        let shopper = Principal::customer(UserId::generate());
        cart.add_or_increment(&shopper, product.id).await.unwrap();
        assert_eq!(cart.clear(&shopper).await.unwrap(), 1);
        assert_eq!(cart.clear(&shopper).await.unwrap(), 0);
    }
}
