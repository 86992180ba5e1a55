//! Order reads and status transitions.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use tidepool_core::{OrderId, OrderStatus, ProductId};

use super::auth::{AdminGrant, Principal, require_owner_or_admin, require_user};
use super::error::{ShopError, ShopResult};
use crate::db::{RepositoryError, Store};
use crate::models::{Order, OrderDetails, OrderLine};

/// Compare-and-set attempts before giving up on a contended status update.
const MAX_STATUS_ATTEMPTS: usize = 3;

/// Order history and lifecycle.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
}

impl OrderService {
    /// Create a new order service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The caller's orders with their lines, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Unauthenticated` for anonymous callers.
    #[instrument(skip(self, principal))]
    pub async fn list_for_user(&self, principal: &Principal) -> ShopResult<Vec<OrderDetails>> {
        let user_id = require_user(principal)?;
        let orders = self.store.list_orders(Some(user_id)).await?;
        self.with_lines(orders).await
    }

    /// One order with its lines. Users see their own orders; admins see all.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` or `ShopError::Forbidden`.
    #[instrument(skip(self, principal), fields(order_id = %id))]
    pub async fn get(&self, principal: &Principal, id: OrderId) -> ShopResult<OrderDetails> {
        require_user(principal)?;
        let order = self.load(id).await?;
        require_owner_or_admin(principal, order.user_id)?;
        let mut details = self.with_lines(vec![order]).await?;
        details
            .pop()
            .ok_or_else(|| ShopError::NotFound(format!("order {id}")))
    }

    /// Every user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::BackendUnavailable` if the store fails.
    #[instrument(skip(self, grant), fields(admin_id = %grant.admin_id()))]
    pub async fn list_all(&self, grant: &AdminGrant) -> ShopResult<Vec<OrderDetails>> {
        let orders = self.store.list_orders(None).await?;
        self.with_lines(orders).await
    }

    /// Move an order along its lifecycle.
    ///
    /// The move is validated against the current status and applied only if
    /// the status has not changed since it was read. A lost race re-reads and
    /// re-validates.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::InvalidTransition` for a move that is not allowed
    /// from the current status and `ShopError::NotFound` for an unknown order.
    #[instrument(skip(self, grant), fields(admin_id = %grant.admin_id(), order_id = %id, to = %to))]
    pub async fn transition(
        &self,
        grant: &AdminGrant,
        id: OrderId,
        to: OrderStatus,
    ) -> ShopResult<Order> {
        for attempt in 1..=MAX_STATUS_ATTEMPTS {
            let mut order = self.load(id).await?;
            let from = order.status;
            from.transition(to)?;

            if self.store.update_order_status(id, from, to).await? {
                info!(%from, %to, "order status updated");
                order.status = to;
                return Ok(order);
            }
            warn!(attempt, %from, "order status changed concurrently, retrying");
        }
        Err(ShopError::BackendUnavailable(RepositoryError::Conflict(
            format!("order {id} status kept changing"),
        )))
    }

    async fn load(&self, id: OrderId) -> ShopResult<Order> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("order {id}")))
    }

    /// Attach lines and product names, batch-loading both.
    async fn with_lines(&self, orders: Vec<Order>) -> ShopResult<Vec<OrderDetails>> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
        let items = self.store.list_order_items(&order_ids).await?;

        let product_ids: Vec<ProductId> = items.iter().map(|i| i.product_id).collect();
        let names: HashMap<ProductId, String> = self
            .store
            .get_products(&product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let mut lines_by_order: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
        for item in items {
            let product_name = names.get(&item.product_id).cloned();
            lines_by_order
                .entry(item.order_id)
                .or_default()
                .push(OrderLine { item, product_name });
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderDetails {
                items: lines_by_order.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }
}
