//! Checkout saga.
//!
//! Turns a cart into an order in five steps:
//!
//! 1. Snapshot the cart lines with their current prices (now frozen).
//! 2. Compute the [`FrozenTotal`].
//! 3. Insert the order as `pending`.
//! 4. Insert one order item per snapshot line.
//! 5. Delete exactly the snapshot's cart rows.
//!
//! The store is not transactional. A failure up to and including step 3
//! leaves nothing behind. A failure in step 4 or 5 leaves a real order, so
//! the snapshot is parked under the order id and the caller gets
//! [`ShopError::CheckoutPartialFailure`]. [`CheckoutService::resume`] picks
//! the parked snapshot up and finishes the remaining steps; running it again
//! on a finished order changes nothing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use tidepool_core::{
    CartItemId, FrozenTotal, MoneyOverflow, OrderId, OrderItemId, OrderStatus, Price, ProductId,
    Quantity, UserId,
};

use super::auth::{Principal, require_user};
use super::cart::CartService;
use super::error::{CheckoutStage, ShopError, ShopResult};
use crate::db::{RepositoryError, Store};
use crate::models::{CartLine, Order, OrderItem};

/// Minimum shipping address length after trimming.
const MIN_ADDRESS_CHARS: usize = 10;

/// Upper bound on parked checkouts held at once.
const MAX_PENDING_CHECKOUTS: u64 = 10_000;

/// One cart line with its price frozen at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub cart_item_id: CartItemId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub price: Price,
}

/// The cart as it was when checkout started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSnapshot {
    pub user_id: UserId,
    pub lines: Vec<SnapshotLine>,
}

impl CheckoutSnapshot {
    /// Freeze the current prices of `lines`.
    #[must_use]
    pub fn freeze(user_id: UserId, lines: &[CartLine]) -> Self {
        Self {
            user_id,
            lines: lines
                .iter()
                .map(|line| SnapshotLine {
                    cart_item_id: line.item.id,
                    product_id: line.product.id,
                    quantity: line.item.quantity,
                    price: line.product.price,
                })
                .collect(),
        }
    }

    /// Order total at the frozen prices.
    ///
    /// # Errors
    ///
    /// Returns `MoneyOverflow` if the total is out of range.
    pub fn total(&self) -> Result<FrozenTotal, MoneyOverflow> {
        FrozenTotal::from_lines(self.lines.iter().map(|l| (l.price, l.quantity)))
    }

    /// Cart rows this checkout consumes.
    #[must_use]
    pub fn cart_item_ids(&self) -> Vec<CartItemId> {
        self.lines.iter().map(|l| l.cart_item_id).collect()
    }

    /// Reject a snapshot that repeats a product or contradicts an order item
    /// already written for its order.
    fn check_against(&self, existing: &[OrderItem]) -> ShopResult<()> {
        let by_product: HashMap<ProductId, &SnapshotLine> =
            self.lines.iter().map(|l| (l.product_id, l)).collect();
        if by_product.len() != self.lines.len() {
            return Err(ShopError::validation("snapshot", "lists a product more than once"));
        }
        let agrees = existing.iter().all(|item| {
            by_product
                .get(&item.product_id)
                .is_some_and(|l| l.quantity == item.quantity && l.price == item.price)
        });
        if !agrees {
            return Err(ShopError::validation(
                "snapshot",
                "does not match the order's existing items",
            ));
        }
        Ok(())
    }

    fn order_items(&self, order_id: OrderId, present: &HashSet<ProductId>) -> Vec<OrderItem> {
        self.lines
            .iter()
            .filter(|l| !present.contains(&l.product_id))
            .map(|l| OrderItem {
                id: OrderItemId::generate(),
                order_id,
                product_id: l.product_id,
                quantity: l.quantity,
                price: l.price,
            })
            .collect()
    }
}

/// What a resume run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResumeReport {
    /// Order items written by this run.
    pub items_inserted: usize,
    /// Cart rows deleted by this run, or `None` if the cart was not touched
    /// because no checkout state was left for the order.
    pub cart_items_cleared: Option<u64>,
}

/// Checkout orchestration.
#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn Store>,
    cart: CartService,
    pending: Cache<OrderId, Arc<CheckoutSnapshot>>,
}

impl CheckoutService {
    /// Create a checkout service. Parked snapshots expire after `resume_ttl`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, cart: CartService, resume_ttl: Duration) -> Self {
        let pending = Cache::builder()
            .max_capacity(MAX_PENDING_CHECKOUTS)
            .time_to_live(resume_ttl)
            .build();
        Self {
            store,
            cart,
            pending,
        }
    }

    /// Place an order for everything in the caller's cart.
    ///
    /// # Errors
    ///
    /// - `ShopError::Unauthenticated` for anonymous callers
    /// - `ShopError::Validation` (field `shipping_address`) for a short address
    /// - `ShopError::EmptyCart` if there is nothing to buy
    /// - `ShopError::BackendUnavailable` if the order could not be created;
    ///   nothing was written and the cart is unchanged
    /// - `ShopError::CheckoutPartialFailure` if the order exists but its items
    ///   or the cart cleanup did not complete
    #[instrument(skip(self, principal, shipping_address), fields(user_id))]
    pub async fn checkout(
        &self,
        principal: &Principal,
        shipping_address: &str,
    ) -> ShopResult<OrderId> {
        let user_id = require_user(principal)?;
        tracing::Span::current().record("user_id", tracing::field::display(user_id));
        let shipping_address = validate_address(shipping_address)?;

        let lines = self.cart.lines(user_id).await?;
        if lines.is_empty() {
            return Err(ShopError::EmptyCart);
        }
        let snapshot = Arc::new(CheckoutSnapshot::freeze(user_id, &lines));
        let total_amount = snapshot.total()?;
        debug!(lines = snapshot.lines.len(), total = %total_amount.display(), "cart snapshot taken");

        let order = Order {
            id: OrderId::generate(),
            user_id,
            shipping_address,
            total_amount,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        self.store.insert_order(&order).await?;
        debug!(order_id = %order.id, "order inserted");

        self.complete(order.id, snapshot, &[]).await?;
        info!(order_id = %order.id, total = %total_amount.display(), "checkout complete");
        Ok(order.id)
    }

    /// Finish a checkout that stopped after its order was created.
    ///
    /// Uses the snapshot parked by the failed run. Without one (expired or
    /// lost on restart) an order whose items already add up to its total is
    /// reported as done, leaving the cart alone.
    ///
    /// # Errors
    ///
    /// - `ShopError::NotFound` for an unknown order, or when no checkout state
    ///   is left for an incomplete order
    /// - `ShopError::Forbidden` for another user's order
    /// - `ShopError::CheckoutPartialFailure` if a step fails again
    #[instrument(skip(self, principal), fields(order_id = %order_id))]
    pub async fn resume(&self, principal: &Principal, order_id: OrderId) -> ShopResult<ResumeReport> {
        let user_id = require_user(principal)?;
        let order = self.owned_order(user_id, order_id).await?;
        let existing = self.store.list_order_items(&[order_id]).await?;

        if let Some(snapshot) = self.pending.get(&order_id).await {
            let report = self.complete(order_id, snapshot, &existing).await?;
            info!(items_inserted = report.items_inserted, "checkout resumed");
            return Ok(report);
        }

        let items_total = FrozenTotal::from_lines(existing.iter().map(|i| (i.price, i.quantity)))?;
        if !existing.is_empty() && items_total == order.total_amount {
            warn!("no checkout state left; order items already complete");
            return Ok(ResumeReport {
                items_inserted: 0,
                cart_items_cleared: None,
            });
        }
        Err(ShopError::NotFound(format!("checkout state for order {order_id}")))
    }

    /// Finish a checkout from a caller-held snapshot.
    ///
    /// The snapshot must belong to the caller, add up to the order total and
    /// agree with every order item already written. Lines for products the
    /// order does not have yet are taken as given.
    ///
    /// # Errors
    ///
    /// As [`resume`](Self::resume), plus `ShopError::Forbidden` if the
    /// snapshot belongs to someone else and `ShopError::Validation` (field
    /// `snapshot`) if it disagrees with the order.
    #[instrument(skip(self, principal, snapshot), fields(order_id = %order_id))]
    pub async fn resume_with(
        &self,
        principal: &Principal,
        order_id: OrderId,
        snapshot: CheckoutSnapshot,
    ) -> ShopResult<ResumeReport> {
        let user_id = require_user(principal)?;
        if snapshot.user_id != user_id {
            return Err(ShopError::Forbidden("snapshot belongs to another user".to_string()));
        }
        let order = self.owned_order(user_id, order_id).await?;
        if snapshot.total()? != order.total_amount {
            return Err(ShopError::validation(
                "snapshot",
                "does not match the order total",
            ));
        }

        let existing = self.store.list_order_items(&[order_id]).await?;
        snapshot.check_against(&existing)?;
        self.complete(order_id, Arc::new(snapshot), &existing).await
    }

    /// The parked snapshot of an unfinished checkout, if any.
    pub async fn pending_snapshot(&self, order_id: OrderId) -> Option<Arc<CheckoutSnapshot>> {
        self.pending.get(&order_id).await
    }

    /// Steps 4 and 5, skipping products that already have an order item.
    async fn complete(
        &self,
        order_id: OrderId,
        snapshot: Arc<CheckoutSnapshot>,
        existing: &[OrderItem],
    ) -> ShopResult<ResumeReport> {
        let present: HashSet<ProductId> = existing.iter().map(|i| i.product_id).collect();
        let items = snapshot.order_items(order_id, &present);

        if !items.is_empty()
            && let Err(source) = self.store.insert_order_items(&items).await
        {
            return Err(self
                .park(order_id, snapshot, CheckoutStage::OrderItems, source)
                .await);
        }
        debug!(order_id = %order_id, inserted = items.len(), "order items written");

        let cleared = match self
            .store
            .delete_cart_items(snapshot.user_id, &snapshot.cart_item_ids())
            .await
        {
            Ok(cleared) => cleared,
            Err(source) => {
                return Err(self
                    .park(order_id, snapshot, CheckoutStage::CartClearing, source)
                    .await);
            }
        };
        debug!(order_id = %order_id, cleared, "cart cleared");

        self.pending.invalidate(&order_id).await;
        Ok(ResumeReport {
            items_inserted: items.len(),
            cart_items_cleared: Some(cleared),
        })
    }

    async fn park(
        &self,
        order_id: OrderId,
        snapshot: Arc<CheckoutSnapshot>,
        stage: CheckoutStage,
        source: RepositoryError,
    ) -> ShopError {
        error!(
            order_id = %order_id,
            stage = %stage,
            error = %source,
            "checkout stopped after order was created"
        );
        self.pending.insert(order_id, snapshot).await;
        ShopError::CheckoutPartialFailure {
            order_id,
            stage,
            source,
        }
    }

    async fn owned_order(&self, user_id: UserId, order_id: OrderId) -> ShopResult<Order> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("order {order_id}")))?;
        if order.user_id != user_id {
            return Err(ShopError::Forbidden("not your order".to_string()));
        }
        Ok(order)
    }
}

fn validate_address(raw: &str) -> ShopResult<String> {
    let address = raw.trim();
    if address.chars().count() < MIN_ADDRESS_CHARS {
        return Err(ShopError::validation(
            "shipping_address",
            format!("must be at least {MIN_ADDRESS_CHARS} characters"),
        ));
    }
    Ok(address.to_string())
}
