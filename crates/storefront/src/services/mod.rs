//! Business logic services for the storefront.
//!
//! # Services
//!
//! - [`catalog`] - Public product listing
//! - [`cart`] - Per-user cart with live totals
//! - [`checkout`] - Cart to order saga with resume
//! - [`orders`] - Order history and status lifecycle
//! - [`admin`] - Staff-only catalog and order mutations
//!
//! Services hold an `Arc<dyn Store>` and take the caller's [`Principal`] as
//! their first argument. Authorization runs inside the service, before any
//! store access, so every entry point (HTTP, CLI, tests) is guarded the
//! same way.

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod orders;

use std::sync::Arc;
use std::time::Duration;

use crate::db::Store;

pub use admin::AdminService;
pub use auth::{AdminGrant, Principal, require_admin, require_user};
pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::{CheckoutService, CheckoutSnapshot, ResumeReport, SnapshotLine};
pub use error::{CheckoutStage, ShopError, ShopResult};
pub use orders::OrderService;

/// Default lifetime of a parked checkout snapshot.
pub const DEFAULT_RESUME_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Tunables for the service layer.
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    /// How long a partially failed checkout stays resumable.
    pub checkout_resume_ttl: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            checkout_resume_ttl: DEFAULT_RESUME_TTL,
        }
    }
}

/// All services, wired to one store.
#[derive(Clone)]
pub struct Services {
    pub catalog: CatalogService,
    pub cart: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub admin: AdminService,
}

impl Services {
    /// Wire every service to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, settings: ServiceSettings) -> Self {
        let cart = CartService::new(Arc::clone(&store));
        let orders = OrderService::new(Arc::clone(&store));
        Self {
            catalog: CatalogService::new(Arc::clone(&store)),
            checkout: CheckoutService::new(
                Arc::clone(&store),
                cart.clone(),
                settings.checkout_resume_ttl,
            ),
            admin: AdminService::new(store, orders.clone()),
            cart,
            orders,
        }
    }
}
