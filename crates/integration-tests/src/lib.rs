//! Integration tests for Tidepool Market.
//!
//! # Running Tests
//!
//! ```bash
//! # Service and HTTP scenarios (in-memory store)
//! cargo test -p tidepool-integration-tests
//!
//! # Include the PostgreSQL scenarios
//! STOREFRONT_DATABASE_URL=postgres://... cargo test -p tidepool-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `checkout` - Checkout saga, failure injection and resume
//! - `cart` - Cart upsert, quantities and live totals
//! - `admin` - Admin guard and order lifecycle
//! - `http` - Router-level tests through `tower::ServiceExt::oneshot`
//! - `postgres` - The same flows against a real database (ignored by default)

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;

use tidepool_core::{Price, UserId};
use tidepool_storefront::db::{InMemoryStore, Store};
use tidepool_storefront::models::{Product, ProductInput};
use tidepool_storefront::services::{Principal, ServiceSettings, Services};

/// A shipping address that passes validation.
pub const ADDRESS: &str = "42 Wharf Street, Port Fairy VIC 3284";

/// Parse a decimal literal.
#[must_use]
pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

/// A fresh signed-in shopper.
#[must_use]
pub fn shopper() -> Principal {
    Principal::customer(UserId::generate())
}

/// Services wired to an in-memory store, plus an admin to set up the catalog.
pub struct TestShop {
    pub store: Arc<InMemoryStore>,
    pub services: Services,
    pub admin: Principal,
}

impl TestShop {
    /// An empty shop.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    /// A shop over an existing in-memory store.
    #[must_use]
    pub fn with_store(store: Arc<InMemoryStore>) -> Self {
        let services = Services::new(store.clone(), ServiceSettings::default());
        Self {
            store,
            services,
            admin: Principal::admin(UserId::generate()),
        }
    }

    /// The store as the port type.
    #[must_use]
    pub fn port(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    /// List a product through the admin service.
    pub async fn product(&self, name: &str, price: &str, stock: i64) -> Product {
        self.services
            .admin
            .create_product(
                &self.admin,
                ProductInput {
                    name: name.to_string(),
                    price: dec(price),
                    stock,
                    ..ProductInput::default()
                },
            )
            .await
            .unwrap()
    }

    /// Overwrite a product's price directly in the store, skipping catalog
    /// validation.
    pub async fn reprice(&self, product: &Product, price: &str) -> Product {
        let repriced = Product {
            price: Price::new(dec(price)).unwrap(),
            ..product.clone()
        };
        assert!(self.store.update_product(&repriced).await.unwrap());
        repriced
    }

    /// Add `units` of `product` to `who`'s cart.
    pub async fn add(&self, who: &Principal, product: &Product, units: u32) {
        for _ in 0..units {
            self.services
                .cart
                .add_or_increment(who, product.id)
                .await
                .unwrap();
        }
    }
}

impl Default for TestShop {
    fn default() -> Self {
        Self::new()
    }
}
