//! Tidepool Market storefront library.
//!
//! Catalog, cart, checkout, order history and admin mutations over a
//! pluggable record store. The HTTP binary and the CLI are thin shells over
//! [`services::Services`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
