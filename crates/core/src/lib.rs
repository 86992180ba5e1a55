//! Tidepool Market Core - Shared domain types.
//!
//! This crate provides the value types used across all Tidepool components:
//! - `storefront` - Catalog, cart, checkout and admin services plus the HTTP API
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP. Anything that needs a store lives in the storefront crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money (`Price`, `LiveTotal`, `FrozenTotal`),
//!   cart quantities and the order status lifecycle

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
