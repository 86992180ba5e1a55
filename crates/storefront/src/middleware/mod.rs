//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! Caller identity is resolved per handler by the extractors in [`auth`];
//! bodies and path parameters go through [`extract`].

pub mod auth;
pub mod extract;
pub mod request_id;

pub use auth::{OptionalUser, RequireUser};
pub use extract::{JsonBody, PathParam};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
