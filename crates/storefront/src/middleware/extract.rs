//! Body and path extractors that reject with [`AppError`].
//!
//! axum's own `Json` and `Path` reject with plain-text bodies. These wrap
//! them so a malformed body or path parameter gets the same JSON error
//! shape as every other failure.
//!
//! ```rust,ignore
//! async fn handler(
//!     PathParam(id): PathParam<OrderId>,
//!     JsonBody(body): JsonBody<UpdateStatusRequest>,
//! ) -> Result<Json<Order>> { ... }
//! ```

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

/// JSON request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Path parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParam<T>(pub T);
