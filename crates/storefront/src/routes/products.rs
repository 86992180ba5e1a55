//! Public catalog handlers.

use axum::{
    Json,
    extract::State,
};
use tracing::instrument;

use tidepool_core::ProductId;

use crate::error::Result;
use crate::middleware::PathParam;
use crate::models::Product;
use crate::state::AppState;

/// List all products, newest first.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.services().catalog.list().await?))
}

/// Show a single product.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    PathParam(id): PathParam<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(state.services().catalog.get(id).await?))
}
