//! Cart handlers.
//!
//! The cart is always read back with live totals at current catalog prices.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tidepool_core::{CartItemId, LiveTotal, ProductId};

use crate::error::Result;
use crate::middleware::{JsonBody, PathParam, RequireUser};
use crate::models::{CartItem, CartLine, CartView};
use crate::state::AppState;

/// Cart display data.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub lines: Vec<CartLine>,
    pub total: LiveTotal,
    /// Total rounded for display (e.g., "$25.50").
    pub total_display: String,
    pub item_count: u32,
}

impl From<CartView> for CartResponse {
    fn from(view: CartView) -> Self {
        Self {
            total_display: view.total.display(),
            total: view.total,
            item_count: view.item_count,
            lines: view.lines,
        }
    }
}

/// Add-to-cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
}

/// Quantity update form data.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

/// Response for clearing the cart.
#[derive(Debug, Serialize)]
pub struct ClearCartResponse {
    pub removed: u64,
}

/// Show the caller's cart.
#[instrument(skip(state, caller))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(caller): RequireUser,
) -> Result<Json<CartResponse>> {
    let view = state.services().cart.view(&caller).await?;
    Ok(Json(view.into()))
}

/// Add one unit of a product.
#[instrument(skip(state, caller, body), fields(product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(caller): RequireUser,
    JsonBody(body): JsonBody<AddToCartRequest>,
) -> Result<Json<CartItem>> {
    let item = state
        .services()
        .cart
        .add_or_increment(&caller, body.product_id)
        .await?;
    Ok(Json(item))
}

/// Set a line's quantity. Returns 204 when the line was removed.
#[instrument(skip(state, caller, body))]
pub async fn update(
    State(state): State<AppState>,
    RequireUser(caller): RequireUser,
    PathParam(id): PathParam<CartItemId>,
    JsonBody(body): JsonBody<UpdateQuantityRequest>,
) -> Result<Response> {
    let updated = state
        .services()
        .cart
        .set_quantity(&caller, id, body.quantity)
        .await?;
    Ok(match updated {
        Some(item) => Json(item).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// Remove a line.
#[instrument(skip(state, caller))]
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(caller): RequireUser,
    PathParam(id): PathParam<CartItemId>,
) -> Result<StatusCode> {
    state.services().cart.remove(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Empty the cart.
#[instrument(skip(state, caller))]
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(caller): RequireUser,
) -> Result<Json<ClearCartResponse>> {
    let removed = state.services().cart.clear(&caller).await?;
    Ok(Json(ClearCartResponse { removed }))
}
