//! Admin handlers.
//!
//! Identity is optional here so that the service's admin guard produces the
//! response: anonymous and non-admin callers both get 403.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tidepool_core::{OrderId, OrderStatus, ProductId};

use crate::error::Result;
use crate::middleware::{JsonBody, OptionalUser, PathParam};
use crate::models::{Order, OrderDetails, Product, ProductInput};
use crate::state::AppState;

/// Status change request.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// Response for a product delete.
#[derive(Debug, Serialize)]
pub struct DeleteProductResponse {
    pub deleted: bool,
}

/// All orders, newest first.
#[instrument(skip(state, caller))]
pub async fn list_orders(
    State(state): State<AppState>,
    OptionalUser(caller): OptionalUser,
) -> Result<Json<Vec<OrderDetails>>> {
    Ok(Json(state.services().admin.list_orders(&caller).await?))
}

/// Create a product.
#[instrument(skip(state, caller, input))]
pub async fn create_product(
    State(state): State<AppState>,
    OptionalUser(caller): OptionalUser,
    JsonBody(input): JsonBody<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = state
        .services()
        .admin
        .create_product(&caller, input)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Replace a product's fields.
#[instrument(skip(state, caller, input))]
pub async fn update_product(
    State(state): State<AppState>,
    OptionalUser(caller): OptionalUser,
    PathParam(id): PathParam<ProductId>,
    JsonBody(input): JsonBody<ProductInput>,
) -> Result<Json<Product>> {
    let product = state
        .services()
        .admin
        .update_product(&caller, id, input)
        .await?;
    Ok(Json(product))
}

/// Delete a product.
#[instrument(skip(state, caller))]
pub async fn delete_product(
    State(state): State<AppState>,
    OptionalUser(caller): OptionalUser,
    PathParam(id): PathParam<ProductId>,
) -> Result<Json<DeleteProductResponse>> {
    let deleted = state.services().admin.delete_product(&caller, id).await?;
    Ok(Json(DeleteProductResponse { deleted }))
}

/// Move an order to a new status.
#[instrument(skip(state, caller, body), fields(to = %body.status))]
pub async fn update_order_status(
    State(state): State<AppState>,
    OptionalUser(caller): OptionalUser,
    PathParam(id): PathParam<OrderId>,
    JsonBody(body): JsonBody<UpdateStatusRequest>,
) -> Result<Json<Order>> {
    let order = state
        .services()
        .admin
        .update_order_status(&caller, id, body.status)
        .await?;
    Ok(Json(order))
}
