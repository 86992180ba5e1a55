//! Checkout handlers.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tidepool_core::OrderId;

use crate::error::{Result, add_breadcrumb};
use crate::middleware::{JsonBody, PathParam, RequireUser};
use crate::services::ResumeReport;
use crate::state::AppState;

/// Checkout form data.
#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: String,
}

/// Response for a placed order.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
}

/// Place an order for the caller's cart.
#[instrument(skip(state, caller, body))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireUser(caller): RequireUser,
    JsonBody(body): JsonBody<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    let order_id = state
        .services()
        .checkout
        .checkout(&caller, &body.shipping_address)
        .await?;
    let order_ref = order_id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_ref.as_str())]));
    Ok((StatusCode::CREATED, Json(CheckoutResponse { order_id })))
}

/// Finish a checkout that stopped after its order was created.
#[instrument(skip(state, caller))]
pub async fn resume(
    State(state): State<AppState>,
    RequireUser(caller): RequireUser,
    PathParam(order_id): PathParam<OrderId>,
) -> Result<Json<ResumeReport>> {
    let report = state.services().checkout.resume(&caller, order_id).await?;
    Ok(Json(report))
}
