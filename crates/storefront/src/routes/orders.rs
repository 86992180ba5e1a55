//! Order history handlers.

use axum::{
    Json,
    extract::State,
};
use tracing::instrument;

use tidepool_core::OrderId;

use crate::error::Result;
use crate::middleware::{PathParam, RequireUser};
use crate::models::OrderDetails;
use crate::state::AppState;

/// The caller's orders, newest first.
#[instrument(skip(state, caller))]
pub async fn index(
    State(state): State<AppState>,
    RequireUser(caller): RequireUser,
) -> Result<Json<Vec<OrderDetails>>> {
    Ok(Json(state.services().orders.list_for_user(&caller).await?))
}

/// A single order. Admins may read any order.
#[instrument(skip(state, caller))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(caller): RequireUser,
    PathParam(id): PathParam<OrderId>,
) -> Result<Json<OrderDetails>> {
    Ok(Json(state.services().orders.get(&caller, id).await?))
}
