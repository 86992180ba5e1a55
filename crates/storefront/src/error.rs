//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses are JSON objects with at least an `error` message. Validation
//! failures add the offending `field`; partial checkouts add the `order_id`,
//! the `stage` that failed and `resumable: true`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::services::ShopError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// A service operation failed.
    #[error(transparent)]
    Shop(#[from] ShopError),

    /// No route matches the request.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client (malformed body, path or header).
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Shop(err) => match err {
                ShopError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ShopError::Unauthenticated => StatusCode::UNAUTHORIZED,
                ShopError::Forbidden(_) => StatusCode::FORBIDDEN,
                ShopError::EmptyCart => StatusCode::BAD_REQUEST,
                ShopError::NotFound(_) => StatusCode::NOT_FOUND,
                ShopError::InvalidTransition { .. } | ShopError::CheckoutPartialFailure { .. } => {
                    StatusCode::CONFLICT
                }
                ShopError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    const fn should_report(&self) -> bool {
        matches!(
            self,
            Self::Shop(ShopError::BackendUnavailable(_) | ShopError::CheckoutPartialFailure { .. })
        )
    }

    fn body(&self) -> Value {
        match self {
            Self::Shop(ShopError::Validation { field, message }) => {
                json!({ "error": message, "field": field })
            }
            Self::Shop(ShopError::CheckoutPartialFailure {
                order_id, stage, ..
            }) => json!({
                "error": "Your order was placed but checkout did not finish",
                "order_id": order_id,
                "stage": stage,
                "resumable": true,
            }),
            // Don't expose internal error details to clients
            Self::Shop(ShopError::BackendUnavailable(_)) => {
                json!({ "error": "Service temporarily unavailable" })
            }
            _ => json!({ "error": self.to_string() }),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.should_report() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), Json(self.body())).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after the caller's identity is resolved to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order placed", Some(&[("order_id", "…")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
