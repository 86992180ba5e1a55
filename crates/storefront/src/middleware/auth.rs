//! Caller identity extractors.
//!
//! Users are authenticated by an upstream gateway, which forwards:
//!
//! - `x-user-id` - the user's UUID
//! - `x-user-admin` - `true` or `false` (absent means `false`)
//! - `x-gateway-secret` - the shared secret, when one is configured
//!
//! If a gateway secret is configured and the request does not carry it, the
//! identity headers are ignored and the caller is anonymous.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::Span;

use tidepool_core::UserId;

use crate::error::{AppError, set_sentry_user};
use crate::services::{Principal, ShopError};
use crate::state::AppState;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the admin flag.
pub const USER_ADMIN_HEADER: &str = "x-user-admin";
/// Header carrying the gateway's shared secret.
pub const GATEWAY_SECRET_HEADER: &str = "x-gateway-secret";

/// Extractor that requires a signed-in caller.
///
/// Rejects anonymous requests with 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireUser(caller): RequireUser) -> impl IntoResponse {
///     format!("Hello, {:?}!", caller.user_id())
/// }
/// ```
pub struct RequireUser(pub Principal);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = resolve_principal(parts, state)?;
        if principal.user_id().is_none() {
            return Err(ShopError::Unauthenticated.into());
        }
        Ok(Self(principal))
    }
}

/// Extractor that resolves the caller, anonymous or not.
///
/// Used where the service layer makes the decision itself, such as the
/// admin routes (an anonymous caller there is forbidden, not unauthenticated).
pub struct OptionalUser(pub Principal);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve_principal(parts, state).map(Self)
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

fn resolve_principal(parts: &Parts, state: &AppState) -> Result<Principal, AppError> {
    if !state
        .config()
        .gateway_trusts(header(parts, GATEWAY_SECRET_HEADER))
    {
        if parts.headers.contains_key(USER_ID_HEADER) {
            tracing::warn!("identity headers without valid gateway secret ignored");
        }
        return Ok(Principal::anonymous());
    }

    let Some(raw_id) = header(parts, USER_ID_HEADER) else {
        return Ok(Principal::anonymous());
    };
    let user_id: UserId = raw_id
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("{USER_ID_HEADER} must be a UUID")))?;

    let is_admin = match header(parts, USER_ADMIN_HEADER).map(str::trim) {
        None | Some("false") => false,
        Some("true") => true,
        Some(_) => {
            return Err(AppError::BadRequest(format!(
                "{USER_ADMIN_HEADER} must be true or false"
            )));
        }
    };

    Span::current().record("user_id", tracing::field::display(user_id));
    set_sentry_user(&user_id);

    Ok(if is_admin {
        Principal::admin(user_id)
    } else {
        Principal::customer(user_id)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use secrecy::SecretString;

    use super::*;
    use crate::config::StorefrontConfig;
    use crate::db::InMemoryStore;

    const SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

    fn state(gateway_secret: Option<&str>) -> AppState {
        let config = StorefrontConfig {
            gateway_secret: gateway_secret.map(SecretString::from),
            ..StorefrontConfig::default()
        };
        AppState::new(config, Arc::new(InMemoryStore::new()))
    }

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/cart");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_no_headers_is_anonymous() {
        let principal = resolve_principal(&parts(&[]), &state(None)).unwrap();
        assert_eq!(principal, Principal::anonymous());
    }

    #[test]
    fn test_customer_and_admin() {
        let id = UserId::generate().to_string();
        let customer = resolve_principal(&parts(&[(USER_ID_HEADER, &id)]), &state(None)).unwrap();
        assert!(!customer.is_admin());
        assert_eq!(customer.user_id().unwrap().to_string(), id);

        let admin = resolve_principal(
            &parts(&[(USER_ID_HEADER, &id), (USER_ADMIN_HEADER, "true")]),
            &state(None),
        )
        .unwrap();
        assert!(admin.is_admin());
    }

    #[test]
    fn test_malformed_headers_rejected() {
        assert!(matches!(
            resolve_principal(&parts(&[(USER_ID_HEADER, "42")]), &state(None)),
            Err(AppError::BadRequest(_))
        ));
        let id = UserId::generate().to_string();
        assert!(matches!(
            resolve_principal(
                &parts(&[(USER_ID_HEADER, &id), (USER_ADMIN_HEADER, "yes")]),
                &state(None)
            ),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_gateway_secret_gates_identity() {
        let id = UserId::generate().to_string();
        let guarded = state(Some(SECRET));

        let spoofed = resolve_principal(
            &parts(&[(USER_ID_HEADER, &id), (USER_ADMIN_HEADER, "true")]),
            &guarded,
        )
        .unwrap();
        assert_eq!(spoofed, Principal::anonymous());

        let trusted = resolve_principal(
            &parts(&[(USER_ID_HEADER, &id), (GATEWAY_SECRET_HEADER, SECRET)]),
            &guarded,
        )
        .unwrap();
        assert_eq!(trusted.user_id().unwrap().to_string(), id);
    }
}
