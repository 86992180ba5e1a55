//! Authorization guard.
//!
//! Authentication happens upstream; the services only see a [`Principal`]
//! (a user identity or none, plus an admin flag). Every service operation
//! runs one of the guards below before touching the store.

use serde::Serialize;

use tidepool_core::UserId;

use super::error::{ShopError, ShopResult};

/// The caller of a service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    user_id: Option<UserId>,
    is_admin: bool,
}

impl Principal {
    /// A caller with no identity.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            user_id: None,
            is_admin: false,
        }
    }

    /// A signed-in shopper.
    #[must_use]
    pub const fn customer(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            is_admin: false,
        }
    }

    /// A signed-in staff member.
    #[must_use]
    pub const fn admin(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            is_admin: true,
        }
    }

    /// The caller's identity, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Whether the caller holds the admin role.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.is_admin
    }
}

/// Proof that the admin guard passed.
///
/// Only [`require_admin`] can create one, so any function taking an
/// `&AdminGrant` cannot be reached without the role check.
#[derive(Debug, Clone, Copy)]
pub struct AdminGrant {
    admin_id: UserId,
}

impl AdminGrant {
    /// The admin who was granted access.
    #[must_use]
    pub const fn admin_id(&self) -> UserId {
        self.admin_id
    }
}

/// Require a user identity.
///
/// # Errors
///
/// Returns `ShopError::Unauthenticated` for an anonymous caller.
pub const fn require_user(principal: &Principal) -> ShopResult<UserId> {
    match principal.user_id {
        Some(user_id) => Ok(user_id),
        None => Err(ShopError::Unauthenticated),
    }
}

/// Require the admin role.
///
/// # Errors
///
/// Returns `ShopError::Forbidden` unless the caller is an admin.
pub fn require_admin(principal: &Principal) -> ShopResult<AdminGrant> {
    match (principal.user_id, principal.is_admin) {
        (Some(admin_id), true) => Ok(AdminGrant { admin_id }),
        _ => {
            tracing::warn!(user_id = ?principal.user_id, "admin operation denied");
            Err(ShopError::Forbidden("admin role required".to_string()))
        }
    }
}

/// Require that the caller owns `owner`'s data, or is an admin.
///
/// # Errors
///
/// Returns `ShopError::Unauthenticated` for an anonymous caller and
/// `ShopError::Forbidden` for anyone else's data.
pub fn require_owner_or_admin(principal: &Principal, owner: UserId) -> ShopResult<UserId> {
    let user_id = require_user(principal)?;
    if user_id == owner || principal.is_admin {
        Ok(user_id)
    } else {
        Err(ShopError::Forbidden("not your record".to_string()))
    }
}
