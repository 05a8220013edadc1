//! Authentication extractors.
//!
//! Handlers declare the account they need as an argument:
//!
//! ```rust,ignore
//! async fn list_products(RequireVendor(vendor): RequireVendor) -> Result<Json<Vec<Product>>> {
//!     // vendor: User, role checked, account active
//! }
//! ```
//!
//! The bearer token is verified first, then the role, then the account is
//! loaded so deactivated or deleted accounts lose access immediately.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};

use marketstall_core::Role;

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::services::auth::TokenSubject;
use crate::state::AppState;

/// Extract the raw bearer token, if any.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verify the request's token.
fn subject(parts: &Parts, state: &AppState) -> Result<TokenSubject, AppError> {
    let token = bearer_token(&parts.headers)
        .ok_or_else(|| AppError::Unauthorized("No token provided".to_string()))?;
    state
        .tokens()
        .verify(token)
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))
}

/// Load the active account behind a verified token.
async fn load_user(state: &AppState, subject: TokenSubject) -> Result<User, AppError> {
    let user = UserRepository::new(state.pool())
        .get_by_id(subject.user_id)
        .await?
        .filter(|u| u.is_active && u.role == subject.role)
        .ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))?;

    set_sentry_user(&user.id, user.role.as_str());
    Ok(user)
}

async fn require_role(parts: &Parts, state: &AppState, role: Role) -> Result<User, AppError> {
    let subject = subject(parts, state)?;
    if subject.role != role {
        return Err(AppError::Forbidden(match role {
            Role::Vendor => "Vendor access required".to_string(),
            Role::Buyer => "Buyer access required".to_string(),
        }));
    }
    load_user(state, subject).await
}

/// A valid token, without loading the account.
pub struct RequireToken(pub TokenSubject);

impl FromRequestParts<AppState> for RequireToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        subject(parts, state).map(Self)
    }
}

/// A signed-in vendor. Buyers get 403.
pub struct RequireVendor(pub User);

impl FromRequestParts<AppState> for RequireVendor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Vendor).await.map(Self)
    }
}

/// A signed-in buyer. Vendors get 403.
pub struct RequireBuyer(pub User);

impl FromRequestParts<AppState> for RequireBuyer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Buyer).await.map(Self)
    }
}

/// The buyer behind the token, when a valid buyer token is sent.
///
/// Never rejects: anonymous requests, bad tokens, and vendor tokens all
/// yield `None`.
pub struct OptionalBuyer(pub Option<User>);

impl FromRequestParts<AppState> for OptionalBuyer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Ok(subject) = subject(parts, state) else {
            return Ok(Self(None));
        };
        if subject.role != Role::Buyer {
            return Ok(Self(None));
        }
        match load_user(state, subject).await {
            Ok(user) => Ok(Self(Some(user))),
            Err(AppError::Unauthorized(_)) => Ok(Self(None)),
            Err(e) => Err(e),
        }
    }
}
