//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error body is JSON: `{"message": "..."}`, plus `"errors"` with the
//! per-field problems for validation failures.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::db::orders::PlaceOrderError;
use crate::services::auth::AuthError;
use crate::services::images::ImageError;
use crate::services::validation::ValidationErrors;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// One or more request fields are invalid.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Image handling failed.
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    /// Order could not be placed.
    #[error("Order error: {0}")]
    Order(#[from] PlaceOrderError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but the wrong kind of account.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Too many requests, please try again later")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::BAD_REQUEST,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Auth(err) => match err {
                AuthError::EmailTaken
                | AuthError::InvalidCredentials
                | AuthError::NotVerified
                | AuthError::VendorNotFound
                | AuthError::AlreadyVerified
                | AuthError::InvalidOtp
                | AuthError::OtpExpired
                | AuthError::InvalidResetOtp => StatusCode::BAD_REQUEST,
                AuthError::AccountDisabled | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::AccountNotFound | AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::Email(_) => StatusCode::BAD_GATEWAY,
                AuthError::Token(_) | AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Image(err) => match err {
                ImageError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                ImageError::Invalid(_) => StatusCode::BAD_REQUEST,
                ImageError::Upload(_) | ImageError::Http(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Order(err) => match err {
                PlaceOrderError::UnavailableProduct(_)
                | PlaceOrderError::InsufficientStock { .. }
                | PlaceOrderError::TotalTooLarge(_) => StatusCode::BAD_REQUEST,
                PlaceOrderError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Don't expose internal error details to clients
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Auth(err) => match err {
                AuthError::Email(_) => "Failed to send email. Please try again.".to_string(),
                AuthError::Token(_) | AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Internal server error".to_string()
                }
                other => other.to_string(),
            },
            Self::Validation(errors) => errors.message().to_string(),
            Self::Image(err) => match err {
                ImageError::NotConfigured => "Image uploads are not configured".to_string(),
                ImageError::Invalid(msg) => format!("Invalid image: {msg}"),
                ImageError::Upload(_) | ImageError::Http(_) => "Image upload failed".to_string(),
            },
            Self::Order(err) => match err {
                PlaceOrderError::UnavailableProduct(id) => {
                    format!("Product {id} is not available from this vendor")
                }
                PlaceOrderError::InsufficientStock { name, .. } => {
                    format!("Insufficient stock for {name}")
                }
                PlaceOrderError::TotalTooLarge(_) => {
                    "Order total is too large; split it into smaller orders".to_string()
                }
                PlaceOrderError::Repository(_) => "Internal server error".to_string(),
            },
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let message = self.public_message();
        let body = match &self {
            Self::Validation(errors) => json!({ "message": message, "errors": errors.errors() }),
            _ => json!({ "message": message }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(format!("Invalid query: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(format!("Invalid path: {}", rejection.body_text()))
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, role: &str) {
    sentry::configure_scope(|scope| {
        let mut user = sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        };
        user.other
            .insert("role".to_string(), serde_json::Value::String(role.to_string()));
        scope.set_user(Some(user));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use marketstall_core::ProductId;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("Product not found".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Image(ImageError::NotConfigured)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Image(ImageError::Upload("boom".into()))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(get_status(AuthError::EmailTaken.into()), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(AuthError::OtpExpired.into()), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(AuthError::InvalidToken.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AuthError::AccountDisabled.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AuthError::AccountNotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(AuthError::PasswordHash.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_messages_are_client_facing() {
        let json = body_json(AppError::from(AuthError::EmailTaken).into_response()).await;
        assert_eq!(json["message"], "Email already registered");

        let json = body_json(AppError::NotFound("Order not found".into()).into_response()).await;
        assert_eq!(json["message"], "Order not found");

        let json = body_json(AppError::Internal("pool exhausted".into()).into_response()).await;
        assert_eq!(json["message"], "Internal server error");

        let err = PlaceOrderError::InsufficientStock {
            product_id: ProductId::new(4),
            name: "Organic Honey".into(),
        };
        let json = body_json(AppError::from(err).into_response()).await;
        assert_eq!(json["message"], "Insufficient stock for Organic Honey");

        let err = PlaceOrderError::TotalTooLarge("12000000000".parse().unwrap());
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["message"],
            "Order total is too large; split it into smaller orders"
        );
    }

    #[tokio::test]
    async fn test_validation_body_lists_fields() {
        let err = ValidationErrors::single("price", "Price must be a positive number");
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["message"], "Price must be a positive number");
        assert_eq!(json["errors"][0]["field"], "price");
    }
}
