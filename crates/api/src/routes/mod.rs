//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database ping)
//! GET  /api/test                        - Smoke test
//!
//! # Identity (strict rate limit)
//! POST /api/auth/vendor/register        - Vendor signup, emails an OTP
//! POST /api/auth/vendor/verify-otp      - Verify vendor email, returns token
//! POST /api/auth/vendor/resend-otp      - New verification code
//! POST /api/auth/buyer/signup           - Buyer signup, returns token
//! POST /api/auth/login                  - Login (either role)
//! GET  /api/auth/me                     - Current account
//! POST /api/auth/forgot-password        - Email a reset OTP
//! POST /api/auth/verify-reset-otp       - Check a reset OTP
//! POST /api/auth/reset-password         - Set a new password
//! POST /api/auth/logout                 - Acknowledge logout
//!
//! # Catalog (vendor)
//! GET    /api/products                  - Own active products
//! POST   /api/products                  - Create product
//! PUT    /api/products/{id}             - Update own product
//! DELETE /api/products/{id}             - Soft delete own product
//! GET    /api/vendors/{catalogId}       - Public vendor page
//! PUT    /api/vendors/profile           - Update own profile
//!
//! # Orders
//! GET  /api/orders                      - Own orders (vendor)
//! GET  /api/orders/recent               - Latest 10 (vendor)
//! POST /api/orders                      - Place order (public)
//! PUT  /api/orders/{id}/status          - Set status (vendor)
//! GET  /api/orders/{id}                 - Order detail (vendor)
//!
//! # Dashboard (vendor)
//! GET  /api/dashboard/stats             - Sales and catalog figures
//! GET  /api/dashboard/sales?from&to     - Sales over a range
//!
//! # Buyer
//! GET  /api/buyer/vendors               - Vendor search
//! GET  /api/buyer/products              - Browse
//! GET  /api/buyer/products/featured     - Featured products
//! GET  /api/buyer/products/{id}         - Product detail (counts a view)
//! POST /api/buyer/orders                - Place order
//! POST /api/buyer/track-order           - Orders by id or phone
//! POST /api/buyer/track-interest        - Record interest
//! POST /api/buyer/interactions          - Log an action (buyer)
//! GET  /api/buyer/interactions          - Own recent actions (buyer)
//!
//! # Automation
//! POST /api/automation/track-interest          - Record interest (public)
//! GET  /api/automation/follow-up-customers     - Customers to follow up (vendor)
//! POST /api/automation/auto-post/setup         - Save auto-post settings (vendor)
//! GET  /api/automation/auto-post/settings      - Read auto-post settings (vendor)
//! POST /api/automation/generate-card/{id}      - WhatsApp share card (vendor)
//! ```

pub mod auth;
pub mod automation;
pub mod buyer;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod vendors;

use std::time::Duration;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequest, FromRequestParts, State},
    http::{HeaderName, Method, StatusCode, header},
    middleware,
    routing::get,
};
use serde_json::{Value, json};
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::error::AppError;
use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, json_rate_limit_body, request_id_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// Request bodies carry base64 images, so the default 2 MB is too small.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// JSON body extractor that rejects with the API's JSON error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor that rejects with the API's JSON error body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Query extractor that rejects with the API's JSON error body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// `{"message": ...}` acknowledgement body.
pub(crate) fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

/// Routes under `/api`, excluding `/api/auth`.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/test", get(api_test))
        .nest("/api/products", products::routes())
        .nest("/api/vendors", vendors::routes())
        .nest("/api/orders", orders::routes())
        .nest("/api/dashboard", dashboard::routes())
        .nest("/api/buyer", buyer::routes())
        .nest("/api/automation", automation::routes())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect::<Vec<_>>(),
        )
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ]))
        .max_age(Duration::from_secs(600))
}

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let config = state.config();

    let mut auth = Router::new().nest("/api/auth", auth::routes());
    let mut api = api_routes();
    if config.rate_limit_enabled {
        auth = auth
            .layer(auth_rate_limiter())
            .layer(middleware::from_fn(json_rate_limit_body));
        api = api
            .layer(api_rate_limiter())
            .layer(middleware::from_fn(json_rate_limit_body));
    }

    let cors = cors_layer(&config.cors_allowed_origins);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(auth)
        .merge(api)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(cors)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn api_test() -> Json<Value> {
    message("Server is working!")
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
