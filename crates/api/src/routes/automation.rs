//! Vendor automation: interest tracking, follow-ups, auto-post settings, and
//! WhatsApp share cards.

use std::collections::BTreeSet;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use marketstall_core::{PostFrequency, ProductId, UserId};

use super::orders::id_value;
use super::{ApiJson, ApiPath, message};
use crate::db::{AutoPostRepository, CustomerRepository, ProductRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireVendor;
use crate::models::{AutoPost, AutoPostInput, Customer};
use crate::services::cards::{self, ShareCard};
use crate::services::validation::{ValidationErrors, Validator, is_post_time};
use crate::state::AppState;

/// How far back a customer's last contact may be to need a follow-up.
const FOLLOW_UP_WINDOW_DAYS: i64 = 2;

/// Create the `/api/automation` router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/track-interest", post(track_interest))
        .route("/follow-up-customers", get(follow_up_customers))
        .route("/auto-post/setup", post(setup_auto_post))
        .route("/auto-post/settings", get(auto_post_settings))
        .route("/generate-card/{product_id}", post(generate_card))
}

/// Interest body. Accepted on both the automation and buyer routes, so the
/// phone is read from `phoneNumber`, `buyerPhone` or `phone`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InterestRequest {
    #[serde(alias = "buyerPhone", alias = "phone")]
    phone_number: Option<String>,
    product_id: Option<Value>,
    vendor_id: Option<Value>,
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutoPostRequest {
    #[serde(default)]
    is_enabled: bool,
    post_time: Option<String>,
    #[serde(default)]
    post_frequency: PostFrequency,
    #[serde(default)]
    selected_products: Vec<Value>,
}

fn product_not_found() -> AppError {
    AppError::NotFound("Product not found".to_string())
}

/// Record a customer's interest in a product; the vendor defaults to the
/// product's owner.
pub(crate) async fn record_interest(
    state: &AppState,
    body: &InterestRequest,
    reply: &str,
) -> Result<Json<Value>> {
    let mut v = Validator::new();
    let phone = v.phone("phoneNumber", body.phone_number.as_deref());
    let product_id = body.product_id.as_ref().and_then(id_value);
    v.check(product_id.is_some(), "productId", "Product is required");
    let name = v.optional_text("name", body.name.as_deref(), 100, "Name must be at most 100 characters");
    v.finish()?;
    let product_id = ProductId::new(product_id.unwrap_or_default());

    let vendor_id = match body.vendor_id.as_ref().filter(|v| !v.is_null()) {
        Some(raw) => UserId::new(id_value(raw).ok_or_else(|| {
            ValidationErrors::single("vendorId", "vendorId must be a valid id")
        })?),
        None => ProductRepository::new(state.pool())
            .vendor_of(product_id)
            .await?
            .ok_or_else(product_not_found)?,
    };

    let customer_id = CustomerRepository::new(state.pool())
        .track_interest(vendor_id, &phone, name.as_deref(), product_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => product_not_found(),
            other => other.into(),
        })?;

    tracing::info!(%customer_id, %vendor_id, %product_id, "Interest tracked");
    Ok(message(reply))
}

#[instrument(skip_all)]
async fn track_interest(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<InterestRequest>,
) -> Result<Json<Value>> {
    record_interest(&state, &body, "Interest tracked").await
}

#[instrument(skip_all, fields(vendor_id = %vendor.id))]
async fn follow_up_customers(
    State(state): State<AppState>,
    RequireVendor(vendor): RequireVendor,
) -> Result<Json<Vec<Customer>>> {
    let since = Utc::now() - Duration::days(FOLLOW_UP_WINDOW_DAYS);
    let customers = CustomerRepository::new(state.pool())
        .follow_up(vendor.id, since)
        .await?;
    Ok(Json(customers))
}

/// Validate settings, collapsing duplicate product ids.
fn auto_post_input(body: &AutoPostRequest) -> std::result::Result<AutoPostInput, ValidationErrors> {
    let mut v = Validator::new();

    let post_time = body.post_time.as_deref().map(str::trim).unwrap_or_default();
    v.check(is_post_time(post_time), "postTime", "Post time must be HH:MM (24-hour)");

    let ids: Option<BTreeSet<i32>> = body.selected_products.iter().map(id_value).collect();
    v.check(ids.is_some(), "selectedProducts", "Selected products must be product ids");

    v.finish()?;

    Ok(AutoPostInput {
        is_enabled: body.is_enabled,
        post_time: post_time.to_string(),
        post_frequency: body.post_frequency,
        selected_products: ids
            .unwrap_or_default()
            .into_iter()
            .map(ProductId::new)
            .collect(),
    })
}

#[instrument(skip_all, fields(vendor_id = %vendor.id))]
async fn setup_auto_post(
    State(state): State<AppState>,
    RequireVendor(vendor): RequireVendor,
    ApiJson(body): ApiJson<AutoPostRequest>,
) -> Result<Json<AutoPost>> {
    let input = auto_post_input(&body)?;

    if !input.selected_products.is_empty() {
        let owned = ProductRepository::new(state.pool())
            .count_owned(vendor.id, &input.selected_products)
            .await?;
        if usize::try_from(owned).ok() != Some(input.selected_products.len()) {
            return Err(ValidationErrors::single(
                "selectedProducts",
                "Selected products must be your own active products",
            )
            .into());
        }
    }

    let settings = AutoPostRepository::new(state.pool())
        .upsert(vendor.id, &input)
        .await?;

    tracing::info!(enabled = settings.is_enabled, "Auto-post settings saved");
    Ok(Json(settings))
}

#[instrument(skip_all, fields(vendor_id = %vendor.id))]
async fn auto_post_settings(
    State(state): State<AppState>,
    RequireVendor(vendor): RequireVendor,
) -> Result<Json<Value>> {
    let settings = AutoPostRepository::new(state.pool()).get(vendor.id).await?;
    let body = match settings {
        Some(settings) => serde_json::to_value(settings)
            .map_err(|e| AppError::Internal(format!("serialize auto-post settings: {e}")))?,
        None => json!({ "isEnabled": false }),
    };
    Ok(Json(body))
}

#[instrument(skip_all, fields(vendor_id = %vendor.id, product_id = %product_id))]
async fn generate_card(
    State(state): State<AppState>,
    RequireVendor(vendor): RequireVendor,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<ShareCard>> {
    let product = ProductRepository::new(state.pool())
        .get_owned(product_id, vendor.id)
        .await?
        .ok_or_else(product_not_found)?;

    let catalog_id = vendor.catalog_id.as_deref().ok_or_else(|| {
        AppError::Internal(format!("vendor {} has no catalog id", vendor.id))
    })?;
    let catalog_url = cards::catalog_url(&state.config().public_base_url, catalog_id);

    Ok(Json(cards::product_card(&product, &catalog_url)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use marketstall_core::Role;

    use crate::routes::tests::{bearer, body_json, post_json, send};

    fn settings(body: Value) -> AutoPostRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_auto_post_input() {
        let input = auto_post_input(&settings(json!({
            "isEnabled": true,
            "postTime": "09:30",
            "postFrequency": "weekly",
            "selectedProducts": [3, "2", 3]
        })))
        .unwrap();

        assert!(input.is_enabled);
        assert_eq!(input.post_time, "09:30");
        assert_eq!(input.post_frequency, PostFrequency::Weekly);
        assert_eq!(input.selected_products, vec![ProductId::new(2), ProductId::new(3)]);
    }

    #[test]
    fn test_auto_post_defaults_to_daily() {
        let input = auto_post_input(&settings(json!({ "postTime": "18:00" }))).unwrap();
        assert!(!input.is_enabled);
        assert_eq!(input.post_frequency, PostFrequency::Daily);
        assert!(input.selected_products.is_empty());
    }

    #[test]
    fn test_auto_post_rejects_bad_time_and_ids() {
        let errors = auto_post_input(&settings(json!({
            "postTime": "25:00",
            "selectedProducts": ["64f1c2"]
        })))
        .unwrap_err();
        let fields: Vec<_> = errors.errors().iter().map(|e| e.field).collect();
        assert_eq!(fields, ["postTime", "selectedProducts"]);
    }

    #[test]
    fn test_interest_phone_aliases() {
        for key in ["phoneNumber", "buyerPhone", "phone"] {
            let body: InterestRequest =
                serde_json::from_value(json!({ key: "08031234567", "productId": 1 })).unwrap();
            assert_eq!(body.phone_number.as_deref(), Some("08031234567"));
        }
    }

    #[tokio::test]
    async fn test_interest_is_validated_before_the_database() {
        let response = send(post_json(
            "/api/automation/track-interest",
            &json!({ "phoneNumber": "12" }),
        ))
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Valid phone number required");
        assert_eq!(body["errors"][1]["field"], "productId");
    }

    #[tokio::test]
    async fn test_follow_ups_are_vendor_only() {
        let response = send(
            Request::get("/api/automation/follow-up-customers")
                .header(header::AUTHORIZATION, bearer(Role::Buyer))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_card_requires_token() {
        let response = send(
            Request::post("/api/automation/generate-card/3")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
