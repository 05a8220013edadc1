//! Public vendor pages and vendor profile editing.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use super::{ApiJson, ApiPath};
use crate::db::{ProductRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireVendor;
use crate::models::{Product, VendorSummary};
use crate::services::images::ImageKind;
use crate::services::validation::Validator;
use crate::state::AppState;

/// Create the `/api/vendors` router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", put(update_profile))
        .route("/{catalog_id}", get(show))
}

#[derive(Serialize)]
struct VendorPage {
    vendor: VendorSummary,
    products: Vec<Product>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRequest {
    name: Option<String>,
    business_name: Option<String>,
    about: Option<String>,
    logo: Option<String>,
}

/// Public catalog page: the vendor and their active products.
#[instrument(skip(state))]
async fn show(
    State(state): State<AppState>,
    ApiPath(catalog_id): ApiPath<String>,
) -> Result<Json<VendorPage>> {
    let vendor = UserRepository::new(state.pool())
        .find_vendor(&catalog_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Vendor not found".to_string()))?;

    let products = ProductRepository::new(state.pool())
        .list_active_for_vendor(vendor.id)
        .await?;

    Ok(Json(VendorPage { vendor, products }))
}

#[instrument(skip_all, fields(vendor_id = %vendor.id))]
async fn update_profile(
    State(state): State<AppState>,
    RequireVendor(vendor): RequireVendor,
    ApiJson(body): ApiJson<ProfileRequest>,
) -> Result<Json<Value>> {
    let mut v = Validator::new();
    let name = v.text("name", body.name.as_deref(), 1, 100, "Name is required");
    let business_name = v.text(
        "businessName",
        body.business_name.as_deref(),
        1,
        100,
        "Business name is required",
    );
    let about = v
        .optional_text("about", body.about.as_deref(), 1000, "About must be at most 1000 characters")
        .unwrap_or_default();
    v.finish()?;

    let logo_url = match body.logo.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        Some(logo) if Some(logo) != vendor.logo_url.as_deref() => {
            Some(state.images().store(logo, ImageKind::Logo).await?)
        }
        _ => vendor.logo_url.clone(),
    };

    let updated = UserRepository::new(state.pool())
        .update_vendor_profile(vendor.id, &name, &business_name, &about, logo_url.as_deref())
        .await?;
    let summary = VendorSummary::from_vendor(&updated).ok_or_else(|| {
        AppError::Internal(format!("vendor {} has no business profile", updated.id))
    })?;

    Ok(Json(json!({ "vendor": summary })))
}
