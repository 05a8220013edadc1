//! Buyer-facing route handlers: discovery, ordering, and tracking.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use marketstall_core::{InteractionAction, OrderId, ProductId, UserId};

use super::automation::{InterestRequest, record_interest};
use super::orders::{OrderRequest, id_value, place_order};
use super::{ApiJson, ApiPath, ApiQuery};
use crate::db::{InteractionRepository, OrderRepository, ProductRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::{OptionalBuyer, RequireBuyer};
use crate::models::{
    BuyerInteraction, ProductFilter, ProductSort, ProductWithVendor, TrackedOrder, VendorSummary,
};
use crate::services::validation::{ValidationErrors, sanitize};
use crate::state::AppState;

const VENDOR_SEARCH_LIMIT: i64 = 20;
const BROWSE_LIMIT: i64 = 50;
const FEATURED_LIMIT: i64 = 10;
const INTERACTION_LIMIT: i64 = 50;

/// Create the `/api/buyer` router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/vendors", get(vendors))
        .route("/products", get(products))
        .route("/products/featured", get(featured))
        .route("/products/{id}", get(product))
        .route("/orders", post(create_order))
        .route("/track-order", post(track_order))
        .route("/track-interest", post(track_interest))
        .route("/interactions", get(interactions).post(log_interaction))
}

#[derive(Debug, Deserialize)]
struct VendorSearchQuery {
    search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrowseQuery {
    category: Option<String>,
    search: Option<String>,
    min_price: Option<String>,
    max_price: Option<String>,
    sort: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackOrderRequest {
    order_id: Option<Value>,
    phone: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InteractionRequest {
    vendor_id: Option<Value>,
    product_id: Option<Value>,
    action: Option<InteractionAction>,
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(sanitize).filter(|s| !s.is_empty())
}

fn price_bound(
    field: &'static str,
    raw: Option<&str>,
) -> std::result::Result<Option<Decimal>, ValidationErrors> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<Decimal>()
            .ok()
            .filter(|p| *p >= Decimal::ZERO)
            .map(Some)
            .ok_or_else(|| ValidationErrors::single(field, format!("{field} must be a number"))),
    }
}

impl BrowseQuery {
    fn into_filter(self) -> std::result::Result<ProductFilter, ValidationErrors> {
        Ok(ProductFilter {
            min_price: price_bound("minPrice", self.min_price.as_deref())?,
            max_price: price_bound("maxPrice", self.max_price.as_deref())?,
            category: non_empty(self.category.as_deref()),
            search: non_empty(self.search.as_deref()),
            sort: ProductSort::parse(self.sort.as_deref()),
        })
    }
}

#[instrument(skip(state))]
async fn vendors(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<VendorSearchQuery>,
) -> Result<Json<Vec<VendorSummary>>> {
    let search = non_empty(query.search.as_deref());
    let vendors = UserRepository::new(state.pool())
        .search_vendors(search.as_deref(), VENDOR_SEARCH_LIMIT)
        .await?;
    Ok(Json(vendors))
}

#[instrument(skip(state))]
async fn products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BrowseQuery>,
) -> Result<Json<Vec<ProductWithVendor>>> {
    let filter = query.into_filter()?;
    let products = ProductRepository::new(state.pool())
        .browse(&filter, BROWSE_LIMIT)
        .await?;
    Ok(Json(products))
}

#[instrument(skip(state))]
async fn featured(State(state): State<AppState>) -> Result<Json<Vec<ProductWithVendor>>> {
    let products = ProductRepository::new(state.pool())
        .featured(FEATURED_LIMIT)
        .await?;
    Ok(Json(products))
}

/// Product detail. Counts a view, and logs one for signed-in buyers.
#[instrument(skip(state, buyer))]
async fn product(
    State(state): State<AppState>,
    OptionalBuyer(buyer): OptionalBuyer,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ProductWithVendor>> {
    let product = ProductRepository::new(state.pool())
        .record_view(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    if let Some(buyer) = buyer {
        let logged = InteractionRepository::new(state.pool())
            .record(
                buyer.id,
                product.product.vendor_id,
                Some(product.product.id),
                InteractionAction::ViewProduct,
            )
            .await;
        if let Err(e) = logged {
            tracing::warn!(error = %e, buyer_id = %buyer.id, "Failed to log product view");
        }
    }

    Ok(Json(product))
}

#[instrument(skip_all)]
async fn create_order(
    State(state): State<AppState>,
    OptionalBuyer(buyer): OptionalBuyer,
    ApiJson(body): ApiJson<OrderRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    place_order(&state, buyer.as_ref(), &body).await
}

/// Orders by id, or else by buyer phone number.
#[instrument(skip_all)]
async fn track_order(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TrackOrderRequest>,
) -> Result<Json<Vec<TrackedOrder>>> {
    let order_id = body.order_id.as_ref().and_then(id_value).map(OrderId::new);
    let phone = non_empty(body.phone.as_deref());

    let repo = OrderRepository::new(state.pool());
    let orders = match (order_id, phone) {
        (Some(id), _) => repo.track(Some(id), None).await?,
        (None, Some(phone)) => repo.track(None, Some(&phone)).await?,
        (None, None) => {
            return Err(AppError::BadRequest(
                "Phone number or order ID required".to_string(),
            ));
        }
    };
    Ok(Json(orders))
}

#[instrument(skip_all)]
async fn track_interest(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<InterestRequest>,
) -> Result<Json<Value>> {
    record_interest(&state, &body, "Interest tracked successfully").await
}

#[instrument(skip_all, fields(buyer_id = %buyer.id))]
async fn log_interaction(
    State(state): State<AppState>,
    RequireBuyer(buyer): RequireBuyer,
    ApiJson(body): ApiJson<InteractionRequest>,
) -> Result<(StatusCode, Json<BuyerInteraction>)> {
    let vendor_id = body.vendor_id.as_ref().and_then(id_value).map(UserId::new);
    let product_id = match body.product_id.as_ref().filter(|v| !v.is_null()) {
        Some(raw) => Some(id_value(raw).map(ProductId::new).ok_or_else(|| {
            ValidationErrors::single("productId", "productId must be a valid id")
        })?),
        None => None,
    };
    let (Some(vendor_id), Some(action)) = (vendor_id, body.action) else {
        return Err(ValidationErrors::single(
            "action",
            "vendorId and a valid action (MessageVendor, ViewProduct, AddToCart, PlaceOrder) are required",
        )
        .into());
    };

    let interaction = InteractionRepository::new(state.pool())
        .record(buyer.id, vendor_id, product_id, action)
        .await
        .map_err(|e| match e {
            crate::db::RepositoryError::NotFound => {
                AppError::NotFound("Vendor not found".to_string())
            }
            other => other.into(),
        })?;

    Ok((StatusCode::CREATED, Json(interaction)))
}

#[instrument(skip_all, fields(buyer_id = %buyer.id))]
async fn interactions(
    State(state): State<AppState>,
    RequireBuyer(buyer): RequireBuyer,
) -> Result<Json<Vec<BuyerInteraction>>> {
    let interactions = InteractionRepository::new(state.pool())
        .list_for_buyer(buyer.id, INTERACTION_LIMIT)
        .await?;
    Ok(Json(interactions))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use marketstall_core::Role;
    use serde_json::json;

    use crate::routes::tests::{bearer, body_json, post_json, send};

    #[test]
    fn test_browse_filter() {
        let filter = BrowseQuery {
            category: Some(" fashion ".into()),
            search: Some(String::new()),
            min_price: Some("1000".into()),
            max_price: None,
            sort: Some("price-high".into()),
        }
        .into_filter()
        .unwrap();

        assert_eq!(filter.category.as_deref(), Some("fashion"));
        assert_eq!(filter.search, None);
        assert_eq!(filter.min_price, Some("1000".parse().unwrap()));
        assert_eq!(filter.max_price, None);
        assert_eq!(filter.sort, ProductSort::PriceHigh);
    }

    #[test]
    fn test_browse_filter_rejects_bad_price() {
        let err = BrowseQuery {
            min_price: Some("cheap".into()),
            ..BrowseQuery::default()
        }
        .into_filter()
        .unwrap_err();
        assert_eq!(err.message(), "minPrice must be a number");
    }

    #[tokio::test]
    async fn test_track_order_needs_id_or_phone() {
        let response = send(post_json("/api/buyer/track-order", &json!({}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["message"],
            "Phone number or order ID required"
        );
    }

    #[tokio::test]
    async fn test_interactions_are_buyer_only() {
        let response = send(
            Request::post("/api/buyer/interactions")
                .header(header::AUTHORIZATION, bearer(Role::Vendor))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "vendorId": 1, "action": "MessageVendor" }).to_string(),
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["message"], "Buyer access required");
    }

    #[tokio::test]
    async fn test_non_numeric_product_id_is_400() {
        let response = send(
            Request::get("/api/buyer/products/not-an-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
