//! Vendor catalog route handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use marketstall_core::ProductId;

use super::{ApiJson, ApiPath, message};
use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireVendor;
use crate::models::{AMOUNT_SCALE, MAX_AMOUNT, Product, ProductInput};
use crate::services::images::ImageKind;
use crate::services::validation::Validator;
use crate::state::AppState;

const DEFAULT_CATEGORY: &str = "general";

/// Create the `/api/products` router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", put(update).delete(remove))
}

/// Product create/update body.
///
/// Numbers are accepted as JSON numbers or numeric strings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductRequest {
    name: Option<String>,
    price: Option<Value>,
    description: Option<String>,
    image: Option<String>,
    category: Option<String>,
    stock: Option<Value>,
    featured: Option<bool>,
    payment_link: Option<String>,
}

/// A JSON number or numeric string as a decimal.
fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Validate a product body. `existing` supplies stock and featured when the
/// body leaves them out; without either, stock is untracked. The image is
/// resolved separately.
fn validate(body: &ProductRequest, existing: Option<&Product>) -> std::result::Result<ProductInput, AppError> {
    let mut v = Validator::new();

    let name = v.text("name", body.name.as_deref(), 1, 100, "Product name is required (max 100 characters)");

    let price = body
        .price
        .as_ref()
        .and_then(decimal_value)
        .map(|p| p.round_dp(AMOUNT_SCALE));
    match price {
        Some(p) if p > MAX_AMOUNT => v.check(false, "price", "Price must be at most 9,999,999,999.99"),
        Some(p) => v.check(p >= Decimal::ZERO, "price", "Price must be a positive number"),
        None => v.check(false, "price", "Price must be a positive number"),
    }

    let description = v
        .optional_text("description", body.description.as_deref(), 500, "Description must be at most 500 characters")
        .unwrap_or_default();

    let category = v
        .optional_text("category", body.category.as_deref(), 50, "Category must be at most 50 characters")
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    let stock = match body.stock.as_ref() {
        Some(raw) => {
            let parsed = integer_value(raw)
                .filter(|s| *s >= 0)
                .and_then(|s| i32::try_from(s).ok());
            v.check(parsed.is_some(), "stock", "Stock must be a non-negative integer");
            parsed
        }
        None => existing.and_then(|p| p.stock),
    };

    let payment_link = v.optional_text(
        "paymentLink",
        body.payment_link.as_deref(),
        500,
        "Payment link must be at most 500 characters",
    );

    v.finish()?;

    Ok(ProductInput {
        name,
        price: price.unwrap_or_default(),
        description,
        image_url: existing.and_then(|p| p.image_url.clone()),
        category,
        stock,
        featured: body
            .featured
            .unwrap_or_else(|| existing.is_some_and(|p| p.featured)),
        payment_link,
    })
}

/// Upload `image` unless it is empty or already the stored URL.
async fn resolve_image(
    state: &AppState,
    image: Option<&str>,
    current: Option<&str>,
) -> Result<Option<String>> {
    match image.map(str::trim).filter(|i| !i.is_empty()) {
        Some(image) if Some(image) != current => {
            Ok(Some(state.images().store(image, ImageKind::Product).await?))
        }
        _ => Ok(current.map(str::to_string)),
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Product not found".to_string())
}

#[instrument(skip_all, fields(vendor_id = %vendor.id))]
async fn list(
    State(state): State<AppState>,
    RequireVendor(vendor): RequireVendor,
) -> Result<Json<Vec<Product>>> {
    let products = ProductRepository::new(state.pool())
        .list_active_for_vendor(vendor.id)
        .await?;
    Ok(Json(products))
}

#[instrument(skip_all, fields(vendor_id = %vendor.id))]
async fn create(
    State(state): State<AppState>,
    RequireVendor(vendor): RequireVendor,
    ApiJson(body): ApiJson<ProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    let mut input = validate(&body, None)?;
    input.image_url = resolve_image(&state, body.image.as_deref(), None).await?;

    let product = ProductRepository::new(state.pool())
        .create(vendor.id, &input)
        .await?;

    tracing::info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip_all, fields(vendor_id = %vendor.id, product_id = %id))]
async fn update(
    State(state): State<AppState>,
    RequireVendor(vendor): RequireVendor,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<ProductRequest>,
) -> Result<Json<Product>> {
    let repo = ProductRepository::new(state.pool());
    let existing = repo.get_owned(id, vendor.id).await?.ok_or_else(not_found)?;

    let mut input = validate(&body, Some(&existing))?;
    input.image_url =
        resolve_image(&state, body.image.as_deref(), existing.image_url.as_deref()).await?;

    let product = repo
        .update_owned(id, vendor.id, &input)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(product))
}

#[instrument(skip_all, fields(vendor_id = %vendor.id, product_id = %id))]
async fn remove(
    State(state): State<AppState>,
    RequireVendor(vendor): RequireVendor,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Value>> {
    let deleted = ProductRepository::new(state.pool())
        .soft_delete_owned(id, vendor.id)
        .await?;
    if !deleted {
        return Err(not_found());
    }

    tracing::info!("Product deactivated");
    Ok(message("Product deleted successfully"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use marketstall_core::Role;
    use serde_json::json;

    use crate::routes::tests::{bearer, body_json, send};

    fn request(body: serde_json::Value) -> ProductRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_validate_defaults() {
        let input = validate(&request(json!({ "name": "  Ankara Fabric ", "price": "15000" })), None).unwrap();
        assert_eq!(input.name, "Ankara Fabric");
        assert_eq!(input.price, "15000".parse::<Decimal>().unwrap());
        assert_eq!(input.category, "general");
        assert_eq!(input.stock, None);
        assert!(!input.featured);
        assert_eq!(input.description, "");
    }

    #[test]
    fn test_validate_accepts_numbers() {
        let input = validate(
            &request(json!({ "name": "Honey", "price": 4500.5, "stock": 12, "featured": true })),
            None,
        )
        .unwrap();
        assert_eq!(input.price, "4500.5".parse::<Decimal>().unwrap());
        assert_eq!(input.stock, Some(12));
        assert!(input.featured);
    }

    #[test]
    fn test_validate_keeps_existing_stock() {
        let now = chrono::Utc::now();
        let product = Product {
            id: ProductId::new(1),
            vendor_id: marketstall_core::UserId::new(1),
            name: "Honey".into(),
            price: Decimal::ONE,
            currency: "NGN".into(),
            description: String::new(),
            image_url: None,
            category: DEFAULT_CATEGORY.into(),
            payment_link: None,
            is_active: true,
            featured: false,
            views: 0,
            stock: Some(3),
            created_at: now,
            updated_at: now,
        };
        let body = request(json!({ "name": "Honey", "price": 4500 }));
        assert_eq!(validate(&body, Some(&product)).unwrap().stock, Some(3));
    }

    #[test]
    fn test_validate_price_fits_column() {
        let input = validate(&request(json!({ "name": "Rug", "price": "9999999999.994" })), None).unwrap();
        assert_eq!(input.price, MAX_AMOUNT);

        let input = validate(&request(json!({ "name": "Rug", "price": 19.999 })), None).unwrap();
        assert_eq!(input.price, "20.00".parse::<Decimal>().unwrap());

        for price in [json!(100_000_000_000_u64), json!("10000000000")] {
            let err = validate(&request(json!({ "name": "Big", "price": price })), None).unwrap_err();
            let AppError::Validation(errors) = err else {
                panic!("expected validation error");
            };
            assert_eq!(errors.message(), "Price must be at most 9,999,999,999.99");
        }
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let err = validate(
            &request(json!({ "name": "", "price": -1, "stock": -3, "description": "x".repeat(501) })),
            None,
        )
        .unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        let fields: Vec<_> = errors.errors().iter().map(|e| e.field).collect();
        assert_eq!(fields, ["name", "price", "description", "stock"]);
    }

    #[test]
    fn test_validate_strips_scripts() {
        let input = validate(
            &request(json!({
                "name": "Bag<script>alert(1)</script>",
                "price": 1,
                "description": "<SCRIPT src=x></SCRIPT>Leather"
            })),
            None,
        )
        .unwrap();
        assert_eq!(input.name, "Bag");
        assert_eq!(input.description, "Leather");
    }

    #[tokio::test]
    async fn test_buyers_cannot_manage_products() {
        let response = send(
            Request::post("/api/products")
                .header(header::AUTHORIZATION, bearer(Role::Buyer))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "name": "x", "price": 1 }).to_string()))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["message"], "Vendor access required");
    }

    #[tokio::test]
    async fn test_listing_requires_token() {
        let response = send(Request::get("/api/products").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
