//! Order route handlers.
//!
//! Vendors list and manage their own orders; anyone can place one. Order
//! placement is shared with `/api/buyer/orders`.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use marketstall_core::{Email, OrderId, OrderStatus, ProductId, UserId};

use super::{ApiJson, ApiPath};
use crate::db::OrderRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{OptionalBuyer, RequireVendor};
use crate::models::{NewOrder, NewOrderLine, Order, User};
use crate::services::validation::{ValidationErrors, Validator};
use crate::state::AppState;

const RECENT_ORDERS: i64 = 10;
const MAX_LINES: usize = 50;
const MAX_QUANTITY: i64 = 1000;

/// Create the `/api/orders` router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/recent", get(recent))
        .route("/{id}", get(show))
        .route("/{id}/status", put(update_status))
}

/// Order placement body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderRequest {
    vendor_id: Option<Value>,
    buyer_name: Option<String>,
    buyer_phone: Option<String>,
    buyer_email: Option<String>,
    #[serde(default)]
    items: Vec<OrderLineRequest>,
    delivery_address: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderLineRequest {
    product_id: Option<Value>,
    quantity: Option<Value>,
}

#[derive(Deserialize)]
struct StatusRequest {
    status: Option<String>,
}

/// A positive id given as a JSON number or numeric string.
pub(crate) fn id_value(value: &Value) -> Option<i32> {
    let id = match value {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.filter(|id| *id > 0)
}

/// Validate an order body. Contact details left out fall back to the
/// signed-in buyer's account.
fn validate(body: &OrderRequest, buyer: Option<&User>) -> std::result::Result<NewOrder, ValidationErrors> {
    let mut v = Validator::new();

    let vendor_id = body.vendor_id.as_ref().and_then(id_value);
    v.check(vendor_id.is_some(), "vendorId", "Vendor is required");

    let name = body
        .buyer_name
        .as_deref()
        .or_else(|| buyer.map(|b| b.name.as_str()));
    let buyer_name = v.text("buyerName", name, 2, 100, "Buyer name is required");

    let phone = body
        .buyer_phone
        .as_deref()
        .or_else(|| buyer.and_then(|b| b.phone.as_deref()));
    let buyer_phone = v.phone("buyerPhone", phone);

    let buyer_email = match body.buyer_email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(raw) => {
            let parsed = Email::parse(raw).ok();
            v.check(parsed.is_some(), "buyerEmail", "Valid email required");
            parsed.map(Email::into_inner)
        }
        None => buyer.map(|b| b.email.as_str().to_string()),
    };

    v.check(
        !body.items.is_empty() && body.items.len() <= MAX_LINES,
        "items",
        "Order must contain between 1 and 50 items",
    );
    let mut lines = Vec::with_capacity(body.items.len());
    for item in &body.items {
        let product_id = item.product_id.as_ref().and_then(id_value);
        let quantity = item
            .quantity
            .as_ref()
            .and_then(|q| match q {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .filter(|q| (1..=MAX_QUANTITY).contains(q))
            .and_then(|q| i32::try_from(q).ok());

        v.check(product_id.is_some(), "items", "Each item needs a valid productId");
        v.check(quantity.is_some(), "items", "Each item quantity must be between 1 and 1000");
        if let (Some(product_id), Some(quantity)) = (product_id, quantity) {
            lines.push(NewOrderLine {
                product_id: ProductId::new(product_id),
                quantity,
            });
        }
    }

    let delivery_address = v.text(
        "deliveryAddress",
        body.delivery_address
            .as_deref()
            .or_else(|| buyer.and_then(|b| b.address.as_deref())),
        5,
        500,
        "Delivery address is required",
    );
    let notes = v.optional_text("notes", body.notes.as_deref(), 500, "Notes must be at most 500 characters");

    v.finish()?;

    Ok(NewOrder {
        vendor_id: UserId::new(vendor_id.unwrap_or_default()),
        buyer_id: buyer.map(|b| b.id),
        buyer_name,
        buyer_phone,
        buyer_email,
        delivery_address,
        notes,
        lines,
    })
}

/// Validate and place an order; 201 with the stored order.
pub(crate) async fn place_order(
    state: &AppState,
    buyer: Option<&User>,
    body: &OrderRequest,
) -> Result<(StatusCode, Json<Value>)> {
    let new = validate(body, buyer)?;
    let order = OrderRepository::new(state.pool()).place(&new).await?;

    let order_id = order.id.to_string();
    add_breadcrumb("orders", "Order placed", Some(&[("order_id", order_id.as_str())][..]));
    tracing::info!(order_id = %order.id, vendor_id = %order.vendor_id, "Order placed");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Order created successfully",
            "orderId": order.id,
            "order": order,
        })),
    ))
}

fn not_found() -> AppError {
    AppError::NotFound("Order not found".to_string())
}

#[instrument(skip_all, fields(vendor_id = %vendor.id))]
async fn list(
    State(state): State<AppState>,
    RequireVendor(vendor): RequireVendor,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_vendor(vendor.id, None)
        .await?;
    Ok(Json(orders))
}

#[instrument(skip_all, fields(vendor_id = %vendor.id))]
async fn recent(
    State(state): State<AppState>,
    RequireVendor(vendor): RequireVendor,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_vendor(vendor.id, Some(RECENT_ORDERS))
        .await?;
    Ok(Json(orders))
}

#[instrument(skip_all)]
async fn create(
    State(state): State<AppState>,
    OptionalBuyer(buyer): OptionalBuyer,
    ApiJson(body): ApiJson<OrderRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    place_order(&state, buyer.as_ref(), &body).await
}

#[instrument(skip_all, fields(vendor_id = %vendor.id, order_id = %id))]
async fn show(
    State(state): State<AppState>,
    RequireVendor(vendor): RequireVendor,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool())
        .get_owned(id, vendor.id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(order))
}

#[instrument(skip_all, fields(vendor_id = %vendor.id, order_id = %id))]
async fn update_status(
    State(state): State<AppState>,
    RequireVendor(vendor): RequireVendor,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<Order>> {
    let status: OrderStatus = body
        .status
        .as_deref()
        .map(str::trim)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            ValidationErrors::single(
                "status",
                "Status must be one of pending, processing, shipped, delivered, cancelled",
            )
        })?;

    let order = OrderRepository::new(state.pool())
        .update_status_owned(id, vendor.id, status)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(%status, "Order status updated");
    Ok(Json(order))
}
