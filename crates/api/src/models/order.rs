//! Order models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use marketstall_core::{OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, UserId};

/// An order placed with a single vendor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub vendor_id: UserId,
    pub buyer_id: Option<UserId>,
    pub buyer_name: String,
    pub buyer_phone: String,
    pub buyer_email: Option<String>,
    pub delivery_address: String,
    pub notes: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item captured when the order was placed.
///
/// `name` and `unit_price` are copies, so later product edits or soft
/// deletes never change historical orders.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    #[serde(skip)]
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A validated order request. Prices are never taken from the client.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub vendor_id: UserId,
    pub buyer_id: Option<UserId>,
    pub buyer_name: String,
    pub buyer_phone: String,
    pub buyer_email: Option<String>,
    pub delivery_address: String,
    pub notes: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

/// Requested product and quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Order as shown to buyers tracking it, with the vendor's contact details.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedOrder {
    #[serde(flatten)]
    pub order: Order,
    pub vendor_business_name: String,
    pub vendor_phone: Option<String>,
}
