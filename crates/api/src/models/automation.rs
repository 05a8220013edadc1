//! Customer tracking, buyer interactions and auto-post settings.

use chrono::{DateTime, Utc};
use serde::Serialize;

use marketstall_core::{
    AutoPostId, CustomerId, InteractionAction, InteractionId, InterestStatus, PostFrequency,
    ProductId, UserId,
};

/// Someone who asked a vendor about products, keyed by phone number.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub vendor_id: UserId,
    pub phone: String,
    pub name: String,
    pub last_interaction: DateTime<Utc>,
    pub total_purchases: i32,
    pub is_active: bool,
    pub interests: Vec<CustomerInterest>,
}

/// A product a customer showed interest in.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInterest {
    #[serde(skip)]
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub product_name: String,
    pub status: InterestStatus,
    pub updated_at: DateTime<Utc>,
}

/// A logged buyer action.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BuyerInteraction {
    pub id: InteractionId,
    pub buyer_id: UserId,
    pub vendor_id: UserId,
    pub product_id: Option<ProductId>,
    pub action: InteractionAction,
    pub created_at: DateTime<Utc>,
}

/// Auto-post settings. Persisted only; nothing publishes on schedule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoPost {
    pub id: AutoPostId,
    pub vendor_id: UserId,
    pub is_enabled: bool,
    pub post_time: String,
    pub post_frequency: PostFrequency,
    pub selected_products: Vec<ProductId>,
    pub last_posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated auto-post settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoPostInput {
    pub is_enabled: bool,
    pub post_time: String,
    pub post_frequency: PostFrequency,
    pub selected_products: Vec<ProductId>,
}
