//! Catalog models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use marketstall_core::{ProductId, UserId};

use super::user::VendorSummary;

/// Largest amount a `NUMERIC(12, 2)` money column holds: 9,999,999,999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Decimal places kept for money.
pub const AMOUNT_SCALE: u32 = 2;

/// A catalog entry owned by one vendor.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub vendor_id: UserId,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub currency: String,
    pub description: String,
    #[serde(rename = "image")]
    pub image_url: Option<String>,
    pub category: String,
    pub payment_link: Option<String>,
    pub is_active: bool,
    pub featured: bool,
    pub views: i32,
    /// Units left; `None` when the vendor does not track stock.
    pub stock: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated product fields for create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInput {
    pub name: String,
    pub price: Decimal,
    pub description: String,
    pub image_url: Option<String>,
    pub category: String,
    pub stock: Option<i32>,
    pub featured: bool,
    pub payment_link: Option<String>,
}

/// A product together with the vendor selling it.
#[derive(Debug, Clone, Serialize)]
pub struct ProductWithVendor {
    #[serde(flatten)]
    pub product: Product,
    pub vendor: VendorSummary,
}

/// Buyer browse ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    #[default]
    Newest,
    PriceLow,
    PriceHigh,
    Popular,
}

impl ProductSort {
    /// Parse the `sort` query value; unknown values fall back to newest.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("price-low") => Self::PriceLow,
            Some("price-high") => Self::PriceHigh,
            Some("popular") => Self::Popular,
            _ => Self::Newest,
        }
    }

    /// SQL `ORDER BY` clause. Only ever one of these fixed strings.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceLow => "p.price ASC, p.id ASC",
            Self::PriceHigh => "p.price DESC, p.id DESC",
            Self::Popular => "p.views DESC, p.id DESC",
        }
    }
}

/// Buyer browse filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
}
