//! Vendor dashboard route handlers.

use axum::{Json, Router, extract::State, routing::get};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use super::ApiQuery;
use crate::db::{OrderRepository, ProductRepository};
use crate::error::Result;
use crate::middleware::RequireVendor;
use crate::services::dashboard::{DashboardStats, SalesSummary, SalesWindows, parse_bound};
use crate::services::validation::ValidationErrors;
use crate::state::AppState;

/// Create the `/api/dashboard` router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/sales", get(sales))
}

#[derive(Debug, Deserialize)]
struct SalesQuery {
    from: Option<String>,
    to: Option<String>,
}

fn bound(
    field: &'static str,
    raw: Option<&str>,
    default: DateTime<Utc>,
) -> std::result::Result<DateTime<Utc>, ValidationErrors> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(default),
        Some(raw) => parse_bound(raw).ok_or_else(|| {
            ValidationErrors::single(field, format!("{field} must be a date (YYYY-MM-DD) or RFC 3339 time"))
        }),
    }
}

/// Resolve the requested range; defaults to the month so far.
fn sales_range(
    query: &SalesQuery,
    now: DateTime<Utc>,
) -> std::result::Result<(DateTime<Utc>, DateTime<Utc>), ValidationErrors> {
    let from = bound("from", query.from.as_deref(), SalesWindows::containing(now).month)?;
    let to = bound("to", query.to.as_deref(), now)?;
    if from >= to {
        return Err(ValidationErrors::single("from", "from must be before to"));
    }
    Ok((from, to))
}

#[instrument(skip_all, fields(vendor_id = %vendor.id))]
async fn stats(
    State(state): State<AppState>,
    RequireVendor(vendor): RequireVendor,
) -> Result<Json<DashboardStats>> {
    let products = ProductRepository::new(state.pool());
    let orders = OrderRepository::new(state.pool());
    let windows = SalesWindows::containing(Utc::now());

    let (totals, total_products, total_views) = tokio::try_join!(
        orders.totals_for_vendor(vendor.id, windows.today, windows.week, windows.month),
        products.count_active(vendor.id),
        products.total_views(vendor.id),
    )?;

    Ok(Json(DashboardStats::new(&totals, total_products, total_views)))
}

#[instrument(skip_all, fields(vendor_id = %vendor.id))]
async fn sales(
    State(state): State<AppState>,
    RequireVendor(vendor): RequireVendor,
    ApiQuery(query): ApiQuery<SalesQuery>,
) -> Result<Json<SalesSummary>> {
    let (from, to) = sales_range(&query, Utc::now())?;
    let (total, orders) = OrderRepository::new(state.pool())
        .sales_between(vendor.id, from, to)
        .await?;
    Ok(Json(SalesSummary {
        from,
        to,
        total,
        orders,
    }))
}
