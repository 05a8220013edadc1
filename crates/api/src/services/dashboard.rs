//! Vendor dashboard figures.
//!
//! The order repository aggregates in SQL. [`totals_from_orders`] and
//! [`sales_between`] compute the same figures over loaded rows, free of I/O,
//! and are the reference those queries are checked against.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use marketstall_core::OrderStatus;

use crate::db::orders::{OrderFigures, OrderTotals};

/// Start instants of the dashboard sales windows (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalesWindows {
    pub today: DateTime<Utc>,
    pub week: DateTime<Utc>,
    pub month: DateTime<Utc>,
}

impl SalesWindows {
    /// Windows containing `now`: today since midnight, the 7 days before
    /// today's midnight onward, and the calendar month so far.
    #[must_use]
    pub fn containing(now: DateTime<Utc>) -> Self {
        let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let month = now
            .date_naive()
            .with_day(1)
            .map_or(today, |first| first.and_time(NaiveTime::MIN).and_utc());

        Self {
            today,
            week: today - Duration::days(7),
            month,
        }
    }
}

/// Dashboard summary for one vendor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(with = "rust_decimal::serde::float")]
    pub today_sales: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub week_sales: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub month_sales: Decimal,
    pub pending_orders: i64,
    pub total_orders: i64,
    pub total_products: i64,
    pub total_views: i64,
    pub total_customers: i64,
    pub conversion_rate: f64,
}

impl DashboardStats {
    /// Combine order aggregates with catalog counts.
    #[must_use]
    pub fn new(totals: &OrderTotals, total_products: i64, total_views: i64) -> Self {
        Self {
            today_sales: totals.today_sales,
            week_sales: totals.week_sales,
            month_sales: totals.month_sales,
            pending_orders: totals.pending_orders,
            total_orders: totals.total_orders,
            total_products,
            total_views,
            total_customers: totals.total_customers,
            conversion_rate: conversion_rate(totals.total_orders, total_views),
        }
    }
}

/// Sales over an explicit range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub orders: i64,
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Sum of non-cancelled order totals with `from <= created_at < to`.
#[must_use]
pub fn sales_between(
    orders: &[OrderFigures],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> SalesSummary {
    let counted = orders
        .iter()
        .filter(|o| o.status.counts_as_sale() && o.created_at >= from && o.created_at < to);

    let (total, n) = counted.fold((Decimal::ZERO, 0usize), |(sum, n), o| {
        (sum + o.total, n + 1)
    });

    SalesSummary {
        from,
        to,
        total,
        orders: count(n),
    }
}

fn sales_since(orders: &[OrderFigures], since: DateTime<Utc>) -> Decimal {
    orders
        .iter()
        .filter(|o| o.status.counts_as_sale() && o.created_at >= since)
        .map(|o| o.total)
        .sum()
}

/// Order aggregates over loaded rows, for the windows containing `now`.
#[must_use]
pub fn totals_from_orders(now: DateTime<Utc>, orders: &[OrderFigures]) -> OrderTotals {
    let windows = SalesWindows::containing(now);
    let customers: HashSet<&str> = orders.iter().map(|o| o.buyer_phone.as_str()).collect();

    OrderTotals {
        today_sales: sales_since(orders, windows.today),
        week_sales: sales_since(orders, windows.week),
        month_sales: sales_since(orders, windows.month),
        pending_orders: count(
            orders
                .iter()
                .filter(|o| o.status == OrderStatus::Pending)
                .count(),
        ),
        total_orders: count(orders.len()),
        total_customers: count(customers.len()),
    }
}

/// Orders per hundred product views, to two decimals. Zero without views.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn conversion_rate(orders: i64, views: i64) -> f64 {
    if views <= 0 {
        return 0.0;
    }
    let rate = orders as f64 / views as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

/// Parse a `from`/`to` query bound: RFC 3339 or a plain `YYYY-MM-DD` date
/// (midnight UTC).
#[must_use]
pub fn parse_bound(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn order(created: &str, total: Decimal, status: OrderStatus, phone: &str) -> OrderFigures {
        OrderFigures {
            created_at: at(created),
            total,
            status,
            buyer_phone: phone.to_string(),
        }
    }

    #[test]
    fn test_windows() {
        let w = SalesWindows::containing(at("2026-03-12T15:30:00Z"));
        assert_eq!(w.today, at("2026-03-12T00:00:00Z"));
        assert_eq!(w.week, at("2026-03-05T00:00:00Z"));
        assert_eq!(w.month, at("2026-03-01T00:00:00Z"));
    }

    #[test]
    fn test_summary() {
        let now = at("2026-03-12T15:30:00Z");
        let orders = vec![
            order("2026-03-12T09:00:00Z", d("15000"), OrderStatus::Pending, "0801"),
            order("2026-03-12T10:00:00Z", d("5000"), OrderStatus::Cancelled, "0802"),
            order("2026-03-10T10:00:00Z", d("2500.50"), OrderStatus::Delivered, "0801"),
            order("2026-03-02T10:00:00Z", d("1000"), OrderStatus::Shipped, "0803"),
            order("2026-02-27T10:00:00Z", d("9999"), OrderStatus::Processing, "0804"),
        ];

        let stats = DashboardStats::new(&totals_from_orders(now, &orders), 8, 250);
        assert_eq!(stats.today_sales, d("15000"));
        assert_eq!(stats.week_sales, d("17500.50"));
        assert_eq!(stats.month_sales, d("18500.50"));
        assert_eq!(stats.pending_orders, 1);
        assert_eq!(stats.total_orders, 5);
        assert_eq!(stats.total_customers, 4);
        assert_eq!(stats.total_products, 8);
        assert!((stats.conversion_rate - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_window_sum_matches_filter_for_generated_sets() {
        let statuses = OrderStatus::ALL;
        let base = at("2026-01-01T00:00:00Z");
        let from = base + Duration::days(3);
        let to = base + Duration::days(9);

        for seed in 0u32..40 {
            let orders: Vec<OrderFigures> = (0..(seed % 13))
                .map(|i| {
                    let k = (seed * 31 + i * 17) % 97;
                    let status = statuses
                        .get((k as usize) % statuses.len())
                        .copied()
                        .unwrap();
                    OrderFigures {
                        created_at: base + Duration::hours(i64::from(k) * 3),
                        total: Decimal::from(k) * d("10.25"),
                        status,
                        buyer_phone: format!("080{}", k % 5),
                    }
                })
                .collect();

            let expected: Decimal = orders
                .iter()
                .filter(|o| o.status != OrderStatus::Cancelled)
                .filter(|o| o.created_at >= from && o.created_at < to)
                .map(|o| o.total)
                .sum();

            let summary = sales_between(&orders, from, to);
            assert_eq!(summary.total, expected, "seed {seed}");
        }
    }

    #[test]
    fn test_sales_between_is_half_open() {
        let orders = vec![
            order("2026-03-01T00:00:00Z", d("1"), OrderStatus::Pending, "a"),
            order("2026-03-02T00:00:00Z", d("2"), OrderStatus::Pending, "b"),
        ];
        let summary = sales_between(
            &orders,
            at("2026-03-01T00:00:00Z"),
            at("2026-03-02T00:00:00Z"),
        );
        assert_eq!(summary.total, d("1"));
        assert_eq!(summary.orders, 1);
    }

    #[test]
    fn test_conversion_rate_without_views() {
        assert!(conversion_rate(5, 0).abs() < f64::EPSILON);
        assert!((conversion_rate(1, 3) - 33.33).abs() < 1e-9);
    }

    #[test]
    fn test_parse_bound() {
        assert_eq!(parse_bound("2026-03-01"), Some(at("2026-03-01T00:00:00Z")));
        assert_eq!(
            parse_bound("2026-03-01T12:00:00+01:00"),
            Some(at("2026-03-01T11:00:00Z"))
        );
        assert_eq!(parse_bound("yesterday"), None);
    }
}
