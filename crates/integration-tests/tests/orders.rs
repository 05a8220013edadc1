//! Order placement, stock, tracking, and dashboard figures.
//!
//! Requires a `PostgreSQL` database in `TEST_DATABASE_URL`.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, Utc};
use marketstall_api::db::orders::OrderFigures;
use marketstall_api::services::dashboard::{DashboardStats, sales_between, totals_from_orders};
use marketstall_integration_tests::{TestContext, json_body, unique_name, unique_phone};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};

fn order_body(vendor: &Value, phone: &str, lines: &[(&Value, i32)]) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(product, quantity)| json!({ "productId": product["id"], "quantity": quantity }))
        .collect();
    json!({
        "vendorId": vendor["id"],
        "buyerName": "Ngozi Eze",
        "buyerPhone": phone,
        "items": items,
        "deliveryAddress": "3 Broad Street, Lagos Island",
    })
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_order_totals_and_stock() {
    let ctx = TestContext::new().await;
    let (vendor, profile) = ctx.vendor().await;
    let shirt = ctx.product(&vendor, &unique_name("Shirt"), 5000, 3).await;
    let nuts = ctx.product(&vendor, &unique_name("Nuts"), 3000, 10).await;
    let phone = unique_phone();

    let resp = ctx
        .post(
            "/api/orders",
            None,
            &order_body(&profile, &phone, &[(&shirt, 2), (&nuts, 1)]),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let placed = json_body(resp).await;
    assert_eq!(placed["order"]["total"], 13000.0);
    assert_eq!(placed["order"]["status"], "pending");

    // Only one shirt left
    let resp = ctx
        .post("/api/orders", None, &order_body(&profile, &phone, &[(&shirt, 2)]))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(
        json_body(resp)
            .await["message"]
            .as_str()
            .unwrap()
            .starts_with("Insufficient stock")
    );

    let products = json_body(ctx.get("/api/products", Some(&vendor)).await).await;
    let stock: Vec<i64> = products
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["stock"].as_i64().unwrap())
        .collect();
    assert!(stock.contains(&1));
    assert!(stock.contains(&9));

    // Another vendor's product cannot be ordered through this vendor
    let (other, _) = ctx.vendor().await;
    let foreign = ctx.product(&other, &unique_name("Pot"), 2500, 5).await;
    let resp = ctx
        .post("/api/orders", None, &order_body(&profile, &phone, &[(&foreign, 1)]))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_status_updates_and_tracking() {
    let ctx = TestContext::new().await;
    let (vendor, profile) = ctx.vendor().await;
    let (other, _) = ctx.vendor().await;
    let lamp = ctx.product(&vendor, &unique_name("Lamp"), 8000, 5).await;
    let phone = unique_phone();

    let placed = json_body(
        ctx.post("/api/buyer/orders", None, &order_body(&profile, &phone, &[(&lamp, 1)]))
            .await,
    )
    .await;
    let status_path = format!("/api/orders/{}/status", placed["orderId"]);

    let resp = ctx.put(&status_path, &other, &json!({ "status": "shipped" })).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = ctx.put(&status_path, &vendor, &json!({ "status": "lost" })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = ctx.put(&status_path, &vendor, &json!({ "status": "shipped" })).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "shipped");

    let by_phone = json_body(
        ctx.post("/api/buyer/track-order", None, &json!({ "phone": phone }))
            .await,
    )
    .await;
    assert_eq!(by_phone.as_array().unwrap().len(), 1);
    assert_eq!(by_phone[0]["status"], "shipped");
    assert_eq!(by_phone[0]["vendorBusinessName"], "Test Stall");

    // The id wins over a phone that matches nothing
    let by_id = json_body(
        ctx.post(
            "/api/buyer/track-order",
            None,
            &json!({ "orderId": placed["orderId"], "phone": "00000000000" }),
        )
        .await,
    )
    .await;
    assert_eq!(by_id[0]["id"], placed["orderId"]);

    let recent = json_body(ctx.get("/api/orders/recent", Some(&vendor)).await).await;
    assert_eq!(recent.as_array().unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_dashboard_excludes_cancelled_orders() {
    let ctx = TestContext::new().await;
    let (vendor, profile) = ctx.vendor().await;
    let bag = ctx.product(&vendor, &unique_name("Bag"), 25000, 10).await;

    let mut ids = Vec::new();
    for phone in [unique_phone(), unique_phone(), unique_phone()] {
        let placed = json_body(
            ctx.post("/api/orders", None, &order_body(&profile, &phone, &[(&bag, 1)]))
                .await,
        )
        .await;
        ids.push(placed["orderId"].clone());
    }

    let resp = ctx
        .put(
            &format!("/api/orders/{}/status", ids.get(2).unwrap()),
            &vendor,
            &json!({ "status": "cancelled" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    ctx.get(&format!("/api/buyer/products/{}", bag["id"]), None)
        .await;

    let stats = json_body(ctx.get("/api/dashboard/stats", Some(&vendor)).await).await;
    assert_eq!(stats["todaySales"], 50000.0);
    assert_eq!(stats["monthSales"], 50000.0);
    assert_eq!(stats["totalOrders"], 3);
    assert_eq!(stats["pendingOrders"], 2);
    assert_eq!(stats["totalProducts"], 1);
    assert_eq!(stats["totalViews"], 1);
    assert_eq!(stats["totalCustomers"], 3);

    let sales = json_body(
        ctx.get("/api/dashboard/sales?from=2000-01-01", Some(&vendor))
            .await,
    )
    .await;
    assert_eq!(sales["total"], 50000.0);
    assert_eq!(sales["orders"], 2);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_products_without_stock_can_always_be_ordered() {
    let ctx = TestContext::new().await;
    let (vendor, profile) = ctx.vendor().await;

    let resp = ctx
        .post(
            "/api/products",
            Some(&vendor),
            &json!({ "name": unique_name("Ankara"), "price": 15000 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let ankara = json_body(resp).await;
    assert!(ankara["stock"].is_null());

    for quantity in [1, 40] {
        let resp = ctx
            .post(
                "/api/orders",
                None,
                &order_body(&profile, &unique_phone(), &[(&ankara, quantity)]),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let products = json_body(ctx.get("/api/products", Some(&vendor)).await).await;
    assert!(products[0]["stock"].is_null());
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_order_total_must_fit() {
    let ctx = TestContext::new().await;
    let (vendor, profile) = ctx.vendor().await;

    let resp = ctx
        .post(
            "/api/products",
            Some(&vendor),
            &json!({ "name": unique_name("Yacht"), "price": "9999999999.99" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let yacht = json_body(resp).await;

    let resp = ctx
        .post("/api/orders", None, &order_body(&profile, &unique_phone(), &[(&yacht, 2)]))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(resp).await["message"],
        "Order total is too large; split it into smaller orders"
    );

    let orders = json_body(ctx.get("/api/orders", Some(&vendor)).await).await;
    assert!(orders.as_array().unwrap().is_empty());

    let resp = ctx
        .post("/api/orders", None, &order_body(&profile, &unique_phone(), &[(&yacht, 1)]))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_dashboard_matches_in_memory_figures() {
    let ctx = TestContext::new().await;
    let (vendor, profile) = ctx.vendor().await;
    let rug = ctx.product(&vendor, &unique_name("Rug"), 12500, 100).await;
    let vendor_id = i32::try_from(profile["id"].as_i64().unwrap()).unwrap();

    let repeat = unique_phone();
    for (phone, quantity) in [
        (repeat.clone(), 1),
        (repeat, 2),
        (unique_phone(), 3),
        (unique_phone(), 1),
    ] {
        let resp = ctx
            .post("/api/orders", None, &order_body(&profile, &phone, &[(&rug, quantity)]))
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    // Spread the orders over recent days and cancel the first
    sqlx::query(
        "UPDATE orders SET created_at = created_at - (id % 4) * INTERVAL '3 days' WHERE vendor_id = $1",
    )
    .bind(vendor_id)
    .execute(&ctx.pool)
    .await
    .unwrap();
    sqlx::query(
        "UPDATE orders SET status = 'cancelled' \
         WHERE id = (SELECT MIN(id) FROM orders WHERE vendor_id = $1)",
    )
    .bind(vendor_id)
    .execute(&ctx.pool)
    .await
    .unwrap();

    let rows = sqlx::query_as::<_, OrderFigures>(
        "SELECT created_at, total, status, buyer_phone FROM orders WHERE vendor_id = $1",
    )
    .bind(vendor_id)
    .fetch_all(&ctx.pool)
    .await
    .unwrap();

    let stats = json_body(ctx.get("/api/dashboard/stats", Some(&vendor)).await).await;
    let expected = DashboardStats::new(&totals_from_orders(Utc::now(), &rows), 1, 0);
    assert_eq!(stats, serde_json::to_value(&expected).unwrap());
    assert_eq!(stats["totalCustomers"], 3);

    let sales = json_body(
        ctx.get("/api/dashboard/sales?from=2000-01-01", Some(&vendor))
            .await,
    )
    .await;
    let from = "2000-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
    let to = sales["to"].as_str().unwrap().parse::<DateTime<Utc>>().unwrap();
    let expected = sales_between(&rows, from, to);
    assert_eq!(sales, serde_json::to_value(&expected).unwrap());
    assert_eq!(expected.orders, 3);
    assert_eq!(expected.total, Decimal::from(12500 * 6));
}
