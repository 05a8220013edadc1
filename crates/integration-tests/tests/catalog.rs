//! Product ownership, soft deletes, and buyer discovery.
//!
//! Requires a `PostgreSQL` database in `TEST_DATABASE_URL`.

#![allow(clippy::unwrap_used)]

use marketstall_integration_tests::{TestContext, json_body, unique_name};
use reqwest::StatusCode;
use serde_json::{Value, json};

fn names(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_vendors_cannot_touch_each_others_products() {
    let ctx = TestContext::new().await;
    let (owner, _) = ctx.vendor().await;
    let (other, _) = ctx.vendor().await;

    let product = ctx.product(&owner, &unique_name("Lamp"), 8000, 5).await;
    let path = format!("/api/products/{}", product["id"]);

    let resp = ctx
        .put(&path, &other, &json!({ "name": "Stolen", "price": 1 }))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = ctx.delete(&path, &other).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Untouched, and still listed for its owner only
    let mine = json_body(ctx.get("/api/products", Some(&owner)).await).await;
    assert_eq!(names(&mine), [product["name"].as_str().unwrap()]);
    let theirs = json_body(ctx.get("/api/products", Some(&other)).await).await;
    assert!(theirs.as_array().unwrap().is_empty());

    let resp = ctx
        .put(&path, &owner, &json!({ "name": "LED Lamp", "price": "9500.50" }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated = json_body(resp).await;
    assert_eq!(updated["price"], 9500.5);
    assert_eq!(updated["stock"], 5);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_soft_deleted_products_leave_buyer_listings_but_not_orders() {
    let ctx = TestContext::new().await;
    let (vendor, profile) = ctx.vendor().await;
    let name = unique_name("Honey");
    let product = ctx.product(&vendor, &name, 4500, 10).await;

    let order = json_body(
        ctx.post(
            "/api/buyer/orders",
            None,
            &json!({
                "vendorId": profile["id"],
                "buyerName": "Chidi Okafor",
                "buyerPhone": "08031112222",
                "items": [{ "productId": product["id"], "quantity": 1 }],
                "deliveryAddress": "14 Allen Avenue, Ikeja",
            }),
        )
        .await,
    )
    .await;
    let order_id = order["orderId"].clone();

    let search = format!("/api/buyer/products?search={}", name.replace(' ', "%20"));
    let found = json_body(ctx.get(&search, None).await).await;
    assert_eq!(names(&found), [name.as_str()]);

    let resp = ctx
        .delete(&format!("/api/products/{}", product["id"]), &vendor)
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let found = json_body(ctx.get(&search, None).await).await;
    assert!(found.as_array().unwrap().is_empty());
    let featured = json_body(ctx.get("/api/buyer/products/featured", None).await).await;
    assert!(!names(&featured).contains(&name));
    let resp = ctx
        .get(&format!("/api/buyer/products/{}", product["id"]), None)
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // The order still shows the line as it was bought
    let stored = json_body(
        ctx.get(&format!("/api/orders/{order_id}"), Some(&vendor))
            .await,
    )
    .await;
    assert_eq!(stored["items"][0]["name"], name.as_str());
    assert_eq!(stored["items"][0]["unitPrice"], 4500.0);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_product_views_and_vendor_page() {
    let ctx = TestContext::new().await;
    let (vendor, profile) = ctx.vendor().await;
    let (buyer, _) = ctx.buyer().await;
    let product = ctx.product(&vendor, &unique_name("Bag"), 25000, 3).await;
    let path = format!("/api/buyer/products/{}", product["id"]);

    let first = json_body(ctx.get(&path, None).await).await;
    assert_eq!(first["views"], 1);
    assert_eq!(first["vendor"]["businessName"], "Test Stall");

    let second = json_body(ctx.get(&path, Some(&buyer)).await).await;
    assert_eq!(second["views"], 2);

    let interactions = json_body(ctx.get("/api/buyer/interactions", Some(&buyer)).await).await;
    assert_eq!(interactions[0]["action"], "ViewProduct");
    assert_eq!(interactions[0]["productId"], product["id"]);

    let page = json_body(
        ctx.get(
            &format!("/api/vendors/{}", profile["catalogId"].as_str().unwrap()),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(page["vendor"]["id"], profile["id"]);
    assert_eq!(page["products"].as_array().unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_prices_beyond_the_money_column_are_rejected() {
    let ctx = TestContext::new().await;
    let (vendor, _) = ctx.vendor().await;

    let resp = ctx
        .post(
            "/api/products",
            Some(&vendor),
            &json!({ "name": unique_name("Island"), "price": 100_000_000_000_u64, "stock": 1 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["message"], "Price must be at most 9,999,999,999.99");
    assert_eq!(body["errors"][0]["field"], "price");

    // Extra places are rounded to kobo
    let resp = ctx
        .post(
            "/api/products",
            Some(&vendor),
            &json!({ "name": unique_name("Mat"), "price": "1999.999" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(json_body(resp).await["price"], 2000.0);

    let products = json_body(ctx.get("/api/products", Some(&vendor)).await).await;
    assert_eq!(names(&products).len(), 1);
}
