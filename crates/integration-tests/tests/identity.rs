//! Identity flows: vendor verification, buyer signup, login, password reset.
//!
//! Requires a `PostgreSQL` database in `TEST_DATABASE_URL`.

#![allow(clippy::unwrap_used)]

use marketstall_integration_tests::{PASSWORD, TestContext, json_body, unique_email};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_vendor_register_verify_login() {
    let ctx = TestContext::new().await;
    let email = unique_email("ada");

    let resp = ctx
        .post(
            "/api/auth/vendor/register",
            None,
            &json!({
                "name": "Ada Obi",
                "email": email.to_uppercase(),
                "phoneNumber": "08031234567",
                "businessName": "Ada's Fabrics",
                "password": PASSWORD,
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["email"], email.as_str());

    // Login is refused until the email is verified
    let resp = ctx
        .post("/api/auth/login", None, &json!({ "email": email, "password": PASSWORD }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["message"], "Please verify your email first");

    // A wrong code changes nothing
    let otp = ctx.verification_code(&email).await;
    let wrong = if otp == "000000" { "111111" } else { "000000" };
    let resp = ctx
        .post("/api/auth/vendor/verify-otp", None, &json!({ "email": email, "otp": wrong }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.verification_code(&email).await, otp);

    let resp = ctx
        .post("/api/auth/vendor/verify-otp", None, &json!({ "email": email, "otp": otp }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let session = json_body(resp).await;
    let token = session["token"].as_str().unwrap().to_string();
    assert_eq!(session["user"]["role"], "vendor");
    assert_eq!(session["user"]["catalogId"].as_str().unwrap().len(), 10);

    let me = json_body(ctx.get("/api/auth/me", Some(&token)).await).await;
    assert_eq!(me["user"]["email"], email.as_str());
    assert_eq!(me["user"]["businessName"], "Ada's Fabrics");

    let resp = ctx
        .post("/api/auth/login", None, &json!({ "email": email, "password": PASSWORD }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx
        .post("/api/auth/login", None, &json!({ "email": email, "password": "wrong-pass" }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["message"], "Invalid credentials");
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_duplicate_email_is_rejected() {
    let ctx = TestContext::new().await;
    let email = unique_email("dup");
    let body = json!({ "name": "Bola", "email": email, "password": PASSWORD });

    let resp = ctx.post("/api/auth/buyer/signup", None, &body).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = ctx.post("/api/auth/buyer/signup", None, &body).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["message"], "Email already registered");
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_password_reset() {
    let ctx = TestContext::new().await;
    let (_, user) = ctx.buyer().await;
    let email = user["email"].as_str().unwrap().to_string();

    let resp = ctx
        .post("/api/auth/forgot-password", None, &json!({ "email": unique_email("nobody") }))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = ctx
        .post("/api/auth/forgot-password", None, &json!({ "email": email }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let otp = ctx.reset_code(&email).await;

    // Checking the code does not consume it
    let resp = ctx
        .post("/api/auth/verify-reset-otp", None, &json!({ "email": email, "otp": otp }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx
        .post(
            "/api/auth/reset-password",
            None,
            &json!({ "email": email, "otp": otp, "newPassword": "n3w-password" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // The code is single use
    let resp = ctx
        .post(
            "/api/auth/reset-password",
            None,
            &json!({ "email": email, "otp": otp, "newPassword": "another-one" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = ctx
        .post("/api/auth/login", None, &json!({ "email": email, "password": PASSWORD }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = ctx
        .post("/api/auth/login", None, &json!({ "email": email, "password": "n3w-password" }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_expired_verification_code_changes_nothing() {
    let ctx = TestContext::new().await;
    let email = unique_email("late");

    let resp = ctx
        .post(
            "/api/auth/vendor/register",
            None,
            &json!({
                "name": "Tunde Bello",
                "email": email,
                "phoneNumber": "08039876543",
                "businessName": "Bello Crafts",
                "password": PASSWORD,
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let otp = ctx.verification_code(&email).await;
    ctx.expire_verification_code(&email).await;

    let resp = ctx
        .post("/api/auth/vendor/verify-otp", None, &json!({ "email": email, "otp": otp }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["message"], "OTP expired");

    assert!(!ctx.is_verified(&email).await);
    assert_eq!(ctx.verification_code(&email).await, otp);
    let resp = ctx
        .post("/api/auth/login", None, &json!({ "email": email, "password": PASSWORD }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["message"], "Please verify your email first");

    // A fresh code still works
    let resp = ctx
        .post("/api/auth/vendor/resend-otp", None, &json!({ "email": email }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let otp = ctx.verification_code(&email).await;
    let resp = ctx
        .post("/api/auth/vendor/verify-otp", None, &json!({ "email": email, "otp": otp }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(ctx.is_verified(&email).await);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_expired_reset_code_changes_nothing() {
    let ctx = TestContext::new().await;
    let (_, user) = ctx.buyer().await;
    let email = user["email"].as_str().unwrap().to_string();

    let resp = ctx
        .post("/api/auth/forgot-password", None, &json!({ "email": email }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let otp = ctx.reset_code(&email).await;
    let hash = ctx.password_hash(&email).await;
    ctx.expire_reset_code(&email).await;

    let resp = ctx
        .post("/api/auth/verify-reset-otp", None, &json!({ "email": email, "otp": otp }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["message"], "Invalid or expired OTP");

    let resp = ctx
        .post(
            "/api/auth/reset-password",
            None,
            &json!({ "email": email, "otp": otp, "newPassword": "n3w-password" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["message"], "Invalid or expired OTP");

    assert_eq!(ctx.password_hash(&email).await, hash);
    let resp = ctx
        .post("/api/auth/login", None, &json!({ "email": email, "password": PASSWORD }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = ctx
        .post("/api/auth/login", None, &json!({ "email": email, "password": "n3w-password" }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_imported_bcrypt_password_logs_in_and_is_upgraded() {
    let ctx = TestContext::new().await;
    let (_, user) = ctx.buyer().await;
    let email = user["email"].as_str().unwrap().to_string();

    let legacy = bcrypt::hash("legacy-pass", 4).unwrap().replacen("$2b$", "$2a$", 1);
    ctx.set_password_hash(&email, &legacy).await;

    let resp = ctx
        .post("/api/auth/login", None, &json!({ "email": email, "password": "wrong-pass" }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.password_hash(&email).await, legacy);

    let resp = ctx
        .post("/api/auth/login", None, &json!({ "email": email, "password": "legacy-pass" }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(ctx.password_hash(&email).await.starts_with("$argon2id$"));

    // The upgraded hash keeps the same password
    let resp = ctx
        .post("/api/auth/login", None, &json!({ "email": email, "password": "legacy-pass" }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}
