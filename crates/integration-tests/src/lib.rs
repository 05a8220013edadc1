//! Integration tests for Marketstall.
//!
//! Each test starts the API in-process on a random port, backed by a real
//! `PostgreSQL` database, and talks to it over HTTP.
//!
//! # Running Tests
//!
//! ```bash
//! export TEST_DATABASE_URL=postgres://localhost/marketstall_test
//! cargo test -p marketstall-integration-tests -- --ignored
//! ```
//!
//! Tests never truncate tables; every account they create has a unique
//! email, so they can run in parallel against a shared database.
//!
//! # Test Categories
//!
//! - `identity` - Registration, verification, login, password reset, legacy hashes
//! - `catalog` - Product ownership and soft deletes
//! - `orders` - Placement, stock, tracking, dashboard figures
//! - `automation` - Interest tracking, auto-post settings, share cards

use std::net::{Ipv4Addr, SocketAddr};

use reqwest::{Client, Response, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use marketstall_api::config::{ApiConfig, AuthConfig};
use marketstall_api::routes;
use marketstall_api::state::AppState;

/// Password used for every test account.
pub const PASSWORD: &str = "s3cure-pass";

/// A running API instance and a direct database handle.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
    pub pool: PgPool,
}

fn test_config(database_url: &str) -> ApiConfig {
    ApiConfig {
        database_url: SecretString::from(database_url.to_string()),
        host: Ipv4Addr::LOCALHOST.into(),
        port: 0,
        public_base_url: "http://stall.test".to_string(),
        auth: AuthConfig {
            jwt_secret: SecretString::from(format!("k{}", Uuid::new_v4().simple())),
            token_ttl_hours: 1,
        },
        email: None,
        images: None,
        cors_allowed_origins: Vec::new(),
        rate_limit_enabled: false,
        log_json: false,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

impl TestContext {
    /// Migrate the database in `TEST_DATABASE_URL` and serve the API.
    ///
    /// # Panics
    ///
    /// Panics if the variable is unset or the database is unreachable.
    pub async fn new() -> Self {
        let database_url =
            std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("../api/migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let state = AppState::new(test_config(&database_url), pool.clone())
            .expect("Failed to build state");
        let app = routes::app(state);

        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("No local address");

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Server error");
        });

        Self {
            client: Client::new(),
            base_url: format!("http://{addr}"),
            pool,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// POST a JSON body, optionally with a bearer token.
    pub async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> Response {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Request failed")
    }

    /// PUT a JSON body with a bearer token.
    pub async fn put(&self, path: &str, token: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    /// GET, optionally with a bearer token.
    pub async fn get(&self, path: &str, token: Option<&str>) -> Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Request failed")
    }

    /// DELETE with a bearer token.
    pub async fn delete(&self, path: &str, token: &str) -> Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Request failed")
    }

    /// The pending verification code for `email`, read from the database.
    pub async fn verification_code(&self, email: &str) -> String {
        sqlx::query_scalar("SELECT otp_code FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .expect("No such user")
    }

    /// The pending reset code for `email`, read from the database.
    pub async fn reset_code(&self, email: &str) -> String {
        sqlx::query_scalar("SELECT reset_otp_code FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .expect("No such user")
    }

    /// Move the pending verification code's expiry into the past.
    pub async fn expire_verification_code(&self, email: &str) {
        sqlx::query("UPDATE users SET otp_expires_at = NOW() - INTERVAL '1 second' WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await
            .expect("Failed to expire code");
    }

    /// Move the pending reset code's expiry into the past.
    pub async fn expire_reset_code(&self, email: &str) {
        sqlx::query(
            "UPDATE users SET reset_otp_expires_at = NOW() - INTERVAL '1 second' WHERE email = $1",
        )
        .bind(email)
        .execute(&self.pool)
        .await
        .expect("Failed to expire code");
    }

    /// The stored password hash for `email`.
    pub async fn password_hash(&self, email: &str) -> String {
        sqlx::query_scalar("SELECT password_hash FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .expect("No such user")
    }

    /// Overwrite the stored password hash for `email`.
    pub async fn set_password_hash(&self, email: &str, hash: &str) {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE email = $1")
            .bind(email)
            .bind(hash)
            .execute(&self.pool)
            .await
            .expect("Failed to set hash");
    }

    /// Whether the account for `email` is verified.
    pub async fn is_verified(&self, email: &str) -> bool {
        sqlx::query_scalar("SELECT is_verified FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .expect("No such user")
    }

    /// Register and verify a vendor. Returns the token and the user profile.
    pub async fn vendor(&self) -> (String, Value) {
        let email = unique_email("vendor");
        let resp = self
            .post(
                "/api/auth/vendor/register",
                None,
                &json!({
                    "name": "Test Vendor",
                    "email": email,
                    "phoneNumber": "+234 801 234 5678",
                    "businessName": "Test Stall",
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK, "vendor registration failed");

        let otp = self.verification_code(&email).await;
        let session = json_body(
            self.post(
                "/api/auth/vendor/verify-otp",
                None,
                &json!({ "email": email, "otp": otp }),
            )
            .await,
        )
        .await;
        session_parts(&session)
    }

    /// Sign up a buyer. Returns the token and the user profile.
    pub async fn buyer(&self) -> (String, Value) {
        let resp = self
            .post(
                "/api/auth/buyer/signup",
                None,
                &json!({
                    "name": "Test Buyer",
                    "email": unique_email("buyer"),
                    "password": PASSWORD,
                    "phone": unique_phone(),
                    "address": "12 Marina Road, Lagos",
                }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED, "buyer signup failed");
        session_parts(&json_body(resp).await)
    }

    /// Create a product as `token`. Returns the product body.
    pub async fn product(&self, token: &str, name: &str, price: u32, stock: i32) -> Value {
        let resp = self
            .post(
                "/api/products",
                Some(token),
                &json!({ "name": name, "price": price, "stock": stock, "featured": true }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED, "product creation failed");
        json_body(resp).await
    }
}

fn session_parts(session: &Value) -> (String, Value) {
    let token = session["token"]
        .as_str()
        .expect("session has no token")
        .to_string();
    (token, session["user"].clone())
}

/// Decode a JSON response body.
pub async fn json_body(resp: Response) -> Value {
    resp.json().await.expect("Response was not JSON")
}

/// A fresh, normalized email address.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@stall.test", Uuid::new_v4().simple())
}

/// A fresh 11-digit phone number.
#[must_use]
pub fn unique_phone() -> String {
    let n = Uuid::new_v4().as_u128() % 1_000_000_000;
    format!("08{n:09}")
}

/// A unique product name, so browse searches only see this test's rows.
#[must_use]
pub fn unique_name(prefix: &str) -> String {
    format!("{prefix} {}", Uuid::new_v4().simple())
}
