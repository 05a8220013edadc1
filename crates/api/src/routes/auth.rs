//! Identity route handlers: signup, email verification, login, password reset.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use marketstall_core::Email;

use super::{ApiJson, message};
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireToken;
use crate::models::UserProfile;
use crate::services::auth::{AuthService, BuyerSignup, Session, VendorRegistration};
use crate::services::validation::{ValidationErrors, Validator};
use crate::state::AppState;

const MIN_PASSWORD: usize = 6;
const PASSWORD_MESSAGE: &str = "Password must be at least 6 characters";

/// Create the `/api/auth` router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/vendor/register", post(register_vendor))
        .route("/vendor/verify-otp", post(verify_otp))
        .route("/vendor/resend-otp", post(resend_otp))
        .route("/buyer/signup", post(buyer_signup))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/forgot-password", post(forgot_password))
        .route("/verify-reset-otp", post(verify_reset_otp))
        .route("/reset-password", post(reset_password))
        .route("/logout", post(logout))
}

fn auth_service(state: &AppState) -> AuthService<'_> {
    AuthService::new(state.pool(), state.tokens(), state.email())
}

/// `email` is only `None` when the validator already recorded an error.
fn required_email(email: Option<Email>) -> std::result::Result<Email, ValidationErrors> {
    email.ok_or_else(|| ValidationErrors::single("email", "Valid email required"))
}

fn session_body(session: &Session) -> Json<Value> {
    Json(json!({
        "token": session.token,
        "user": UserProfile::from(&session.user),
    }))
}

// =============================================================================
// Request bodies
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VendorRegisterRequest {
    name: Option<String>,
    email: Option<String>,
    phone_number: Option<String>,
    business_name: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct BuyerSignupRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    phone: Option<String>,
    address: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct EmailRequest {
    email: Option<String>,
}

#[derive(Deserialize)]
struct OtpRequest {
    email: Option<String>,
    otp: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest {
    email: Option<String>,
    otp: Option<String>,
    new_password: Option<String>,
}

fn check_otp(v: &mut Validator, otp: Option<&str>) -> String {
    let otp = otp.map(str::trim).unwrap_or_default().to_string();
    v.check(
        otp.len() == 6 && otp.bytes().all(|b| b.is_ascii_digit()),
        "otp",
        "OTP must be 6 digits",
    );
    otp
}

// =============================================================================
// Vendor signup
// =============================================================================

#[instrument(skip_all)]
async fn register_vendor(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<VendorRegisterRequest>,
) -> Result<Json<Value>> {
    let mut v = Validator::new();
    let name = v.text("name", body.name.as_deref(), 2, 100, "Name must be at least 2 characters");
    let email = v.email("email", body.email.as_deref());
    let phone = v.phone("phoneNumber", body.phone_number.as_deref());
    let business_name = v.text(
        "businessName",
        body.business_name.as_deref(),
        2,
        100,
        "Business name required",
    );
    let password = v.password("password", body.password.as_deref(), MIN_PASSWORD, PASSWORD_MESSAGE);
    v.finish()?;

    let user = auth_service(&state)
        .register_vendor(VendorRegistration {
            name,
            email: required_email(email)?,
            phone,
            business_name,
            password,
        })
        .await?;

    add_breadcrumb("auth", "Vendor registered", None);
    Ok(Json(json!({
        "message": "Registration successful. Please check your email for verification code.",
        "email": user.email.as_str(),
    })))
}

#[instrument(skip_all)]
async fn verify_otp(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<OtpRequest>,
) -> Result<Json<Value>> {
    let mut v = Validator::new();
    let email = v.email("email", body.email.as_deref());
    let otp = check_otp(&mut v, body.otp.as_deref());
    v.finish()?;

    let session = auth_service(&state)
        .verify_vendor(&required_email(email)?, &otp)
        .await?;
    Ok(session_body(&session))
}

#[instrument(skip_all)]
async fn resend_otp(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EmailRequest>,
) -> Result<Json<Value>> {
    let mut v = Validator::new();
    let email = v.email("email", body.email.as_deref());
    v.finish()?;

    auth_service(&state)
        .resend_verification(&required_email(email)?)
        .await?;
    Ok(message("New verification code sent to your email"))
}

// =============================================================================
// Buyer signup and login
// =============================================================================

#[instrument(skip_all)]
async fn buyer_signup(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<BuyerSignupRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let mut v = Validator::new();
    let name = v.text("name", body.name.as_deref(), 2, 100, "Name must be at least 2 characters");
    let email = v.email("email", body.email.as_deref());
    let password = v.password("password", body.password.as_deref(), MIN_PASSWORD, PASSWORD_MESSAGE);
    let phone = v.optional_text("phone", body.phone.as_deref(), 20, "Phone number is too long");
    let address = v.optional_text("address", body.address.as_deref(), 500, "Address is too long");
    v.finish()?;

    let session = auth_service(&state)
        .signup_buyer(BuyerSignup {
            name,
            email: required_email(email)?,
            password,
            phone,
            address,
        })
        .await?;

    add_breadcrumb("auth", "Buyer signed up", None);
    Ok((StatusCode::CREATED, session_body(&session)))
}

#[instrument(skip_all)]
async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<Value>> {
    let mut v = Validator::new();
    let email = v.email("email", body.email.as_deref());
    let password = v.password("password", body.password.as_deref(), 1, "Password required");
    v.finish()?;

    let session = auth_service(&state)
        .login(&required_email(email)?, &password)
        .await?;

    let user_id = session.user.id.to_string();
    add_breadcrumb("auth", "Login", Some(&[("user_id", user_id.as_str())][..]));
    Ok(session_body(&session))
}

#[instrument(skip_all)]
async fn me(
    State(state): State<AppState>,
    RequireToken(subject): RequireToken,
) -> Result<Json<Value>> {
    let user = auth_service(&state).current_user(subject.user_id).await?;
    Ok(Json(json!({ "user": UserProfile::from(&user) })))
}

async fn logout() -> Json<Value> {
    message("Logged out successfully")
}

// =============================================================================
// Password reset
// =============================================================================

#[instrument(skip_all)]
async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EmailRequest>,
) -> Result<Json<Value>> {
    let mut v = Validator::new();
    let email = v.email("email", body.email.as_deref());
    v.finish()?;

    auth_service(&state)
        .start_password_reset(&required_email(email)?)
        .await?;
    Ok(message("OTP sent to your email address"))
}

#[instrument(skip_all)]
async fn verify_reset_otp(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<OtpRequest>,
) -> Result<Json<Value>> {
    let mut v = Validator::new();
    let email = v.email("email", body.email.as_deref());
    let otp = check_otp(&mut v, body.otp.as_deref());
    v.finish()?;

    auth_service(&state)
        .check_reset_code(&required_email(email)?, &otp)
        .await?;
    Ok(message("OTP verified successfully"))
}

#[instrument(skip_all)]
async fn reset_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> Result<Json<Value>> {
    let mut v = Validator::new();
    let email = v.email("email", body.email.as_deref());
    let otp = check_otp(&mut v, body.otp.as_deref());
    let new_password = v.password(
        "newPassword",
        body.new_password.as_deref(),
        MIN_PASSWORD,
        PASSWORD_MESSAGE,
    );
    v.finish()?;

    auth_service(&state)
        .reset_password(&required_email(email)?, &otp, &new_password)
        .await?;
    Ok(message("Password reset successfully"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::json;

    use crate::routes::tests::{body_json, post_json, send};

    #[tokio::test]
    async fn test_register_validation_lists_every_field() {
        let response = send(post_json(
            "/api/auth/vendor/register",
            &json!({ "name": "A", "email": "nope", "phoneNumber": "123", "password": "abc" }),
        ))
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["message"], "Name must be at least 2 characters");
        let fields: Vec<&str> = json["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, ["name", "email", "phoneNumber", "businessName", "password"]);
    }

    #[tokio::test]
    async fn test_verify_otp_requires_six_digits() {
        let response = send(post_json(
            "/api/auth/vendor/verify-otp",
            &json!({ "email": "ada@stall.ng", "otp": "12a456" }),
        ))
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "OTP must be 6 digits");
    }

    #[tokio::test]
    async fn test_reset_password_checks_length() {
        let response = send(post_json(
            "/api/auth/reset-password",
            &json!({ "email": "ada@stall.ng", "otp": "123456", "newPassword": "123" }),
        ))
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["message"],
            "Password must be at least 6 characters"
        );
    }

    #[tokio::test]
    async fn test_me_without_token() {
        let response = send(Request::get("/api/auth/me").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], "No token provided");
    }

    #[tokio::test]
    async fn test_me_with_garbage_token() {
        let response = send(
            Request::get("/api/auth/me")
                .header(header::AUTHORIZATION, "Bearer not.a.jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], "Invalid token");
    }

    #[tokio::test]
    async fn test_logout_is_stateless() {
        let response = send(
            Request::post("/api/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "Logged out successfully");
    }
}
