//! Account models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use marketstall_core::{Email, Role, UserId};

use crate::services::auth::otp::OtpChallenge;

/// A vendor or buyer account.
///
/// Vendor-only fields (`business_name`, `catalog_id`, ...) are `None` for
/// buyers and vice versa for `address`.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub role: Role,
    pub name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub business_name: Option<String>,
    pub logo_url: Option<String>,
    pub about: String,
    pub catalog_id: Option<String>,
    pub address: Option<String>,
    pub verification_otp: Option<OtpChallenge>,
    pub reset_otp: Option<OtpChallenge>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_vendor(&self) -> bool {
        self.role == Role::Vendor
    }
}

/// Fields needed to create an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub password_hash: String,
    pub role: Role,
    pub name: String,
    pub phone: Option<String>,
    pub is_verified: bool,
    pub business_name: Option<String>,
    pub about: String,
    pub catalog_id: Option<String>,
    pub address: Option<String>,
    pub verification_otp: Option<OtpChallenge>,
}

/// The account as returned to its owner.
///
/// Vendor fields are omitted for buyers and buyer fields for vendors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        let vendor = user.is_vendor();
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.as_str().to_string(),
            role: user.role,
            phone: user.phone.clone(),
            business_name: user.business_name.clone().filter(|_| vendor),
            catalog_id: user.catalog_id.clone().filter(|_| vendor),
            logo: user.logo_url.clone().filter(|_| vendor),
            about: vendor.then(|| user.about.clone()),
            address: user.address.clone().filter(|_| !vendor),
        }
    }
}

/// Public vendor profile shown on catalog pages.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VendorSummary {
    pub id: UserId,
    pub name: String,
    pub business_name: String,
    #[serde(rename = "phoneNumber")]
    pub phone: Option<String>,
    #[serde(rename = "logo")]
    pub logo_url: Option<String>,
    pub about: String,
    pub catalog_id: String,
}

impl VendorSummary {
    /// Public profile of a vendor account; `None` for buyers.
    #[must_use]
    pub fn from_vendor(user: &User) -> Option<Self> {
        if !user.is_vendor() {
            return None;
        }
        Some(Self {
            id: user.id,
            name: user.name.clone(),
            business_name: user.business_name.clone()?,
            phone: user.phone.clone(),
            logo_url: user.logo_url.clone(),
            about: user.about.clone(),
            catalog_id: user.catalog_id.clone()?,
        })
    }
}
