//! Import of the legacy split vendor/buyer account exports.
//!
//! # Usage
//!
//! ```bash
//! ms-cli legacy import --vendors vendors.json --buyers buyers.json
//! ```
//!
//! Each file is a JSON array as written by `mongoexport --jsonArray`.
//! Timestamps may be plain RFC 3339 strings or `{"$date": ...}` objects.
//!
//! Accounts whose email already exists are skipped. Password hashes and
//! catalog ids are carried over unchanged. Imported bcrypt hashes keep
//! working and are upgraded to Argon2id on each user's first login.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use marketstall_api::services::auth::generate_catalog_id;
use marketstall_core::{Email, Role};

use super::{CliError, connect};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LegacyDate {
    Extended {
        #[serde(rename = "$date")]
        date: DateTime<Utc>,
    },
    Plain(DateTime<Utc>),
}

impl LegacyDate {
    const fn get(&self) -> DateTime<Utc> {
        match self {
            Self::Extended { date } | Self::Plain(date) => *date,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyVendor {
    pub name: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
    pub business_name: Option<String>,
    pub password: String,
    pub catalog_id: Option<String>,
    pub logo: Option<String>,
    pub about: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    pub created_at: Option<LegacyDate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyBuyer {
    pub name: Option<String>,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: Option<LegacyDate>,
}

/// A legacy record ready for the unified `users` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedUser {
    pub email: Email,
    pub password_hash: String,
    pub role: Role,
    pub name: String,
    pub phone: Option<String>,
    pub is_verified: bool,
    pub business_name: Option<String>,
    pub logo_url: Option<String>,
    pub about: String,
    pub catalog_id: Option<String>,
    pub address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Why a legacy record was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    InvalidEmail(String),
    MissingBusinessName(String),
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl LegacyVendor {
    /// Convert to a vendor account. A missing catalog id gets a fresh one.
    pub fn into_user(self) -> Result<ImportedUser, Skip> {
        let email = Email::parse(&self.email).map_err(|_| Skip::InvalidEmail(self.email.clone()))?;
        let business_name = non_empty(self.business_name.as_deref())
            .ok_or_else(|| Skip::MissingBusinessName(self.email.clone()))?;

        Ok(ImportedUser {
            name: non_empty(self.name.as_deref()).unwrap_or_else(|| business_name.clone()),
            email,
            password_hash: self.password,
            role: Role::Vendor,
            phone: non_empty(self.phone_number.as_deref()),
            is_verified: self.is_verified,
            business_name: Some(business_name),
            logo_url: non_empty(self.logo.as_deref()),
            about: self.about.unwrap_or_default(),
            catalog_id: Some(
                non_empty(self.catalog_id.as_deref()).unwrap_or_else(generate_catalog_id),
            ),
            address: None,
            created_at: self.created_at.as_ref().map(LegacyDate::get),
        })
    }
}

impl LegacyBuyer {
    /// Convert to a buyer account; buyers were never email-verified.
    pub fn into_user(self) -> Result<ImportedUser, Skip> {
        let email = Email::parse(&self.email).map_err(|_| Skip::InvalidEmail(self.email.clone()))?;

        Ok(ImportedUser {
            name: non_empty(self.name.as_deref()).unwrap_or_default(),
            email,
            password_hash: self.password,
            role: Role::Buyer,
            phone: non_empty(self.phone.as_deref()),
            is_verified: true,
            business_name: None,
            logo_url: None,
            about: String::new(),
            catalog_id: None,
            address: non_empty(self.address.as_deref()),
            created_at: self.created_at.as_ref().map(LegacyDate::get),
        })
    }
}

/// Insert unless the email (or catalog id) is taken. Returns whether a row
/// was written.
async fn insert(pool: &PgPool, user: &ImportedUser) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO users (email, password_hash, role, name, phone, is_verified, business_name, \
         logo_url, about, catalog_id, address, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, COALESCE($12, NOW())) \
         ON CONFLICT DO NOTHING",
    )
    .bind(user.email.as_str())
    .bind(&user.password_hash)
    .bind(user.role)
    .bind(&user.name)
    .bind(user.phone.as_deref())
    .bind(user.is_verified)
    .bind(user.business_name.as_deref())
    .bind(user.logo_url.as_deref())
    .bind(&user.about)
    .bind(user.catalog_id.as_deref())
    .bind(user.address.as_deref())
    .bind(user.created_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

async fn import_all(
    pool: &PgPool,
    users: impl IntoIterator<Item = Result<ImportedUser, Skip>>,
) -> Result<ImportSummary, sqlx::Error> {
    let mut summary = ImportSummary::default();
    for user in users {
        match user {
            Ok(user) => {
                if insert(pool, &user).await? {
                    tracing::info!(email = %user.email, role = %user.role, "Imported");
                    summary.imported += 1;
                } else {
                    tracing::info!(email = %user.email, "Already exists, skipping");
                    summary.skipped += 1;
                }
            }
            Err(skip) => {
                tracing::warn!(?skip, "Skipping legacy record");
                summary.skipped += 1;
            }
        }
    }
    Ok(summary)
}

fn read_export<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, CliError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CliError::Json {
        path: display,
        source,
    })
}

/// Import legacy vendors and/or buyers.
pub async fn import(vendors: Option<&Path>, buyers: Option<&Path>) -> Result<(), CliError> {
    if vendors.is_none() && buyers.is_none() {
        return Err(CliError::NothingToImport);
    }

    // Parse everything before touching the database
    let vendors: Vec<LegacyVendor> = vendors.map(read_export).transpose()?.unwrap_or_default();
    let buyers: Vec<LegacyBuyer> = buyers.map(read_export).transpose()?.unwrap_or_default();
    tracing::info!(vendors = vendors.len(), buyers = buyers.len(), "Parsed legacy exports");

    let pool = connect().await?;

    let vendor_summary = import_all(&pool, vendors.into_iter().map(LegacyVendor::into_user)).await?;
    tracing::info!(
        imported = vendor_summary.imported,
        skipped = vendor_summary.skipped,
        "Vendors done"
    );

    let buyer_summary = import_all(&pool, buyers.into_iter().map(LegacyBuyer::into_user)).await?;
    tracing::info!(
        imported = buyer_summary.imported,
        skipped = buyer_summary.skipped,
        "Buyers done"
    );

    Ok(())
}
