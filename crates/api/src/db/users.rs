//! Account repository.
//!
//! Vendors and buyers share the `users` table; role-specific columns are
//! nullable and the schema enforces that vendors carry a business name and
//! catalog id.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use marketstall_core::{Email, Role, UserId};

use super::{RepositoryError, contains_pattern};
use crate::models::{NewUser, User, VendorSummary};
use crate::services::auth::otp::OtpChallenge;

macro_rules! user_columns {
    () => {
        "id, email, role, name, phone, is_active, is_verified, business_name, logo_url, \
         about, catalog_id, address, otp_code, otp_expires_at, reset_otp_code, \
         reset_otp_expires_at, created_at, updated_at"
    };
}

macro_rules! vendor_summary_columns {
    () => {
        "id, name, business_name, phone, logo_url, about, catalog_id"
    };
}

/// Internal row type for `PostgreSQL` user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    role: Role,
    name: String,
    phone: Option<String>,
    is_active: bool,
    is_verified: bool,
    business_name: Option<String>,
    logo_url: Option<String>,
    about: String,
    catalog_id: Option<String>,
    address: Option<String>,
    otp_code: Option<String>,
    otp_expires_at: Option<DateTime<Utc>>,
    reset_otp_code: Option<String>,
    reset_otp_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            role: row.role,
            name: row.name,
            phone: row.phone,
            is_active: row.is_active,
            is_verified: row.is_verified,
            business_name: row.business_name,
            logo_url: row.logo_url,
            about: row.about,
            catalog_id: row.catalog_id,
            address: row.address,
            verification_otp: OtpChallenge::from_columns(row.otp_code, row.otp_expires_at),
            reset_otp: OtpChallenge::from_columns(row.reset_otp_code, row.reset_otp_expires_at),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for account database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user and their password hash for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let user = self.get_by_email(email).await?;
        let Some(user) = user else {
            return Ok(None);
        };

        let hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
                .bind(user.id.as_i32())
                .fetch_optional(self.pool)
                .await?;

        Ok(hash.map(|h| (user, h)))
    }

    /// Whether an account with this email exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn email_exists(&self, email: &Email) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email.as_str())
            .fetch_one(self.pool)
            .await?;
        Ok(exists)
    }

    /// Create a new account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email or catalog id already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewUser) -> Result<User, RepositoryError> {
        let (otp_code, otp_expires_at) = match &new.verification_otp {
            Some(otp) => (Some(otp.code.as_str()), Some(otp.expires_at)),
            None => (None, None),
        };

        let row = sqlx::query_as::<_, UserRow>(concat!(
            "INSERT INTO users (email, password_hash, role, name, phone, is_verified, \
             business_name, about, catalog_id, address, otp_code, otp_expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING ",
            user_columns!()
        ))
        .bind(new.email.as_str())
        .bind(&new.password_hash)
        .bind(new.role)
        .bind(&new.name)
        .bind(new.phone.as_deref())
        .bind(new.is_verified)
        .bind(new.business_name.as_deref())
        .bind(&new.about)
        .bind(new.catalog_id.as_deref())
        .bind(new.address.as_deref())
        .bind(otp_code)
        .bind(otp_expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "account"))?;

        row.try_into()
    }

    /// Hard-delete an account. Only used to roll back a registration whose
    /// verification email could not be sent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the email verification code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn set_verification_otp(
        &self,
        id: UserId,
        otp: &OtpChallenge,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE users SET otp_code = $2, otp_expires_at = $3 WHERE id = $1")
                .bind(id.as_i32())
                .bind(&otp.code)
                .bind(otp.expires_at)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark a vendor verified and clear the verification code.
    ///
    /// Only succeeds while the stored code still equals `code`, so two
    /// concurrent submissions cannot both consume it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the code was already consumed.
    pub async fn mark_verified(&self, id: UserId, code: &str) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            "UPDATE users SET is_verified = TRUE, otp_code = NULL, otp_expires_at = NULL \
             WHERE id = $1 AND otp_code = $2 AND NOT is_verified \
             RETURNING ",
            user_columns!()
        ))
        .bind(id.as_i32())
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Replace the password reset code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn set_reset_otp(&self, id: UserId, otp: &OtpChallenge) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET reset_otp_code = $2, reset_otp_expires_at = $3 WHERE id = $1",
        )
        .bind(id.as_i32())
        .bind(&otp.code)
        .bind(otp.expires_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set a new password hash and consume the reset code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the code was already consumed.
    pub async fn reset_password(
        &self,
        id: UserId,
        code: &str,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $3, reset_otp_code = NULL, reset_otp_expires_at = NULL \
             WHERE id = $1 AND reset_otp_code = $2",
        )
        .bind(id.as_i32())
        .bind(code)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Swap a stored password hash, only if it is still `current`.
    ///
    /// Returns `false` when the hash changed in the meantime.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn replace_password_hash(
        &self,
        id: UserId,
        current: &str,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $3 WHERE id = $1 AND password_hash = $2",
        )
        .bind(id.as_i32())
        .bind(current)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Update a vendor's public profile. The catalog id is never touched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the vendor doesn't exist.
    pub async fn update_vendor_profile(
        &self,
        id: UserId,
        name: &str,
        business_name: &str,
        about: &str,
        logo_url: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            "UPDATE users SET name = $2, business_name = $3, about = $4, logo_url = $5 \
             WHERE id = $1 AND role = 'vendor' \
             RETURNING ",
            user_columns!()
        ))
        .bind(id.as_i32())
        .bind(name)
        .bind(business_name)
        .bind(about)
        .bind(logo_url)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Resolve a vendor by catalog id, or by numeric id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_vendor(&self, reference: &str) -> Result<Option<VendorSummary>, RepositoryError> {
        let numeric_id = UserId::parse(reference).map(|id| id.as_i32());

        let vendor = sqlx::query_as::<_, VendorSummary>(concat!(
            "SELECT ",
            vendor_summary_columns!(),
            " FROM users \
             WHERE role = 'vendor' AND (catalog_id = $1 OR id = $2) \
             ORDER BY (catalog_id = $1) DESC \
             LIMIT 1"
        ))
        .bind(reference.trim())
        .bind(numeric_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(vendor)
    }

    /// Public profile for a vendor id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn vendor_summary(&self, id: UserId) -> Result<Option<VendorSummary>, RepositoryError> {
        let vendor = sqlx::query_as::<_, VendorSummary>(concat!(
            "SELECT ",
            vendor_summary_columns!(),
            " FROM users WHERE role = 'vendor' AND id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(vendor)
    }

    /// Verified, active vendors matching `search` on business name or name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search_vendors(
        &self,
        search: Option<&str>,
        limit: i64,
    ) -> Result<Vec<VendorSummary>, RepositoryError> {
        let pattern = search.map(contains_pattern);

        let vendors = sqlx::query_as::<_, VendorSummary>(concat!(
            "SELECT ",
            vendor_summary_columns!(),
            " FROM users \
             WHERE role = 'vendor' AND is_verified AND is_active \
               AND ($1::text IS NULL OR business_name ILIKE $1 OR name ILIKE $1) \
             ORDER BY business_name ASC, id ASC \
             LIMIT $2"
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(vendors)
    }
}
