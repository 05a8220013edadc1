//! Authentication service.
//!
//! Registration, email verification, login, and password reset for both
//! roles. Passwords are hashed with Argon2id; bcrypt hashes from the legacy
//! import are accepted and rehashed at login. Sessions are stateless bearer
//! tokens (see [`token`]).

mod error;
pub mod otp;
pub mod token;

pub use error::AuthError;
pub use token::{Claims, TokenService, TokenSubject};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use rand::seq::IndexedRandom;
use sqlx::PgPool;

use marketstall_core::{Email, Role, UserId};

use self::otp::{OtpChallenge, OtpRejection, RESET_OTP_TTL, VERIFICATION_OTP_TTL, check_stored};
use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::{NewUser, User};
use crate::services::email::{EmailService, OtpPurpose};

/// Length of a vendor's public catalog id.
const CATALOG_ID_LENGTH: usize = 10;

const CATALOG_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Catalog id collisions tolerated before giving up.
const CATALOG_ID_ATTEMPTS: usize = 3;

/// Validated vendor registration.
#[derive(Debug, Clone)]
pub struct VendorRegistration {
    pub name: String,
    pub email: Email,
    pub phone: String,
    pub business_name: String,
    pub password: String,
}

/// Validated buyer signup.
#[derive(Debug, Clone)]
pub struct BuyerSignup {
    pub name: String,
    pub email: Email,
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A signed-in user and their bearer token.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    tokens: &'a TokenService,
    email: &'a EmailService,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, tokens: &'a TokenService, email: &'a EmailService) -> Self {
        Self {
            users: UserRepository::new(pool),
            tokens,
            email,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register an unverified vendor and email them a verification code.
    ///
    /// If the email cannot be sent the account is removed again, so a
    /// failed registration can simply be retried.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailTaken` if the email is already registered,
    /// `AuthError::Email` if the code could not be delivered.
    pub async fn register_vendor(&self, registration: VendorRegistration) -> Result<User, AuthError> {
        if self.users.email_exists(&registration.email).await? {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(&registration.password)?;
        let otp = OtpChallenge::issue(Utc::now(), VERIFICATION_OTP_TTL);

        let mut new = NewUser {
            email: registration.email,
            password_hash,
            role: Role::Vendor,
            name: registration.name,
            phone: Some(registration.phone),
            is_verified: false,
            business_name: Some(registration.business_name),
            about: String::new(),
            catalog_id: None,
            address: None,
            verification_otp: Some(otp.clone()),
        };

        let user = self.create_with_catalog_id(&mut new).await?;

        if let Err(e) = self
            .email
            .send_otp(
                user.email.as_str(),
                &user.name,
                &otp.code,
                OtpPurpose::Verification,
                VERIFICATION_OTP_TTL.num_minutes(),
            )
            .await
        {
            tracing::error!(user_id = %user.id, error = %e, "Verification email failed; rolling back registration");
            self.users.delete(user.id).await?;
            return Err(AuthError::Email(e));
        }

        tracing::info!(user_id = %user.id, "Vendor registered");
        Ok(user)
    }

    async fn create_with_catalog_id(&self, new: &mut NewUser) -> Result<User, AuthError> {
        let mut last_conflict = None;
        for _ in 0..CATALOG_ID_ATTEMPTS {
            new.catalog_id = Some(generate_catalog_id());
            match self.users.create(new).await {
                Ok(user) => return Ok(user),
                Err(RepositoryError::Conflict(msg)) => {
                    if self.users.email_exists(&new.email).await? {
                        return Err(AuthError::EmailTaken);
                    }
                    last_conflict = Some(msg);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::Repository(RepositoryError::Conflict(
            last_conflict.unwrap_or_else(|| "catalog id".to_string()),
        )))
    }

    /// Create a verified buyer and sign them in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailTaken` if the email is already registered.
    pub async fn signup_buyer(&self, signup: BuyerSignup) -> Result<Session, AuthError> {
        let password_hash = hash_password(&signup.password)?;

        let new = NewUser {
            email: signup.email,
            password_hash,
            role: Role::Buyer,
            name: signup.name,
            phone: signup.phone,
            is_verified: true,
            business_name: None,
            about: String::new(),
            catalog_id: None,
            address: signup.address,
            verification_otp: None,
        };

        let user = self.users.create(&new).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::EmailTaken,
            other => AuthError::Repository(other),
        })?;

        tracing::info!(user_id = %user.id, "Buyer signed up");
        self.session(user)
    }

    // =========================================================================
    // Email verification
    // =========================================================================

    /// Verify a vendor's email with the code they were sent.
    ///
    /// A wrong or expired code changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::VendorNotFound`, `AuthError::AlreadyVerified`,
    /// `AuthError::InvalidOtp`, or `AuthError::OtpExpired`.
    pub async fn verify_vendor(&self, email: &Email, code: &str) -> Result<Session, AuthError> {
        let vendor = self.find_vendor(email).await?;
        if vendor.is_verified {
            return Err(AuthError::AlreadyVerified);
        }

        let challenge = vendor.verification_otp.as_ref();
        check_stored(challenge, code, Utc::now()).map_err(|rejection| match rejection {
            OtpRejection::Mismatch => AuthError::InvalidOtp,
            OtpRejection::Expired => AuthError::OtpExpired,
        })?;

        let stored = challenge.map(|c| c.code.as_str()).unwrap_or_default();
        let user = self
            .users
            .mark_verified(vendor.id, stored)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::InvalidOtp,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "Vendor verified");
        self.session(user)
    }

    /// Issue and send a new verification code to an unverified vendor.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::VendorNotFound` or `AuthError::AlreadyVerified`,
    /// and `AuthError::Email` if the code could not be delivered.
    pub async fn resend_verification(&self, email: &Email) -> Result<(), AuthError> {
        let vendor = self.find_vendor(email).await?;
        if vendor.is_verified {
            return Err(AuthError::AlreadyVerified);
        }

        let otp = OtpChallenge::issue(Utc::now(), VERIFICATION_OTP_TTL);
        self.users.set_verification_otp(vendor.id, &otp).await?;
        self.email
            .send_otp(
                vendor.email.as_str(),
                &vendor.name,
                &otp.code,
                OtpPurpose::Verification,
                VERIFICATION_OTP_TTL.num_minutes(),
            )
            .await?;
        Ok(())
    }

    async fn find_vendor(&self, email: &Email) -> Result<User, AuthError> {
        self.users
            .get_by_email(email)
            .await?
            .filter(User::is_vendor)
            .ok_or(AuthError::VendorNotFound)
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong,
    /// `AuthError::NotVerified` for unverified vendors, and
    /// `AuthError::AccountDisabled` for deactivated accounts.
    pub async fn login(&self, email: &Email, password: &str) -> Result<Session, AuthError> {
        let (user, password_hash) = self
            .users
            .get_password_hash(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let matched = verify_password(password, &password_hash)?;

        if user.is_vendor() && !user.is_verified {
            return Err(AuthError::NotVerified);
        }
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        if matched == PasswordMatch::Legacy {
            self.upgrade_hash(user.id, password, &password_hash).await;
        }

        self.session(user)
    }

    /// The account a token belongs to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    pub async fn current_user(&self, id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    // =========================================================================
    // Password reset
    // =========================================================================

    /// Email a password reset code to any account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccountNotFound` for unknown emails and
    /// `AuthError::Email` if the code could not be delivered.
    pub async fn start_password_reset(&self, email: &Email) -> Result<(), AuthError> {
        let user = self
            .users
            .get_by_email(email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let otp = OtpChallenge::issue(Utc::now(), RESET_OTP_TTL);
        self.users.set_reset_otp(user.id, &otp).await?;
        self.email
            .send_otp(
                user.email.as_str(),
                &user.name,
                &otp.code,
                OtpPurpose::PasswordReset,
                RESET_OTP_TTL.num_minutes(),
            )
            .await?;

        tracing::info!(user_id = %user.id, "Password reset code sent");
        Ok(())
    }

    /// Check a reset code without consuming it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetOtp` if the account is unknown or the
    /// code is wrong or expired.
    pub async fn check_reset_code(&self, email: &Email, code: &str) -> Result<User, AuthError> {
        let user = self
            .users
            .get_by_email(email)
            .await?
            .ok_or(AuthError::InvalidResetOtp)?;

        check_stored(user.reset_otp.as_ref(), code, Utc::now())
            .map_err(|_| AuthError::InvalidResetOtp)?;

        Ok(user)
    }

    /// Set a new password using a valid reset code, consuming the code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetOtp` if the code is not accepted.
    pub async fn reset_password(
        &self,
        email: &Email,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self.check_reset_code(email, code).await?;
        let stored = user
            .reset_otp
            .as_ref()
            .map(|c| c.code.as_str())
            .unwrap_or_default();

        let password_hash = hash_password(new_password)?;
        self.users
            .reset_password(user.id, stored, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::InvalidResetOtp,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    /// Replace an imported bcrypt hash with Argon2id. Errors are logged and
    /// the upgrade is retried at the next login.
    async fn upgrade_hash(&self, id: UserId, password: &str, legacy_hash: &str) {
        let upgraded = match hash_password(password) {
            Ok(hash) => self.users.replace_password_hash(id, legacy_hash, &hash).await,
            Err(_) => {
                tracing::warn!(user_id = %id, "Could not rehash legacy password");
                return;
            }
        };
        match upgraded {
            Ok(true) => tracing::info!(user_id = %id, "Legacy password hash upgraded"),
            Ok(false) => {}
            Err(e) => tracing::warn!(user_id = %id, error = %e, "Could not store upgraded password hash"),
        }
    }

    fn session(&self, user: User) -> Result<Session, AuthError> {
        let token = self.tokens.issue(&user)?;
        Ok(Session { token, user })
    }
}

/// Generate a public catalog id: lowercase letters and digits.
#[must_use]
pub fn generate_catalog_id() -> String {
    let mut rng = rand::rng();
    (0..CATALOG_ID_LENGTH)
        .filter_map(|_| CATALOG_ID_ALPHABET.choose(&mut rng).copied().map(char::from))
        .collect()
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Which kind of stored hash a password matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PasswordMatch {
    /// Argon2 PHC string.
    Current,
    /// bcrypt hash carried over by the legacy import.
    Legacy,
}

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// Verify a password against an Argon2 or bcrypt hash.
fn verify_password(password: &str, hash: &str) -> Result<PasswordMatch, AuthError> {
    if BCRYPT_PREFIXES.iter().any(|prefix| hash.starts_with(prefix)) {
        return match bcrypt::verify(password, hash) {
            Ok(true) => Ok(PasswordMatch::Legacy),
            Ok(false) | Err(_) => Err(AuthError::InvalidCredentials),
        };
    }

    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map(|()| PasswordMatch::Current)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("password123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert_eq!(verify_password("password123", &hash).unwrap(), PasswordMatch::Current);
        assert!(matches!(
            verify_password("password124", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(
            hash_password("password123").unwrap(),
            hash_password("password123").unwrap()
        );
    }

    #[test]
    fn test_legacy_bcrypt_hashes_verify() {
        let hash = bcrypt::hash("password123", 4).unwrap();
        let tail = hash.get(4..).unwrap();

        for prefix in BCRYPT_PREFIXES {
            let legacy = format!("{prefix}{tail}");
            assert_eq!(verify_password("password123", &legacy).unwrap(), PasswordMatch::Legacy);
            assert!(matches!(
                verify_password("password124", &legacy),
                Err(AuthError::InvalidCredentials)
            ));
        }
    }

    #[test]
    fn test_unknown_hash_format_never_verifies() {
        for hash in ["", "plaintext", "$1$abc$def", "$2a$10$short"] {
            assert!(matches!(
                verify_password("plaintext", hash),
                Err(AuthError::InvalidCredentials)
            ));
        }
    }

    #[test]
    fn test_catalog_id_shape() {
        for _ in 0..50 {
            let id = generate_catalog_id();
            assert_eq!(id.len(), CATALOG_ID_LENGTH);
            assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
        assert_ne!(generate_catalog_id(), generate_catalog_id());
    }
}
