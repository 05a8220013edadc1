//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::email::EmailError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Email already belongs to an account.
    #[error("Email already registered")]
    EmailTaken,

    /// Invalid credentials (wrong password or user not found).
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Vendor tried to log in before verifying their email.
    #[error("Please verify your email first")]
    NotVerified,

    /// Account has been deactivated.
    #[error("Account is disabled")]
    AccountDisabled,

    /// No vendor with that email.
    #[error("Vendor not found")]
    VendorNotFound,

    /// No account of any role with that email.
    #[error("No account found with this email address")]
    AccountNotFound,

    /// Token refers to an account that no longer exists.
    #[error("User not found")]
    UserNotFound,

    /// Vendor is already verified.
    #[error("Account already verified")]
    AlreadyVerified,

    /// Verification code does not match.
    #[error("Invalid OTP")]
    InvalidOtp,

    /// Verification code matched but has expired.
    #[error("OTP expired")]
    OtpExpired,

    /// Reset code wrong or expired.
    #[error("Invalid or expired OTP")]
    InvalidResetOtp,

    /// Missing, malformed, tampered, or expired bearer token.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Token signing failed.
    #[error("token error: {0}")]
    Token(jsonwebtoken::errors::Error),

    /// The code could not be delivered.
    #[error("email delivery failed: {0}")]
    Email(#[from] EmailError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
