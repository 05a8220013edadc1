//! Bearer tokens (HS256 JWT).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use marketstall_core::{Role, UserId};

use super::AuthError;
use crate::models::User;

/// Token claims. `sub` is the user id as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// The identity a verified token carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: UserId,
    pub role: Role,
}

/// Issues and verifies tokens with a shared secret.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let key = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            ttl,
        }
    }

    /// Issue a token for `user` valid from `now`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if signing fails.
    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.as_str().to_owned(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AuthError::Token)
    }

    /// Issue a token for `user` valid from now.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if signing fails.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        self.issue_at(user, Utc::now())
    }

    /// Verify signature and expiry and return the subject.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for any malformed, tampered, or
    /// expired token.
    pub fn verify(&self, token: &str) -> Result<TokenSubject, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| AuthError::InvalidToken)?;

        let user_id = UserId::parse(&data.claims.sub).ok_or(AuthError::InvalidToken)?;

        Ok(TokenSubject {
            user_id,
            role: data.claims.role,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use marketstall_core::Email;

    fn service(secret: &str) -> TokenService {
        TokenService::new(&SecretString::from(secret.to_owned()), Duration::hours(168))
    }

    fn user(role: Role) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(42),
            email: Email::parse("amaka@example.com").unwrap(),
            role,
            name: "Amaka".into(),
            phone: None,
            is_active: true,
            is_verified: true,
            business_name: None,
            logo_url: None,
            about: String::new(),
            catalog_id: None,
            address: None,
            verification_otp: None,
            reset_otp: None,
            created_at: now,
            updated_at: now,
        }
    }

    const SECRET: &str = "k3J9x!pQ2mZ7vR4tW8yB1nC6hF0sD5gL";

    #[test]
    fn test_issue_and_verify() {
        let tokens = service(SECRET);
        let token = tokens.issue(&user(Role::Vendor)).unwrap();
        let subject = tokens.verify(&token).unwrap();
        assert_eq!(subject.user_id, UserId::new(42));
        assert_eq!(subject.role, Role::Vendor);
    }

    #[test]
    fn test_claims_shape() {
        let tokens = service(SECRET);
        let now = Utc::now();
        let token = tokens.issue_at(&user(Role::Buyer), now).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let data = jsonwebtoken::decode::<Claims>(
            &token,
            &DecodingKey::from_secret(SECRET.as_bytes()),
            &validation,
        )
        .unwrap();

        assert_eq!(data.claims.sub, "42");
        assert_eq!(data.claims.email, "amaka@example.com");
        assert_eq!(data.claims.role, Role::Buyer);
        assert_eq!(data.claims.exp - data.claims.iat, 168 * 3600);
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = service(SECRET);
        let issued = Utc::now() - Duration::hours(169);
        let token = tokens.issue_at(&user(Role::Buyer), issued).unwrap();
        assert!(matches!(tokens.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = service(SECRET).issue(&user(Role::Vendor)).unwrap();
        let other = service("Zq8!wE3rT6yU9iO2pA5sD7fG1hJ4kL0x");
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            service(SECRET).verify("not.a.jwt"),
            Err(AuthError::InvalidToken)
        ));
    }
}
