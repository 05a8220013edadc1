//! One-time codes for email verification and password reset.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Lifetime of the code sent after vendor registration.
pub const VERIFICATION_OTP_TTL: Duration = Duration::minutes(5);

/// Lifetime of a password reset code.
pub const RESET_OTP_TTL: Duration = Duration::minutes(10);

/// A six-digit code and the instant it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Why a submitted code was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpRejection {
    /// No code was issued, or the code does not match.
    Mismatch,
    /// The code matched but `now` is at or past the expiry.
    Expired,
}

impl OtpChallenge {
    /// Issue a fresh random code valid for `ttl` from `now`.
    #[must_use]
    pub fn issue(now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            code: generate_code(),
            expires_at: now + ttl,
        }
    }

    /// Rebuild a challenge from its stored columns. Both must be present.
    #[must_use]
    pub fn from_columns(code: Option<String>, expires_at: Option<DateTime<Utc>>) -> Option<Self> {
        Some(Self {
            code: code?,
            expires_at: expires_at?,
        })
    }

    /// Accept `submitted` iff it equals the code and `now < expires_at`.
    ///
    /// The code is compared first so a wrong guess never reveals whether a
    /// code is still live.
    ///
    /// # Errors
    ///
    /// Returns the reason the code was refused.
    pub fn check(&self, submitted: &str, now: DateTime<Utc>) -> Result<(), OtpRejection> {
        if !constant_time_eq(self.code.as_bytes(), submitted.trim().as_bytes()) {
            return Err(OtpRejection::Mismatch);
        }
        if now >= self.expires_at {
            return Err(OtpRejection::Expired);
        }
        Ok(())
    }
}

/// Check an optional stored challenge.
///
/// # Errors
///
/// Returns `Mismatch` when no challenge is stored.
pub fn check_stored(
    challenge: Option<&OtpChallenge>,
    submitted: &str,
    now: DateTime<Utc>,
) -> Result<(), OtpRejection> {
    challenge.map_or(Err(OtpRejection::Mismatch), |c| c.check(submitted, now))
}

/// Generate a 6-digit code.
#[must_use]
pub fn generate_code() -> String {
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn challenge(expires_at: DateTime<Utc>) -> OtpChallenge {
        OtpChallenge {
            code: "482913".to_string(),
            expires_at,
        }
    }

    #[test]
    fn test_generate_code_format() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..1_000_000).contains(&n));
        }
    }

    #[test]
    fn test_issue_sets_expiry() {
        let now = Utc::now();
        let otp = OtpChallenge::issue(now, RESET_OTP_TTL);
        assert_eq!(otp.expires_at - now, Duration::minutes(10));
    }

    #[test]
    fn test_reset_expiry_boundary() {
        let expires = Utc::now();
        let otp = challenge(expires);

        assert_eq!(otp.check("482913", expires - Duration::milliseconds(1)), Ok(()));
        assert_eq!(otp.check("482913", expires), Err(OtpRejection::Expired));
        assert_eq!(
            otp.check("482913", expires + Duration::milliseconds(1)),
            Err(OtpRejection::Expired)
        );
    }

    #[test]
    fn test_wrong_code_is_mismatch_even_when_expired() {
        let expires = Utc::now();
        let otp = challenge(expires);
        assert_eq!(
            otp.check("000000", expires - Duration::minutes(1)),
            Err(OtpRejection::Mismatch)
        );
        assert_eq!(
            otp.check("000000", expires + Duration::minutes(1)),
            Err(OtpRejection::Mismatch)
        );
    }

    #[test]
    fn test_submitted_code_is_trimmed() {
        let expires = Utc::now() + Duration::minutes(1);
        assert!(challenge(expires).check(" 482913\n", Utc::now()).is_ok());
    }

    #[test]
    fn test_check_stored_without_challenge() {
        assert_eq!(
            check_stored(None, "482913", Utc::now()),
            Err(OtpRejection::Mismatch)
        );
    }

    #[test]
    fn test_from_columns_requires_both() {
        let now = Utc::now();
        assert!(OtpChallenge::from_columns(Some("123456".into()), None).is_none());
        assert!(OtpChallenge::from_columns(None, Some(now)).is_none());
        assert_eq!(
            OtpChallenge::from_columns(Some("123456".into()), Some(now)),
            Some(OtpChallenge {
                code: "123456".into(),
                expires_at: now
            })
        );
    }
}
