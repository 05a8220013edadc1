//! Request field validation and sanitization.
//!
//! Handlers collect every field problem with a [`Validator`] and report
//! them together as `{"message", "errors": [{"field", "message"}]}`.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use marketstall_core::Email;

static SCRIPT_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("Invalid regex")
});

static POST_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("Invalid regex"));

/// Trim and strip `<script>` blocks.
#[must_use]
pub fn sanitize(input: &str) -> String {
    SCRIPT_BLOCK_RE.replace_all(input.trim(), "").trim().to_string()
}

/// Whether `value` is a 24-hour `HH:MM` time.
#[must_use]
pub fn is_post_time(value: &str) -> bool {
    POST_TIME_RE.is_match(value)
}

/// One invalid field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All invalid fields of a request. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.message())]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// A single-field failure.
    #[must_use]
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        Self(vec![FieldError {
            field,
            message: message.into(),
        }])
    }

    /// The first problem, used as the response `message`.
    #[must_use]
    pub fn message(&self) -> &str {
        self.0.first().map_or("Validation failed", |e| e.message.as_str())
    }

    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }
}

/// Collects field errors while reading a request.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error on `field` unless `ok`.
    pub fn check(&mut self, ok: bool, field: &'static str, message: &str) {
        if !ok {
            self.errors.push(FieldError {
                field,
                message: message.to_string(),
            });
        }
    }

    /// Required text, sanitized, with a character-count range.
    pub fn text(
        &mut self,
        field: &'static str,
        value: Option<&str>,
        min: usize,
        max: usize,
        message: &str,
    ) -> String {
        let value = value.map(sanitize).unwrap_or_default();
        let len = value.chars().count();
        self.check(len >= min && len <= max, field, message);
        value
    }

    /// Optional text, sanitized; empty becomes `None`.
    pub fn optional_text(
        &mut self,
        field: &'static str,
        value: Option<&str>,
        max: usize,
        message: &str,
    ) -> Option<String> {
        let value = value.map(sanitize).filter(|v| !v.is_empty())?;
        self.check(value.chars().count() <= max, field, message);
        Some(value)
    }

    /// Required, normalized email address.
    pub fn email(&mut self, field: &'static str, value: Option<&str>) -> Option<Email> {
        let parsed = value.and_then(|v| Email::parse(v).ok());
        self.check(parsed.is_some(), field, "Valid email required");
        parsed
    }

    /// Password: kept verbatim, only its length is checked.
    pub fn password(
        &mut self,
        field: &'static str,
        value: Option<&str>,
        min: usize,
        message: &str,
    ) -> String {
        let value = value.unwrap_or_default().to_string();
        self.check(value.chars().count() >= min, field, message);
        value
    }

    /// Phone number: at least ten characters, digits with common separators.
    pub fn phone(&mut self, field: &'static str, value: Option<&str>) -> String {
        let value = value.map(sanitize).unwrap_or_default();
        let well_formed = value.chars().count() >= 10
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
            && value.chars().filter(char::is_ascii_digit).count() >= 7;
        self.check(well_formed, field, "Valid phone number required");
        value
    }

    /// Finish, failing if anything was recorded.
    ///
    /// # Errors
    ///
    /// Returns every recorded field error.
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}
