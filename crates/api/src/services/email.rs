//! Email service for sending one-time codes.
//!
//! Uses SMTP via lettre for delivery with Askama templates. When SMTP is not
//! configured, messages are written to the log instead so local development
//! works without a mail server.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

/// HTML template for one-time code emails.
#[derive(Template)]
#[template(path = "email/otp.html")]
struct OtpEmailHtml<'a> {
    heading: &'a str,
    name: &'a str,
    intro: &'a str,
    code: &'a str,
    minutes: i64,
}

/// Plain text template for one-time code emails.
#[derive(Template)]
#[template(path = "email/otp.txt")]
struct OtpEmailText<'a> {
    name: &'a str,
    intro: &'a str,
    code: &'a str,
    minutes: i64,
}

/// Why a code is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    /// Vendor email verification after registration.
    Verification,
    /// Password reset for any account.
    PasswordReset,
}

impl OtpPurpose {
    const fn subject(self) -> &'static str {
        match self {
            Self::Verification => "Verify your Marketstall account",
            Self::PasswordReset => "Password Reset OTP - Marketstall",
        }
    }

    const fn heading(self) -> &'static str {
        match self {
            Self::Verification => "Email Verification",
            Self::PasswordReset => "Password Reset Request",
        }
    }

    const fn intro(self) -> &'static str {
        match self {
            Self::Verification => {
                "Thanks for registering your business. Use the code below to verify your email address:"
            }
            Self::PasswordReset => {
                "We received a request to reset your password. Use the code below to reset your password:"
            }
        }
    }
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    smtp: Option<SmtpMailer>,
}

#[derive(Clone)]
struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("smtp", &self.smtp.as_ref().map(|s| s.from_address.as_str()))
            .finish()
    }
}

impl EmailService {
    /// Create an email service. `None` logs messages instead of sending.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: Option<&EmailConfig>) -> Result<Self, SmtpError> {
        let Some(config) = config else {
            return Ok(Self::log_only());
        };

        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            smtp: Some(SmtpMailer {
                transport,
                from_address: config.from_address.clone(),
            }),
        })
    }

    /// A service that only logs outgoing mail.
    #[must_use]
    pub const fn log_only() -> Self {
        Self { smtp: None }
    }

    /// Send a one-time code.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_otp(
        &self,
        to: &str,
        name: &str,
        code: &str,
        purpose: OtpPurpose,
        minutes: i64,
    ) -> Result<(), EmailError> {
        let intro = purpose.intro();
        let html = OtpEmailHtml {
            heading: purpose.heading(),
            name,
            intro,
            code,
            minutes,
        }
        .render()?;
        let text = OtpEmailText {
            name,
            intro,
            code,
            minutes,
        }
        .render()?;

        self.send_multipart_email(to, purpose.subject(), &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let Some(smtp) = &self.smtp else {
            tracing::info!(to = %to, subject = %subject, body = %text_body, "SMTP not configured; email logged");
            return Ok(());
        };

        let email = Message::builder()
            .from(
                smtp.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(smtp.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        smtp.transport.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}
