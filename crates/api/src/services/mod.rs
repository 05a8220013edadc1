//! Business logic services.
//!
//! - `auth` - Registration, verification, login, password reset, tokens
//! - `cards` - WhatsApp share cards
//! - `dashboard` - Vendor sales aggregation
//! - `email` - Transactional email (OTP codes)
//! - `images` - Image hosting uploads
//! - `validation` - Request field validation and sanitization

pub mod auth;
pub mod cards;
pub mod dashboard;
pub mod email;
pub mod images;
pub mod validation;
