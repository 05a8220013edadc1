//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID
//! 4. CORS
//! 5. Security headers
//! 6. Rate limiting (governor), when enabled
//!
//! Authentication is not a layer: handlers take one of the extractors in
//! [`auth`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{OptionalBuyer, RequireBuyer, RequireToken, RequireVendor};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter, json_rate_limit_body};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
