//! HTTP middleware module.
//!
//! - CORS for configured trusted origins
//! - Security headers
//! - Per-client rate limiting
//!
//! ```ignore
//! use axum_helpers::http::{create_cors_layer, security_headers};
//!
//! let app = Router::new()
//!     .layer(axum::middleware::from_fn(security_headers))
//!     .layer(create_cors_layer(&config.cors_allowed_origins)?.unwrap_or_default());
//! ```

pub mod cors;
pub mod rate_limit;
pub mod security;

pub use cors::create_cors_layer;
pub use rate_limit::{IpRateLimiter, rate_limit};
pub use security::security_headers;
