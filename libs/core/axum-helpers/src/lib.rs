//! # Axum Helpers
//!
//! Shared building blocks for the HTTP services in this workspace.
//!
//! - **[`errors`]**: `AppError` and the structured error body with stable codes
//! - **[`extractors`]**: `IdPath`, `ValidatedJson`, `QueryParams`
//! - **[`validation`]**: field-level `Validator` accumulator
//! - **[`pagination`]**: `Filters` (page, size, allow-listed sort) and `Metadata`
//! - **[`auth`]**: request `Principal` and permission-gated extractors
//! - **[`http`]**: CORS, security headers, rate limiting
//! - **[`server`]**: router assembly, health checks, graceful shutdown
//! - **[`audit`]**: audit events on the `audit` tracing target

pub mod audit;
pub mod auth;
pub mod errors;
pub mod extractors;
pub mod http;
pub mod pagination;
pub mod server;
pub mod validation;

pub use audit::{AuditEvent, AuditOutcome, extract_ip_from_headers, extract_user_agent};
pub use auth::{
    ActivatedUser, Authorized, CurrentUser, Permission, Principal, ProductsOrder, ProductsRead,
    ProductsWrite,
};
pub use errors::{AppError, ErrorCode, ErrorResponse};
pub use extractors::{IdPath, QueryParams, ValidatedJson};
pub use pagination::{Filters, Metadata, PageParams, SortDirection};
pub use server::{
    HealthCheckFuture, HealthResponse, ShutdownCoordinator, create_production_app, create_router,
    health_router, run_health_checks, shutdown_signal,
};
pub use validation::Validator;
