//! Custom extractors for Axum handlers.
//!
//! Each one rejects with [`AppError`](crate::errors::AppError) so clients see
//! the same error body regardless of which part of the request was wrong.

pub mod id_path;
pub mod query;
pub mod validated_json;

pub use id_path::IdPath;
pub use query::QueryParams;
pub use validated_json::ValidatedJson;
