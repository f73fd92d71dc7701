//! Type-safe error codes for API responses.
//!
//! Each error code carries:
//! - a string identifier for clients (e.g., "EDIT_CONFLICT")
//! - an integer code for logs and dashboards (e.g., 1007)
//! - a default human-readable message
//!
//! ```rust
//! use axum_helpers::errors::ErrorCode;
//!
//! let code = ErrorCode::EditConflict;
//! assert_eq!(code.as_str(), "EDIT_CONFLICT");
//! assert_eq!(code.code(), 1007);
//! ```

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Client errors (1000-1999)
    /// One or more input fields failed validation
    ValidationError,
    /// Request body is not the JSON the endpoint expects
    JsonExtraction,
    /// Query string could not be decoded
    InvalidQuery,
    BadRequest,
    NotFound,
    Unauthorized,
    Forbidden,
    /// The record changed since it was read
    EditConflict,
    /// Not enough stock to reserve the requested quantity
    OutOfStock,
    /// Uniqueness conflict, e.g. a registered email
    Conflict,
    /// The caller is not eligible for the action (e.g. review without purchase)
    NotPermitted,
    RateLimited,

    // Server errors (5000-5999)
    InternalError,
    DatabaseError,
    ServiceUnavailable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::JsonExtraction => "JSON_EXTRACTION",
            Self::InvalidQuery => "INVALID_QUERY",
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::EditConflict => "EDIT_CONFLICT",
            Self::OutOfStock => "OUT_OF_STOCK",
            Self::Conflict => "CONFLICT",
            Self::NotPermitted => "NOT_PERMITTED",
            Self::RateLimited => "RATE_LIMITED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    /// Integer code used in structured logs.
    ///
    /// - 1000-1999: client errors
    /// - 5000-5999: server errors
    pub fn code(&self) -> i32 {
        match self {
            Self::ValidationError => 1001,
            Self::JsonExtraction => 1002,
            Self::InvalidQuery => 1003,
            Self::NotFound => 1004,
            Self::Unauthorized => 1005,
            Self::Forbidden => 1006,
            Self::EditConflict => 1007,
            Self::OutOfStock => 1008,
            Self::Conflict => 1009,
            Self::NotPermitted => 1010,
            Self::RateLimited => 1011,
            Self::BadRequest => 1012,
            Self::InternalError => 5001,
            Self::DatabaseError => 5002,
            Self::ServiceUnavailable => 5003,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            Self::ValidationError => "Request validation failed",
            Self::JsonExtraction => "Failed to parse request body",
            Self::InvalidQuery => "Failed to parse query string",
            Self::BadRequest => "Bad request",
            Self::NotFound => "The requested resource could not be found",
            Self::Unauthorized => "You must be authenticated to access this resource",
            Self::Forbidden => "You are not allowed to access this resource",
            Self::EditConflict => {
                "Unable to update the record due to an edit conflict, please try again"
            }
            Self::OutOfStock => "Not enough stock to fulfil the request",
            Self::Conflict => "Resource already exists",
            Self::NotPermitted => "You are not permitted to perform this action",
            Self::RateLimited => "Rate limit exceeded",
            Self::InternalError => {
                "The server encountered a problem and could not process your request"
            }
            Self::DatabaseError => {
                "The server encountered a problem and could not process your request"
            }
            Self::ServiceUnavailable => "Service is temporarily unavailable",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_string_representation() {
        assert_eq!(ErrorCode::ValidationError.as_str(), "VALIDATION_ERROR");
        assert_eq!(ErrorCode::OutOfStock.to_string(), "OUT_OF_STOCK");
    }

    #[test]
    fn test_error_code_ranges() {
        assert!((1000..2000).contains(&ErrorCode::NotPermitted.code()));
        assert!((5000..6000).contains(&ErrorCode::DatabaseError.code()));
    }

    #[test]
    fn test_error_code_serde_matches_as_str() {
        let json = serde_json::to_string(&ErrorCode::EditConflict).unwrap();
        assert_eq!(json, "\"EDIT_CONFLICT\"");
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorCode::EditConflict);
    }
}
