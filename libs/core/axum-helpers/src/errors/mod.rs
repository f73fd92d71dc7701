pub mod codes;
pub mod handlers;
pub mod responses;

pub use codes::ErrorCode;

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::validation::field_messages;

/// Standard error response body.
///
/// ```json
/// {
///   "code": 1007,
///   "error": "EDIT_CONFLICT",
///   "message": "Unable to update the record due to an edit conflict, please try again",
///   "details": null
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Integer error code for logging and monitoring
    pub code: i32,
    /// Machine-readable error identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Field → message map for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            error: code.as_str().to_string(),
            message: message.into(),
            details: None,
        }
    }
}

/// Application error type that can be converted to HTTP responses.
///
/// Domain crates convert their own error enums into this type; internal
/// details are logged here and never sent to the client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("JSON extraction error: {0}")]
    JsonExtractorRejection(#[from] JsonRejection),

    #[error("Query extraction error: {0}")]
    QueryRejection(#[from] QueryRejection),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationErrors),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Edit conflict: {0}")]
    EditConflict(String),

    #[error("Out of stock: {0}")]
    OutOfStock(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not permitted: {0}")]
    NotPermitted(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal Server Error: {0}")]
    InternalServerError(String),

    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::JsonExtractorRejection(e) => e.status(),
            AppError::QueryRejection(_)
            | AppError::ValidationError(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::EditConflict(_) | AppError::OutOfStock(_) | AppError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            AppError::NotPermitted(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::JsonExtractorRejection(_) => ErrorCode::JsonExtraction,
            AppError::QueryRejection(_) => ErrorCode::InvalidQuery,
            AppError::ValidationError(_) => ErrorCode::ValidationError,
            AppError::BadRequest(_) => ErrorCode::BadRequest,
            AppError::Unauthorized(_) => ErrorCode::Unauthorized,
            AppError::Forbidden(_) => ErrorCode::Forbidden,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::EditConflict(_) => ErrorCode::EditConflict,
            AppError::OutOfStock(_) => ErrorCode::OutOfStock,
            AppError::Conflict(_) => ErrorCode::Conflict,
            AppError::NotPermitted(_) => ErrorCode::NotPermitted,
            AppError::TooManyRequests => ErrorCode::RateLimited,
            AppError::InternalServerError(_) => ErrorCode::InternalError,
            AppError::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.error_code();

        let (message, details) = match self {
            AppError::Database(e) => {
                tracing::error!(error_code = code.code(), error = ?e, "database error");
                (code.default_message().to_string(), None)
            }
            AppError::InternalServerError(detail) => {
                tracing::error!(error_code = code.code(), error = %detail, "internal server error");
                (code.default_message().to_string(), None)
            }
            AppError::JsonExtractorRejection(e) => {
                tracing::debug!(error_code = code.code(), error = %e, "rejected request body");
                (e.body_text(), None)
            }
            AppError::QueryRejection(e) => {
                tracing::debug!(error_code = code.code(), error = %e, "rejected query string");
                (e.body_text(), None)
            }
            AppError::ValidationError(e) => {
                tracing::debug!(error_code = code.code(), errors = ?e, "validation failed");
                let details = serde_json::to_value(field_messages(&e)).ok();
                (code.default_message().to_string(), details)
            }
            AppError::TooManyRequests => (code.default_message().to_string(), None),
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!(error_code = code.code(), "service unavailable: {}", msg);
                (msg, None)
            }
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::EditConflict(msg)
            | AppError::OutOfStock(msg)
            | AppError::Conflict(msg)
            | AppError::NotPermitted(msg) => {
                tracing::info!(error_code = code.code(), "{}", msg);
                (msg, None)
            }
        };

        let body = Json(ErrorResponse {
            code: code.code(),
            error: code.as_str().to_string(),
            message,
            details,
        });

        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Validator;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_status_mapping_for_domain_kinds() {
        let cases = [
            (AppError::NotFound("product 9".into()), StatusCode::NOT_FOUND),
            (AppError::EditConflict("product 9".into()), StatusCode::CONFLICT),
            (AppError::OutOfStock("product 9".into()), StatusCode::CONFLICT),
            (AppError::NotPermitted("review".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::TooManyRequests, StatusCode::TOO_MANY_REQUESTS),
            (AppError::Forbidden("inactive".into()), StatusCode::FORBIDDEN),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_internal_errors_hide_details() {
        let response =
            AppError::InternalServerError("connection reset by peer".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "INTERNAL_ERROR");
        assert!(!body["message"].as_str().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_validation_error_lists_fields() {
        let mut v = Validator::new();
        v.check(false, "title", "must be provided");
        v.check(false, "price", "must be greater than zero");
        let response = AppError::from(v.finish().unwrap_err()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["code"], 1001);
        assert_eq!(body["details"]["title"], "must be provided");
        assert_eq!(body["details"]["price"], "must be greater than zero");
    }

    #[tokio::test]
    async fn test_unauthorized_sets_www_authenticate() {
        let response = AppError::Unauthorized("invalid or missing authentication token".into())
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
