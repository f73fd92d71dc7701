use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use sea_orm::DbErr;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Product not found: {0}")]
    NotFound(i64),

    #[error("Category not found: {0}")]
    CategoryNotFound(i64),

    #[error("Product {0} was modified concurrently")]
    EditConflict(i64),

    #[error("Product {0} does not have enough stock")]
    OutOfStock(i64),

    #[error("User {user_id} has not ordered product {product_id}")]
    NotPermitted { user_id: i64, product_id: i64 },

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ProductResult<T> = Result<T, ProductError>;

impl From<DbErr> for ProductError {
    fn from(err: DbErr) -> Self {
        ProductError::Internal(format!("Database error: {}", err))
    }
}

/// Convert ProductError to AppError for standardized error responses
impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::NotFound(id) => AppError::NotFound(format!("Product {} not found", id)),
            ProductError::CategoryNotFound(id) => {
                AppError::NotFound(format!("Category {} not found", id))
            }
            ProductError::EditConflict(_) => AppError::EditConflict(
                "unable to update the record due to an edit conflict, please try again".to_string(),
            ),
            ProductError::OutOfStock(id) => {
                AppError::OutOfStock(format!("Product {} does not have enough stock", id))
            }
            ProductError::NotPermitted { .. } => AppError::NotPermitted(
                "only customers who ordered this product can rate it".to_string(),
            ),
            ProductError::Validation(errors) => AppError::ValidationError(errors),
            ProductError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for ProductError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_error_kinds_map_to_distinct_statuses() {
        let cases = [
            (ProductError::NotFound(1), StatusCode::NOT_FOUND),
            (ProductError::CategoryNotFound(1), StatusCode::NOT_FOUND),
            (ProductError::EditConflict(1), StatusCode::CONFLICT),
            (ProductError::OutOfStock(1), StatusCode::CONFLICT),
            (
                ProductError::NotPermitted {
                    user_id: 1,
                    product_id: 1,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ProductError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }
}
