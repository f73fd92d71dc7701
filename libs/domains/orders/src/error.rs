use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use domain_products::ProductError;
use sea_orm::DbErr;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(i64),

    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    #[error("Record {0} was modified concurrently")]
    EditConflict(i64),

    #[error("Product {0} does not have enough stock")]
    OutOfStock(i64),

    #[error("User {user_id} does not own order {order_id}")]
    NotOwner { user_id: i64, order_id: i64 },

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type OrderResult<T> = Result<T, OrderError>;

impl From<DbErr> for OrderError {
    fn from(err: DbErr) -> Self {
        OrderError::Internal(format!("Database error: {}", err))
    }
}

/// Stock reservation failures surface unchanged in kind.
impl From<ProductError> for OrderError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::NotFound(id) => OrderError::ProductNotFound(id),
            ProductError::EditConflict(id) => OrderError::EditConflict(id),
            ProductError::OutOfStock(id) => OrderError::OutOfStock(id),
            ProductError::Validation(errors) => OrderError::Validation(errors),
            ProductError::Internal(msg) => OrderError::Internal(msg),
            other => OrderError::Internal(other.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(id) => AppError::NotFound(format!("Order {} not found", id)),
            OrderError::ProductNotFound(id) => {
                AppError::NotFound(format!("Product {} not found", id))
            }
            OrderError::EditConflict(_) => AppError::EditConflict(
                "unable to update the record due to an edit conflict, please try again".to_string(),
            ),
            OrderError::OutOfStock(id) => {
                AppError::OutOfStock(format!("Product {} does not have enough stock", id))
            }
            OrderError::NotOwner { .. } => {
                AppError::Forbidden("you can only change your own orders".to_string())
            }
            OrderError::Validation(errors) => AppError::ValidationError(errors),
            OrderError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for OrderError {
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
    fn test_reservation_failures_keep_their_kind() {
        assert!(matches!(
            OrderError::from(ProductError::OutOfStock(5)),
            OrderError::OutOfStock(5)
        ));
        assert!(matches!(
            OrderError::from(ProductError::EditConflict(5)),
            OrderError::EditConflict(5)
        ));
        assert!(matches!(
            OrderError::from(ProductError::NotFound(5)),
            OrderError::ProductNotFound(5)
        ));
    }

    #[test]
    fn test_statuses() {
        let cases = [
            (OrderError::NotFound(1), StatusCode::NOT_FOUND),
            (OrderError::ProductNotFound(1), StatusCode::NOT_FOUND),
            (OrderError::EditConflict(1), StatusCode::CONFLICT),
            (OrderError::OutOfStock(1), StatusCode::CONFLICT),
            (
                OrderError::NotOwner {
                    user_id: 1,
                    order_id: 2,
                },
                StatusCode::FORBIDDEN,
            ),
            (
                OrderError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
