use std::time::Duration;

/// Errors raised while connecting to, migrating or probing the store.
///
/// Query-level failures stay as `sea_orm::DbErr` so repositories can classify
/// them (see [`crate::postgres::is_check_violation`]).
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sea_orm::DbErr),

    /// Connection failed after retries
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Store operation exceeded its {0:?} deadline")]
    Timeout(Duration),
}

/// Result type alias for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;
