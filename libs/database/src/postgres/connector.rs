use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use super::PostgresConfig;
use crate::common::{DatabaseError, RetryConfig, retry_with_backoff};

/// Open a connection pool using the given settings.
pub async fn connect(config: &PostgresConfig) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(config.clone().into_connect_options()).await?;
    info!(
        max_connections = config.max_connections,
        "connected to PostgreSQL"
    );
    Ok(db)
}

/// Open a connection pool, retrying with exponential backoff.
///
/// Used at startup where the database may still be coming up.
pub async fn connect_with_retry(
    config: &PostgresConfig,
    retry: Option<RetryConfig>,
) -> Result<DatabaseConnection, DatabaseError> {
    retry_with_backoff(|| connect(config), retry.unwrap_or_default())
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))
}

/// Apply all pending migrations of `M`.
pub async fn run_migrations<M: MigratorTrait>(
    db: &DatabaseConnection,
    app_name: &str,
) -> Result<(), DatabaseError> {
    info!(app = app_name, "running database migrations");
    M::up(db, None)
        .await
        .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;
    info!(app = app_name, "migrations applied");
    Ok(())
}
