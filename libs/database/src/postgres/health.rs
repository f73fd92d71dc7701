use std::time::Duration;

use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use tracing::debug;

use super::bounded;
use crate::common::DatabaseError;

/// Run `SELECT 1` within `deadline`. Backs the readiness check.
pub async fn check_health(db: &DatabaseConnection, deadline: Duration) -> Result<(), DatabaseError> {
    let stmt = Statement::from_string(DatabaseBackend::Postgres, "SELECT 1".to_owned());
    bounded(deadline, db.query_one_raw(stmt))
        .await
        .map_err(|e| DatabaseError::HealthCheckFailed(e.to_string()))?;

    debug!("PostgreSQL health check passed");
    Ok(())
}
