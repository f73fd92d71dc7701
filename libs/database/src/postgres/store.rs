use std::future::Future;
use std::time::Duration;

use sea_orm::{DbBackend, DbErr, RuntimeErr, SqlErr, Statement, Value};

/// Deadline applied to each store operation unless configured otherwise.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// SQLSTATE for `check_violation`.
const CHECK_VIOLATION: &str = "23514";

/// Await `operation`, failing with `DbErr::Custom` once `deadline` passes.
///
/// Dropping the future on timeout cancels the in-flight query and rolls back
/// an open transaction it owns. `E` lets a multi-statement block return a
/// domain error while a deadline overrun still surfaces as a store failure.
pub async fn bounded<T, E, F>(deadline: Duration, operation: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<DbErr>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result,
        Err(_) => Err(DbErr::Custom(format!("store operation exceeded {deadline:?} deadline")).into()),
    }
}

/// Build a parameterised Postgres statement.
pub fn statement<I>(sql: &str, values: I) -> Statement
where
    I: IntoIterator<Item = Value>,
{
    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}

/// SQLSTATE code reported by the server, if the error came from Postgres.
pub fn sqlstate(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned()),
        _ => None,
    }
}

/// Name of the constraint the server reported as violated.
pub fn violated_constraint(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => e
            .as_database_error()
            .and_then(|db| db.constraint())
            .map(str::to_owned),
        _ => None,
    }
}

/// True when a CHECK constraint rejected the write.
pub fn is_check_violation(err: &DbErr) -> bool {
    sqlstate(err).as_deref() == Some(CHECK_VIOLATION)
}

/// True when a UNIQUE constraint rejected the write.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_through_result() {
        let value = bounded(Duration::from_millis(50), async { Ok::<_, DbErr>(7) }).await;
        assert_eq!(value.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_bounded_times_out_as_custom_error() {
        let result = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, DbErr>(())
        })
        .await;

        match result {
            Err(DbErr::Custom(msg)) => assert!(msg.contains("deadline")),
            other => panic!("expected deadline error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_driver_errors_are_unclassified() {
        let err = DbErr::RecordNotFound("product".into());
        assert_eq!(sqlstate(&err), None);
        assert_eq!(violated_constraint(&err), None);
        assert!(!is_check_violation(&err));
        assert!(!is_unique_violation(&err));
    }
}
