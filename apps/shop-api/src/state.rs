//! Shared state for the app-level handlers (readiness).
//!
//! Domain routers carry their own services; only the pool handle and the
//! configuration live here.

use database::postgres::DatabaseConnection;

#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    /// PostgreSQL connection pool
    pub db: DatabaseConnection,
}
