//! PostgreSQL connector and store helpers shared by the repositories.

mod config;
mod connector;
mod health;
mod store;

pub use config::PostgresConfig;
pub use connector::{connect, connect_with_retry, run_migrations};
pub use health::check_health;
pub use store::{
    DEFAULT_QUERY_TIMEOUT, bounded, is_check_violation, is_unique_violation, sqlstate, statement,
    violated_constraint,
};

// Re-export SeaORM types for convenience
pub use sea_orm::{ConnectOptions, DatabaseConnection, DbErr};
pub use sea_orm_migration::MigratorTrait;
