//! Database library providing the PostgreSQL connector and store helpers.
//!
//! # Features
//!
//! - `postgres` (default) - PostgreSQL support with SeaORM
//! - `config` (default) - `core_config::FromEnv` support for [`postgres::PostgresConfig`]
//!
//! # Example
//!
//! ```ignore
//! use database::postgres::{self, PostgresConfig};
//! use migration::Migrator;
//!
//! let config = PostgresConfig::from_env()?;
//! let db = postgres::connect_with_retry(&config, None).await?;
//! postgres::run_migrations::<Migrator>(&db, "shop_api").await?;
//!
//! // Every repository call is bounded by the configured deadline.
//! let row = postgres::bounded(config.query_timeout(), Product::find_by_statement(stmt).one(&db)).await?;
//! ```

pub mod common;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use common::{DatabaseError, DatabaseResult};
