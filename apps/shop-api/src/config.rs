use core_config::{
    AppInfo, FromEnv, app_info, rate_limit::RateLimitConfig, server::ServerConfig,
};
use database::postgres::PostgresConfig;

pub use core_config::Environment;

/// Application configuration, composed from the shared config components
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub database: PostgresConfig,
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let database = PostgresConfig::from_env()?; // DATABASE_URL is required
        let server = ServerConfig::from_env()?; // HOST=0.0.0.0, PORT=4000
        let rate_limit = RateLimitConfig::from_env()?;

        Ok(Self {
            app: app_info!(),
            database,
            server,
            rate_limit,
            environment,
        })
    }
}
