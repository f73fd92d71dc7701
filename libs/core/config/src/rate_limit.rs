use crate::{env_parse, ConfigError, FromEnv};

/// Per-client token bucket settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Sustained requests per second per client IP.
    pub requests_per_second: u32,
    pub burst: u32,
    /// Key buckets on the first `X-Forwarded-For` hop. Only safe behind a
    /// proxy that overwrites the header; otherwise clients pick their own key.
    pub trust_forwarded_for: bool,
}

impl FromEnv for RateLimitConfig {
    /// - LIMITER_ENABLED: defaults to true
    /// - LIMITER_RPS: defaults to 2
    /// - LIMITER_BURST: defaults to 4
    /// - LIMITER_TRUST_FORWARDED_FOR: defaults to false
    fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            enabled: env_parse("LIMITER_ENABLED", true)?,
            requests_per_second: env_parse("LIMITER_RPS", 2u32)?,
            burst: env_parse("LIMITER_BURST", 4u32)?,
            trust_forwarded_for: env_parse("LIMITER_TRUST_FORWARDED_FOR", false)?,
        };

        if config.enabled && (config.requests_per_second == 0 || config.burst == 0) {
            return Err(ConfigError::ParseError {
                key: "LIMITER_RPS".to_string(),
                details: "rate and burst must be positive when the limiter is enabled".to_string(),
            });
        }

        Ok(config)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 2,
            burst: 4,
            trust_forwarded_for: false,
        }
    }
}
