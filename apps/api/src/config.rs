//! API server configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//! Pricing, payment and rate-limit settings live in the engine's TOML file
//! (`ENGINE_CONFIG`), not here.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Secret used when `JWT_SECRET` is unset. Development only.
const DEV_JWT_SECRET: &str = "kitshare-dev-secret-change-in-production";

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// HTTP listen port
    pub http_port: u16,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Redis connection string (optional). Enables shared rate limiting.
    pub redis_url: Option<String>,

    /// Secret for validating caller JWTs
    pub jwt_secret: String,

    /// Lifetime of tokens issued by the dev tooling, in seconds
    pub jwt_access_lifetime_secs: i64,

    /// Engine TOML file; the platform config dir is used when unset
    pub engine_config: Option<PathBuf>,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = ApiConfig {
            http_port: var("HTTP_PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("HTTP_PORT".to_string()))?,

            database_path: var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("kitshare.db")),

            redis_url: var("REDIS_URL").filter(|s| !s.trim().is_empty()),

            jwt_secret: var("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string()),

            jwt_access_lifetime_secs: var("JWT_ACCESS_LIFETIME_SECS")
                .unwrap_or_else(|| "3600".to_string()) // 1 hour
                .parse()
                .map_err(|_| ConfigError::InvalidValue("JWT_ACCESS_LIFETIME_SECS".to_string()))?,

            engine_config: var("ENGINE_CONFIG").map(PathBuf::from),
        };

        if config.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }

        Ok(config)
    }

    /// True when running with the built-in development secret.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.database_path, PathBuf::from("kitshare.db"));
        assert!(config.redis_url.is_none());
        assert!(config.engine_config.is_none());
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn test_overrides() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("HTTP_PORT", "9000"),
            ("DATABASE_PATH", "/var/lib/kitshare/db.sqlite"),
            ("REDIS_URL", "redis://cache:6379"),
            ("JWT_SECRET", "s3cret"),
            ("ENGINE_CONFIG", "/etc/kitshare/engine.toml"),
        ]))
        .unwrap();

        assert_eq!(config.http_port, 9000);
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.engine_config, Some(PathBuf::from("/etc/kitshare/engine.toml")));
        assert!(!config.uses_dev_secret());
    }

    #[test]
    fn test_invalid_port() {
        let err = ApiConfig::from_lookup(lookup(&[("HTTP_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v) if v == "HTTP_PORT"));
    }

    #[test]
    fn test_blank_secret_rejected() {
        let err = ApiConfig::from_lookup(lookup(&[("JWT_SECRET", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(_)));
    }
}
