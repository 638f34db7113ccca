//! # Engine Configuration
//!
//! Tunables for pricing, payment calls and update rate limiting.
//!
//! ## Loading Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Configuration Loading                              │
//! │                                                                         │
//! │  1. Defaults (every field has one)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. TOML file                                                          │
//! │     explicit path, else <config dir>/kitshare/engine.toml if present   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. Environment overrides (RENTAL_*)                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  4. validate()                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example File
//! ```toml
//! [pricing]
//! service_fee_bps = 1000
//! guarantee_standard_bps = 1200
//! rounding = "whole_unit"
//!
//! [payments]
//! call_timeout_secs = 10
//!
//! [rate_limit]
//! max_updates = 20
//! window_secs = 900
//! ```
//!
//! ## Environment Variables
//! | Variable | Field |
//! |----------|-------|
//! | `RENTAL_SERVICE_FEE_BPS` | `pricing.service_fee_bps` |
//! | `RENTAL_FEE_ROUNDING` | `pricing.rounding` (`cent` or `whole_unit`) |
//! | `RENTAL_PAYMENT_TIMEOUT_SECS` | `payments.call_timeout_secs` |
//! | `RENTAL_RATE_LIMIT_MAX` | `rate_limit.max_updates` |
//! | `RENTAL_RATE_LIMIT_WINDOW_SECS` | `rate_limit.window_secs` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use rental_core::money::Rounding;
use rental_core::FeeSchedule;

// =============================================================================
// Errors
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Gateway call settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Upper bound for one gateway call; on expiry the outcome is resolved
    /// through a lookup.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

fn default_call_timeout_secs() -> u64 {
    10
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl PaymentsConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Booking update throttling, per caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_updates")]
    pub max_updates: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_max_updates() -> u32 {
    20
}

fn default_window_secs() -> u64 {
    15 * 60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_updates: default_max_updates(),
            window_secs: default_window_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

// =============================================================================
// Engine Config
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub pricing: FeeSchedule,

    #[serde(default)]
    pub payments: PaymentsConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl EngineConfig {
    /// Loads configuration from `path`, or from the default location when
    /// `None`. A missing default file means defaults; a missing explicit
    /// file is an error.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No engine config file, using defaults");
                    EngineConfig::default()
                }
            },
        };

        config.apply_env_overrides();
        config.validate()?;

        info!(
            service_fee_bps = config.pricing.service_fee_bps,
            call_timeout_secs = config.payments.call_timeout_secs,
            rate_limit = config.rate_limit.max_updates,
            "Engine configuration loaded"
        );
        Ok(config)
    }

    /// Parses a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Reading engine config");
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pricing
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                field: "pricing".into(),
                message: e.to_string(),
            })?;

        if self.payments.call_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "payments.call_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.rate_limit.max_updates == 0 || self.rate_limit.window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit".into(),
                message: "max_updates and window_secs must be greater than 0".into(),
            });
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(bps) = parse_var::<u32>(&var, "RENTAL_SERVICE_FEE_BPS") {
            debug!(bps, "Overriding service fee from environment");
            self.pricing.service_fee_bps = bps;
        }

        if let Some(mode) = var("RENTAL_FEE_ROUNDING") {
            match mode.to_lowercase().as_str() {
                "cent" => self.pricing.rounding = Rounding::Cent,
                "whole_unit" | "whole" => self.pricing.rounding = Rounding::WholeUnit,
                _ => warn!(mode = %mode, "Unknown fee rounding in environment"),
            }
        }

        if let Some(secs) = parse_var::<u64>(&var, "RENTAL_PAYMENT_TIMEOUT_SECS") {
            self.payments.call_timeout_secs = secs;
        }

        if let Some(max) = parse_var::<u32>(&var, "RENTAL_RATE_LIMIT_MAX") {
            self.rate_limit.max_updates = max;
        }

        if let Some(secs) = parse_var::<u64>(&var, "RENTAL_RATE_LIMIT_WINDOW_SECS") {
            self.rate_limit.window_secs = secs;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "kitshare", "kitshare")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }
}

fn parse_var<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
