// packages/engine/src/utils/config.rs
//! Layered engine configuration
//!
//! Values are resolved in order, later sources winning:
//!
//! 1. Built-in defaults ([`EngineConfig::default`])
//! 2. An optional config file (`dashboard.toml` unless another path is given)
//! 3. Environment variables prefixed with `DASHBOARD`, using `__` between
//!    nested keys (e.g. `DASHBOARD_SERVER__PORT=5001`)

use crate::utils::errors::{EngineError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "dashboard";
const ENV_PREFIX: &str = "DASHBOARD";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub simulation: SimulationConfig,
    pub observability: ObservabilityConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Event store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:`
    pub path: PathBuf,

    /// Insert the default car catalogue when the `cars` table is empty
    pub seed_default_cars: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("car_dashboard.db"),
            seed_default_cars: true,
        }
    }
}

/// Events API paging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

/// Dashboard session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Base URL of the Events API used by `drive`, `replay` and `history`
    pub api_base_url: String,

    /// Length of one acceleration or braking maneuver, in seconds
    pub maneuver_duration_secs: f64,

    /// Multiplier applied to recorded durations during replay
    /// (1.0 = real time, 0.5 = twice as fast)
    pub replay_time_scale: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:5000".to_string(),
            maneuver_duration_secs: 1.0,
            replay_time_scale: 1.0,
        }
    }
}

/// Logging and metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones
    pub json_logs: bool,

    /// Prometheus scrape endpoint, disabled when unset
    pub metrics_addr: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_addr: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `dashboard.*`, or from `path` when given,
    /// and the environment
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: EngineConfig = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| EngineError::ConfigError(format!("Failed to read config: {}", e)))?
            .try_deserialize()
            .map_err(|e| EngineError::ConfigError(format!("Invalid config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.api.default_page_size == 0 {
            return Err(EngineError::ConfigError(
                "api.default_page_size must be at least 1".into(),
            ));
        }
        if self.api.max_page_size < self.api.default_page_size {
            return Err(EngineError::ConfigError(
                "api.max_page_size must not be below api.default_page_size".into(),
            ));
        }
        if !positive_finite(self.simulation.maneuver_duration_secs) {
            return Err(EngineError::ConfigError(
                "simulation.maneuver_duration_secs must be a positive number".into(),
            ));
        }
        if !positive_finite(self.simulation.replay_time_scale) {
            return Err(EngineError::ConfigError(
                "simulation.replay_time_scale must be a positive number".into(),
            ));
        }
        if let Some(addr) = &self.observability.metrics_addr {
            addr.parse::<SocketAddr>().map_err(|e| {
                EngineError::ConfigError(format!("Invalid metrics address {}: {}", addr, e))
            })?;
        }
        Ok(())
    }

    /// Address the API server binds to
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| EngineError::ConfigError(format!("Invalid server address: {}", e)))
    }
}

fn positive_finite(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
