//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use guessing_game::{GameSettings, db::DatabaseConfig};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Default listen address
pub const DEFAULT_BIND: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
    6969,
);

/// Which store backs the game service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process maps; state is lost on restart
    Memory,
    /// Shared PostgreSQL database
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            other => Err(ConfigError::Invalid {
                var: "GAME_STORE".to_string(),
                reason: format!("unknown store backend '{}' (expected memory or postgres)", other),
            }),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Postgres => write!(f, "postgres"),
        }
    }
}

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Store backend
    pub store: StoreBackend,
    /// Database configuration (used by the postgres backend)
    pub database: DatabaseConfig,
    /// Game rules and id space
    pub game: GameSettings,
    /// Prometheus scrape address; `None` disables the exporter
    pub metrics_bind: Option<SocketAddr>,
}

/// Values given on the command line, taking precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind: Option<SocketAddr>,
    pub database_url: Option<String>,
    pub store: Option<StoreBackend>,
    pub metrics_bind: Option<SocketAddr>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `overrides` - Values from CLI args
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if a set variable cannot be parsed
    pub fn from_env(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let bind = match overrides.bind {
            Some(bind) => bind,
            None => parse_env_required("SERVER_BIND")?.unwrap_or(DEFAULT_BIND),
        };

        let store = match overrides.store {
            Some(store) => store,
            None => match std::env::var("GAME_STORE") {
                Ok(raw) => raw.parse()?,
                Err(_) => StoreBackend::Memory,
            },
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = overrides.database_url {
            database.database_url = url;
        }

        let metrics_bind = match overrides.metrics_bind {
            Some(addr) => Some(addr),
            None => parse_env_required("METRICS_BIND")?,
        };

        Ok(ServerConfig {
            bind,
            store,
            database,
            game: GameSettings::from_env(),
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.game.validate().map_err(|reason| ConfigError::Invalid {
            var: "GUESS_*".to_string(),
            reason,
        })?;

        if self.store == StoreBackend::Postgres {
            self.database
                .validate()
                .map_err(|reason| ConfigError::Invalid {
                    var: "DATABASE_URL / DB_*".to_string(),
                    reason,
                })?;
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from server bind address ({})", self.bind),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an optional environment variable, failing on malformed values
fn parse_env_required<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().map(Some).map_err(|e| ConfigError::Invalid {
            var: key.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}
