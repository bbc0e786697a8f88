//! Configuration loading and representation.
//!
//! Everything comes from environment variables. Loading goes through a lookup
//! function so tests can supply values without touching the process
//! environment.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use stockcast_ai::DEFAULT_THREADS;
use stockcast_core::YearMonth;

pub const DEFAULT_MODEL_PATH: &str = "models/model.json";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: &str = "3306";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(String),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// How to reach the ticket database.
///
/// Credentials given as separate variables stay separate all the way to the
/// driver, so they never need URL escaping.
#[derive(Clone, PartialEq, Eq)]
pub enum DatabaseConfig {
    Url(String),
    Parts {
        user: String,
        password: Option<String>,
        host: String,
        port: u16,
        name: String,
    },
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseConfig::Url(_) => f.debug_tuple("Url").field(&"<redacted>").finish(),
            DatabaseConfig::Parts {
                user,
                password,
                host,
                port,
                name,
            } => f
                .debug_struct("Parts")
                .field("user", user)
                .field("password", &password.as_ref().map(|_| "<redacted>"))
                .field("host", host)
                .field("port", port)
                .field("name", name)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database: DatabaseConfig,
    pub model_path: PathBuf,
    pub bind_addr: String,
    /// Fixed validation month; `None` means "the current month".
    pub train_cutoff: Option<YearMonth>,
    pub forecast_threads: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database = match get("DATABASE_URL") {
            Some(url) => DatabaseConfig::Url(url),
            None => {
                let user = get("DB_USER").ok_or_else(|| {
                    ConfigError::Missing("DATABASE_URL or DB_USER/DB_NAME".to_string())
                })?;
                let name = get("DB_NAME").ok_or_else(|| ConfigError::Missing("DB_NAME".to_string()))?;
                let port = get("DB_PORT")
                    .unwrap_or_else(|| DEFAULT_DB_PORT.to_string())
                    .parse::<u16>()
                    .map_err(|e| ConfigError::Invalid {
                        var: "DB_PORT",
                        reason: e.to_string(),
                    })?;
                DatabaseConfig::Parts {
                    user,
                    // Passwords are taken verbatim, surrounding whitespace included.
                    password: lookup("DB_PASSWORD").filter(|v| !v.is_empty()),
                    host: get("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
                    port,
                    name,
                }
            }
        };

        let train_cutoff = get("TRAIN_CUTOFF")
            .map(|raw| {
                raw.parse::<YearMonth>().map_err(|e| ConfigError::Invalid {
                    var: "TRAIN_CUTOFF",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let forecast_threads = match get("FORECAST_THREADS") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "FORECAST_THREADS",
                        reason: format!("expected a positive integer, got {raw:?}"),
                    });
                }
            },
            None => DEFAULT_THREADS,
        };

        Ok(Self {
            database,
            model_path: get("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            train_cutoff,
            forecast_threads,
        })
    }
}
