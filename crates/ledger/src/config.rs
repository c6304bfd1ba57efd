//! Ledger configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LEDGER_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   the generic `DATABASE_URL` when unset)
//!
//! ## Optional
//! - `LEDGER_DB_MAX_CONNECTIONS` - Connection pool ceiling (default: 10)
//! - `LEDGER_DB_MIN_CONNECTIONS` - Idle connections kept warm (default: 2)
//! - `LEDGER_CATALOG_CACHE_TTL_SECS` - Catalog cache time-to-live (default: 300)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Ledger engine configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Connection pool ceiling
    pub max_connections: u32,
    /// Idle connections kept warm
    pub min_connections: u32,
    /// Time-to-live for cached catalog lookups
    pub catalog_cache_ttl: Duration,
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("LEDGER_DATABASE_URL")?;
        let max_connections = parse_env_or_default("LEDGER_DB_MAX_CONNECTIONS", 10)?;
        let min_connections = parse_env_or_default("LEDGER_DB_MIN_CONNECTIONS", 2)?;
        let catalog_cache_ttl = Duration::from_secs(parse_env_or_default(
            "LEDGER_CATALOG_CACHE_TTL_SECS",
            300,
        )?);

        Ok(Self {
            database_url,
            max_connections,
            min_connections,
            catalog_cache_ttl,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Parse an environment variable, falling back to a default when unset.
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
