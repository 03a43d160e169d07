//! Configuration loader for the `weatherflow` backend service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Nothing else in the crate reads `env::var` for
//! service settings.
//!
use std::env;

use anyhow::{anyhow, bail, Result};
use chrono::FixedOffset;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Which [`ReadingStore`](crate::ReadingStore) implementation backs the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    // ---
    /// Durable PostgreSQL store.
    Postgres { db_url: String, db_pool_max: u32 },

    /// Process-local store, lost on restart. Development and tests only.
    Memory,
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Storage backend selection and its connection settings.
    pub backend: StoreBackend,

    /// TCP port the HTTP server binds on `0.0.0.0`.
    pub port: u16,

    /// Deployment-wide reference timezone, as a fixed offset from UTC.
    ///
    /// Defines local midnight for the today-summary and the wall clock that
    /// bucket keys are cut from.
    pub reporting_offset: FixedOffset,

    /// Default number of readings in the recent-readings view.
    pub recent_limit: u32,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string (postgres backend only)
///
/// Optional:
/// - `STORE_BACKEND` – `postgres` (default) or `memory`
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `PORT` – listen port (default: 8080)
/// - `REPORTING_UTC_OFFSET_MINUTES` – reference timezone offset (default: 0)
/// - `RECENT_READINGS_LIMIT` – recent view window (default: 24)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let backend = match env::var("STORE_BACKEND").as_deref() {
        Ok("memory") => StoreBackend::Memory,
        Ok("postgres") | Err(_) => StoreBackend::Postgres {
            db_url: require_env!("DATABASE_URL"),
            db_pool_max: parse_env!("DB_POOL_MAX", u32, 5),
        },
        Ok(other) => bail!("Invalid STORE_BACKEND: {other} (expected postgres or memory)"),
    };

    let port = parse_env!("PORT", u16, 8080);
    let offset_minutes = parse_env!("REPORTING_UTC_OFFSET_MINUTES", i32, 0);
    let recent_limit = parse_env!("RECENT_READINGS_LIMIT", u32, 24);

    if recent_limit == 0 {
        bail!("Invalid RECENT_READINGS_LIMIT: must be at least 1");
    }

    Ok(Config {
        backend,
        port,
        reporting_offset: reporting_offset(offset_minutes)?,
        recent_limit,
    })
}

/// Build the reference timezone from an offset in minutes east of UTC.
pub fn reporting_offset(minutes: i32) -> Result<FixedOffset> {
    // ---
    if !(-1439..=1439).contains(&minutes) {
        bail!("Invalid REPORTING_UTC_OFFSET_MINUTES: {minutes} is outside -1439..=1439");
    }
    FixedOffset::east_opt(minutes * 60)
        .ok_or_else(|| anyhow!("Invalid REPORTING_UTC_OFFSET_MINUTES: {minutes}"))
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords while showing
    /// all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        match &self.backend {
            StoreBackend::Postgres {
                db_url,
                db_pool_max,
            } => {
                tracing::info!("  STORE_BACKEND  : postgres");
                tracing::info!("  DATABASE_URL   : {}", mask_db_url(db_url));
                tracing::info!("  DB_POOL_MAX    : {}", db_pool_max);
            }
            StoreBackend::Memory => {
                tracing::warn!("  STORE_BACKEND  : memory (readings are not durable)");
            }
        }
        tracing::info!("  PORT           : {}", self.port);
        tracing::info!("  UTC OFFSET     : {}", self.reporting_offset);
        tracing::info!("  RECENT LIMIT   : {}", self.recent_limit);
    }
}

/// Replace the password portion of a connection string with `****`.
pub fn mask_db_url(db_url: &str) -> String {
    // ---
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            // "postgres://host" has its only colon in the scheme
            if !db_url[colon_pos..].starts_with("://") {
                return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
            }
        }
    }
    db_url.to_string()
}
