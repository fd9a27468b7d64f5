//! Configuration loader for the `roomtemp-ingest` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Nothing else in the crate calls `env::var`; the
//! request handler only ever sees the [`IngestSettings`] snapshot built here.
//!
use std::{env, net::SocketAddr, path::PathBuf};

use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use sqlx::postgres::PgConnectOptions;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
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

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8443";

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PEM certificate chain served to clients.
    pub tls_cert: PathBuf,

    /// PEM private key matching `tls_cert`.
    pub tls_key: PathBuf,

    /// Shared secret every submission must carry in `?token=`.
    pub access_token: String,

    pub db_host: String,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Zone used to interpret submitted epoch seconds.
    pub timezone: Tz,

    pub listen_addr: SocketAddr,
}

/// Read-only context shared by every request handler.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub access_token: String,
    pub timezone: Tz,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `TLS_CERT`, `TLS_KEY` – PEM file paths
/// - `ACCESS_TOKEN` – shared secret, must not be empty
/// - `DATABASE_HOST`, `DATABASE_USER`, `DATABASE_PASSWORD`, `DATABASE_NAME`
/// - `TIMEZONE` – IANA zone name, e.g. `Europe/Berlin`
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `LISTEN_ADDR` – TLS socket (default: `0.0.0.0:8443`)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let tls_cert = PathBuf::from(require_env!("TLS_CERT"));
    let tls_key = PathBuf::from(require_env!("TLS_KEY"));
    let access_token = require_env!("ACCESS_TOKEN");
    let db_host = require_env!("DATABASE_HOST");
    let db_user = require_env!("DATABASE_USER");
    let db_password = require_env!("DATABASE_PASSWORD");
    let db_name = require_env!("DATABASE_NAME");
    let timezone = parse_timezone(&require_env!("TIMEZONE"))?;
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let listen_addr = parse_listen_addr(
        &env::var("LISTEN_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string()),
    )?;

    if access_token.is_empty() {
        return Err(anyhow!("ACCESS_TOKEN must not be empty"));
    }

    Ok(Config {
        tls_cert,
        tls_key,
        access_token,
        db_host,
        db_user,
        db_password,
        db_name,
        db_pool_max,
        timezone,
        listen_addr,
    })
}

fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow!("Invalid TIMEZONE {:?}: {}", name, e))
}

fn parse_listen_addr(raw: &str) -> Result<SocketAddr> {
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("Invalid LISTEN_ADDR {:?}: {}", raw, e))
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "****"
    }
}

impl Config {
    /// Connection options for the PostgreSQL pool.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.db_host)
            .username(&self.db_user)
            .password(&self.db_password)
            .database(&self.db_name)
    }

    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            access_token: self.access_token.clone(),
            timezone: self.timezone,
        }
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the database password and the access token.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  TLS_CERT          : {}", self.tls_cert.display());
        tracing::info!("  TLS_KEY           : {}", self.tls_key.display());
        tracing::info!("  ACCESS_TOKEN      : {}", mask(&self.access_token));
        tracing::info!("  DATABASE_HOST     : {}", self.db_host);
        tracing::info!("  DATABASE_USER     : {}", self.db_user);
        tracing::info!("  DATABASE_PASSWORD : {}", mask(&self.db_password));
        tracing::info!("  DATABASE_NAME     : {}", self.db_name);
        tracing::info!("  DB_POOL_MAX       : {}", self.db_pool_max);
        tracing::info!("  TIMEZONE          : {}", self.timezone.name());
        tracing::info!("  LISTEN_ADDR       : {}", self.listen_addr);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_parse_timezone_accepts_iana_names() {
        // ---
        assert_eq!(parse_timezone("UTC").unwrap(), Tz::UTC);
        assert_eq!(
            parse_timezone(" Europe/Berlin ").unwrap(),
            chrono_tz::Europe::Berlin
        );
    }

    #[test]
    fn test_parse_timezone_rejects_unknown_zone() {
        // ---
        let err = parse_timezone("Mars/Olympus_Mons").unwrap_err();
        assert!(err.to_string().contains("Invalid TIMEZONE"));
    }

    #[test]
    fn test_parse_listen_addr() {
        // ---
        let addr = parse_listen_addr(DEFAULT_LISTEN_ADDR).unwrap();
        assert_eq!(addr.port(), 8443);
        assert!(parse_listen_addr("localhost").is_err());
    }

    #[test]
    fn test_mask_never_echoes_secret() {
        // ---
        assert_eq!(mask("hunter2"), "****");
        assert_eq!(mask(""), "<empty>");
    }
}
