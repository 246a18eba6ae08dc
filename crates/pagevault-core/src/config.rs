use std::env::VarError;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Loads `.env` (if present) and then reads configuration from the process
/// environment.
///
/// # Errors
///
/// Returns `ConfigError` when `DATABASE_URL` is unset or a value fails to parse.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Reads configuration from the process environment without touching `.env`.
///
/// # Errors
///
/// Same as [`load_app_config`].
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Reads `var` through `lookup`, parsing it as `T`. An unset variable yields
/// `default`.
fn parsed<T, F>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Result<String, VarError>,
{
    match lookup(var) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let database_url = lookup("DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

    let env = lookup("PAGEVAULT_ENV")
        .map(|name| Environment::from_name(&name))
        .unwrap_or(Environment::Development);
    let log_level = lookup("PAGEVAULT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let config = AppConfig {
        database_url,
        env,
        bind_addr: parsed(
            &lookup,
            "PAGEVAULT_BIND_ADDR",
            SocketAddr::from(([0, 0, 0, 0], 8080)),
        )?,
        log_level,
        db_max_connections: parsed(&lookup, "PAGEVAULT_DB_MAX_CONNECTIONS", 10)?,
        db_min_connections: parsed(&lookup, "PAGEVAULT_DB_MIN_CONNECTIONS", 1)?,
        db_acquire_timeout_secs: parsed(&lookup, "PAGEVAULT_DB_ACQUIRE_TIMEOUT_SECS", 10)?,
        request_timeout_secs: parsed(&lookup, "PAGEVAULT_REQUEST_TIMEOUT_SECS", 15)?,
    };
    check_limits(&config)?;
    Ok(config)
}

fn check_limits(config: &AppConfig) -> Result<(), ConfigError> {
    if config.db_min_connections > config.db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "PAGEVAULT_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "min connections ({}) exceeds max connections ({})",
                config.db_min_connections, config.db_max_connections
            ),
        });
    }
    if config.request_timeout_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PAGEVAULT_REQUEST_TIMEOUT_SECS".to_string(),
            reason: "must be at least 1 second".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
