//! Configuration management for the ticket inventory server.
//!
//! Loads configuration from environment variables. `DATABASE_URL` is required;
//! everything else has a default.
//!
//! | Variable | Default |
//! |---|---|
//! | `DATABASE_URL` | required |
//! | `DATABASE_MAX_CONNECTIONS` | `10` |
//! | `DATABASE_MIN_CONNECTIONS` | `1` |
//! | `DATABASE_CONNECT_TIMEOUT` | `30` (seconds) |
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `8080` |
//! | `SHUTDOWN_TIMEOUT` | `5` (seconds) |
//! | `REQUEST_TIMEOUT` | `10` (seconds) |
//! | `PURCHASE_MAX_RETRIES` | `3` |
//! | `METRICS_ADDR` | unset, no exporter |

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use ticket_inventory_postgres::PostgresConfig;

/// Errors raised while reading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        reason: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// `PostgreSQL` pool configuration
    pub postgres: PostgresConfig,
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Prometheus exporter address, if enabled
    pub metrics_addr: Option<SocketAddr>,
}

/// HTTP server and lifecycle settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Total budget for the two-phase shutdown
    pub shutdown_timeout: Duration,
    /// Budget for a single request, body upload included
    pub request_timeout: Duration,
    /// Retries of a conflicting purchase transaction before giving up
    pub purchase_max_retries: usize,
}

impl ServerConfig {
    /// `host:port` string for binding the listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            purchase_max_retries: 3,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `DATABASE_URL` is missing or any variable
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let defaults = ServerConfig::default();
        let pool_defaults = PostgresConfig::new(url.clone());

        let postgres = PostgresConfig {
            url,
            max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                pool_defaults.max_connections,
            )?,
            min_connections: parse_or(
                &lookup,
                "DATABASE_MIN_CONNECTIONS",
                pool_defaults.min_connections,
            )?,
            connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "DATABASE_CONNECT_TIMEOUT",
                pool_defaults.connect_timeout.as_secs(),
            )?),
        };

        let server = ServerConfig {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            shutdown_timeout: Duration::from_secs(parse_or(
                &lookup,
                "SHUTDOWN_TIMEOUT",
                defaults.shutdown_timeout.as_secs(),
            )?),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REQUEST_TIMEOUT",
                defaults.request_timeout.as_secs(),
            )?),
            purchase_max_retries: parse_or(
                &lookup,
                "PURCHASE_MAX_RETRIES",
                defaults.purchase_max_retries,
            )?,
        };

        let metrics_addr = lookup("METRICS_ADDR")
            .map(|raw| parse_value("METRICS_ADDR", raw))
            .transpose()?;

        Ok(Self {
            postgres,
            server,
            metrics_addr,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key).map_or(Ok(default), |raw| parse_value(key, raw))
}

fn parse_value<T>(key: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value: raw,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn database_url_is_required() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));

        let err = Config::from_lookup(lookup_from(&[("DATABASE_URL", " ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn defaults_apply_when_only_url_is_set() {
        let config =
            Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://db/tickets")])).unwrap();

        assert_eq!(config.postgres.url, "postgres://db/tickets");
        assert_eq!(config.postgres.max_connections, 10);
        assert_eq!(config.postgres.min_connections, 1);
        assert_eq!(config.postgres.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.server.request_timeout, Duration::from_secs(10));
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/tickets"),
            ("DATABASE_MAX_CONNECTIONS", "32"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("SHUTDOWN_TIMEOUT", "12"),
            ("REQUEST_TIMEOUT", "3"),
            ("PURCHASE_MAX_RETRIES", "0"),
            ("METRICS_ADDR", "127.0.0.1:9090"),
        ]))
        .unwrap();

        assert_eq!(config.postgres.max_connections, 32);
        assert_eq!(config.server.bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(12));
        assert_eq!(config.server.request_timeout, Duration::from_secs(3));
        assert_eq!(config.server.purchase_max_retries, 0);
        assert_eq!(config.metrics_addr, Some("127.0.0.1:9090".parse().unwrap()));
    }

    #[test]
    fn unparsable_values_are_reported() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/tickets"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "PORT", ref value, .. } if value == "eighty"));
    }
}
