//! PostgreSQL connection settings loaded from environment variables.

use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgSslMode};

/// PostgreSQL configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `POSTGRES_HOST` (default: `"localhost"`)
/// - `POSTGRES_PORT` (default: `5432`)
/// - `POSTGRES_DATABASE` (default: `"postgres"`)
/// - `POSTGRES_USER` (default: `"postgres"`)
/// - `POSTGRES_PASSWORD` (default: empty)
/// - `POSTGRES_SSL_MODE` (default: `"prefer"`)
/// - `POSTGRES_MAX_CONNECTIONS` (default: `10`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("POSTGRES_HOST").unwrap_or(defaults.host),
            port: lookup("POSTGRES_PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            database: lookup("POSTGRES_DATABASE").unwrap_or(defaults.database),
            user: lookup("POSTGRES_USER").unwrap_or(defaults.user),
            password: lookup("POSTGRES_PASSWORD").unwrap_or(defaults.password),
            ssl_mode: lookup("POSTGRES_SSL_MODE").unwrap_or(defaults.ssl_mode),
            max_connections: lookup("POSTGRES_MAX_CONNECTIONS")
                .and_then(|n| n.trim().parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_connections),
        }
    }

    /// Builds driver connect options. An unknown SSL mode falls back to
    /// `prefer`.
    pub fn connect_options(&self) -> PgConnectOptions {
        let ssl_mode = PgSslMode::from_str(&self.ssl_mode).unwrap_or_else(|_| {
            tracing::warn!(ssl_mode = %self.ssl_mode, "unknown POSTGRES_SSL_MODE, using prefer");
            PgSslMode::Prefer
        });

        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
            .ssl_mode(ssl_mode)
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            ssl_mode: "prefer".to_string(),
            max_connections: 10,
        }
    }
}
