use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("unsupported database url scheme: {0}")]
    UnsupportedDatabase(String),
}

/// Deployment environment, normalised from `APP_ENV`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
    Staging,
    Test,
    Other(String),
}

impl AppEnv {
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "dev" | "develop" | "development" | "local" => Self::Development,
            "prod" | "production" => Self::Production,
            "stage" | "staging" => Self::Staging,
            "test" | "testing" => Self::Test,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_production(&self) -> bool {
        *self == Self::Production
    }
}

#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Connections kept warm even when idle.
    pub min_connections: u32,

    /// Hard cap on open connections.
    ///
    /// Every write transaction pins one connection for its lifetime, so this
    /// also bounds how many bookings can be mid-flight at once.
    pub max_connections: u32,

    /// Connections older than this are recycled.
    pub max_lifetime: Duration,

    /// Idle connections above `min_connections` are closed after this.
    pub idle_timeout: Duration,

    /// How long a caller waits for a free connection before failing.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 2,
            max_connections: 10,
            max_lifetime: Duration::from_secs(60 * 60),
            idle_timeout: Duration::from_secs(30 * 60),
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string (`postgres://…` or `sqlite:…`).
    pub database_url: String,

    pub pool: PoolConfig,

    // =========================
    // Booking rules
    // =========================
    /// How far in the past a requested start time may lie and still be
    /// accepted. Absorbs clock skew between client and server.
    pub booking_past_grace: Duration,

    // =========================
    // Observability
    // =========================
    /// Store calls slower than this emit a `performance` warning.
    pub slow_query_warn: Duration,

    pub app_env: AppEnv,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PoolConfig::default();

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "sqlite://coachbook_dev.db?mode=rwc".to_string());

        let pool = PoolConfig {
            min_connections: parse_or(&lookup, "DB_MIN_CONNECTIONS", defaults.min_connections)?,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.max_connections)?,
            max_lifetime: secs_or(&lookup, "DB_MAX_LIFETIME_SECS", defaults.max_lifetime)?,
            idle_timeout: secs_or(&lookup, "DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout)?,
            acquire_timeout: secs_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout)?,
        };

        if pool.max_connections == 0 || pool.min_connections > pool.max_connections {
            return Err(ConfigError::Invalid {
                key: "DB_MIN_CONNECTIONS",
                value: format!("{} (max {})", pool.min_connections, pool.max_connections),
            });
        }

        Ok(Self {
            database_url,
            pool,
            booking_past_grace: secs_or(&lookup, "BOOKING_PAST_GRACE_SECS", Duration::from_secs(60))?,
            slow_query_warn: Duration::from_millis(parse_or(&lookup, "SLOW_QUERY_WARN_MS", 200u64)?),
            app_env: AppEnv::normalize(&lookup("APP_ENV").unwrap_or_else(|| "development".into())),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        _ => Ok(default),
    }
}

fn secs_or<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, key, default.as_secs()).map(Duration::from_secs)
}
