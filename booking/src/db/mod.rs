pub mod lock;
pub mod schema;

use sqlx::any::AnyPoolOptions;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, AnyPool, Transaction};
use thiserror::Error;

use crate::config::{AppConfig, ConfigError, PoolConfig};

/// Neutral storage failure kinds. Callers never inspect vendor error codes.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::UniqueViolation,
            _ => Self::Database(err),
        }
    }
}

/// SQL dialect behind the `Any` pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let scheme = url.split(':').next().unwrap_or_default().to_ascii_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(ConfigError::UnsupportedDatabase(scheme)),
        }
    }
}

#[derive(Clone)]
pub struct Db {
    pub pool: AnyPool,
    pub backend: Backend,
}

impl Db {
    pub fn from_pool(pool: AnyPool, backend: Backend) -> Self {
        Self { pool, backend }
    }

    pub async fn connect(cfg: &AppConfig) -> anyhow::Result<Self> {
        Self::connect_with(&cfg.database_url, &cfg.pool).await
    }

    pub async fn connect_with(database_url: &str, pool_cfg: &PoolConfig) -> anyhow::Result<Self> {
        sqlx::any::install_default_drivers();

        let backend = Backend::from_url(database_url)?;
        let pool = AnyPoolOptions::new()
            .min_connections(pool_cfg.min_connections)
            .max_connections(pool_cfg.max_connections)
            .max_lifetime(pool_cfg.max_lifetime)
            .idle_timeout(pool_cfg.idle_timeout)
            .acquire_timeout(pool_cfg.acquire_timeout)
            .connect(database_url)
            .await?;

        tracing::info!(?backend, max = pool_cfg.max_connections, "database pool ready");
        Ok(Self { pool, backend })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        schema::migrate(&self.pool, self.backend).await
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Any>, StoreError> {
        Ok(self.pool.begin().await?)
    }

    pub async fn acquire(&self) -> Result<PoolConnection<Any>, StoreError> {
        Ok(self.pool.acquire().await?)
    }
}

/// Shorthand for the connection type every store operation runs on; both
/// pooled connections and open transactions deref to it.
pub type Conn = AnyConnection;

/// `$start, $start+1, …` for `count` bind parameters.
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
