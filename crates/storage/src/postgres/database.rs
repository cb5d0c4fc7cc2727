//! PostgreSQL connection pool and migrations.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, instrument, warn};

use spanscope_core::error::{StorageError, StorageResult};

const APPLICATION_NAME: &str = "spanscope";

/// Pool settings for the read side.
///
/// Queries are short and issued per GraphQL request, so the pool fails fast
/// when saturated and every statement runs under a server-side timeout.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a request waits for a free connection.
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    /// `statement_timeout` set on every connection. Zero disables it.
    pub statement_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 15,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(300),
            max_lifetime: Duration::from_secs(900),
            statement_timeout: Duration::from_secs(30),
        }
    }

    /// Parse the URL and apply per-connection session settings.
    pub fn connect_options(&self) -> StorageResult<PgConnectOptions> {
        let options = PgConnectOptions::from_str(&self.url)
            .map_err(|e| StorageError::ConnectionError(format!("invalid database url: {e}")))?
            .application_name(APPLICATION_NAME)
            .options([(
                "statement_timeout",
                self.statement_timeout.as_millis().to_string(),
            )]);
        Ok(options)
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections.min(self.max_connections))
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(Some(self.idle_timeout))
            .max_lifetime(Some(self.max_lifetime))
    }
}

/// Shared connection pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip_all)]
    pub async fn connect(config: &DatabaseConfig) -> StorageResult<Self> {
        debug!(
            max_conn = config.max_connections,
            statement_timeout_ms = config.statement_timeout.as_millis() as u64,
            "Creating connection pool"
        );

        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations from `./migrations`.
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::MigrationError(e.to_string()))?;

        debug!("Migrations applied");
        Ok(())
    }

    /// Round-trip a trivial query through the pool.
    pub async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Database ping failed");
                StorageError::ConnectionError(e.to_string())
            })?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
