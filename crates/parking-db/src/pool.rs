//! # Database Pool Management
//!
//! Connection pool creation, configuration and the transaction boundary.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Gateway startup                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← Configure pool settings                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::transaction(|tx| ...) ← one unit of work per connection     │
//! │       Ok  → COMMIT                                                      │
//! │       Err → ROLLBACK                                                    │
//! │       dropped before completion → ROLLBACK                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! Readers never block the single writer and the writer never blocks
//! readers. Write transactions start with `BEGIN IMMEDIATE`, so they queue
//! on the write lock (up to `busy_timeout`) instead of reading a snapshot
//! that a concurrent commit could invalidate. Only a lock wait that outlasts
//! `busy_timeout` surfaces as [`DbError::Conflict`].

use futures_util::future::BoxFuture;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::occupancy::OccupancyRepository;
use crate::repository::site::SiteRepository;
use crate::repository::vehicle::VehicleRepository;
use crate::repository::zone::ZoneRepository;

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/parking/parking.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_millis(250));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file (`:memory:` for an ephemeral one).
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a free pooled connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long SQLite waits on a held write lock before reporting BUSY.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the SQLite busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// Single connection: every pooled connection to `:memory:` would
    /// otherwise open its own empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access and transactions.
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous
    ///    - Foreign keys enabled
    ///    - Busy timeout from the config
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let base_options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
        };

        let connect_options = base_options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs `unit_of_work` inside one SQLite write transaction.
    ///
    /// ## Outcome
    /// - closure returns `Ok` → COMMIT, then `Ok` is returned
    /// - closure returns `Err` → ROLLBACK, the error is returned unchanged
    /// - the returned future is dropped mid-flight → the transaction is
    ///   dropped and SQLite rolls it back
    ///
    /// The transaction opens with `BEGIN IMMEDIATE`: it takes the write lock
    /// before its first read, waiting up to `busy_timeout` for it. A failed
    /// BEGIN or COMMIT is reported through `E: From<DbError>`.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let zone = db
    ///     .transaction(|tx| Box::pin(async move {
    ///         zone::fetch(&mut **tx, "zone-a").await
    ///     }))
    ///     .await?;
    /// ```
    pub async fn transaction<F, T, E>(&self, unit_of_work: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut Transaction<'static, Sqlite>) -> BoxFuture<'c, Result<T, E>>
            + Send,
        T: Send,
        E: From<DbError> + Send,
    {
        self.transaction_until(None, unit_of_work).await
    }

    /// [`Database::transaction`] with a deadline on everything before COMMIT.
    ///
    /// Waiting for a connection, waiting for the write lock and the unit of
    /// work itself must all finish by `deadline`; otherwise the transaction is
    /// rolled back and `DbError::DeadlineExceeded` is returned. Once COMMIT
    /// has been sent it is always awaited, so a commit is never reported as a
    /// timeout.
    pub async fn transaction_until<F, T, E>(
        &self,
        deadline: Option<Instant>,
        unit_of_work: F,
    ) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut Transaction<'static, Sqlite>) -> BoxFuture<'c, Result<T, E>>
            + Send,
        T: Send,
        E: From<DbError> + Send,
    {
        let work = async {
            let mut tx = self
                .pool
                .begin_with("BEGIN IMMEDIATE")
                .await
                .map_err(|e| E::from(DbError::from(e)))?;
            let outcome = unit_of_work(&mut tx).await;
            Ok::<_, E>((tx, outcome))
        };

        let (tx, outcome) = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, work)
                .await
                .map_err(|_| E::from(DbError::DeadlineExceeded))??,
            None => work.await?,
        };

        match outcome {
            Ok(value) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed; connection will be discarded");
                }
                Err(err)
            }
        }
    }

    pub fn sites(&self) -> SiteRepository {
        SiteRepository::new(self.pool.clone())
    }

    pub fn zones(&self) -> ZoneRepository {
        ZoneRepository::new(self.pool.clone())
    }

    pub fn vehicles(&self) -> VehicleRepository {
        VehicleRepository::new(self.pool.clone())
    }

    /// Returns the occupancy record repository.
    pub fn occupancy(&self) -> OccupancyRepository {
        OccupancyRepository::new(self.pool.clone())
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/parking-test.db")
            .max_connections(10)
            .min_connections(2)
            .busy_timeout(Duration::from_millis(100));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.busy_timeout, Duration::from_millis(100));
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    #[tokio::test]
    async fn test_transaction_commits_on_ok() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        db.transaction(|tx| {
            Box::pin(async move {
                sqlx::query(
                    "INSERT INTO sites (id, name, city, state, created_at) \
                     VALUES ('s1', 'North', 'Bogota', 'active', '2026-01-01T00:00:00Z')",
                )
                .execute(&mut **tx)
                .await
                .map_err(DbError::from)?;
                Ok::<_, DbError>(())
            })
        })
        .await
        .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sites")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_err() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let result = db
            .transaction::<_, (), DbError>(|tx| {
                Box::pin(async move {
                    sqlx::query(
                        "INSERT INTO sites (id, name, city, state, created_at) \
                         VALUES ('s1', 'North', 'Bogota', 'active', '2026-01-01T00:00:00Z')",
                    )
                    .execute(&mut **tx)
                    .await?;
                    Err(DbError::Internal("abort".to_string()))
                })
            })
            .await;

        assert!(matches!(result, Err(DbError::Internal(_))));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sites")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
