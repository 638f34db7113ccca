//! # Database Handle
//!
//! Opens the SQLite pool the repositories share.
//!
//! ## Locking Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        One SQLite file, WAL mode                        │
//! │                                                                         │
//! │   reads (get, list, conflict pre-check) ──► any pooled connection,     │
//! │                                              never blocked by writers  │
//! │                                                                         │
//! │   booking writes ──► BEGIN                                             │
//! │                      UPDATE listings SET availability_version + 1      │
//! │                        └─ takes the write lock; the next writer waits  │
//! │                           up to busy_timeout here                      │
//! │                      re-scan for overlap, write, COMMIT                │
//! │                                                                         │
//! │   Two confirmations of overlapping bookings therefore run one after    │
//! │   the other, and the second one's scan sees the first one's commit.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::booking::BookingRepository;
use crate::repository::listing::ListingRepository;

/// Path marker for a private in-memory database.
const MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Pool settings.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/kitshare/kitshare.db")
///     .max_connections(10)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created on first open.
    pub path: PathBuf,

    /// Upper bound on pooled connections (default 5).
    pub max_connections: u32,

    /// How long a caller waits for a free connection (default 30s).
    pub acquire_timeout: Duration,

    /// How long a writer waits for SQLite's write lock (default 5s).
    pub busy_timeout: Duration,

    /// Apply embedded migrations when opening (default true).
    pub migrate: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: path.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    /// A private, migrated in-memory database for tests.
    ///
    /// Every connection to `:memory:` is a separate database, so the pool is
    /// pinned to a single connection.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(MEMORY)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn migrate(mut self, migrate: bool) -> Self {
        self.migrate = migrate;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == MEMORY
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let url = if self.is_in_memory() {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}", self.path.display())
        };

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(format!("{}: {}", url, e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout);

        Ok(options)
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared database handle. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.path.display(), "Opening booking database");

        let options = config.connect_options()?;
        debug!(busy_timeout_ms = config.busy_timeout.as_millis() as u64, "SQLite options ready");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };
        if config.migrate {
            db.run_migrations().await?;
        }

        info!(max_connections = config.max_connections, "Booking database ready");
        Ok(db)
    }

    /// Applies pending migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Booking reads, conflict scans and lifecycle writes.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let mine = db.bookings().list_for_user("u-1", ActorRole::Renter, None, 20).await?;
    /// ```
    pub fn bookings(&self) -> BookingRepository {
        BookingRepository::new(self.pool.clone())
    }

    pub fn listings(&self) -> ListingRepository {
        ListingRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections and closes the pool.
    pub async fn close(&self) {
        info!("Closing booking database");
        self.pool.close().await;
    }

    /// True if a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
