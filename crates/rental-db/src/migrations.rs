//! # Schema Migrations
//!
//! The SQL files under `migrations/sqlite/` are compiled into the binary and
//! applied in filename order when a [`Database`](crate::Database) opens.
//!
//! ```text
//! 001_initial_schema.sql
//!   listings              availability_version bumped by every booking write
//!   bookings              UNIQUE(idempotency_key), date-range index per listing
//!   booking_transitions   UNIQUE(idempotency_key), one row per status change
//! ```
//!
//! Applied files are recorded in `_sqlx_migrations` with their checksum, so
//! an edited migration fails startup. Schema changes go in a new numbered file.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every migration not yet recorded. Each runs in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(embedded = MIGRATOR.migrations.len(), "Applying schema migrations");
    MIGRATOR.run(pool).await?;
    info!("Schema is up to date");
    Ok(())
}

/// Number of embedded migrations and number recorded as applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;

    Ok((MIGRATOR.migrations.len(), applied as usize))
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_fresh_database_has_every_migration() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (embedded, applied) = super::migration_status(db.pool()).await.unwrap();
        assert!(embedded >= 1);
        assert_eq!(embedded, applied);
    }

    #[tokio::test]
    async fn test_rerun_is_a_no_op() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.run_migrations().await.unwrap();
        let (embedded, applied) = super::migration_status(db.pool()).await.unwrap();
        assert_eq!(embedded, applied);
    }
}
