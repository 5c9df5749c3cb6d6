//! SQLite storage layer for NewsBalancer.
//!
//! Provides database initialization, connection pooling, and CRUD operations
//! for all persistent entities. Uses SQLx with WAL mode for concurrent access.
//! Writes to one article are serialized by the orchestrator's per-article
//! lock; reads are unlocked.

pub mod articles;
pub mod feedback;
pub mod scores;
pub mod sources;

use crate::config::expand_tilde;
use crate::error::StorageError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use std::time::Duration;

/// Type alias for the SQLite connection pool.
pub type DbPool = sqlx::SqlitePool;

/// Initialize the SQLite database with settings suited to a long-running daemon.
///
/// Creates the database file and parent directories if they don't exist,
/// configures WAL mode for concurrent read/write performance, runs embedded
/// migrations, and returns a connection pool.
pub async fn init_db(db_path: &str) -> Result<DbPool, StorageError> {
    let expanded = expand_tilde(db_path);

    if let Some(parent) = std::path::Path::new(&expanded).parent() {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
            source: sqlx::Error::Configuration(
                format!("failed to create directory {}: {e}", parent.display()).into(),
            ),
        })?;
    }

    let connect_options = SqliteConnectOptions::from_str(&format!("sqlite:{expanded}"))
        .map_err(|e| StorageError::Connection { source: e })?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
        .optimize_on_close(true, None)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .min_connections(1)
        .idle_timeout(Duration::from_secs(300))
        .connect_with(connect_options)
        .await
        .map_err(|e| StorageError::Connection { source: e })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StorageError::Migration { source: e })?;

    Ok(pool)
}

/// Initialize an in-memory SQLite database for testing.
///
/// Uses a single connection so all queries observe the same in-memory database.
#[cfg(any(test, feature = "test-helpers"))]
pub async fn init_test_db() -> Result<DbPool, StorageError> {
    let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| StorageError::Connection { source: e })?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options)
        .await
        .map_err(|e| StorageError::Connection { source: e })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StorageError::Migration { source: e })?;

    Ok(pool)
}

/// Cheap connectivity check for the health endpoint.
pub async fn ping(pool: &DbPool) -> Result<(), StorageError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;
    Ok(())
}

/// Current UTC time as the ISO-8601 string stored in timestamp columns.
pub fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_test_db_creates_all_tables() {
        let pool = init_test_db().await.expect("init test db");

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .expect("query tables");

        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(names, vec!["articles", "feedback", "llm_scores", "sources"]);
    }

    #[test]
    fn now_iso_is_utc_second_precision() {
        let ts = now_iso();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), 20);
    }
}
