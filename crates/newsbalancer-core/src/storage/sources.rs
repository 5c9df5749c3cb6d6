//! CRUD operations for registered feed sources.
//!
//! Sources carry a consecutive-error streak maintained by the collector.
//! A source at or past [`UNHEALTHY_STREAK`] failures is reported unhealthy
//! but stays enabled; an admin action clears the streak.

use super::{now_iso, DbPool};
use crate::error::StorageError;

/// Consecutive failures after which a source is considered unhealthy.
pub const UNHEALTHY_STREAK: i64 = 5;

/// A registered feed source.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Source {
    /// Stable source id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Channel type (currently always "rss").
    pub channel_type: String,
    /// Feed URL (unique).
    pub feed_url: String,
    /// Editorial category label.
    pub category: String,
    /// Whether the collector fetches this source (0 = no, 1 = yes).
    pub enabled: i64,
    /// Consecutive fetch/parse failures.
    pub error_streak: i64,
    /// ISO-8601 timestamp of the last successful refresh.
    pub last_success: Option<String>,
}

impl Source {
    /// Whether the error streak has reached the unhealthy limit.
    pub fn is_healthy(&self) -> bool {
        self.error_streak < UNHEALTHY_STREAK
    }
}

/// Fields required to register a new source.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewSource {
    /// Display name.
    pub name: String,
    /// Feed URL.
    pub feed_url: String,
    /// Editorial category label.
    #[serde(default)]
    pub category: String,
}

/// Register a source. Returns the new row id, or `None` when the feed URL
/// is already registered.
pub async fn insert_source(pool: &DbPool, source: &NewSource) -> Result<Option<i64>, StorageError> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO sources (name, channel_type, feed_url, category) \
         VALUES (?, 'rss', ?, ?)",
    )
    .bind(&source.name)
    .bind(&source.feed_url)
    .bind(&source.category)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    if result.rows_affected() > 0 {
        Ok(Some(result.last_insert_rowid()))
    } else {
        Ok(None)
    }
}

/// Fetch a single source by id. Returns `None` if not found.
pub async fn get_source(pool: &DbPool, id: i64) -> Result<Option<Source>, StorageError> {
    sqlx::query_as::<_, Source>("SELECT * FROM sources WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })
}

/// List sources, optionally restricted to enabled ones.
pub async fn list_sources(pool: &DbPool, only_enabled: bool) -> Result<Vec<Source>, StorageError> {
    let sql = if only_enabled {
        "SELECT * FROM sources WHERE enabled = 1 ORDER BY id"
    } else {
        "SELECT * FROM sources ORDER BY id"
    };

    sqlx::query_as::<_, Source>(sql)
        .fetch_all(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })
}

/// Enable or disable a source. Returns whether the source exists.
pub async fn set_enabled(pool: &DbPool, id: i64, enabled: bool) -> Result<bool, StorageError> {
    let result = sqlx::query("UPDATE sources SET enabled = ? WHERE id = ?")
        .bind(i64::from(enabled))
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.rows_affected() > 0)
}

/// Update a source's category label. Returns whether the source exists.
pub async fn set_category(pool: &DbPool, id: i64, category: &str) -> Result<bool, StorageError> {
    let result = sqlx::query("UPDATE sources SET category = ? WHERE id = ?")
        .bind(category)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.rows_affected() > 0)
}

/// Record a successful refresh: clears the error streak and stamps
/// `last_success`.
pub async fn record_success(pool: &DbPool, id: i64) -> Result<(), StorageError> {
    sqlx::query("UPDATE sources SET error_streak = 0, last_success = ? WHERE id = ?")
        .bind(now_iso())
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(())
}

/// Record a failed refresh. Returns the new streak value.
pub async fn record_failure(pool: &DbPool, id: i64) -> Result<i64, StorageError> {
    sqlx::query_scalar::<_, i64>(
        "UPDATE sources SET error_streak = error_streak + 1 WHERE id = ? RETURNING error_streak",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

/// Clear a source's error streak (admin action). Returns whether the
/// source exists.
pub async fn reset_errors(pool: &DbPool, id: i64) -> Result<bool, StorageError> {
    let result = sqlx::query("UPDATE sources SET error_streak = 0 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_test_db;

    fn sample() -> NewSource {
        NewSource {
            name: "Example Wire".to_string(),
            feed_url: "https://example.com/feed.xml".to_string(),
            category: "politics".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_dedupes_on_feed_url() {
        let pool = init_test_db().await.expect("init db");

        let first = insert_source(&pool, &sample()).await.expect("insert");
        assert_eq!(first, Some(1));

        let dup = insert_source(&pool, &sample()).await.expect("insert dup");
        assert_eq!(dup, None);
    }

    #[tokio::test]
    async fn streak_tracks_health_and_resets() {
        let pool = init_test_db().await.expect("init db");
        insert_source(&pool, &sample()).await.expect("insert");

        for expected in 1..=UNHEALTHY_STREAK {
            let streak = record_failure(&pool, 1).await.expect("failure");
            assert_eq!(streak, expected);
        }

        let source = get_source(&pool, 1).await.expect("get").expect("exists");
        assert!(!source.is_healthy());
        assert_eq!(source.enabled, 1, "unhealthy sources stay enabled");

        record_success(&pool, 1).await.expect("success");
        let source = get_source(&pool, 1).await.expect("get").expect("exists");
        assert!(source.is_healthy());
        assert_eq!(source.error_streak, 0);
        assert!(source.last_success.is_some());
    }

    #[tokio::test]
    async fn disabled_sources_are_excluded_from_enabled_listing() {
        let pool = init_test_db().await.expect("init db");
        insert_source(&pool, &sample()).await.expect("insert");
        set_enabled(&pool, 1, false).await.expect("disable");

        assert!(list_sources(&pool, true).await.expect("list").is_empty());
        assert_eq!(list_sources(&pool, false).await.expect("list").len(), 1);
    }
}
