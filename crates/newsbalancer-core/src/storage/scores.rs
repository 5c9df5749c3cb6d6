//! CRUD operations for per-model bias scores.
//!
//! One row per (article, model); re-scoring upserts so the last write wins.
//! A NULL score is the "invalid" sentinel: the model responded but produced
//! no usable value, or its fall-back chain was exhausted.

use super::{now_iso, DbPool};
use crate::error::StorageError;

/// A single model's bias verdict for one article.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ModelScoreRow {
    /// Row id; insertion order breaks duplicate-model ties.
    pub id: i64,
    /// The scored article.
    pub article_id: i64,
    /// Model identifier (provider/name).
    pub model: String,
    /// Bias score in [-1, +1]; NULL marks an invalid result.
    pub score: Option<f64>,
    /// Per-call confidence in [0, 1].
    pub confidence: f64,
    /// Optional free-form JSON metadata (prompt variant, latency).
    pub metadata: Option<String>,
    /// ISO-8601 timestamp of the last write.
    pub created_at: String,
}

/// Upsert a model score. The (article_id, model) pair is unique; a second
/// write for the pair replaces the first.
pub async fn upsert_score<'e, E>(
    executor: E,
    article_id: i64,
    model: &str,
    score: Option<f64>,
    confidence: f64,
    metadata: Option<&str>,
) -> Result<(), StorageError>
where
    E: sqlx::SqliteExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO llm_scores (article_id, model, score, confidence, metadata, created_at) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT(article_id, model) DO UPDATE SET \
           score = excluded.score, \
           confidence = excluded.confidence, \
           metadata = excluded.metadata, \
           created_at = excluded.created_at",
    )
    .bind(article_id)
    .bind(model)
    .bind(score)
    .bind(confidence)
    .bind(metadata)
    .bind(now_iso())
    .execute(executor)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(())
}

/// Fetch all model scores for an article in insertion order.
pub async fn list_scores<'e, E>(
    executor: E,
    article_id: i64,
) -> Result<Vec<ModelScoreRow>, StorageError>
where
    E: sqlx::SqliteExecutor<'e>,
{
    sqlx::query_as::<_, ModelScoreRow>(
        "SELECT * FROM llm_scores WHERE article_id = ? ORDER BY id",
    )
    .bind(article_id)
    .fetch_all(executor)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

/// Delete all model scores for an article (forced re-analysis).
pub async fn delete_scores(pool: &DbPool, article_id: i64) -> Result<u64, StorageError> {
    let result = sqlx::query("DELETE FROM llm_scores WHERE article_id = ?")
        .bind(article_id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::articles::{insert_article, NewArticle};
    use crate::storage::init_test_db;

    async fn seeded_pool() -> DbPool {
        let pool = init_test_db().await.expect("init db");
        insert_article(
            &pool,
            &NewArticle {
                source: "example".to_string(),
                url: "https://example.com/a".to_string(),
                title: "title".to_string(),
                content: "content".to_string(),
                pub_date: "2026-01-10T08:00:00Z".to_string(),
            },
        )
        .await
        .expect("insert article");
        pool
    }

    #[tokio::test]
    async fn upsert_keeps_one_row_per_article_model() {
        let pool = seeded_pool().await;

        upsert_score(&pool, 1, "left-m1", Some(-0.6), 0.8, None)
            .await
            .expect("insert");
        upsert_score(&pool, 1, "left-m1", Some(-0.2), 0.5, Some(r#"{"variant":"default"}"#))
            .await
            .expect("upsert");

        let rows = list_scores(&pool, 1).await.expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].score, Some(-0.2));
        assert_eq!(rows[0].confidence, 0.5);
        assert!(rows[0].metadata.as_deref().unwrap().contains("variant"));
    }

    #[tokio::test]
    async fn invalid_scores_round_trip_as_null() {
        let pool = seeded_pool().await;

        upsert_score(&pool, 1, "left-m1", None, 0.0, None)
            .await
            .expect("insert invalid");

        let rows = list_scores(&pool, 1).await.expect("list");
        assert_eq!(rows[0].score, None);
    }

    #[tokio::test]
    async fn delete_scores_clears_article_rows() {
        let pool = seeded_pool().await;

        upsert_score(&pool, 1, "left-m1", Some(-0.6), 0.8, None)
            .await
            .expect("insert");
        upsert_score(&pool, 1, "center-m1", Some(0.0), 0.9, None)
            .await
            .expect("insert");

        let deleted = delete_scores(&pool, 1).await.expect("delete");
        assert_eq!(deleted, 2);
        assert!(list_scores(&pool, 1).await.expect("list").is_empty());
    }
}
