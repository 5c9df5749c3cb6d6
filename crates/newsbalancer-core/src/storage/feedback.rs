//! CRUD operations for user feedback on article analyses.
//!
//! Feedback records are immutable once written and are never deduplicated:
//! the same user may submit repeatedly and every record is kept.

use super::{now_iso, DbPool};
use crate::error::StorageError;

/// Feedback category submitted by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackCategory {
    /// Reader agrees with the analysis; nudges confidence up.
    Agree,
    /// Reader disagrees; nudges confidence down.
    Disagree,
    /// Free-form commentary; no confidence effect.
    Other,
}

impl FeedbackCategory {
    /// The confidence delta this category applies to the target article.
    pub fn confidence_delta(self) -> f64 {
        match self {
            Self::Agree => 0.1,
            Self::Disagree => -0.1,
            Self::Other => 0.0,
        }
    }

    /// The string stored in the `category` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agree => "agree",
            Self::Disagree => "disagree",
            Self::Other => "other",
        }
    }
}

/// A stored feedback record.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct FeedbackRecord {
    /// Row id.
    pub id: i64,
    /// The article the feedback targets.
    pub article_id: i64,
    /// Optional submitting user id.
    pub user_id: Option<String>,
    /// Free-form feedback text.
    pub feedback_text: String,
    /// Category string: agree, disagree, or other.
    pub category: String,
    /// ISO-8601 submission timestamp.
    pub created_at: String,
}

/// Insert a feedback record. Returns the new row id.
pub async fn insert_feedback(
    pool: &DbPool,
    article_id: i64,
    user_id: Option<&str>,
    feedback_text: &str,
    category: FeedbackCategory,
) -> Result<i64, StorageError> {
    let result = sqlx::query(
        "INSERT INTO feedback (article_id, user_id, feedback_text, category, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(article_id)
    .bind(user_id)
    .bind(feedback_text)
    .bind(category.as_str())
    .bind(now_iso())
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.last_insert_rowid())
}

/// Fetch all feedback for an article, oldest first.
pub async fn list_feedback(
    pool: &DbPool,
    article_id: i64,
) -> Result<Vec<FeedbackRecord>, StorageError> {
    sqlx::query_as::<_, FeedbackRecord>(
        "SELECT * FROM feedback WHERE article_id = ? ORDER BY id",
    )
    .bind(article_id)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::articles::{insert_article, NewArticle};
    use crate::storage::init_test_db;

    #[tokio::test]
    async fn duplicate_feedback_is_kept() {
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

        for _ in 0..2 {
            insert_feedback(&pool, 1, Some("user-1"), "spot on", FeedbackCategory::Agree)
                .await
                .expect("insert feedback");
        }

        let rows = list_feedback(&pool, 1).await.expect("list");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category, "agree");
        assert_eq!(rows[0].user_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn category_deltas() {
        assert_eq!(FeedbackCategory::Agree.confidence_delta(), 0.1);
        assert_eq!(FeedbackCategory::Disagree.confidence_delta(), -0.1);
        assert_eq!(FeedbackCategory::Other.confidence_delta(), 0.0);
    }
}
