//! CRUD operations for collected articles.
//!
//! Articles are inserted by the RSS collector, scored by the ensemble
//! orchestrator, and nudged by user feedback. The feed URL is the
//! deduplication key.

use super::{now_iso, DbPool};
use crate::error::StorageError;
use crate::scoring::Leaning;

/// Articles returned per listing page.
pub const PAGE_SIZE: u32 = 20;

/// A news article collected from an RSS source.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Article {
    /// Stable article id.
    pub id: i64,
    /// Display name of the source that produced the article.
    pub source: String,
    /// Canonical article URL (unique).
    pub url: String,
    /// Article headline.
    pub title: String,
    /// Article body text.
    pub content: String,
    /// ISO-8601 publication timestamp.
    pub pub_date: String,
    /// ISO-8601 collection timestamp.
    pub created_at: String,
    /// Composite bias score in [-1, +1], if analyzed.
    pub composite_score: Option<f64>,
    /// Confidence in [0, 1], if analyzed.
    pub confidence: Option<f64>,
    /// Optional generated summary.
    pub summary: Option<String>,
}

/// Fields required to insert a new article.
#[derive(Debug, Clone)]
pub struct NewArticle {
    /// Display name of the source.
    pub source: String,
    /// Canonical article URL.
    pub url: String,
    /// Article headline.
    pub title: String,
    /// Article body text.
    pub content: String,
    /// ISO-8601 publication timestamp.
    pub pub_date: String,
}

/// Listing filters for `list_articles`.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    /// Exact source name match.
    pub source: Option<String>,
    /// Bias leaning derived from the composite score.
    pub leaning: Option<Leaning>,
    /// Case-insensitive substring match on title or content.
    pub query: Option<String>,
    /// 1-based page number.
    pub page: u32,
}

/// Insert an article. Uses `INSERT OR IGNORE` so a URL already in the store
/// is skipped silently. Returns whether a row was inserted.
pub async fn insert_article(pool: &DbPool, article: &NewArticle) -> Result<bool, StorageError> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO articles (source, url, title, content, pub_date, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&article.source)
    .bind(&article.url)
    .bind(&article.title)
    .bind(&article.content)
    .bind(&article.pub_date)
    .bind(now_iso())
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.rows_affected() > 0)
}

/// Fetch a single article by id. Returns `None` if not found.
pub async fn get_article(pool: &DbPool, id: i64) -> Result<Option<Article>, StorageError> {
    sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })
}

/// List articles matching the filter, newest first.
///
/// Fetches one extra row beyond the page size to derive `has_more`.
/// `lean_threshold` is the composite magnitude separating Left/Right from
/// Center (config knob, default 0.1).
pub async fn list_articles(
    pool: &DbPool,
    filter: &ArticleFilter,
    lean_threshold: f64,
) -> Result<(Vec<Article>, bool), StorageError> {
    let mut sql = String::from("SELECT * FROM articles WHERE 1=1");

    if filter.source.is_some() {
        sql.push_str(" AND source = ?");
    }
    match filter.leaning {
        Some(Leaning::Left) => sql.push_str(" AND composite_score < ?"),
        Some(Leaning::Right) => sql.push_str(" AND composite_score > ?"),
        Some(Leaning::Center) => {
            sql.push_str(" AND composite_score IS NOT NULL AND ABS(composite_score) <= ?");
        }
        None => {}
    }
    if filter.query.is_some() {
        sql.push_str(" AND (LOWER(title) LIKE ? OR LOWER(content) LIKE ?)");
    }
    sql.push_str(" ORDER BY pub_date DESC, id DESC LIMIT ? OFFSET ?");

    let mut query = sqlx::query_as::<_, Article>(&sql);

    if let Some(source) = &filter.source {
        query = query.bind(source.clone());
    }
    match filter.leaning {
        Some(Leaning::Left) => query = query.bind(-lean_threshold),
        Some(Leaning::Right) => query = query.bind(lean_threshold),
        Some(Leaning::Center) => query = query.bind(lean_threshold),
        None => {}
    }
    if let Some(q) = &filter.query {
        let pattern = format!("%{}%", q.to_lowercase());
        query = query.bind(pattern.clone()).bind(pattern);
    }

    let page = filter.page.max(1);
    let offset = (page - 1) * PAGE_SIZE;
    query = query.bind(i64::from(PAGE_SIZE) + 1).bind(i64::from(offset));

    let mut rows = query
        .fetch_all(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    let has_more = rows.len() > PAGE_SIZE as usize;
    rows.truncate(PAGE_SIZE as usize);

    Ok((rows, has_more))
}

/// Persist a composite score and confidence on an article.
///
/// Called inside the transaction that read the score set, so the stored
/// composite always corresponds to the score view that produced it.
pub async fn set_composite<'e, E>(
    executor: E,
    id: i64,
    composite: f64,
    confidence: f64,
) -> Result<(), StorageError>
where
    E: sqlx::SqliteExecutor<'e>,
{
    sqlx::query("UPDATE articles SET composite_score = ?, confidence = ? WHERE id = ?")
        .bind(composite)
        .bind(confidence)
        .bind(id)
        .execute(executor)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(())
}

/// Override the composite score manually, preserving the prior confidence.
/// Returns whether the article exists.
pub async fn set_manual_score(pool: &DbPool, id: i64, score: f64) -> Result<bool, StorageError> {
    let result = sqlx::query("UPDATE articles SET composite_score = ? WHERE id = ?")
        .bind(score)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.rows_affected() > 0)
}

/// Adjust an article's confidence by `delta`, clamping to [0, 1].
///
/// A missing confidence is treated as 0. Returns the new confidence, or
/// `None` if the article does not exist.
pub async fn adjust_confidence(
    pool: &DbPool,
    id: i64,
    delta: f64,
) -> Result<Option<f64>, StorageError> {
    sqlx::query_scalar::<_, f64>(
        "UPDATE articles \
         SET confidence = MAX(0.0, MIN(1.0, COALESCE(confidence, 0.0) + ?)) \
         WHERE id = ? \
         RETURNING confidence",
    )
    .bind(delta)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}
