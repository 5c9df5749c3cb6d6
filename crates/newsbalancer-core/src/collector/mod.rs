//! RSS collector: fetches configured feeds and inserts new articles.
//!
//! Fetches are bounded in time and size, parsed with the `rss` crate, and
//! deduplicated on the article URL alone (some feeds rewrite titles, so
//! the URL is the fingerprint). Per-source health is an error streak in
//! the sources table; the collector never triggers analysis itself.

use crate::config::CollectorConfig;
use crate::error::CollectorError;
use crate::storage::articles::NewArticle;
use crate::storage::sources::{Source, UNHEALTHY_STREAK};
use crate::storage::{articles, now_iso, sources, DbPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Summary of one `refresh_all` run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RefreshSummary {
    /// Sources refreshed successfully.
    pub sources_ok: usize,
    /// Sources that failed to fetch or parse.
    pub sources_failed: usize,
    /// New articles inserted across all sources.
    pub articles_inserted: u64,
}

/// Collector over the registered RSS sources.
#[derive(Clone)]
pub struct Collector {
    db: DbPool,
    client: reqwest::Client,
    config: CollectorConfig,
}

impl Collector {
    /// Create a collector with the given limits.
    pub fn new(db: DbPool, config: CollectorConfig) -> Self {
        Self {
            db,
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Refresh every enabled source, bounded to
    /// `max_parallel_fetches` concurrent fetches.
    pub async fn refresh_all(&self) -> Result<RefreshSummary, CollectorError> {
        let enabled = sources::list_sources(&self.db, true).await?;
        if enabled.is_empty() {
            tracing::debug!("no enabled sources to refresh");
            return Ok(RefreshSummary::default());
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_fetches));
        let mut set: JoinSet<(i64, Result<u64, CollectorError>)> = JoinSet::new();

        for source in enabled {
            let collector = self.clone();
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = collector.refresh_source(&source).await;
                (source.id, result)
            });
        }

        let mut summary = RefreshSummary::default();
        while let Some(joined) = set.join_next().await {
            let Ok((source_id, result)) = joined else {
                summary.sources_failed += 1;
                continue;
            };
            match result {
                Ok(inserted) => {
                    summary.sources_ok += 1;
                    summary.articles_inserted += inserted;
                }
                Err(err) => {
                    summary.sources_failed += 1;
                    tracing::warn!(source_id, error = %err, "source refresh failed");
                }
            }
        }

        tracing::info!(
            sources_ok = summary.sources_ok,
            sources_failed = summary.sources_failed,
            articles_inserted = summary.articles_inserted,
            "feed refresh finished"
        );

        Ok(summary)
    }

    /// Refresh one source, maintaining its health streak. Returns the
    /// number of new articles inserted.
    pub async fn refresh_source(&self, source: &Source) -> Result<u64, CollectorError> {
        match self.fetch_and_store(source).await {
            Ok(inserted) => {
                sources::record_success(&self.db, source.id).await?;
                tracing::debug!(
                    source_id = source.id,
                    source = %source.name,
                    inserted,
                    "source refreshed"
                );
                Ok(inserted)
            }
            Err(err) => {
                // A failing streak marks the source unhealthy but leaves it
                // enabled; an admin action clears the streak.
                if let Ok(streak) = sources::record_failure(&self.db, source.id).await {
                    if streak == UNHEALTHY_STREAK {
                        tracing::warn!(
                            source_id = source.id,
                            source = %source.name,
                            streak,
                            "source marked unhealthy"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    async fn fetch_and_store(&self, source: &Source) -> Result<u64, CollectorError> {
        let body = self.fetch_capped(&source.feed_url).await?;
        let channel =
            rss::Channel::read_from(&body[..]).map_err(|e| CollectorError::Parse { source: e })?;

        let mut inserted = 0u64;
        for item in channel.items() {
            let Some(link) = item.link() else {
                continue;
            };

            let article = NewArticle {
                source: source.name.clone(),
                url: link.to_string(),
                title: item.title().unwrap_or("(untitled)").to_string(),
                content: item
                    .content()
                    .or_else(|| item.description())
                    .unwrap_or_default()
                    .to_string(),
                pub_date: item.pub_date().map_or_else(now_iso, str::to_string),
            };

            if articles::insert_article(&self.db, &article).await? {
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    /// Download a feed body, enforcing the deadline and the byte cap.
    async fn fetch_capped(&self, url: &str) -> Result<Vec<u8>, CollectorError> {
        let mut response = self
            .client
            .get(url)
            .timeout(Duration::from_millis(self.config.feed_timeout_ms))
            .send()
            .await
            .map_err(|e| CollectorError::Http { source: e })?
            .error_for_status()
            .map_err(|e| CollectorError::Http { source: e })?;

        let limit = self.config.feed_max_bytes;
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| CollectorError::Http { source: e })?
        {
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(CollectorError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

/// Periodically refresh all sources until cancellation.
pub async fn run_collector_loop(collector: Collector, cancel: CancellationToken) {
    let interval = Duration::from_secs(collector.config.refresh_interval_seconds);
    tracing::info!(interval_secs = interval.as_secs(), "feed collector started");

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("feed collector cancelled");
                return;
            }
            () = tokio::time::sleep(interval) => {}
        }

        if let Err(err) = collector.refresh_all().await {
            tracing::error!(error = %err, "scheduled feed refresh failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_test_db;
    use crate::storage::sources::NewSource;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Wire</title>
    <link>https://example.com</link>
    <description>Test feed</description>
    <item>
      <title>Senate votes on budget</title>
      <link>https://example.com/senate</link>
      <description>Today the Senate voted.</description>
      <pubDate>Sat, 10 Jan 2026 08:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Markets rally</title>
      <link>https://example.com/markets</link>
      <description>Stocks rose.</description>
    </item>
    <item>
      <title>No link, skipped</title>
      <description>Orphan entry.</description>
    </item>
  </channel>
</rss>"#;

    async fn setup(feed_body: &str) -> (MockServer, DbPool, Collector) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/rss+xml")
                    .set_body_string(feed_body.to_string()),
            )
            .mount(&server)
            .await;

        let pool = init_test_db().await.expect("init db");
        sources::insert_source(
            &pool,
            &NewSource {
                name: "Example Wire".to_string(),
                feed_url: format!("{}/feed.xml", server.uri()),
                category: "politics".to_string(),
            },
        )
        .await
        .expect("insert source");

        let collector = Collector::new(pool.clone(), CollectorConfig::default());
        (server, pool, collector)
    }

    #[tokio::test]
    async fn refresh_inserts_new_articles_and_skips_linkless() {
        let (_server, pool, collector) = setup(FEED).await;

        let summary = collector.refresh_all().await.expect("refresh");
        assert_eq!(summary.sources_ok, 1);
        assert_eq!(summary.articles_inserted, 2);

        let (rows, _) = articles::list_articles(&pool, &Default::default(), 0.1)
            .await
            .expect("list");
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn second_refresh_inserts_no_duplicates() {
        let (_server, pool, collector) = setup(FEED).await;

        collector.refresh_all().await.expect("first refresh");
        let summary = collector.refresh_all().await.expect("second refresh");
        assert_eq!(summary.articles_inserted, 0);

        let (rows, _) = articles::list_articles(&pool, &Default::default(), 0.1)
            .await
            .expect("list");
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn refresh_resets_streak_on_success() {
        let (_server, pool, collector) = setup(FEED).await;
        for _ in 0..3 {
            sources::record_failure(&pool, 1).await.expect("failure");
        }

        collector.refresh_all().await.expect("refresh");

        let source = sources::get_source(&pool, 1)
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(source.error_streak, 0);
        assert!(source.last_success.is_some());
    }

    #[tokio::test]
    async fn unparseable_feed_increments_streak() {
        let (_server, pool, collector) = setup("this is not xml").await;

        let summary = collector.refresh_all().await.expect("refresh");
        assert_eq!(summary.sources_failed, 1);

        let source = sources::get_source(&pool, 1)
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(source.error_streak, 1);
    }

    #[tokio::test]
    async fn oversized_feed_is_rejected() {
        let (_server, pool, _) = setup(FEED).await;
        let config = CollectorConfig {
            feed_max_bytes: 64,
            ..CollectorConfig::default()
        };
        let collector = Collector::new(pool.clone(), config);

        let source = sources::get_source(&pool, 1)
            .await
            .expect("get")
            .expect("exists");
        let err = collector
            .refresh_source(&source)
            .await
            .expect_err("too large");
        assert!(matches!(err, CollectorError::TooLarge { limit: 64 }));
    }

    #[tokio::test]
    async fn http_error_counts_as_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let pool = init_test_db().await.expect("init db");
        sources::insert_source(
            &pool,
            &NewSource {
                name: "Broken Wire".to_string(),
                feed_url: format!("{}/feed.xml", server.uri()),
                category: String::new(),
            },
        )
        .await
        .expect("insert source");

        let collector = Collector::new(pool.clone(), CollectorConfig::default());
        let summary = collector.refresh_all().await.expect("refresh");
        assert_eq!(summary.sources_failed, 1);
    }
}
