//! Per-article analysis progress registry with subscriber fan-out.
//!
//! The ensemble orchestrator is the single writer per article; SSE handlers
//! subscribe for updates. Publishing never blocks: each article has a
//! bounded broadcast channel and slow subscribers lose the oldest events,
//! observed on their side as a dropped-events marker. A timer-driven reaper
//! removes terminal states after the retention window.

use crate::error::ErrorKind;
use crate::storage::now_iso;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Broadcast capacity per article; overflow drops the oldest event.
const CHANNEL_CAPACITY: usize = 16;

/// Lifecycle status of one article analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
pub enum AnalysisStatus {
    /// Accepted, not yet started.
    Queued,
    /// Perspectives are being scored.
    InProgress,
    /// Finished; the composite is persisted.
    Complete,
    /// Failed fatally or canceled.
    Error,
}

impl AnalysisStatus {
    /// Whether this status ends the stream.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::InProgress => 1,
            Self::Complete | Self::Error => 2,
        }
    }
}

/// Error detail attached to a terminal `Error` state.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressErrorInfo {
    /// Stable error code.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Provider retry hint, when one applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Observable state of one article analysis.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressState {
    /// The article under analysis.
    pub article_id: i64,
    /// Current step description (e.g. "ensemble: left 2/3").
    pub step: String,
    /// Completion percent, 0-100, non-decreasing.
    pub percent: u8,
    /// Lifecycle status.
    pub status: AnalysisStatus,
    /// Final composite, set on `Complete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    /// Failure detail, set on `Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProgressErrorInfo>,
    /// ISO-8601 timestamp of the last update.
    pub updated_at: String,
}

impl ProgressState {
    /// A fresh `Queued` state.
    pub fn queued(article_id: i64) -> Self {
        Self {
            article_id,
            step: "queued".to_string(),
            percent: 0,
            status: AnalysisStatus::Queued,
            final_score: None,
            error: None,
            updated_at: now_iso(),
        }
    }

    /// An `InProgress` tick.
    pub fn in_progress(article_id: i64, step: impl Into<String>, percent: u8) -> Self {
        Self {
            article_id,
            step: step.into(),
            percent: percent.min(100),
            status: AnalysisStatus::InProgress,
            final_score: None,
            error: None,
            updated_at: now_iso(),
        }
    }

    /// A terminal `Complete` state carrying the composite.
    pub fn complete(article_id: i64, final_score: f64) -> Self {
        Self {
            article_id,
            step: "complete".to_string(),
            percent: 100,
            status: AnalysisStatus::Complete,
            final_score: Some(final_score),
            error: None,
            updated_at: now_iso(),
        }
    }

    /// A terminal `Error` state.
    pub fn error(article_id: i64, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            article_id,
            step: "error".to_string(),
            percent: 0,
            status: AnalysisStatus::Error,
            final_score: None,
            error: Some(ProgressErrorInfo {
                kind,
                message: message.into(),
                retry_after_secs: None,
            }),
            updated_at: now_iso(),
        }
    }

    /// Attach a retry hint to an `Error` state.
    pub fn with_retry_after(mut self, secs: Option<u64>) -> Self {
        if let Some(info) = self.error.as_mut() {
            info.retry_after_secs = secs;
        }
        self
    }
}

/// An event observed by a subscriber.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A state update, delivered in publish order.
    Update(ProgressState),
    /// The subscriber lagged and `missed` older events were dropped.
    Dropped {
        /// Number of events lost to overflow.
        missed: u64,
    },
}

/// A subscription to one article's progress events.
pub struct ProgressStream {
    rx: broadcast::Receiver<ProgressState>,
}

impl ProgressStream {
    /// Receive the next event. Returns `None` once the article's entry is
    /// reaped and no events remain.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        match self.rx.recv().await {
            Ok(state) => Some(ProgressEvent::Update(state)),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                Some(ProgressEvent::Dropped { missed })
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

struct Entry {
    state: Option<ProgressState>,
    tx: broadcast::Sender<ProgressState>,
    terminal_at: Option<Instant>,
}

impl Entry {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            state: None,
            tx,
            terminal_at: None,
        }
    }
}

/// Registry of per-article progress states and their subscribers.
pub struct ProgressManager {
    entries: RwLock<HashMap<i64, Entry>>,
    retention: Duration,
}

impl ProgressManager {
    /// Create a manager retaining terminal states for `retention`.
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Upsert an article's state and broadcast it to subscribers.
    ///
    /// Enforces the status machine Queued → InProgress → {Complete | Error}
    /// (with the Queued → Error shortcut); a violating publish is dropped.
    /// A percent lower than the last published value is clamped up to it.
    /// A `Queued` publish after a terminal state starts a new analysis
    /// generation for the article.
    pub fn publish(&self, mut update: ProgressState) {
        let mut entries = self.lock_write();
        let entry = entries.entry(update.article_id).or_insert_with(Entry::new);

        if let Some(current) = &entry.state {
            let restart =
                current.status.is_terminal() && update.status == AnalysisStatus::Queued;
            if restart {
                entry.terminal_at = None;
            } else {
                if !transition_allowed(current.status, update.status) {
                    tracing::warn!(
                        article_id = update.article_id,
                        from = ?current.status,
                        to = ?update.status,
                        "dropping progress publish that violates status transitions"
                    );
                    return;
                }
                if update.percent < current.percent {
                    update.percent = current.percent;
                }
            }
        } else if update.status == AnalysisStatus::Complete {
            tracing::warn!(
                article_id = update.article_id,
                "dropping Complete publish for article never queued"
            );
            return;
        }

        if update.status.is_terminal() {
            entry.terminal_at = Some(Instant::now());
        }
        entry.state = Some(update.clone());

        // Send errors only mean there are no subscribers right now.
        let _ = entry.tx.send(update);
    }

    /// Subscribe to an article's progress. Returns the current state (if
    /// any) and a stream of subsequent events.
    pub fn subscribe(&self, article_id: i64) -> (Option<ProgressState>, ProgressStream) {
        let mut entries = self.lock_write();
        let entry = entries.entry(article_id).or_insert_with(Entry::new);

        (
            entry.state.clone(),
            ProgressStream {
                rx: entry.tx.subscribe(),
            },
        )
    }

    /// Point-in-time state for polling. `None` when unknown or reaped.
    pub fn snapshot(&self, article_id: i64) -> Option<ProgressState> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&article_id)
            .and_then(|e| e.state.clone())
    }

    /// Remove terminal entries older than the retention window, closing any
    /// lingering subscriber streams. Returns the number reaped.
    pub fn reap(&self) -> usize {
        let mut entries = self.lock_write();
        let retention = self.retention;
        let before = entries.len();

        entries.retain(|_, entry| match entry.terminal_at {
            Some(at) => at.elapsed() < retention,
            None => true,
        });

        before - entries.len()
    }

    /// Number of tracked articles (terminal states included until reaped).
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether no articles are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<i64, Entry>> {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn transition_allowed(from: AnalysisStatus, to: AnalysisStatus) -> bool {
    if from.rank() >= AnalysisStatus::Complete.rank() {
        // Exactly one terminal event per analysis.
        return false;
    }
    match (from, to) {
        // Queued may restart as Queued (re-publish) or advance; the only
        // terminal reachable directly from Queued is the Error shortcut.
        (AnalysisStatus::Queued, AnalysisStatus::Complete) => false,
        _ => to.rank() >= from.rank(),
    }
}

/// Periodically reap terminal progress entries until cancellation.
pub async fn run_reaper_loop(
    manager: std::sync::Arc<ProgressManager>,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs(), "progress reaper started");

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("progress reaper cancelled");
                return;
            }
            () = tokio::time::sleep(interval) => {}
        }

        let reaped = manager.reap();
        if reaped > 0 {
            tracing::debug!(reaped, "reaped terminal progress states");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ProgressManager {
        ProgressManager::new(Duration::from_secs(900))
    }

    #[tokio::test]
    async fn subscribers_see_updates_in_publish_order() {
        let mgr = manager();
        let (snapshot, mut stream) = mgr.subscribe(1);
        assert!(snapshot.is_none());

        mgr.publish(ProgressState::queued(1));
        mgr.publish(ProgressState::in_progress(1, "ensemble: left 1/3", 33));
        mgr.publish(ProgressState::complete(1, -0.0667));

        let first = stream.next().await.expect("queued");
        let second = stream.next().await.expect("tick");
        let third = stream.next().await.expect("terminal");

        match (first, second, third) {
            (
                ProgressEvent::Update(a),
                ProgressEvent::Update(b),
                ProgressEvent::Update(c),
            ) => {
                assert_eq!(a.status, AnalysisStatus::Queued);
                assert_eq!(b.percent, 33);
                assert_eq!(c.status, AnalysisStatus::Complete);
                assert_eq!(c.final_score, Some(-0.0667));
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn percent_regressions_are_clamped() {
        let mgr = manager();
        mgr.publish(ProgressState::queued(1));
        mgr.publish(ProgressState::in_progress(1, "a", 60));
        mgr.publish(ProgressState::in_progress(1, "b", 40));

        let state = mgr.snapshot(1).expect("state");
        assert_eq!(state.percent, 60);
        assert_eq!(state.step, "b");
    }

    #[tokio::test]
    async fn second_terminal_publish_is_dropped() {
        let mgr = manager();
        mgr.publish(ProgressState::queued(1));
        mgr.publish(ProgressState::in_progress(1, "a", 50));
        mgr.publish(ProgressState::complete(1, 0.2));
        mgr.publish(ProgressState::error(1, ErrorKind::Unknown, "late"));

        let state = mgr.snapshot(1).expect("state");
        assert_eq!(state.status, AnalysisStatus::Complete);
    }

    #[tokio::test]
    async fn requeue_after_terminal_starts_a_new_generation() {
        let mgr = manager();
        mgr.publish(ProgressState::queued(1));
        mgr.publish(ProgressState::in_progress(1, "a", 100));
        mgr.publish(ProgressState::complete(1, 0.2));

        // A re-analysis resets the entry instead of being dropped.
        mgr.publish(ProgressState::queued(1));
        let state = mgr.snapshot(1).expect("state");
        assert_eq!(state.status, AnalysisStatus::Queued);
        assert_eq!(state.percent, 0, "percent clamp does not span generations");

        mgr.publish(ProgressState::in_progress(1, "b", 50));
        mgr.publish(ProgressState::complete(1, -0.3));
        let state = mgr.snapshot(1).expect("state");
        assert_eq!(state.final_score, Some(-0.3));
    }

    #[tokio::test]
    async fn queued_to_complete_requires_in_progress() {
        let mgr = manager();
        mgr.publish(ProgressState::queued(1));
        mgr.publish(ProgressState::complete(1, 0.2));

        let state = mgr.snapshot(1).expect("state");
        assert_eq!(state.status, AnalysisStatus::Queued);
    }

    #[tokio::test]
    async fn queued_to_error_shortcut_is_allowed() {
        let mgr = manager();
        mgr.publish(ProgressState::queued(1));
        mgr.publish(ProgressState::error(1, ErrorKind::InputInvalid, "empty content"));

        let state = mgr.snapshot(1).expect("state");
        assert_eq!(state.status, AnalysisStatus::Error);
        assert_eq!(state.error.as_ref().expect("error").kind, ErrorKind::InputInvalid);
    }

    #[tokio::test]
    async fn late_subscriber_still_receives_terminal() {
        let mgr = manager();
        mgr.publish(ProgressState::queued(1));
        mgr.publish(ProgressState::in_progress(1, "a", 50));

        // Subscribes mid-run: misses earlier ticks, sees the snapshot and
        // the terminal event.
        let (snapshot, mut stream) = mgr.subscribe(1);
        assert_eq!(snapshot.expect("snapshot").percent, 50);

        mgr.publish(ProgressState::complete(1, 0.1));
        match stream.next().await.expect("terminal") {
            ProgressEvent::Update(state) => assert_eq!(state.status, AnalysisStatus::Complete),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_subscriber_observes_drop_marker() {
        let mgr = manager();
        let (_, mut stream) = mgr.subscribe(1);

        mgr.publish(ProgressState::queued(1));
        for pct in 0..CHANNEL_CAPACITY as u8 + 4 {
            mgr.publish(ProgressState::in_progress(1, "tick", pct));
        }

        match stream.next().await.expect("event") {
            ProgressEvent::Dropped { missed } => assert!(missed >= 1),
            other => panic!("expected drop marker, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reap_removes_terminal_entries_and_closes_streams() {
        let mgr = ProgressManager::new(Duration::from_millis(0));
        mgr.publish(ProgressState::queued(1));
        mgr.publish(ProgressState::in_progress(1, "a", 50));

        let (_, mut stream) = mgr.subscribe(1);
        mgr.publish(ProgressState::complete(1, 0.1));

        // Zero retention: the sweep removes the entry immediately.
        assert_eq!(mgr.reap(), 1);
        assert!(mgr.snapshot(1).is_none());

        // The buffered terminal event still drains, then the stream ends.
        match stream.next().await.expect("terminal") {
            ProgressEvent::Update(state) => assert_eq!(state.status, AnalysisStatus::Complete),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn reap_keeps_in_flight_entries() {
        let mgr = ProgressManager::new(Duration::from_millis(0));
        mgr.publish(ProgressState::queued(1));

        assert_eq!(mgr.reap(), 0);
        assert!(mgr.snapshot(1).is_some());
    }
}
