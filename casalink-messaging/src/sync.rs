//! Sync Scheduler
//!
//! Periodic refresh of the active thread and the conversation list. Each
//! watched target gets its own repeating task, scoped to the owning view's
//! lifetime through the returned [`SyncHandle`]: dropping or stopping the
//! handle aborts the task, so navigating away tears the timer down instead
//! of leaving a global one ticking.
//!
//! Per-target rules:
//! - At most one refresh in flight. If the previous refresh has not
//!   resolved when the next tick fires, the tick is skipped — nothing is
//!   queued and the in-flight request is not cancelled.
//! - Results are applied only while their dispatch tag is still current;
//!   the session's generation/sequence guard discards the rest.
//! - Failures are logged and retried on the next tick, never surfaced.
//!   Worst case is a stale view corrected by the next successful pass.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::session::{MessagingSession, PollOutcome};

/// Spawns scoped refresh tasks for session targets.
#[derive(Debug, Clone)]
pub struct SyncScheduler {
    interval: Duration,
}

impl SyncScheduler {
    /// Scheduler with the configured poll interval.
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            interval: config.poll_interval(),
        }
    }

    /// Scheduler with an explicit interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Keep the active thread fresh while the handle lives.
    ///
    /// The first pass runs immediately (load on mount), then one per
    /// interval. Ticks while no thread is selected are no-ops.
    pub fn watch_thread(&self, session: MessagingSession) -> SyncHandle {
        let interval = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match session.poll_thread().await {
                    Ok(PollOutcome::Refreshed) => debug!("active thread refreshed"),
                    Ok(PollOutcome::Skipped) => {
                        debug!("thread refresh still in flight, skipping tick");
                    }
                    Ok(_) => {}
                    Err(error) => warn!("background thread refresh failed: {}", error),
                }
            }
        });
        SyncHandle { task }
    }

    /// Keep the conversation list fresh while the handle lives.
    pub fn watch_conversations(&self, session: MessagingSession) -> SyncHandle {
        let interval = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match session.poll_conversations().await {
                    Ok(PollOutcome::Refreshed) => debug!("conversation list refreshed"),
                    Ok(PollOutcome::Skipped) => {
                        debug!("conversation refresh still in flight, skipping tick");
                    }
                    Ok(_) => {}
                    Err(error) => warn!("background conversation refresh failed: {}", error),
                }
            }
        });
        SyncHandle { task }
    }
}

/// Handle to one repeating refresh task.
///
/// The task is aborted on [`stop`](SyncHandle::stop) and on drop.
#[derive(Debug)]
pub struct SyncHandle {
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Stop the refresh task.
    pub fn stop(self) {
        self.task.abort();
    }

    /// Whether the task has terminated.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::InMemoryBackend;
    use std::sync::Arc;

    async fn session_with_backend(self_id: &str) -> (MessagingSession, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new(self_id));
        let session = MessagingSession::new(backend.clone(), self_id);
        (session, backend)
    }

    #[tokio::test]
    async fn test_watch_conversations_refreshes_on_interval() {
        let (session, backend) = session_with_backend("me").await;
        backend.push_incoming("a", "hi").await;

        let scheduler = SyncScheduler::with_interval(Duration::from_millis(20));
        let handle = scheduler.watch_conversations(session.clone());

        tokio::time::sleep(Duration::from_millis(110)).await;
        handle.stop();

        // Immediate first pass plus several interval passes.
        let calls = backend.calls().await.conversations;
        assert!(calls >= 3, "expected several refreshes, got {}", calls);
        assert_eq!(session.conversations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_watch_thread_picks_up_new_messages() {
        let (session, backend) = session_with_backend("me").await;
        backend.push_incoming("a", "first").await;
        session.select("a").await.unwrap();

        let scheduler = SyncScheduler::with_interval(Duration::from_millis(20));
        let _handle = scheduler.watch_thread(session.clone());

        backend.push_incoming("a", "second").await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(session.thread_messages().await.len(), 2);
    }

    #[tokio::test]
    async fn test_stop_aborts_task_and_polling_ceases() {
        let (session, backend) = session_with_backend("me").await;

        let scheduler = SyncScheduler::with_interval(Duration::from_millis(20));
        let handle = scheduler.watch_conversations(session);

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let calls_after_stop = backend.calls().await.conversations;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.calls().await.conversations, calls_after_stop);
    }

    #[tokio::test]
    async fn test_dropping_handle_aborts_task() {
        let (session, backend) = session_with_backend("me").await;

        let scheduler = SyncScheduler::with_interval(Duration::from_millis(20));
        {
            let _handle = scheduler.watch_conversations(session);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        let calls_after_drop = backend.calls().await.conversations;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.calls().await.conversations, calls_after_drop);
    }

    #[tokio::test]
    async fn test_slow_refresh_skips_ticks_instead_of_queuing() {
        let (session, backend) = session_with_backend("me").await;
        backend.push_incoming("a", "hi").await;
        session.select("a").await.unwrap();
        backend
            .set_thread_delay("a", Duration::from_millis(120))
            .await;
        let calls_at_start = backend.calls().await.threads;

        let scheduler = SyncScheduler::with_interval(Duration::from_millis(20));
        let handle = scheduler.watch_thread(session);

        // ~12 ticks elapse, but each refresh takes ~6 intervals; skipped
        // ticks must not pile up into queued requests.
        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.stop();

        let refreshes = backend.calls().await.threads - calls_at_start;
        assert!(
            refreshes <= 3,
            "expected skipped ticks, got {} refreshes",
            refreshes
        );
    }

    #[tokio::test]
    async fn test_background_failures_are_swallowed_and_retried() {
        let (session, backend) = session_with_backend("me").await;
        backend.push_incoming("a", "hi").await;
        session.select("a").await.unwrap();
        backend.fail_next_thread(500, "flaky upstream").await;

        let scheduler = SyncScheduler::with_interval(Duration::from_millis(20));
        let handle = scheduler.watch_thread(session.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();

        // The failing pass did not kill the loop; later passes succeeded
        // and the thread is still rendered.
        assert!(backend.calls().await.threads >= 2);
        assert_eq!(session.thread_messages().await.len(), 1);
    }
}
