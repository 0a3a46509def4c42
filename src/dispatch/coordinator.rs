//! Dispatch coordination: deduplication, retry with backoff, cancellation.
//!
//! At most one dispatch request is ever issued per meeting id. The external
//! call runs in a background task so a slow dispatcher never delays the
//! caller's join; the final outcome is delivered to the owning session
//! through an event channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::dispatcher::AgentDispatcher;

/// Status of the agent dispatch for one meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    NotRequested,
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

impl DispatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRequested => "not_requested",
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Final outcome of a dispatch request, after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Succeeded,
    Failed,
}

/// Event delivered to the session layer when a dispatch resolves.
#[derive(Debug, Clone)]
pub struct DispatchEvent {
    pub meeting_id: String,
    pub outcome: DispatchOutcome,
}

/// Retry policy for the external dispatch call.
#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    /// Total attempts before giving up.
    pub max_attempts: u32,
    /// Timeout applied to each individual attempt.
    pub attempt_timeout: Duration,
    /// First backoff delay; doubles on every retry (1s, 2s, 4s, ...).
    pub backoff_base: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// In-flight or resolved dispatch tracking for one meeting.
#[derive(Debug, Clone)]
struct DispatchAttempt {
    status: DispatchStatus,
    attempt: u32,
    started_at: DateTime<Utc>,
}

/// Wraps the external [`AgentDispatcher`] with per-meeting deduplication,
/// bounded retry, and cancellation.
pub struct DispatchCoordinator {
    dispatcher: Arc<dyn AgentDispatcher>,
    policy: DispatchPolicy,
    attempts: Arc<Mutex<HashMap<String, DispatchAttempt>>>,
    events: mpsc::Sender<DispatchEvent>,
}

impl DispatchCoordinator {
    pub fn new(
        dispatcher: Arc<dyn AgentDispatcher>,
        policy: DispatchPolicy,
        events: mpsc::Sender<DispatchEvent>,
    ) -> Self {
        Self {
            dispatcher,
            policy,
            attempts: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    /// Request an agent for a meeting.
    ///
    /// Returns once the request is tracked; the external call and its
    /// retries run in a background task. Calling again for the same meeting
    /// is a no-op regardless of how the first request ended.
    pub async fn connect(&self, meeting_id: &str) {
        {
            let mut attempts = self.attempts.lock().await;
            if let Some(existing) = attempts.get(meeting_id) {
                debug!(
                    "Dispatch for meeting {} already {}, not re-issuing",
                    meeting_id,
                    existing.status.as_str()
                );
                return;
            }

            attempts.insert(
                meeting_id.to_string(),
                DispatchAttempt {
                    status: DispatchStatus::Pending,
                    attempt: 0,
                    started_at: Utc::now(),
                },
            );
        }

        info!("Dispatching agent for meeting {}", meeting_id);

        let dispatcher = Arc::clone(&self.dispatcher);
        let attempts = Arc::clone(&self.attempts);
        let events = self.events.clone();
        let policy = self.policy;
        let meeting_id = meeting_id.to_string();

        tokio::spawn(async move {
            Self::run_attempts(dispatcher, policy, attempts, events, meeting_id).await;
        });
    }

    /// Stop tracking a pending dispatch for a meeting.
    ///
    /// The retry loop stops scheduling further attempts and a late-arriving
    /// outcome is discarded. An attempt the external dispatcher already
    /// accepted cannot be recalled; the agent may still join.
    pub async fn cancel(&self, meeting_id: &str) {
        let mut attempts = self.attempts.lock().await;
        match attempts.get_mut(meeting_id) {
            Some(entry) if entry.status == DispatchStatus::Pending => {
                entry.status = DispatchStatus::Cancelled;
                info!("Cancelled pending agent dispatch for meeting {}", meeting_id);
            }
            Some(entry) => {
                debug!(
                    "Cancel for meeting {} ignored, dispatch already {}",
                    meeting_id,
                    entry.status.as_str()
                );
            }
            None => {
                debug!("Cancel for meeting {} ignored, no dispatch tracked", meeting_id);
            }
        }
    }

    /// Drop all tracking state for a meeting. Called when the session is
    /// evicted from the registry.
    pub async fn forget(&self, meeting_id: &str) {
        if self.attempts.lock().await.remove(meeting_id).is_some() {
            debug!("Dropped dispatch tracking for meeting {}", meeting_id);
        }
    }

    /// Current tracked status for a meeting, if any.
    pub async fn status(&self, meeting_id: &str) -> Option<DispatchStatus> {
        self.attempts
            .lock()
            .await
            .get(meeting_id)
            .map(|entry| entry.status)
    }

    async fn run_attempts(
        dispatcher: Arc<dyn AgentDispatcher>,
        policy: DispatchPolicy,
        attempts: Arc<Mutex<HashMap<String, DispatchAttempt>>>,
        events: mpsc::Sender<DispatchEvent>,
        meeting_id: String,
    ) {
        let mut attempt: u32 = 1;
        loop {
            {
                let mut map = attempts.lock().await;
                match map.get_mut(&meeting_id) {
                    Some(entry) if entry.status == DispatchStatus::Pending => {
                        entry.attempt = attempt;
                    }
                    _ => {
                        debug!(
                            "Dispatch for meeting {} no longer pending, stopping retries",
                            meeting_id
                        );
                        return;
                    }
                }
            }

            match timeout(policy.attempt_timeout, dispatcher.connect_agent(&meeting_id)).await {
                Ok(Ok(())) => {
                    Self::resolve(&attempts, &events, &meeting_id, DispatchOutcome::Succeeded)
                        .await;
                    return;
                }
                Ok(Err(e)) => {
                    warn!(
                        "Agent dispatch attempt {}/{} for meeting {} failed: {}",
                        attempt, policy.max_attempts, meeting_id, e
                    );
                }
                Err(_) => {
                    warn!(
                        "Agent dispatch attempt {}/{} for meeting {} timed out after {:?}",
                        attempt, policy.max_attempts, meeting_id, policy.attempt_timeout
                    );
                }
            }

            if attempt >= policy.max_attempts {
                error!(
                    "Agent dispatch for meeting {} exhausted {} attempts, agent will not join",
                    meeting_id, policy.max_attempts
                );
                Self::resolve(&attempts, &events, &meeting_id, DispatchOutcome::Failed).await;
                return;
            }

            // Exponential backoff: base, 2x base, 4x base, ...
            let delay = policy.backoff_base * (1 << (attempt - 1));
            sleep(delay).await;
            attempt += 1;
        }
    }

    async fn resolve(
        attempts: &Mutex<HashMap<String, DispatchAttempt>>,
        events: &mpsc::Sender<DispatchEvent>,
        meeting_id: &str,
        outcome: DispatchOutcome,
    ) {
        {
            let mut map = attempts.lock().await;
            match map.get_mut(meeting_id) {
                Some(entry) if entry.status == DispatchStatus::Cancelled => {
                    // Documented race: the external dispatcher may already
                    // have accepted the agent for a meeting that has ended.
                    warn!(
                        "Discarding {:?} dispatch outcome for cancelled meeting {} \
                         (agent may still attach externally)",
                        outcome, meeting_id
                    );
                    return;
                }
                Some(entry) => {
                    entry.status = match outcome {
                        DispatchOutcome::Succeeded => DispatchStatus::Succeeded,
                        DispatchOutcome::Failed => DispatchStatus::Failed,
                    };
                    let elapsed = Utc::now() - entry.started_at;
                    info!(
                        "Dispatch for meeting {} resolved {:?} after {} attempt(s) in {}ms",
                        meeting_id,
                        outcome,
                        entry.attempt,
                        elapsed.num_milliseconds()
                    );
                }
                None => {
                    debug!(
                        "Dispatch outcome for meeting {} arrived after tracking was dropped",
                        meeting_id
                    );
                    return;
                }
            }
        }

        let event = DispatchEvent {
            meeting_id: meeting_id.to_string(),
            outcome,
        };
        if events.send(event).await.is_err() {
            debug!("No listener for dispatch events, outcome not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Dispatcher that fails a fixed number of times before succeeding.
    struct ScriptedDispatcher {
        calls: AtomicU32,
        failures_before_success: u32,
        delay: Duration,
    }

    impl ScriptedDispatcher {
        fn new(failures_before_success: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures_before_success,
                delay: Duration::ZERO,
            }
        }

        fn with_delay(failures_before_success: u32, delay: Duration) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures_before_success,
                delay,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AgentDispatcher for ScriptedDispatcher {
        async fn connect_agent(&self, meeting_id: &str) -> Result<(), DispatchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            if call < self.failures_before_success {
                Err(DispatchError {
                    meeting_id: meeting_id.to_string(),
                    reason: "simulated failure".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn fast_policy() -> DispatchPolicy {
        DispatchPolicy {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(1),
            backoff_base: Duration::from_millis(1),
        }
    }

    fn build(
        dispatcher: Arc<ScriptedDispatcher>,
        policy: DispatchPolicy,
    ) -> (DispatchCoordinator, mpsc::Receiver<DispatchEvent>) {
        let (tx, rx) = mpsc::channel(8);
        (DispatchCoordinator::new(dispatcher, policy, tx), rx)
    }

    async fn expect_event(rx: &mut mpsc::Receiver<DispatchEvent>) -> DispatchEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for dispatch event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(0));
        let (coordinator, mut rx) = build(dispatcher.clone(), fast_policy());

        coordinator.connect("m1").await;
        let event = expect_event(&mut rx).await;

        assert_eq!(event.meeting_id, "m1");
        assert_eq!(event.outcome, DispatchOutcome::Succeeded);
        assert_eq!(dispatcher.calls(), 1);
        assert_eq!(
            coordinator.status("m1").await,
            Some(DispatchStatus::Succeeded)
        );
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(2));
        let (coordinator, mut rx) = build(dispatcher.clone(), fast_policy());

        coordinator.connect("m1").await;
        let event = expect_event(&mut rx).await;

        assert_eq!(event.outcome, DispatchOutcome::Succeeded);
        assert_eq!(dispatcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausts_attempts_and_fails() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(u32::MAX));
        let (coordinator, mut rx) = build(dispatcher.clone(), fast_policy());

        coordinator.connect("m1").await;
        let event = expect_event(&mut rx).await;

        assert_eq!(event.outcome, DispatchOutcome::Failed);
        assert_eq!(dispatcher.calls(), 3);
        assert_eq!(coordinator.status("m1").await, Some(DispatchStatus::Failed));
    }

    #[tokio::test]
    async fn test_connect_deduplicates() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(0));
        let (coordinator, mut rx) = build(dispatcher.clone(), fast_policy());

        coordinator.connect("m1").await;
        coordinator.connect("m1").await;
        coordinator.connect("m1").await;

        let _ = expect_event(&mut rx).await;
        // No second event; the channel stays empty.
        assert!(
            timeout(Duration::from_millis(200), rx.recv()).await.is_err(),
            "dedup must not produce a second event"
        );
        assert_eq!(dispatcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_connect_after_failure_is_not_reissued() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(u32::MAX));
        let (coordinator, mut rx) = build(dispatcher.clone(), fast_policy());

        coordinator.connect("m1").await;
        let _ = expect_event(&mut rx).await;
        let calls_after_failure = dispatcher.calls();

        coordinator.connect("m1").await;
        sleep(Duration::from_millis(100)).await;
        assert_eq!(dispatcher.calls(), calls_after_failure);
    }

    #[tokio::test]
    async fn test_cancel_discards_late_outcome() {
        // The attempt takes 200ms; cancellation lands first.
        let dispatcher = Arc::new(ScriptedDispatcher::with_delay(
            0,
            Duration::from_millis(200),
        ));
        let (coordinator, mut rx) = build(dispatcher.clone(), fast_policy());

        coordinator.connect("m1").await;
        sleep(Duration::from_millis(20)).await;
        coordinator.cancel("m1").await;

        assert!(
            timeout(Duration::from_millis(500), rx.recv()).await.is_err(),
            "outcome after cancel must be discarded"
        );
        assert_eq!(
            coordinator.status("m1").await,
            Some(DispatchStatus::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_cancel_stops_retry_loop() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(u32::MAX));
        let policy = DispatchPolicy {
            max_attempts: 5,
            attempt_timeout: Duration::from_secs(1),
            backoff_base: Duration::from_millis(100),
        };
        let (coordinator, _rx) = build(dispatcher.clone(), policy);

        coordinator.connect("m1").await;
        // First attempt fails immediately; cancel during the first backoff.
        sleep(Duration::from_millis(30)).await;
        coordinator.cancel("m1").await;
        sleep(Duration::from_millis(300)).await;

        assert_eq!(dispatcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_without_dispatch_is_noop() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(0));
        let (coordinator, _rx) = build(dispatcher, fast_policy());

        coordinator.cancel("never-dispatched").await;
        assert_eq!(coordinator.status("never-dispatched").await, None);
    }

    #[tokio::test]
    async fn test_forget_drops_tracking() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(0));
        let (coordinator, mut rx) = build(dispatcher, fast_policy());

        coordinator.connect("m1").await;
        let _ = expect_event(&mut rx).await;
        coordinator.forget("m1").await;
        assert_eq!(coordinator.status("m1").await, None);
    }

    #[test]
    fn test_dispatch_status_as_str() {
        assert_eq!(DispatchStatus::NotRequested.as_str(), "not_requested");
        assert_eq!(DispatchStatus::Pending.as_str(), "pending");
        assert_eq!(DispatchStatus::Succeeded.as_str(), "succeeded");
        assert_eq!(DispatchStatus::Failed.as_str(), "failed");
        assert_eq!(DispatchStatus::Cancelled.as_str(), "cancelled");
    }

    #[test]
    fn test_dispatch_status_serialization() {
        let json = serde_json::to_string(&DispatchStatus::NotRequested).unwrap();
        assert_eq!(json, "\"not_requested\"");

        let parsed: DispatchStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, DispatchStatus::Cancelled);
    }
}
