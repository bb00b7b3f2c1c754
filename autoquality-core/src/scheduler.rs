//! Debounced, single-flight trigger scheduler.
//!
//! Holds the only process-wide mutable state of the engine: one pending
//! timer and one in-flight flag. Every trigger re-arms the same timer, so a
//! burst of triggers collapses into one attempt, and an attempt requested
//! while another is executing is dropped rather than queued.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::attempt::{AttemptOutcome, AttemptReport, QualityAutomation};

/// Capacity of the outcome broadcast channel.
const OUTCOME_CHANNEL_CAPACITY: usize = 64;

/// Why an attempt was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerReason {
    InitialLoad,
    VideoAdded,
    LocationChanged { location: String },
    /// Explicit request, e.g. from a page action.
    Manual,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerReason::InitialLoad => write!(f, "initial load"),
            TriggerReason::VideoAdded => write!(f, "video added"),
            TriggerReason::LocationChanged { location } => write!(f, "navigated to {location}"),
            TriggerReason::Manual => write!(f, "manual"),
        }
    }
}

/// Counters describing scheduler activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Calls to `schedule_attempt`.
    pub requested: u64,
    /// Pipeline invocations that ran business logic.
    pub executed: u64,
    /// Pipeline invocations dropped because one was in flight.
    pub skipped: u64,
}

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct SchedulerInner {
    automation: QualityAutomation,
    pending: Mutex<Option<PendingTimer>>,
    in_flight: AtomicBool,
    generation: AtomicU64,
    requested: AtomicU64,
    executed: AtomicU64,
    skipped: AtomicU64,
    outcomes: broadcast::Sender<AttemptOutcome>,
}

/// Releases the in-flight flag when dropped, including on unwind.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives the selection pipeline in response to page triggers.
///
/// Cheap to clone; clones share the same timer and in-flight flag.
#[derive(Clone)]
pub struct TriggerScheduler {
    inner: Arc<SchedulerInner>,
}

impl TriggerScheduler {
    /// Creates an idle scheduler around the given pipeline.
    pub fn new(automation: QualityAutomation) -> Self {
        let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(SchedulerInner {
                automation,
                pending: Mutex::new(None),
                in_flight: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                requested: AtomicU64::new(0),
                executed: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
                outcomes,
            }),
        }
    }

    /// Arms the timer to run the pipeline after `delay`.
    ///
    /// Any timer that has not fired yet is cancelled and replaced. An attempt
    /// that is already executing is not affected.
    pub fn schedule_attempt(&self, delay: Duration, reason: TriggerReason) {
        self.inner.requested.fetch_add(1, Ordering::Relaxed);
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;

        let mut pending = self.inner.pending.lock();
        if let Some(previous) = pending.take() {
            tracing::trace!(replaced = previous.generation, "Re-arming attempt timer");
            previous.handle.abort();
        }

        tracing::debug!(delay_ms = delay.as_millis() as u64, %reason, "Scheduling quality attempt");

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            sleep(delay).await;

            {
                let mut pending = inner.pending.lock();
                match pending.as_ref() {
                    Some(timer) if timer.generation == generation => *pending = None,
                    _ => return,
                }
            }

            tracing::debug!(%reason, "Attempt timer fired");
            inner.run_pipeline().await;
        });

        *pending = Some(PendingTimer { generation, handle });
    }

    /// Runs the pipeline immediately, unless an attempt is in flight.
    pub async fn run_now(&self) -> AttemptReport {
        self.inner.run_pipeline().await
    }

    /// Cancels the pending timer, if any.
    pub fn cancel_pending(&self) {
        if let Some(timer) = self.inner.pending.lock().take() {
            timer.handle.abort();
        }
    }

    pub fn has_pending(&self) -> bool {
        self.inner.pending.lock().is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            requested: self.inner.requested.load(Ordering::Relaxed),
            executed: self.inner.executed.load(Ordering::Relaxed),
            skipped: self.inner.skipped.load(Ordering::Relaxed),
        }
    }

    /// Subscribes to the outcome of every executed attempt.
    pub fn subscribe(&self) -> broadcast::Receiver<AttemptOutcome> {
        self.inner.outcomes.subscribe()
    }
}

impl SchedulerInner {
    async fn run_pipeline(&self) -> AttemptReport {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            let skipped = self.skipped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(skipped, "Attempt already in flight, dropping request");
            return AttemptReport::skipped(0);
        };

        let number = self.executed.fetch_add(1, Ordering::Relaxed) + 1;
        let report = self.automation.execute(number).await;

        // No receivers is fine.
        let _ = self.outcomes.send(report.outcome.clone());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettingsStore;
    use crate::test_mocks::ScriptedMenu;
    use crate::AutoQualityConfig;

    fn scheduler(menu: &Arc<ScriptedMenu>) -> TriggerScheduler {
        TriggerScheduler::new(QualityAutomation::new(
            menu.clone(),
            Arc::new(MemorySettingsStore::new()),
            AutoQualityConfig::for_testing().menu,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_attempt_with_latest_delay() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["1080p", "720p"]));
        let scheduler = scheduler(&menu);

        scheduler.schedule_attempt(Duration::from_millis(500), TriggerReason::InitialLoad);
        scheduler.schedule_attempt(Duration::from_millis(200), TriggerReason::VideoAdded);
        assert!(scheduler.has_pending());

        sleep(Duration::from_millis(150)).await;
        assert_eq!(scheduler.stats().executed, 0);

        sleep(Duration::from_millis(150)).await;
        assert_eq!(scheduler.stats().executed, 1);
        assert!(!scheduler.has_pending());

        sleep(Duration::from_secs(2)).await;
        let stats = scheduler.stats();
        assert_eq!(stats.requested, 2);
        assert_eq!(stats.executed, 1);
        assert_eq!(menu.selected(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_rearm_pushes_the_deadline_back() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["720p"]));
        let scheduler = scheduler(&menu);

        for _ in 0..5 {
            scheduler.schedule_attempt(Duration::from_millis(100), TriggerReason::VideoAdded);
            sleep(Duration::from_millis(60)).await;
        }
        assert_eq!(scheduler.stats().executed, 0);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(scheduler.stats().executed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invocation_while_in_flight_has_no_side_effects() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["1080p", "720p"]));
        menu.set_query_delay(Duration::from_millis(500));
        let scheduler = scheduler(&menu);

        let running = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_now().await })
        };
        sleep(Duration::from_millis(100)).await;
        assert!(scheduler.is_in_flight());

        let clicks_before = menu.clicks().len();
        let queries_before = menu.quality_row_queries();
        let dropped = scheduler.run_now().await;

        assert_eq!(dropped.outcome, AttemptOutcome::Skipped);
        assert!(dropped.cleanup.is_none());
        assert_eq!(menu.clicks().len(), clicks_before);
        assert_eq!(menu.quality_row_queries(), queries_before);
        assert_eq!(scheduler.stats().skipped, 1);

        let finished = running.await.unwrap();
        assert!(finished.outcome.is_satisfied());
        assert!(!scheduler.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_flag_released_after_failure() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["1080p"]));
        menu.panic_on_quality_rows();
        let scheduler = scheduler(&menu);

        let report = scheduler.run_now().await;
        assert!(matches!(report.outcome, AttemptOutcome::Failed { .. }));
        assert!(!scheduler.is_in_flight());

        let again = scheduler.run_now().await;
        assert_ne!(again.outcome, AttemptOutcome::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_attempt_survives_panicking_video_check() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["720p"]));
        menu.panic_on_has_video();
        let scheduler = scheduler(&menu);
        let mut outcomes = scheduler.subscribe();

        scheduler.schedule_attempt(Duration::from_millis(50), TriggerReason::VideoAdded);
        let outcome = outcomes.recv().await.unwrap();

        assert!(matches!(outcome, AttemptOutcome::Failed { .. }));
        assert!(!scheduler.is_in_flight());
        assert_eq!(scheduler.stats().executed, 1);
        assert_ne!(scheduler.run_now().await.outcome, AttemptOutcome::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_prevents_attempt() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["720p"]));
        let scheduler = scheduler(&menu);

        scheduler.schedule_attempt(Duration::from_millis(100), TriggerReason::Manual);
        scheduler.cancel_pending();
        sleep(Duration::from_secs(1)).await;

        assert_eq!(scheduler.stats().executed, 0);
        assert!(menu.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcomes_are_broadcast() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["720p", "480p"]));
        let scheduler = scheduler(&menu);
        let mut outcomes = scheduler.subscribe();

        scheduler.schedule_attempt(Duration::from_millis(50), TriggerReason::InitialLoad);
        let outcome = outcomes.recv().await.unwrap();

        assert!(matches!(outcome, AttemptOutcome::Selected { ref label, .. } if label == "720p"));
    }
}
