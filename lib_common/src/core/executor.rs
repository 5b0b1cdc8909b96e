//! # Schedule Executor
//!
//! Runs one claimed item through the whole snapshot schedule.
//!
//! Repetition `k` is due at `anchor + sum(interval of every earlier
//! repetition)`, where `anchor` is taken when observation starts. Deadlines
//! are absolute, so a slow fetch shortens the following sleep instead of
//! pushing every later snapshot back. The snapshot timestamp is the scheduled
//! one, never the fetch completion time.
//!
//! Every failed repetition (non-2xx or no response, on either page) adds an
//! `ErrorEvent` and the schedule moves on. Once more than `error_threshold`
//! events have accumulated the rest of the schedule is skipped. The check runs
//! after each repetition and ignores phase boundaries.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::model::{
    ClaimedItem, ErrorEvent, FetchOutcome, RawPage, Snapshot, TerminalMarker,
};
use crate::core::schedule::{Schedule, MAX_HORIZON};
use crate::error::CrawlerResult;
use crate::ingestors::snapshot_fetcher::SnapshotFetcher;
use crate::storage::snapshot_store::SnapshotStore;

pub const DEFAULT_ERROR_THRESHOLD: usize = 3;

/// Why an observation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationExit {
    /// Every repetition of every phase ran.
    Completed,
    /// The shutdown signal was seen at a repetition boundary or during a sleep.
    Cancelled,
    /// The error threshold was exceeded.
    TooManyErrors,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationReport {
    pub item: ClaimedItem,
    pub snapshots: usize,
    pub errors: Vec<ErrorEvent>,
    pub exit: ObservationExit,
}

/// Anchor of the absolute schedule clock.
#[derive(Debug, Clone, Copy)]
struct VirtualClock {
    started: Instant,
    started_unix: i64,
}

impl VirtualClock {
    fn anchor() -> Self {
        Self {
            started: Instant::now(),
            started_unix: chrono::Utc::now().timestamp(),
        }
    }

    /// Offsets are clamped to `MAX_HORIZON`; a valid `Schedule` never exceeds it.
    fn deadline(&self, offset: Duration) -> Instant {
        self.started + offset.min(MAX_HORIZON)
    }

    fn timestamp(&self, offset: Duration) -> i64 {
        let secs = i64::try_from(offset.min(MAX_HORIZON).as_secs()).unwrap_or(i64::MAX);
        self.started_unix.saturating_add(secs)
    }
}

pub struct ScheduleExecutor {
    schedule: Schedule,
    fetcher: Arc<dyn SnapshotFetcher>,
    store: Arc<SnapshotStore>,
    error_threshold: usize,
}

impl ScheduleExecutor {
    pub fn new(
        schedule: Schedule,
        fetcher: Arc<dyn SnapshotFetcher>,
        store: Arc<SnapshotStore>,
    ) -> Self {
        Self {
            schedule,
            fetcher,
            store,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
        }
    }

    pub fn with_error_threshold(mut self, error_threshold: usize) -> Self {
        self.error_threshold = error_threshold;
        self
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// # Observe
    ///
    /// Creates the item's record, runs the schedule, and writes the terminal
    /// marker on every exit path: `ok` when no error was recorded, otherwise
    /// `error` with the events in order.
    ///
    /// ## Errors
    /// Only snapshot store failures escape. The record is then left without a
    /// marker, which downstream readers treat as incomplete.
    pub async fn observe(
        &self,
        item: &ClaimedItem,
        cancel: &CancellationToken,
    ) -> CrawlerResult<ObservationReport> {
        self.store.create_record(item.id).await?;

        let clock = VirtualClock::anchor();
        let mut offset = Duration::ZERO;
        let mut errors: Vec<ErrorEvent> = Vec::new();
        let mut snapshots = 0usize;
        let mut exit = ObservationExit::Completed;
        let mut first = true;

        'phases: for (phase, entry) in self.schedule.entries().iter().enumerate() {
            info!(
                item_id = %item.id,
                phase,
                interval_secs = entry.interval().as_secs(),
                repetitions = entry.repetitions(),
                "starting schedule phase"
            );

            for repetition in 0..entry.repetitions() {
                if !first {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            exit = ObservationExit::Cancelled;
                            break 'phases;
                        }
                        _ = tokio::time::sleep_until(clock.deadline(offset)) => {}
                    }
                }
                first = false;

                if cancel.is_cancelled() {
                    exit = ObservationExit::Cancelled;
                    break 'phases;
                }

                let timestamp = clock.timestamp(offset);
                debug!(item_id = %item.id, phase, repetition, timestamp, "capturing snapshot");

                match self.capture(item, timestamp).await {
                    Ok(snapshot) => {
                        self.store.write_snapshot(item.id, &snapshot).await?;
                        snapshots += 1;
                    }
                    Err(event) => {
                        warn!(
                            item_id = %item.id,
                            item_status = %event.item,
                            owner_status = %event.owner,
                            "error getting data"
                        );
                        errors.push(event);
                    }
                }

                if errors.len() > self.error_threshold {
                    warn!(item_id = %item.id, errors = errors.len(), "too many errors, skipping rest of schedule");
                    exit = ObservationExit::TooManyErrors;
                    break 'phases;
                }

                offset = offset.saturating_add(entry.interval());
            }
        }

        if exit == ObservationExit::Cancelled {
            info!(item_id = %item.id, snapshots, "stopping as requested");
        }

        let marker = TerminalMarker::from_errors(errors.clone());
        self.store.write_marker(item.id, &marker).await?;
        info!(
            item_id = %item.id,
            snapshots,
            errors = errors.len(),
            exit = ?exit,
            "item finished"
        );

        Ok(ObservationReport {
            item: item.clone(),
            snapshots,
            errors,
            exit,
        })
    }

    /// Fetches both pages. Both are always requested, even when the first fails.
    async fn capture(&self, item: &ClaimedItem, timestamp: i64) -> Result<Snapshot, ErrorEvent> {
        let item_page = self.fetcher.fetch_item(item.id).await;
        let owner_page = self.fetcher.fetch_owner(&item.owner).await;

        match (item_page, owner_page) {
            (Ok(i), Ok(o)) if i.is_success() && o.is_success() => Ok(Snapshot {
                timestamp,
                item_page: i.body,
                owner_page: o.body,
            }),
            (i, o) => Err(ErrorEvent {
                timestamp,
                item: outcome(&i),
                owner: outcome(&o),
            }),
        }
    }
}

fn outcome(result: &CrawlerResult<RawPage>) -> FetchOutcome {
    match result {
        Ok(page) => FetchOutcome::Status(page.status),
        Err(e) => FetchOutcome::Transport(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ItemId, OwnerId};
    use crate::error::CrawlerError;
    use crate::storage::snapshot_store::ItemRecordState;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers repetition `n` (1-based) according to `fail`.
    struct CountingFetcher {
        calls: Mutex<u32>,
        fail: fn(u32) -> Option<u16>,
        fetch_delay: Duration,
    }

    impl CountingFetcher {
        fn new(fail: fn(u32) -> Option<u16>) -> Self {
            Self {
                calls: Mutex::new(0),
                fail,
                fetch_delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl SnapshotFetcher for CountingFetcher {
        async fn fetch_item(&self, id: ItemId) -> CrawlerResult<RawPage> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            tokio::time::sleep(self.fetch_delay).await;
            let status = (self.fail)(n).unwrap_or(200);
            Ok(RawPage {
                status,
                body: format!("photo {} rep {}", id, n),
            })
        }

        async fn fetch_owner(&self, owner: &OwnerId) -> CrawlerResult<RawPage> {
            Ok(RawPage {
                status: 200,
                body: format!("user {}", owner),
            })
        }
    }

    struct OfflineFetcher;

    #[async_trait]
    impl SnapshotFetcher for OfflineFetcher {
        async fn fetch_item(&self, _id: ItemId) -> CrawlerResult<RawPage> {
            Err(CrawlerError::Transport("connection refused".into()))
        }

        async fn fetch_owner(&self, _owner: &OwnerId) -> CrawlerResult<RawPage> {
            Ok(RawPage {
                status: 200,
                body: String::new(),
            })
        }
    }

    fn item(id: u64) -> ClaimedItem {
        ClaimedItem {
            id: ItemId(id),
            owner: OwnerId("owner".into()),
        }
    }

    fn executor(
        schedule: &str,
        fetcher: Arc<dyn SnapshotFetcher>,
        root: &std::path::Path,
    ) -> ScheduleExecutor {
        ScheduleExecutor::new(
            schedule.parse().unwrap(),
            fetcher,
            Arc::new(SnapshotStore::new(root)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetches_do_not_drift() {
        let tmp = tempfile::tempdir().unwrap();
        let mut fetcher = CountingFetcher::new(|_| None);
        fetcher.fetch_delay = Duration::from_secs(4);
        let exec = executor("10x4", Arc::new(fetcher), tmp.path());

        let started = Instant::now();
        let report = exec.observe(&item(1), &CancellationToken::new()).await.unwrap();

        // Last repetition is due at +30 and its fetch takes 4s.
        assert_eq!(started.elapsed(), Duration::from_secs(34));
        let stamps = exec.store().snapshot_timestamps(ItemId(1)).await.unwrap();
        let t0 = stamps[0];
        assert_eq!(stamps, vec![t0, t0 + 10, t0 + 20, t0 + 30]);
        assert_eq!(report.exit, ObservationExit::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn phases_run_in_order_with_their_own_interval() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = executor("5x2,60x2", Arc::new(CountingFetcher::new(|_| None)), tmp.path());

        let report = exec.observe(&item(2), &CancellationToken::new()).await.unwrap();

        assert_eq!(report.snapshots, 4);
        let stamps = exec.store().snapshot_timestamps(ItemId(2)).await.unwrap();
        let t0 = stamps[0];
        assert_eq!(stamps, vec![t0, t0 + 5, t0 + 10, t0 + 70]);
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_is_checked_across_phase_boundaries() {
        let tmp = tempfile::tempdir().unwrap();
        // Repetitions 2..=5 fail; they straddle the two phases.
        let fetcher = CountingFetcher::new(|n| (n >= 2).then_some(500));
        let exec = executor("10x3,20x5", Arc::new(fetcher), tmp.path());

        let report = exec.observe(&item(3), &CancellationToken::new()).await.unwrap();

        assert_eq!(report.exit, ObservationExit::TooManyErrors);
        assert_eq!(report.errors.len(), 4);
        assert_eq!(report.snapshots, 1);
        let marker = std::fs::read_to_string(tmp.path().join("3/error")).unwrap();
        assert_eq!(marker.lines().count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_are_recorded_like_statuses() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = executor("10x2", Arc::new(OfflineFetcher), tmp.path());

        let report = exec.observe(&item(4), &CancellationToken::new()).await.unwrap();

        assert_eq!(report.exit, ObservationExit::Completed);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.snapshots, 0);
        let marker = std::fs::read_to_string(tmp.path().join("4/error")).unwrap();
        let first = marker.lines().next().unwrap();
        assert!(first.contains("connection refused, 200"), "{}", first);
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_observation_writes_ok_marker_only() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = executor("10x3", Arc::new(CountingFetcher::new(|_| None)), tmp.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = exec.observe(&item(5), &cancel).await.unwrap();

        assert_eq!(report.exit, ObservationExit::Cancelled);
        assert_eq!(report.snapshots, 0);
        assert_eq!(
            exec.store().record_state(ItemId(5)).await.unwrap(),
            ItemRecordState::Ok
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_sleep_returns_without_waiting_for_deadline() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = executor("3600x5", Arc::new(CountingFetcher::new(|_| None)), tmp.path());
        let cancel = CancellationToken::new();

        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            stopper.cancel();
        });

        let started = Instant::now();
        let report = exec.observe(&item(6), &cancel).await.unwrap();

        assert_eq!(report.exit, ObservationExit::Cancelled);
        assert_eq!(report.snapshots, 1);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn year_long_schedule_runs_without_overflow() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = executor("15768000x2", Arc::new(CountingFetcher::new(|_| None)), tmp.path());
        let cancel = CancellationToken::new();

        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            stopper.cancel();
        });

        let report = exec.observe(&item(7), &cancel).await.unwrap();
        assert_eq!(report.exit, ObservationExit::Cancelled);
        assert_eq!(report.snapshots, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clock_clamps_oversized_offsets() {
        let clock = VirtualClock::anchor();
        assert_eq!(clock.deadline(Duration::MAX), clock.started + MAX_HORIZON);
        assert_eq!(
            clock.timestamp(Duration::MAX),
            clock.started_unix + MAX_HORIZON.as_secs() as i64
        );
    }
}
