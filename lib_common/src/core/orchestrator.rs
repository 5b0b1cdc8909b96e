//! # Orchestrator
//!
//! Owns the worker pool for one crawler run.
//!
//! ## Key Design Principles:
//! - **Staggered start**: every worker sleeps an independent random delay in
//!   `[stagger_min, stagger_max]` before its first poll, so the pool does not
//!   hit the feed in one burst. The delay is cancellable.
//! - **One signal**: all workers share a single `CancellationToken`. Setting it
//!   (from a signal handler or from a fatal discovery error) stops the pool.
//! - **Full join**: `run` returns only after every worker task has ended. There
//!   is no forced abort; workers finish their current repetition first.
//! - **Panic isolation**: a panicking worker is logged and counted, the rest of
//!   the pool keeps running.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

use crate::core::executor::ScheduleExecutor;
use crate::core::worker::{Worker, WorkerSummary};
use crate::error::{CrawlerError, CrawlerResult};
use crate::ingestors::fresh_feed::Discovery;

pub const DEFAULT_WORKERS: usize = 200;
pub const DEFAULT_STAGGER_MIN: Duration = Duration::from_secs(10);
pub const DEFAULT_STAGGER_MAX: Duration = Duration::from_secs(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub workers: usize,
    pub stagger_min: Duration,
    pub stagger_max: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            stagger_min: DEFAULT_STAGGER_MIN,
            stagger_max: DEFAULT_STAGGER_MAX,
        }
    }
}

/// Aggregated outcome of a run that ended without a fatal error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorReport {
    pub workers_started: usize,
    pub items_finished: usize,
    pub items_incomplete: usize,
    pub workers_panicked: usize,
}

impl OrchestratorReport {
    fn absorb(&mut self, summary: WorkerSummary) {
        self.items_finished += summary.items_finished;
        self.items_incomplete += summary.items_incomplete;
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    discovery: Arc<Discovery>,
    executor: Arc<ScheduleExecutor>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        discovery: Arc<Discovery>,
        executor: Arc<ScheduleExecutor>,
    ) -> Self {
        Self {
            config,
            discovery,
            executor,
            cancel: CancellationToken::new(),
        }
    }

    /// Handle for requesting shutdown from outside the pool.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// # Run
    ///
    /// Spawns the configured number of workers and waits for all of them.
    ///
    /// ## Errors
    /// The first fatal worker error (discovery failure). When it happens the
    /// shared signal is set, the remaining workers are joined, and the error
    /// is returned.
    pub async fn run(self) -> CrawlerResult<OrchestratorReport> {
        let delays = stagger_delays(&self.config);
        let mut report = OrchestratorReport {
            workers_started: delays.len(),
            ..OrchestratorReport::default()
        };
        let mut set: JoinSet<CrawlerResult<WorkerSummary>> = JoinSet::new();

        info!(
            workers = self.config.workers,
            stagger_min_secs = self.config.stagger_min.as_secs(),
            stagger_max_secs = self.config.stagger_max.as_secs(),
            "starting worker pool"
        );

        for (id, delay) in delays.into_iter().enumerate() {
            let mut worker = Worker::new(
                id,
                self.discovery.clone(),
                self.executor.clone(),
                self.cancel.clone(),
            );
            let cancel = self.cancel.clone();
            set.spawn(
                async move {
                    info!(delay_ms = delay.as_millis() as u64, "starting worker");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Ok(WorkerSummary::default()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    worker.run().await
                }
                .instrument(info_span!("worker", id)),
            );
        }

        let mut fatal: Option<CrawlerError> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(summary)) => report.absorb(summary),
                Ok(Err(e)) => {
                    if fatal.is_none() {
                        error!(error = %e, "fatal worker error, stopping all workers");
                        self.cancel.cancel();
                        fatal = Some(e);
                    }
                }
                Err(join_error) => {
                    error!(error = %join_error, "worker task failed");
                    report.workers_panicked += 1;
                }
            }
        }

        info!(
            finished = report.items_finished,
            incomplete = report.items_incomplete,
            panicked = report.workers_panicked,
            "all workers stopped"
        );

        match fatal {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

/// One independent delay per worker, uniform in `[stagger_min, stagger_max]`.
fn stagger_delays(config: &OrchestratorConfig) -> Vec<Duration> {
    let min = config.stagger_min.as_millis() as u64;
    let max = config.stagger_max.as_millis() as u64;
    let mut rng = rand::rng();
    (0..config.workers)
        .map(|_| {
            if max <= min {
                Duration::from_millis(min)
            } else {
                Duration::from_millis(rng.random_range(min..=max))
            }
        })
        .collect()
}
