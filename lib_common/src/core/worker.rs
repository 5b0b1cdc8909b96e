//! # Worker
//!
//! One long-lived task that alternates between claiming a fresh item and
//! observing it to the end of its schedule:
//!
//! ```text
//! Idle -> Claiming -> Observing -> Idle ...
//!             \            \
//!              +------------+--> Stopped   (shutdown signal seen)
//! ```
//!
//! A worker never observes two items at once. Once the shutdown signal is
//! set it finishes the current repetition boundary, writes the item's marker
//! and exits for good.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::core::executor::ScheduleExecutor;
use crate::error::CrawlerResult;
use crate::ingestors::fresh_feed::Discovery;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Claiming,
    Observing,
    Stopped,
}

/// Totals reported by a worker when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Items whose observation ended with a terminal marker.
    pub items_finished: usize,
    /// Items abandoned because the snapshot store failed.
    pub items_incomplete: usize,
}

pub struct Worker {
    id: usize,
    discovery: Arc<Discovery>,
    executor: Arc<ScheduleExecutor>,
    cancel: CancellationToken,
    state: WorkerState,
}

impl Worker {
    pub fn new(
        id: usize,
        discovery: Arc<Discovery>,
        executor: Arc<ScheduleExecutor>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            discovery,
            executor,
            cancel,
            state: WorkerState::Idle,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Runs until the shutdown signal is observed.
    ///
    /// # Errors
    /// Only `CrawlerError::DiscoveryUnavailable` is returned; per-item failures
    /// are logged and the worker moves on to the next item.
    pub async fn run(&mut self) -> CrawlerResult<WorkerSummary> {
        let mut summary = WorkerSummary::default();

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.transition(WorkerState::Claiming);
            let item = match self.discovery.next_new_item(&self.cancel).await {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(e) => {
                    error!(worker = self.id, error = %e, "discovery failed");
                    self.transition(WorkerState::Stopped);
                    return Err(e);
                }
            };

            self.transition(WorkerState::Observing);
            info!(worker = self.id, item_id = %item.id, owner = %item.owner, "starting to process item");

            match self.executor.observe(&item, &self.cancel).await {
                Ok(_) => summary.items_finished += 1,
                Err(e) => {
                    // The claim stands; the record stays without a marker.
                    error!(worker = self.id, item_id = %item.id, error = %e, "observation aborted, record left incomplete");
                    summary.items_incomplete += 1;
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }
            self.transition(WorkerState::Idle);
        }

        self.transition(WorkerState::Stopped);
        info!(
            worker = self.id,
            finished = summary.items_finished,
            incomplete = summary.items_incomplete,
            "worker stopped"
        );
        Ok(summary)
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(worker = self.id, from = ?self.state, to = ?next, "state change");
        self.state = next;
    }
}
