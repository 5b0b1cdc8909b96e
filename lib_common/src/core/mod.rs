//! # Core Engine Module
//!
//! The scheduling heart of the crawler. Everything here is independent of
//! HTTP and of the file system layout; the ingestors and the store plug in
//! through traits and handles.
//!
//! ## Core Components:
//!
//! - **`model`**: item ids, owners, raw pages, error events and terminal
//!   markers shared by the rest of the crate.
//! - **`registry`**: the process-wide processed set. Claiming an id is atomic
//!   and exclusive.
//! - **`schedule`**: the ordered `(interval, repetitions)` phases and their
//!   textual form (`600x72,1800x24,3600x24`).
//! - **`executor`**: runs one claimed item through its schedule on an
//!   absolute virtual clock and writes the terminal marker.
//! - **`worker`**: the claim/observe loop of a single task.
//! - **`orchestrator`**: spawns the staggered worker pool and joins it.

pub mod executor;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod schedule;
pub mod worker;

// --- Public API Re-exports ---
pub use executor::{ObservationExit, ObservationReport, ScheduleExecutor};
pub use model::{ClaimedItem, ErrorEvent, FetchOutcome, ItemId, OwnerId, RawPage, Snapshot, TerminalMarker};
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorReport};
pub use registry::Registry;
pub use schedule::{Schedule, ScheduleEntry};
pub use worker::{Worker, WorkerState, WorkerSummary};
