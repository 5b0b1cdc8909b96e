//! # Storage Module
//!
//! Durable output of the crawler. Everything written here is consumed later by
//! the offline parsing and analysis tooling, so the layout is a contract.

/// Per-item record directories with timestamped snapshots and terminal markers.
pub mod snapshot_store;

pub use snapshot_store::{ItemRecordState, SnapshotStore};
