//! # Data Ingestors Module
//!
//! Clients for the two external sources the crawler reads from.
//!
//! ## Contained Modules:
//! - **`fresh_feed`**: polls the discovery feed and hands out exclusive claims
//!   on newly published items.
//! - **`snapshot_fetcher`**: downloads the raw item and owner pages for one
//!   snapshot.
//!
//! Both are expressed as traits (`FeedSource`, `SnapshotFetcher`) with one
//! HTTP implementation each, so the scheduling core can run against fakes.

/// Fresh feed polling and claim-on-discovery.
pub mod fresh_feed;
/// Raw page retrieval for snapshots.
pub mod snapshot_fetcher;

// --- Public API Re-exports ---
pub use fresh_feed::{Discovery, FeedSource, FreshFeed, FreshItem};
pub use snapshot_fetcher::{SiteFetcher, SnapshotFetcher};
