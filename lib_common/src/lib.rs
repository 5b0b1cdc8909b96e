//! # lib_common
//!
//! Building blocks for the 500px progressions crawler: a fresh-feed poller
//! with exclusive claims, a snapshot schedule executor, a staggered worker
//! pool and the on-disk snapshot store.
//!
//! Features:
//! - `retrieve`: the HTTP client and the error type.
//! - `crawler`: everything else (implies `retrieve`).

#![forbid(unsafe_code)]

#[cfg(feature = "retrieve")]
pub mod error;
#[cfg(feature = "retrieve")]
pub mod retrieve;

#[cfg(feature = "crawler")]
pub mod core;
#[cfg(feature = "crawler")]
pub mod ingestors;
#[cfg(feature = "crawler")]
pub mod storage;

// --- Public API Re-exports ---
#[cfg(feature = "retrieve")]
pub use error::{CrawlerError, CrawlerResult};
