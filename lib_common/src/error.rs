//! # Crawler Errors
//!
//! One error type for the whole library. Only `DiscoveryUnavailable` is fatal;
//! everything else is either turned into an `ErrorEvent` by the schedule
//! executor or reported by the worker that hit it.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout `lib_common`.
pub type CrawlerResult<T> = Result<T, CrawlerError>;

#[derive(Debug, Error)]
/// # Crawler Error
pub enum CrawlerError {
    /// The fresh feed answered with a non-success status or an unusable body.
    /// Every worker depends on the feed, so the process must be restarted.
    #[error("discovery unavailable (status {status:?}): {reason}")]
    DiscoveryUnavailable {
        /// HTTP status returned by the feed, if the request got that far.
        status: Option<u16>,
        /// Human readable cause.
        reason: String,
    },

    /// The request never produced an HTTP response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A response body could not be decoded into the expected shape.
    #[error("failed to decode response body: {0}")]
    Decode(String),

    /// A base URL or a joined path did not form a valid URL.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A schedule definition was empty or contained zero values.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Reading or writing the snapshot store failed.
    #[error("storage error at {}: {source}", path.display())]
    Storage {
        /// The file or directory being touched.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl CrawlerError {
    /// Whether this error must take the whole process down.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CrawlerError::DiscoveryUnavailable { .. })
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrawlerError::Storage {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for CrawlerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            CrawlerError::Decode(e.to_string())
        } else {
            CrawlerError::Transport(e.to_string())
        }
    }
}
