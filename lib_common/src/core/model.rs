//! # Crawler Data Model
//!
//! Plain value types shared by the registry, the schedule executor and the
//! snapshot store.

use std::fmt;
use std::str::FromStr;

/// Identifier of a discovered photo. Also the name of its record directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(ItemId)
    }
}

/// Username of the account that published an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerId(pub String);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An item exclusively assigned to one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedItem {
    /// The claimed item.
    pub id: ItemId,
    /// Its publishing account.
    pub owner: OwnerId,
}

/// A raw page as returned by the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// HTTP status code.
    pub status: u16,
    /// Body text, kept verbatim.
    pub body: String,
}

impl RawPage {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// How one side (item or owner) of a fetch attempt went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// An HTTP response arrived with this status.
    Status(u16),
    /// No response; the transport error text.
    Transport(String),
}

impl FetchOutcome {
    /// Only a 2xx status counts as success.
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Status(code) if (200..300).contains(code))
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Status(code) => write!(f, "{}", code),
            FetchOutcome::Transport(reason) => f.write_str(reason),
        }
    }
}

/// A failed fetch attempt, stamped with the repetition's scheduled time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    /// Scheduled unix timestamp of the repetition.
    pub timestamp: i64,
    /// Outcome of the item page request.
    pub item: FetchOutcome,
    /// Outcome of the owner page request.
    pub owner: FetchOutcome,
}

impl fmt::Display for ErrorEvent {
    /// `<timestamp>: <item-status>, <owner-status>`, one line of the `error` marker.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}, {}", self.timestamp, self.item, self.owner)
    }
}

/// One capture of an item and its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Scheduled unix timestamp, not the time the fetch completed.
    pub timestamp: i64,
    /// Raw item page.
    pub item_page: String,
    /// Raw owner page.
    pub owner_page: String,
}

/// The final word on an item record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalMarker {
    /// No error was ever recorded.
    Ok,
    /// At least one error was recorded, in order of occurrence.
    Error(Vec<ErrorEvent>),
}

impl TerminalMarker {
    /// Builds the marker for an item from its accumulated errors.
    pub fn from_errors(errors: Vec<ErrorEvent>) -> Self {
        if errors.is_empty() {
            TerminalMarker::Ok
        } else {
            TerminalMarker::Error(errors)
        }
    }
}
