//! # Snapshot Schedule
//!
//! Ordered phases of `(interval, repetitions)`. The textual form used by the
//! config layer is `<interval-secs>x<repetitions>` joined by commas, e.g.
//! `600x72,1800x24,3600x24`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CrawlerError, CrawlerResult};

/// Longest span a whole schedule may cover.
pub const MAX_HORIZON: Duration = Duration::from_secs(365 * 24 * 3600);

/// One phase of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    interval: Duration,
    repetitions: u32,
}

impl ScheduleEntry {
    /// Snapshot timestamps have second resolution, so intervals below one
    /// second would collide on disk and are rejected.
    pub fn new(interval: Duration, repetitions: u32) -> CrawlerResult<Self> {
        if interval < Duration::from_secs(1) {
            return Err(CrawlerError::InvalidSchedule(format!(
                "interval must be at least one second, got {:?}",
                interval
            )));
        }
        if repetitions == 0 {
            return Err(CrawlerError::InvalidSchedule(
                "repetitions must be positive".to_string(),
            ));
        }
        let within_horizon = matches!(interval.checked_mul(repetitions), Some(span) if span <= MAX_HORIZON);
        if !within_horizon {
            return Err(CrawlerError::InvalidSchedule(format!(
                "{}x{} spans more than {} days",
                interval.as_secs(),
                repetitions,
                MAX_HORIZON.as_secs() / 86_400
            )));
        }
        Ok(Self {
            interval,
            repetitions,
        })
    }

    /// Time covered by this phase alone.
    pub fn span(&self) -> Duration {
        self.interval * self.repetitions
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }
}

/// A non-empty, ordered list of phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    entries: Vec<ScheduleEntry>,
}

impl Schedule {
    pub fn new(entries: Vec<ScheduleEntry>) -> CrawlerResult<Self> {
        if entries.is_empty() {
            return Err(CrawlerError::InvalidSchedule(
                "schedule has no phases".to_string(),
            ));
        }
        let mut horizon = Duration::ZERO;
        for entry in &entries {
            horizon = horizon
                .checked_add(entry.span())
                .filter(|total| *total <= MAX_HORIZON)
                .ok_or_else(|| {
                    CrawlerError::InvalidSchedule(format!(
                        "schedule spans more than {} days",
                        MAX_HORIZON.as_secs() / 86_400
                    ))
                })?;
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Number of snapshots a fully successful observation takes.
    pub fn total_repetitions(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.repetitions)).sum()
    }

    /// Wall-clock span covered by the schedule, never above `MAX_HORIZON`.
    pub fn horizon(&self) -> Duration {
        self.entries.iter().map(ScheduleEntry::span).sum()
    }
}

impl Default for Schedule {
    /// Every 10 minutes for 12 hours, every 30 minutes for 12 hours, then
    /// hourly for another day.
    fn default() -> Self {
        Self {
            entries: vec![
                ScheduleEntry {
                    interval: Duration::from_secs(60 * 10),
                    repetitions: 72,
                },
                ScheduleEntry {
                    interval: Duration::from_secs(60 * 30),
                    repetitions: 24,
                },
                ScheduleEntry {
                    interval: Duration::from_secs(60 * 60),
                    repetitions: 24,
                },
            ],
        }
    }
}

impl FromStr for Schedule {
    type Err = CrawlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entries = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (secs, reps) = part.split_once(|c: char| c == 'x' || c == 'X').ok_or_else(|| {
                    CrawlerError::InvalidSchedule(format!(
                        "expected <interval-secs>x<repetitions>, got '{}'",
                        part
                    ))
                })?;
                let secs: u64 = secs.trim().parse().map_err(|_| {
                    CrawlerError::InvalidSchedule(format!("bad interval in '{}'", part))
                })?;
                let reps: u32 = reps.trim().parse().map_err(|_| {
                    CrawlerError::InvalidSchedule(format!("bad repetition count in '{}'", part))
                })?;
                ScheduleEntry::new(Duration::from_secs(secs), reps)
            })
            .collect::<CrawlerResult<Vec<_>>>()?;

        Schedule::new(entries)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}x{}", entry.interval.as_secs(), entry.repetitions)?;
        }
        Ok(())
    }
}
