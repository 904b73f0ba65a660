//! Core domain types for the harvest engine.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Timestamp format used by the upstream API (`2024-03-17T00:00:00`, no zone).
pub const API_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// How far past the configured current year the year planner looks ahead,
/// so events announced for upcoming seasons are discovered early.
pub const YEAR_LOOKAHEAD: i32 = 2;

/// How long after "now" an event is still treated as possibly changing.
pub const ONGOING_WINDOW: Duration = Duration::days(1);

// ---------------------------------------------------------------------------
// WorkUnit
// ---------------------------------------------------------------------------

/// One fetchable entity selected by the planner. Immutable once planned;
/// each unit owns exactly one storage key, so no two units in a run ever
/// write to the same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkUnit {
    /// The event calendar listing for one year.
    Year { year: i32 },
    /// The match list for one event, stored under its year partition.
    EventMatches { event_id: i64, year: i32 },
}

impl WorkUnit {
    /// Storage key relative to the raw data root.
    pub fn storage_key(&self) -> String {
        match self {
            Self::Year { year } => format!("events/events_{year}.json"),
            Self::EventMatches { event_id, year } => {
                format!("event_matches/{year}/event_matches_{event_id}.json")
            }
        }
    }

    /// How a record count is extracted from this unit's raw payload.
    ///
    /// The shape is fixed by the unit variant, never sniffed from the
    /// payload: the calendar endpoint wraps its rows, the matches endpoint
    /// returns a bare list.
    pub fn payload_shape(&self) -> PayloadShape {
        match self {
            Self::Year { .. } => PayloadShape::Wrapped,
            Self::EventMatches { .. } => PayloadShape::Flat,
        }
    }
}

impl std::fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Year { year } => write!(f, "year {year}"),
            Self::EventMatches { event_id, year } => {
                write!(f, "event {event_id} ({year})")
            }
        }
    }
}

/// The unwrap rule for a raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// Count lives at `payload[0].rows.len()`.
    Wrapped,
    /// Payload is the record list itself.
    Flat,
}

// ---------------------------------------------------------------------------
// FetchOutcome / RunSummary
// ---------------------------------------------------------------------------

/// Result of attempting one work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Records present at the key after this fetch.
    pub total: usize,
    /// Records beyond what the previous run stored, floored at zero.
    pub added: usize,
    /// False means the store was left untouched for this unit.
    pub succeeded: bool,
}

impl FetchOutcome {
    /// Outcome for a failed unit: all zero, nothing written.
    pub fn failed() -> Self {
        Self {
            total: 0,
            added: 0,
            succeeded: false,
        }
    }
}

/// Aggregate over all work units in one invocation. Built once per run,
/// never persisted.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Units attempted (every planned unit reaches a terminal state).
    pub units: usize,
    /// Units that ended in failure.
    pub failed: usize,
    /// Sum of per-unit totals.
    pub total_records: usize,
    /// Sum of per-unit added counts.
    pub new_records: usize,
    /// Wall-clock duration of the run.
    pub elapsed: std::time::Duration,
}

// ---------------------------------------------------------------------------
// Event records & status
// ---------------------------------------------------------------------------

/// One row of the event calendar payload. Unknown fields are ignored;
/// the raw file keeps the full record either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "EventId", default)]
    pub event_id: Option<i64>,
    #[serde(rename = "EventName", default)]
    pub event_name: Option<String>,
    #[serde(rename = "StartDateTime", default)]
    pub start_date: Option<String>,
    #[serde(rename = "EndDateTime", default)]
    pub end_date: Option<String>,
}

impl EventRecord {
    /// Parse a timestamp field in the API's format.
    pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(raw, API_DATETIME_FORMAT).ok()
    }

    /// Classify this event against a reference time, or `None` when either
    /// timestamp is missing or unparseable.
    pub fn status(&self, now: NaiveDateTime) -> Option<EventStatus> {
        let start = Self::parse_datetime(self.start_date.as_deref()?)?;
        let end = Self::parse_datetime(self.end_date.as_deref()?)?;
        Some(EventStatus::classify(start, end, now))
    }
}

/// Time-based staleness judgment for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    /// Starts after the ongoing window closes.
    Future,
    /// Inside the window: data may still be growing.
    Ongoing,
    /// Ended before now: assumed immutable.
    Completed,
}

impl EventStatus {
    /// Pure classification of (start, end) against `now`.
    pub fn classify(start: NaiveDateTime, end: NaiveDateTime, now: NaiveDateTime) -> Self {
        let cutoff = now + ONGOING_WINDOW;
        if start > cutoff {
            Self::Future
        } else if end < now {
            Self::Completed
        } else {
            Self::Ongoing
        }
    }
}
