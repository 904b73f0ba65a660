//! Markdown summary reports over the raw data store.
//!
//! Reads the stored year listings and produces a human-readable breakdown:
//! events per year, senior vs excluded split, and status counts. Purely a
//! consumer of the store; never touches the network.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{Local, NaiveDateTime};
use regex::Regex;
use tracing::info;

use ttharvest_shared::{EventRecord, EventStatus, HarvestError, PayloadShape, Result};
use ttharvest_store::RawStore;

/// Name fragments that mark an event as outside the senior circuit.
const EXCLUDED_EVENT_TERMS: &[&str] = &["youth", "junior", "cadet", "hopes", "para"];

/// Age-restricted event names (U11 through U21, with optional separator).
fn age_limit_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bu[-_ ]?(1[1-9]|2[01])\b").expect("static regex"))
}

/// Whether an event name belongs to the senior circuit: no excluded term,
/// no age-limit marker.
pub fn is_senior_event(event_name: &str) -> bool {
    if event_name.is_empty() {
        return false;
    }
    let name_lower = event_name.to_lowercase();
    if EXCLUDED_EVENT_TERMS.iter().any(|t| name_lower.contains(t)) {
        return false;
    }
    !age_limit_pattern().is_match(&name_lower)
}

// ---------------------------------------------------------------------------
// Raw events summary
// ---------------------------------------------------------------------------

/// Build the markdown summary of all stored year listings, classifying
/// events against `now`.
pub fn raw_events_summary(store: &RawStore, now: NaiveDateTime) -> Result<String> {
    let mut md = String::from("# Raw Events Data Summary\n\n");

    let mut total_events = 0usize;
    let mut excluded_events = 0usize;
    let mut senior_events = 0usize;
    let mut total_future = 0usize;
    let mut total_ongoing = 0usize;
    let mut total_completed = 0usize;

    for (year, key) in store.year_files()? {
        let count = store.record_count(&key, PayloadShape::Wrapped);
        total_events += count;
        let _ = writeln!(md, "- {year}: {count} events");

        let Some(doc) = store.read(&key) else {
            continue;
        };

        for event in unwrap_event_rows(&doc) {
            let senior = event
                .event_name
                .as_deref()
                .is_some_and(is_senior_event);
            if !senior {
                excluded_events += 1;
                continue;
            }
            senior_events += 1;

            match event.status(now) {
                Some(EventStatus::Future) => total_future += 1,
                Some(EventStatus::Ongoing) => total_ongoing += 1,
                Some(EventStatus::Completed) => total_completed += 1,
                None => {}
            }
        }
    }

    let pct = |part: usize| -> f64 {
        if total_events == 0 {
            0.0
        } else {
            (part as f64 / total_events as f64) * 100.0
        }
    };

    md.push_str("\n### Senior vs Excluded Breakdown\n");
    md.push_str("| Category | Count | Percentage |\n");
    md.push_str("| :--- | :--- | :--- |\n");
    let _ = writeln!(md, "| **Total Raw Events** | {total_events} | 100% |");
    let _ = writeln!(
        md,
        "| **Excluded (Youth/Para)** | {excluded_events} | {:.1}% |",
        pct(excluded_events)
    );
    let _ = writeln!(
        md,
        "| **Senior Events** | {senior_events} | {:.1}% |",
        pct(senior_events)
    );

    md.push_str("\n### Senior Event Status\n");
    md.push_str("| Status | Count |\n");
    md.push_str("| :--- | :--- |\n");
    let _ = writeln!(md, "| Completed | {total_completed} |");
    let _ = writeln!(md, "| Ongoing | {total_ongoing} |");
    let _ = writeln!(md, "| Future | {total_future} |");
    let _ = writeln!(md, "| Total | {senior_events} |");

    Ok(md)
}

/// Write the full raw-data report to `path`, stamped with the generation
/// time. Returns the path written.
pub fn write_report(store: &RawStore, path: &Path) -> Result<PathBuf> {
    let now = Local::now();
    let mut report = format!(
        "# ttharvest Raw Data Report\n*Generated on: {}*\n\n---\n\n",
        now.format("%Y-%m-%d %H:%M:%S")
    );
    report.push_str(&raw_events_summary(store, now.naive_local())?);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| HarvestError::io(parent, e))?;
    }
    std::fs::write(path, report).map_err(|e| HarvestError::io(path, e))?;

    info!(?path, "raw data report written");
    Ok(path.to_path_buf())
}

/// Rows of a stored calendar document, tolerating undecodable entries.
fn unwrap_event_rows(doc: &serde_json::Value) -> Vec<EventRecord> {
    doc.as_array()
        .and_then(|list| list.first())
        .and_then(|first| first.get("rows"))
        .and_then(|rows| rows.as_array())
        .map(|rows| {
            rows.iter()
                .filter_map(|row| serde_json::from_value(row.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}
