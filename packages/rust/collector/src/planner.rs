//! Staleness planning: which units need a fetch this run.
//!
//! Both domains share one freshness policy shape: past partitions with
//! valid data on disk are assumed immutable history and skipped; current
//! and future partitions, and events still inside the ongoing window, are
//! always re-fetched. This catches live updates without re-pulling the
//! whole historical corpus and without needing ETags from upstream.

use chrono::NaiveDateTime;
use tracing::{debug, info};

use ttharvest_shared::{EventRecord, ONGOING_WINDOW, Result, WorkUnit, YEAR_LOOKAHEAD};
use ttharvest_store::RawStore;

/// Plan the year-listing units for this run.
///
/// Candidates are `start_year..=current_year + 2`; the lookahead exists to
/// pre-discover events announced for upcoming seasons. A year is selected
/// when no valid blob exists at its key, or when it is the current year or
/// later (new events keep being added to those).
pub fn plan_years(store: &RawStore, start_year: i32, current_year: i32) -> Vec<WorkUnit> {
    let mut units = Vec::new();

    for year in start_year..=current_year + YEAR_LOOKAHEAD {
        let unit = WorkUnit::Year { year };
        let has_data = store.is_valid_json(&unit.storage_key());

        if !has_data || year >= current_year {
            units.push(unit);
        } else {
            debug!(year, "past year already stored, skipping");
        }
    }

    info!(
        planned = units.len(),
        start_year, current_year, "year plan computed"
    );
    units
}

/// Plan the event-match units for this run.
///
/// Reads every stored year listing, and for each event carrying an id and
/// both timestamps selects it when its match file is missing, or present
/// but the event ends on/after `now + 1 day` (still ongoing, so its match
/// list may still be growing). Events in future partition years are never
/// selected; records missing required fields are skipped silently.
///
/// Unlike per-unit fetch failures, a store that cannot be enumerated here
/// is fatal: without the year listings there is no correct work set.
pub fn plan_event_matches(
    store: &RawStore,
    current_year: i32,
    now: NaiveDateTime,
) -> Result<Vec<WorkUnit>> {
    let cutoff = now + ONGOING_WINDOW;
    let mut units = Vec::new();
    let mut skipped_records = 0usize;

    for (year, key) in store.year_files()? {
        if year > current_year {
            continue;
        }

        let Some(doc) = store.read(&key) else {
            continue;
        };

        for event in unwrap_event_rows(&doc) {
            let (Some(event_id), Some(_), Some(end_raw)) =
                (event.event_id, &event.start_date, &event.end_date)
            else {
                skipped_records += 1;
                continue;
            };
            let Some(end) = EventRecord::parse_datetime(end_raw) else {
                skipped_records += 1;
                continue;
            };

            let unit = WorkUnit::EventMatches { event_id, year };
            let has_data = store.is_valid_json(&unit.storage_key());

            if !has_data || end >= cutoff {
                units.push(unit);
            }
        }
    }

    info!(
        planned = units.len(),
        skipped_records, current_year, "event-match plan computed"
    );
    Ok(units)
}

/// Deserialize the rows of a stored calendar document. Rows that do not
/// deserialize are dropped; the planner only needs id and dates.
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
