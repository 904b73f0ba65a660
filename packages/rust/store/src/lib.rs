//! Raw JSON blob store for harvested API payloads.
//!
//! Documents are keyed by hierarchical paths relative to a data root:
//! `events/events_<year>.json` for calendar listings and
//! `event_matches/<year>/event_matches_<id>.json` for per-event match lists.
//! Writes are full overwrites via a temp file + rename, so a key always
//! holds either the previous complete document or the new one.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use ttharvest_shared::{HarvestError, PayloadShape, Result};

/// Filename pattern for stored year listings.
fn year_file_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^events_(\d{1,4})\.json$").expect("static regex"))
}

// ---------------------------------------------------------------------------
// RawStore
// ---------------------------------------------------------------------------

/// File-backed store for raw JSON documents.
#[derive(Debug, Clone)]
pub struct RawStore {
    root: PathBuf,
}

impl RawStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| HarvestError::io(&root, e))?;
        Ok(Self { root })
    }

    /// The data root this store operates under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn abs(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// True when the key holds a non-empty, well-formed JSON document.
    pub fn is_valid_json(&self, key: &str) -> bool {
        self.read(key).is_some()
    }

    /// Read the document at `key`. Absent, empty, or unparseable files all
    /// come back as `None` — a prior run's bad write is treated the same as
    /// no data, so the unit gets re-fetched.
    pub fn read(&self, key: &str) -> Option<Value> {
        let path = self.abs(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) if !c.is_empty() => c,
            Ok(_) => return None,
            Err(_) => return None,
        };
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(?path, error = %e, "stored file is not valid JSON, ignoring");
                None
            }
        }
    }

    /// Write a document at `key`, replacing any previous content.
    ///
    /// The document is serialized to a sibling temp file first and renamed
    /// into place, so a crash mid-write never leaves a truncated document
    /// at the key.
    pub fn write(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.abs(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HarvestError::io(parent, e))?;
        }

        let content = serde_json::to_string_pretty(value)
            .map_err(|e| HarvestError::Storage(format!("serialize {key}: {e}")))?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| HarvestError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| HarvestError::io(&path, e))?;

        debug!(?path, "wrote raw document");
        Ok(())
    }

    /// Record count stored at `key` under the given unwrap rule.
    /// 0 when the key is absent or invalid.
    pub fn record_count(&self, key: &str, shape: PayloadShape) -> usize {
        self.read(key).map(|v| count_records(&v, shape)).unwrap_or(0)
    }

    /// Enumerate stored year-listing files as `(year, key)` pairs, sorted
    /// by year. Files not matching the `events_<year>.json` pattern are
    /// skipped silently.
    ///
    /// An unreadable events directory is a hard error here: the event-match
    /// planner cannot produce a correct work set without it.
    pub fn year_files(&self) -> Result<Vec<(i32, String)>> {
        let dir = self.root.join("events");
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| HarvestError::io(&dir, e))?;

        let mut years = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| HarvestError::io(&dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(caps) = year_file_pattern().captures(name) else {
                continue;
            };
            match caps[1].parse::<i32>() {
                Ok(year) => years.push((year, format!("events/{name}"))),
                Err(_) => {
                    warn!(name, "year filename matched pattern but did not parse, skipping");
                }
            }
        }

        years.sort_by_key(|(year, _)| *year);
        Ok(years)
    }
}

// ---------------------------------------------------------------------------
// Unwrap rules
// ---------------------------------------------------------------------------

/// Extract a record count from a raw payload under a given shape.
/// Any deviation from the expected shape counts as zero records.
pub fn count_records(payload: &Value, shape: PayloadShape) -> usize {
    match shape {
        PayloadShape::Wrapped => wrapped_count(payload),
        PayloadShape::Flat => flat_count(payload),
    }
}

/// Count for the calendar shape: `payload[0].rows.len()`.
fn wrapped_count(payload: &Value) -> usize {
    payload
        .as_array()
        .and_then(|list| list.first())
        .and_then(|first| first.get("rows"))
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

/// Count for the flat shape: length of the list itself.
fn flat_count(payload: &Value) -> usize {
    payload.as_array().map(Vec::len).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store(tag: &str) -> RawStore {
        let root = std::env::temp_dir().join(format!(
            "ttharvest-store-test-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&root);
        RawStore::open(root).expect("open temp store")
    }

    fn cleanup(store: &RawStore) {
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[test]
    fn write_then_read_roundtrip() {
        let store = temp_store("roundtrip");
        let doc = json!([{"rows": [{"EventId": 1}, {"EventId": 2}]}]);

        store.write("events/events_2024.json", &doc).expect("write");
        let read = store.read("events/events_2024.json").expect("present");
        assert_eq!(read, doc);
        assert!(store.is_valid_json("events/events_2024.json"));

        cleanup(&store);
    }

    #[test]
    fn absent_and_invalid_read_as_none() {
        let store = temp_store("invalid");
        assert_eq!(store.read("events/events_1900.json"), None);

        // Hand-write garbage where a document should be.
        let path = store.root().join("events");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("events_1900.json"), "{not json").unwrap();
        assert_eq!(store.read("events/events_1900.json"), None);
        assert!(!store.is_valid_json("events/events_1900.json"));
        assert_eq!(
            store.record_count("events/events_1900.json", PayloadShape::Wrapped),
            0
        );

        cleanup(&store);
    }

    #[test]
    fn empty_file_is_invalid() {
        let store = temp_store("empty");
        let dir = store.root().join("events");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("events_2020.json"), "").unwrap();

        assert!(!store.is_valid_json("events/events_2020.json"));
        cleanup(&store);
    }

    #[test]
    fn overwrite_replaces_document() {
        let store = temp_store("overwrite");
        let key = "event_matches/2024/event_matches_77.json";

        store.write(key, &json!([1, 2])).expect("first write");
        store.write(key, &json!([1, 2, 3, 4])).expect("second write");

        assert_eq!(store.record_count(key, PayloadShape::Flat), 4);
        cleanup(&store);
    }

    #[test]
    fn wrapped_count_rules() {
        assert_eq!(
            count_records(&json!([{"rows": [1, 2, 3]}]), PayloadShape::Wrapped),
            3
        );
        assert_eq!(count_records(&json!([]), PayloadShape::Wrapped), 0);
        assert_eq!(count_records(&json!([{}]), PayloadShape::Wrapped), 0);
        assert_eq!(
            count_records(&json!({"rows": [1]}), PayloadShape::Wrapped),
            0
        );
        assert_eq!(count_records(&json!("nope"), PayloadShape::Wrapped), 0);
    }

    #[test]
    fn flat_count_rules() {
        assert_eq!(count_records(&json!([1, 2]), PayloadShape::Flat), 2);
        assert_eq!(count_records(&json!([]), PayloadShape::Flat), 0);
        assert_eq!(count_records(&json!({"rows": []}), PayloadShape::Flat), 0);
    }

    #[test]
    fn year_files_skips_malformed_names() {
        let store = temp_store("yearfiles");
        let dir = store.root().join("events");
        std::fs::create_dir_all(&dir).unwrap();

        for name in [
            "events_2021.json",
            "events_2023.json",
            "events_backup.json",
            "notes.txt",
            "events_2022.json",
        ] {
            std::fs::write(dir.join(name), "[]").unwrap();
        }

        let years = store.year_files().expect("list");
        let listed: Vec<i32> = years.iter().map(|(y, _)| *y).collect();
        assert_eq!(listed, vec![2021, 2022, 2023]);
        assert_eq!(years[0].1, "events/events_2021.json");

        cleanup(&store);
    }

    #[test]
    fn year_files_empty_when_no_events_dir() {
        let store = temp_store("noevents");
        assert!(store.year_files().expect("list").is_empty());
        cleanup(&store);
    }
}
