//! Concurrent harvest runs over a planned set of work units.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, Local};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use ttharvest_shared::{
    FetchOutcome, HarvestConfig, HarvestError, Result, RunSummary, WorkUnit,
};
use ttharvest_store::RawStore;

use crate::client::{ApiClient, RetryPolicy};
use crate::executor::fetch_unit;
use crate::planner;
use crate::routes::Routes;

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Callbacks for surfacing run progress to the caller (CLI progress bar,
/// test probes). Implementations must tolerate concurrent units finishing
/// in arbitrary order.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a unit reaches a terminal state.
    fn unit_done(&self, unit: &WorkUnit, outcome: &FetchOutcome, completed: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn unit_done(
        &self,
        _unit: &WorkUnit,
        _outcome: &FetchOutcome,
        _completed: usize,
        _total: usize,
    ) {
    }
    fn done(&self, _summary: &RunSummary) {}
}

// ---------------------------------------------------------------------------
// Harvester
// ---------------------------------------------------------------------------

/// Coordinates planning and concurrent execution of harvest runs.
pub struct Harvester {
    config: HarvestConfig,
    client: ApiClient,
    routes: Routes,
    store: RawStore,
}

impl Harvester {
    /// Build a harvester from the runtime configuration. Opens (and creates
    /// if needed) the raw store under `<data_dir>/raw`.
    pub fn new(config: HarvestConfig) -> Result<Self> {
        let client = ApiClient::new(&config)?;
        let store = RawStore::open(config.data_dir.join("raw"))?;
        Ok(Self {
            config,
            client,
            routes: Routes::default(),
            store,
        })
    }

    /// Point the harvester at a non-default API host (mock servers in tests).
    #[cfg(test)]
    pub fn with_routes(mut self, routes: Routes) -> Self {
        self.routes = routes;
        self
    }

    /// The raw store this harvester reads and writes.
    pub fn store(&self) -> &RawStore {
        &self.store
    }

    /// Plan and run the year-listing harvest.
    #[instrument(skip_all)]
    pub async fn harvest_events(&self, progress: &dyn ProgressReporter) -> Result<RunSummary> {
        progress.phase("Planning year listings");
        let current_year = Local::now().year();
        let units = planner::plan_years(&self.store, self.config.start_year, current_year);

        progress.phase("Fetching year listings");
        Ok(self.run(units, progress).await)
    }

    /// Plan and run the per-event match harvest. Requires year listings on
    /// disk; a store that cannot be enumerated aborts the run.
    #[instrument(skip_all)]
    pub async fn harvest_event_matches(
        &self,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary> {
        progress.phase("Scanning stored listings for work");
        let now = Local::now().naive_local();
        let units = planner::plan_event_matches(&self.store, now.year(), now)?;

        progress.phase("Fetching event matches");
        Ok(self.run(units, progress).await)
    }

    /// Run the executor over `units` under the concurrency ceiling.
    ///
    /// One task per unit, all sharing one semaphore. No ordering between
    /// units; the summary is a pure sum, so completion order never matters.
    /// A panicking or failing unit is converted into a zero outcome and the
    /// rest of the run proceeds; every launched task is awaited before the
    /// summary is produced.
    pub async fn run(&self, units: Vec<WorkUnit>, progress: &dyn ProgressReporter) -> RunSummary {
        let start = Instant::now();
        let total_units = units.len();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency as usize));
        let policy = RetryPolicy::from(&self.config.retry);

        info!(
            units = total_units,
            concurrency = self.config.concurrency,
            "starting harvest run"
        );

        let mut handles = Vec::with_capacity(total_units);
        for unit in units {
            let sem = semaphore.clone();
            let client = self.client.clone();
            let routes = self.routes.clone();
            let store = self.store.clone();
            let task_unit = unit.clone();

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                fetch_unit(&client, &policy, &routes, &store, &task_unit).await
            });
            handles.push((unit, handle));
        }

        let mut summary = RunSummary {
            units: total_units,
            failed: 0,
            total_records: 0,
            new_records: 0,
            elapsed: std::time::Duration::ZERO,
        };

        for (completed, (unit, handle)) in handles.into_iter().enumerate() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(unit = %unit, error = %e, "unit task aborted");
                    FetchOutcome::failed()
                }
            };

            if outcome.succeeded {
                summary.total_records += outcome.total;
                summary.new_records += outcome.added;
            } else {
                summary.failed += 1;
            }
            progress.unit_done(&unit, &outcome, completed + 1, total_units);
        }

        summary.elapsed = start.elapsed();

        info!(
            units = summary.units,
            failed = summary.failed,
            total_records = summary.total_records,
            new_records = summary.new_records,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "harvest run complete"
        );
        progress.done(&summary);
        summary
    }
}

/// Fatal wrapper for callers that treat an empty data root as an error.
pub fn require_year_listings(store: &RawStore) -> Result<()> {
    if store.year_files()?.is_empty() {
        return Err(HarvestError::planning(
            "no year listings on disk; run the events harvest first",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use ttharvest_shared::AppConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_harvester(tag: &str, server_uri: &str) -> Harvester {
        let mut config = HarvestConfig::from(&AppConfig::default());
        config.data_dir = std::env::temp_dir().join(format!(
            "ttharvest-runner-test-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&config.data_dir);
        config.max_jitter_ms = 0;
        config.retry.base_delay_secs = 0;
        config.concurrency = 4;

        Harvester::new(config)
            .expect("build harvester")
            .with_routes(Routes::with_base(server_uri.parse().unwrap()))
    }

    fn cleanup(harvester: &Harvester) {
        let _ = std::fs::remove_dir_all(&harvester.config.data_dir);
    }

    async fn mount_matches(server: &MockServer, event_id: i64, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/api/eventmatches"))
            .and(query_param("eventId", event_id.to_string()))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn one_failing_unit_does_not_abort_the_run() {
        let server = MockServer::start().await;
        mount_matches(&server, 1, ResponseTemplate::new(500)).await;
        mount_matches(
            &server,
            2,
            ResponseTemplate::new(200).set_body_json(json!([1, 2])),
        )
        .await;
        mount_matches(
            &server,
            3,
            ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])),
        )
        .await;

        let harvester = test_harvester("isolation", &server.uri());
        let units = vec![
            WorkUnit::EventMatches { event_id: 1, year: 2024 },
            WorkUnit::EventMatches { event_id: 2, year: 2024 },
            WorkUnit::EventMatches { event_id: 3, year: 2024 },
        ];

        let summary = harvester.run(units.clone(), &SilentProgress).await;

        assert_eq!(summary.units, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_records, 5);
        assert_eq!(summary.new_records, 5);

        // The failed unit's key was never created; the others were.
        let store = harvester.store();
        assert!(!store.is_valid_json(&units[0].storage_key()));
        assert!(store.is_valid_json(&units[1].storage_key()));
        assert!(store.is_valid_json(&units[2].storage_key()));

        cleanup(&harvester);
    }

    #[tokio::test]
    async fn every_unit_is_reported_even_when_some_fail() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingProgress {
            reported: AtomicUsize,
            failures: AtomicUsize,
        }

        impl ProgressReporter for CountingProgress {
            fn phase(&self, _name: &str) {}
            fn unit_done(
                &self,
                _unit: &WorkUnit,
                outcome: &FetchOutcome,
                _completed: usize,
                total: usize,
            ) {
                assert_eq!(total, 3);
                self.reported.fetch_add(1, Ordering::SeqCst);
                if !outcome.succeeded {
                    self.failures.fetch_add(1, Ordering::SeqCst);
                }
            }
            fn done(&self, _summary: &RunSummary) {}
        }

        let server = MockServer::start().await;
        mount_matches(&server, 20, ResponseTemplate::new(500)).await;
        for id in [21i64, 22] {
            mount_matches(
                &server,
                id,
                ResponseTemplate::new(200).set_body_json(json!([1])),
            )
            .await;
        }

        let harvester = test_harvester("reporting", &server.uri());
        let units = (20..=22)
            .map(|event_id| WorkUnit::EventMatches { event_id, year: 2024 })
            .collect();

        let progress = CountingProgress {
            reported: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        };
        let summary = harvester.run(units, &progress).await;

        // The progress counter and the summary must agree: one callback per
        // unit, failures included.
        assert_eq!(progress.reported.load(Ordering::SeqCst), 3);
        assert_eq!(progress.failures.load(Ordering::SeqCst), 1);
        assert_eq!(summary.failed, 1);

        cleanup(&harvester);
    }

    #[tokio::test]
    async fn aggregation_is_order_independent() {
        let server = MockServer::start().await;
        for (id, rows) in [(10i64, 4usize), (11, 1), (12, 7)] {
            mount_matches(
                &server,
                id,
                ResponseTemplate::new(200)
                    .set_body_json(json!(vec![0; rows]))
                    // Stagger responses so completion order differs from launch order.
                    .set_delay(Duration::from_millis((13 - id as u64) * 20)),
            )
            .await;
        }

        let harvester = test_harvester("ordering", &server.uri());
        let units = (10..=12)
            .map(|event_id| WorkUnit::EventMatches { event_id, year: 2024 })
            .collect();

        let summary = harvester.run(units, &SilentProgress).await;
        assert_eq!(summary.total_records, 12);
        assert_eq!(summary.failed, 0);

        cleanup(&harvester);
    }

    #[tokio::test]
    async fn empty_plan_produces_empty_summary() {
        let server = MockServer::start().await;
        let harvester = test_harvester("emptyplan", &server.uri());

        let summary = harvester.run(Vec::new(), &SilentProgress).await;
        assert_eq!(summary.units, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.total_records, 0);

        cleanup(&harvester);
    }

    #[tokio::test]
    async fn events_then_matches_end_to_end() {
        let server = MockServer::start().await;

        // Every calendar year responds with one completed event.
        Mock::given(method("POST"))
            .and(path("/api/eventcalendar"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "rows": [{
                    "EventId": 900,
                    "EventName": "Archive Open",
                    "StartDateTime": "2021-02-01T00:00:00",
                    "EndDateTime": "2021-02-07T00:00:00"
                }]
            }])))
            .mount(&server)
            .await;
        mount_matches(
            &server,
            900,
            ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])),
        )
        .await;

        let mut harvester = test_harvester("endtoend", &server.uri());
        harvester.config.start_year = Local::now().year();

        let events = harvester.harvest_events(&SilentProgress).await.expect("events run");
        // start_year..=current+2 inclusive.
        assert_eq!(events.units, 3);
        assert!(events.total_records > 0);

        // Only the current-year listing yields a plannable event: future
        // partition years are never selected.
        let matches = harvester
            .harvest_event_matches(&SilentProgress)
            .await
            .expect("matches run");
        assert!(matches.units >= 1);
        assert_eq!(matches.failed, 0);

        cleanup(&harvester);
    }

    #[test]
    fn missing_listings_is_a_planning_error() {
        let root = std::env::temp_dir().join(format!(
            "ttharvest-runner-test-nolistings-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&root);
        let store = RawStore::open(&root).expect("open store");

        let err = require_year_listings(&store).expect_err("must fail");
        assert!(matches!(err, HarvestError::Planning { .. }));

        let _ = std::fs::remove_dir_all(&root);
    }
}
