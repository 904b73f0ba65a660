//! Per-unit fetch execution: one network call, one delta, one write.

use tracing::{debug, warn};

use ttharvest_shared::{FetchOutcome, HarvestError, WorkUnit};
use ttharvest_store::{RawStore, count_records};

use crate::client::{ApiClient, RetryPolicy};
use crate::reconcile;
use crate::routes::Routes;

/// Execute one work unit end to end and report its outcome.
///
/// The previous count at the unit's key is read first so the delta survives
/// the overwrite. Any failure leaves the store untouched for this key and
/// yields an all-zero outcome; this function never propagates an error, so
/// one bad unit cannot take down a run.
pub async fn fetch_unit(
    client: &ApiClient,
    policy: &RetryPolicy,
    routes: &Routes,
    store: &RawStore,
    unit: &WorkUnit,
) -> FetchOutcome {
    let key = unit.storage_key();
    let shape = unit.payload_shape();
    let old_count = store.record_count(&key, shape);

    let route = match unit {
        WorkUnit::Year { year } => routes.events_year(*year),
        WorkUnit::EventMatches { event_id, .. } => routes.event_matches(*event_id),
    };

    let payload = match client.fetch_with_retry(&route, policy).await {
        Ok(payload) => payload,
        Err(HarvestError::MalformedResponse { message }) => {
            // Upstream schema drift: degrade to zero records instead of
            // failing the unit, and keep whatever was stored before.
            warn!(unit = %unit, message, "response unusable, counting zero records");
            return FetchOutcome {
                total: 0,
                added: 0,
                succeeded: true,
            };
        }
        Err(e) => {
            warn!(unit = %unit, error = %e, "fetch failed");
            return FetchOutcome::failed();
        }
    };

    let total = count_records(&payload, shape);
    let added = reconcile::added_records(old_count, total);

    if let Err(e) = store.write(&key, &payload) {
        // The fetch worked, but persistence is the point of the operation.
        warn!(unit = %unit, error = %e, "store write failed");
        return FetchOutcome::failed();
    }

    debug!(unit = %unit, total, added, "unit complete");
    FetchOutcome {
        total,
        added,
        succeeded: true,
    }
}
