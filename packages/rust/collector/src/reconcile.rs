//! Delta reconciliation between stored and freshly fetched record counts.

/// Records gained since the previous run, floored at zero.
///
/// A shrinking upstream count (an event cancelled or records removed) must
/// never surface as negative "added" records in the run summary.
pub fn added_records(old: usize, new: usize) -> usize {
    new.saturating_sub(old)
}
