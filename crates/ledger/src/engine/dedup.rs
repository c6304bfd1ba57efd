//! Movement deduplication.
//!
//! Re-submitting a batch after a client-side timeout must be a no-op. Every
//! committed line item contributes its movement key; a submitted request is
//! dropped when any of its keys was already committed. Matching on "any"
//! rather than "all" is deliberate: batches persist atomically, so an honest
//! re-submission carries all of its keys, and "any" is the direction that can
//! never double-apply a movement.

use std::collections::HashSet;

use stockbridge_core::MovementKey;

use crate::models::MovementRequest;

/// Result of filtering a batch against previously committed movement keys.
#[derive(Debug)]
pub struct DedupOutcome {
    /// Requests that survive, original order preserved.
    pub kept: Vec<MovementRequest>,
    /// Number of requests dropped as duplicates.
    pub dropped: usize,
}

/// Drop every request whose movement key was already committed.
///
/// Pure function, no side effects; `applied` is loaded once per submission.
#[must_use]
pub fn filter_applied(
    requests: Vec<MovementRequest>,
    applied: &HashSet<MovementKey>,
) -> DedupOutcome {
    let total = requests.len();
    let kept: Vec<_> = requests
        .into_iter()
        .filter(|request| {
            request
                .movement_keys()
                .iter()
                .all(|key| !applied.contains(key))
        })
        .collect();
    let dropped = total - kept.len();
    DedupOutcome { kept, dropped }
}
