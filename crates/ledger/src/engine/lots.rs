//! Lot identity resolution and expiration-conflict detection.
//!
//! Every distinct `(product_code, lot_code)` in a filtered batch resolves to
//! exactly one durable [`ProductLot`]: the one already staged in this batch,
//! the one already persisted, or a freshly staged identity. A reported
//! expiration date that disagrees with the resolved lot's date is a
//! [`LotConflict`] - escalated and carried in the submit outcome, never an
//! error, and never applied over the persisted date.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::warn;

use stockbridge_core::{LotCode, LotId, ProductCode, ProductLotCode};

use super::context::BatchContext;
use crate::error::LedgerError;
use crate::models::{MovementRequest, ProductLot};

/// Disagreement between a newly reported and previously stored expiration
/// date for the same lot code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotConflict {
    /// Product the lot belongs to.
    pub product_code: ProductCode,
    /// The contested lot code.
    pub lot_code: LotCode,
    /// Expiration date the ledger holds; stays authoritative.
    pub persisted_expiration: Option<NaiveDate>,
    /// Expiration date the client reported.
    pub reported_expiration: Option<NaiveDate>,
}

/// Escalation sink for lot conflicts.
///
/// Implementations record or notify but never block ingestion.
pub trait ConflictSink: Send + Sync + 'static {
    /// Escalate one conflict.
    fn escalate(&self, conflict: &LotConflict);
}

/// Default sink: a structured warning in the log stream.
#[derive(Debug, Default)]
pub struct TracingConflictSink;

impl ConflictSink for TracingConflictSink {
    fn escalate(&self, conflict: &LotConflict) {
        warn!(
            product = %conflict.product_code,
            lot = %conflict.lot_code,
            persisted = ?conflict.persisted_expiration,
            reported = ?conflict.reported_expiration,
            "lot expiration conflict; keeping persisted date"
        );
    }
}

/// Resolve every lot touched by the batch, staging new identities and
/// collecting expiration conflicts.
///
/// Also records the earliest event date per touched lot key on the context,
/// which the projector uses to seed its snapshot search.
///
/// # Errors
///
/// Returns `LedgerError` if a store lookup fails. Conflicts are not errors.
pub async fn resolve(
    ctx: &mut BatchContext,
    requests: &[MovementRequest],
    sink: &dyn ConflictSink,
) -> Result<Vec<LotConflict>, LedgerError> {
    let mut conflicts = Vec::new();
    let mut seen: HashSet<(ProductLotCode, Option<NaiveDate>)> = HashSet::new();

    for request in requests {
        if request.lot_events.is_empty() {
            // No-lot product: the sentinel identity is the product itself.
            ctx.record_event_date(
                ProductLotCode::no_lot(request.product_code.clone()),
                request.occurred_date,
            );
            continue;
        }

        for lot_event in &request.lot_events {
            let key =
                ProductLotCode::with_lot(request.product_code.clone(), lot_event.lot_code.clone());
            ctx.record_event_date(key.clone(), lot_event.occurred_date);

            match ctx.lot(&key).await? {
                Some(resolved) => {
                    let disagrees = match (lot_event.expiration_date, resolved.expiration_date) {
                        (Some(reported), Some(persisted)) => reported != persisted,
                        _ => false,
                    };
                    if disagrees && seen.insert((key, lot_event.expiration_date)) {
                        let conflict = LotConflict {
                            product_code: request.product_code.clone(),
                            lot_code: lot_event.lot_code.clone(),
                            persisted_expiration: resolved.expiration_date,
                            reported_expiration: lot_event.expiration_date,
                        };
                        sink.escalate(&conflict);
                        conflicts.push(conflict);
                    }
                }
                None => {
                    ctx.stage_lot(ProductLot {
                        id: LotId::random(),
                        product_code: request.product_code.clone(),
                        lot_code: lot_event.lot_code.clone(),
                        expiration_date: lot_event.expiration_date,
                    });
                }
            }
        }
    }

    Ok(conflicts)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{TimeZone, Utc};

    use stockbridge_core::{FacilityId, MovementType};

    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::models::{Facility, LotEvent};
    use crate::store::{LedgerStore, MemoryStore, StagedBatch};

    /// Sink that records every escalated conflict.
    #[derive(Debug, Default)]
    struct RecordingSink {
        conflicts: Mutex<Vec<LotConflict>>,
    }

    impl ConflictSink for RecordingSink {
        fn escalate(&self, conflict: &LotConflict) {
            self.conflicts
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(conflict.clone());
        }
    }

    fn context(store: Arc<MemoryStore>) -> BatchContext {
        BatchContext::new(
            store,
            Arc::new(StaticCatalog::new()),
            Facility {
                id: FacilityId::random(),
                code: "HF01".to_string(),
                name: "Central Clinic".to_string(),
            },
        )
    }

    fn receive(product: &str, lot: &str, expiration: Option<NaiveDate>) -> MovementRequest {
        MovementRequest {
            product_code: ProductCode::from(product),
            movement_type: MovementType::Receive,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap(),
            occurred_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            quantity: 10,
            stock_on_hand: 10,
            reason: None,
            document_number: None,
            requested_quantity: None,
            signature: None,
            lot_events: vec![LotEvent {
                lot_code: LotCode::from(lot),
                expiration_date: expiration,
                quantity: 10,
                stock_on_hand: 10,
                occurred_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
                reason: None,
                document_number: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_unseen_lot_is_staged_once() {
        let store = MemoryStore::new_shared();
        let mut ctx = context(Arc::clone(&store));
        let requests = vec![
            receive("26A01", "L1", None),
            receive("26A01", "L1", None),
            receive("26A01", "L2", None),
        ];

        let conflicts = resolve(&mut ctx, &requests, &TracingConflictSink)
            .await
            .unwrap();
        assert!(conflicts.is_empty());

        let (lots, _) = ctx.take_staged();
        assert_eq!(lots.len(), 2);
    }

    #[tokio::test]
    async fn test_expiration_conflict_flagged_not_overwritten() {
        let e1 = NaiveDate::from_ymd_opt(2027, 1, 31).unwrap();
        let e2 = NaiveDate::from_ymd_opt(2027, 6, 30).unwrap();

        let store = MemoryStore::new_shared();
        let persisted = ProductLot {
            id: LotId::random(),
            product_code: ProductCode::from("26A01"),
            lot_code: LotCode::from("L1"),
            expiration_date: Some(e1),
        };
        store
            .persist_batch(StagedBatch {
                lots: vec![persisted.clone()],
                ..StagedBatch::default()
            })
            .await
            .unwrap();

        let sink = RecordingSink::default();
        let mut ctx = context(Arc::clone(&store));
        let conflicts = resolve(&mut ctx, &[receive("26A01", "L1", Some(e2))], &sink)
            .await
            .unwrap();

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].persisted_expiration, Some(e1));
        assert_eq!(conflicts[0].reported_expiration, Some(e2));
        assert_eq!(
            sink.conflicts
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .len(),
            1
        );

        // Nothing staged, persisted date untouched
        let (lots, _) = ctx.take_staged();
        assert!(lots.is_empty());
        let stored = store.find_lot(&persisted.key()).await.unwrap().unwrap();
        assert_eq!(stored.expiration_date, Some(e1));
    }

    #[tokio::test]
    async fn test_matching_expiration_is_not_a_conflict() {
        let e1 = NaiveDate::from_ymd_opt(2027, 1, 31).unwrap();
        let store = MemoryStore::new_shared();
        store
            .persist_batch(StagedBatch {
                lots: vec![ProductLot {
                    id: LotId::random(),
                    product_code: ProductCode::from("26A01"),
                    lot_code: LotCode::from("L1"),
                    expiration_date: Some(e1),
                }],
                ..StagedBatch::default()
            })
            .await
            .unwrap();

        let mut ctx = context(store);
        let conflicts = resolve(&mut ctx, &[receive("26A01", "L1", Some(e1))], &TracingConflictSink)
            .await
            .unwrap();
        assert!(conflicts.is_empty());
    }

    #[tokio::test]
    async fn test_no_lot_request_records_event_date_only() {
        let store = MemoryStore::new_shared();
        let mut ctx = context(store);
        let mut request = receive("26KIT", "unused", None);
        request.lot_events.clear();

        let conflicts = resolve(&mut ctx, &[request], &TracingConflictSink)
            .await
            .unwrap();
        assert!(conflicts.is_empty());

        let key = ProductLotCode::no_lot("26KIT");
        assert_eq!(
            ctx.earliest_event_date(&key),
            Some(NaiveDate::from_ymd_opt(2026, 3, 14).unwrap())
        );
        let (lots, _) = ctx.take_staged();
        assert!(lots.is_empty());
    }
}
