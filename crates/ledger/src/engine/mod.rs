//! The ledger engine: ingestion pipeline and service facade.
//!
//! [`LedgerService::submit`] runs one batch end to end - deduplicate, resolve
//! lots, project, persist - inside one unit of work. [`LedgerService::history`]
//! reconstructs per-movement stock levels from stored line items and
//! snapshots.

pub mod context;
pub mod dedup;
pub mod history;
pub mod lots;
pub mod projector;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use stockbridge_core::{FacilityId, MovementKey, StockCardId, UserId};

use crate::catalog::Catalog;
use crate::error::{LedgerError, ReferenceKind};
use crate::models::{MovementHistoryEntry, MovementRequest, TimeRange};
use crate::store::LedgerStore;

pub use context::BatchContext;
pub use lots::{ConflictSink, LotConflict, TracingConflictSink};

/// What happened to one submitted batch.
///
/// Duplicates and lot conflicts are expected outcomes, not errors: duplicates
/// are silently skipped (that is what makes retries safe) and conflicts are
/// escalated without blocking ingestion.
#[derive(Debug)]
pub struct SubmitOutcome {
    /// Requests applied to the ledger.
    pub applied: usize,
    /// Requests dropped as already-committed duplicates.
    pub duplicates: usize,
    /// Lot expiration conflicts detected while resolving identities.
    pub conflicts: Vec<LotConflict>,
}

/// The stock ledger engine.
///
/// Cheap to clone the `Arc`s into; each call builds its own per-batch state.
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    catalog: Arc<dyn Catalog>,
    conflicts: Arc<dyn ConflictSink>,
}

impl LedgerService {
    /// Create a service with the default tracing conflict sink.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            store,
            catalog,
            conflicts: Arc::new(TracingConflictSink),
        }
    }

    /// Replace the conflict escalation sink.
    #[must_use]
    pub fn with_conflict_sink(mut self, sink: Arc<dyn ConflictSink>) -> Self {
        self.conflicts = sink;
        self
    }

    /// Ingest one batch of client-reported stock movements for a facility.
    ///
    /// The whole batch persists atomically; on any error nothing is applied
    /// and the client may safely retry the identical batch.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnresolvableReference`] when the facility, a
    /// product, or a product's program cannot be resolved, and
    /// `LedgerError::Store` when persistence fails. Duplicates and lot
    /// conflicts are reported in the [`SubmitOutcome`], not as errors.
    #[instrument(skip(self, requests), fields(facility = %facility_id, requests = requests.len()))]
    pub async fn submit(
        &self,
        facility_id: FacilityId,
        requests: Vec<MovementRequest>,
        submitted_by: Option<UserId>,
    ) -> Result<SubmitOutcome, LedgerError> {
        let facility = self.catalog.facility_by_id(facility_id).await?.ok_or_else(|| {
            LedgerError::UnresolvableReference {
                kind: ReferenceKind::Facility,
                reference: facility_id.to_string(),
            }
        })?;

        let applied: HashSet<MovementKey> = self
            .store
            .applied_movement_keys(facility_id)
            .await?
            .into_iter()
            .collect();
        let dedup::DedupOutcome { kept, dropped } = dedup::filter_applied(requests, &applied);

        if kept.is_empty() {
            info!(duplicates = dropped, "batch fully deduplicated, nothing to apply");
            return Ok(SubmitOutcome {
                applied: 0,
                duplicates: dropped,
                conflicts: Vec::new(),
            });
        }

        let mut ctx = BatchContext::new(
            Arc::clone(&self.store),
            Arc::clone(&self.catalog),
            facility,
        );
        let conflicts = lots::resolve(&mut ctx, &kept, self.conflicts.as_ref()).await?;
        let batch = projector::project(&mut ctx, &kept, submitted_by, Utc::now()).await?;
        self.store.persist_batch(batch).await?;

        info!(
            applied = kept.len(),
            duplicates = dropped,
            conflicts = conflicts.len(),
            "stock movement batch persisted"
        );
        Ok(SubmitOutcome {
            applied: kept.len(),
            duplicates: dropped,
            conflicts,
        })
    }

    /// Stock level after each historical movement on a card, newest first.
    ///
    /// The reconstruction always runs over the card's full history - a
    /// snapshot covers every line of its date, so partial reconstruction
    /// would mis-seed - and `range` then filters what is returned.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::CardNotFound`] if the card does not exist or
    /// belongs to a different facility, [`LedgerError::MissingSnapshot`] if
    /// the ledger lacks a seed snapshot for some line's date, and
    /// `LedgerError::Store` when a lookup fails.
    #[instrument(skip(self, range), fields(card = %stock_card_id, facility = %facility_id))]
    pub async fn history(
        &self,
        stock_card_id: StockCardId,
        facility_id: FacilityId,
        range: &TimeRange,
    ) -> Result<Vec<MovementHistoryEntry>, LedgerError> {
        let card = self
            .store
            .stock_card(stock_card_id)
            .await?
            .ok_or(LedgerError::CardNotFound(stock_card_id))?;
        if card.facility_id != facility_id {
            return Err(LedgerError::CardNotFound(stock_card_id));
        }

        let lot_code = match card.lot_id {
            Some(lot_id) => self
                .store
                .lot_by_id(lot_id)
                .await?
                .map(|lot| lot.lot_code),
            None => None,
        };

        let items = self.store.line_items_for_card(card.id).await?;
        let snapshots = self.store.snapshots_for_card(card.id, None).await?;
        let soh_by_date = history::snapshot_map(&snapshots);

        let mut entries = Vec::new();
        for step in history::StockOnHandTrace::new(&items, &soh_by_date) {
            let (item, stock_on_hand_after) = step?;
            if !range.contains(item.processed_at) {
                continue;
            }
            entries.push(MovementHistoryEntry {
                processed_at: item.processed_at,
                occurred_date: item.occurred_date,
                movement_type: item.movement_type,
                quantity: item.quantity,
                stock_on_hand_after,
                reason: item.reason.clone(),
                lot_code: lot_code.clone(),
                document_number: item.document_number.clone(),
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_unknown_facility_is_unresolvable() {
        let service = LedgerService::new(
            MemoryStore::new_shared(),
            Arc::new(StaticCatalog::new()),
        );

        let err = service
            .submit(FacilityId::random(), Vec::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::UnresolvableReference {
                kind: ReferenceKind::Facility,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_batch_applies_nothing() {
        let facility = crate::models::Facility {
            id: FacilityId::random(),
            code: "HF01".to_string(),
            name: "Central Clinic".to_string(),
        };
        let store = MemoryStore::new_shared();
        let service = LedgerService::new(
            Arc::clone(&store) as Arc<dyn LedgerStore>,
            Arc::new(StaticCatalog::new().with_facility(facility.clone())),
        );

        let outcome = service.submit(facility.id, Vec::new(), None).await.unwrap();
        assert_eq!(outcome.applied, 0);
        assert_eq!(outcome.duplicates, 0);
        assert_eq!(store.line_item_count(), 0);
    }

    #[tokio::test]
    async fn test_history_for_unknown_card_is_not_found() {
        let service = LedgerService::new(
            MemoryStore::new_shared(),
            Arc::new(StaticCatalog::new()),
        );

        let err = service
            .history(
                StockCardId::random(),
                FacilityId::random(),
                &TimeRange::unbounded(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::CardNotFound(_)));
    }
}
