//! In-memory ledger store.
//!
//! Used by unit and integration tests. One mutex guards all tables, so
//! `persist_batch` is atomic the same way the Postgres implementation's
//! transaction is: readers observe either the whole batch or none of it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;

use stockbridge_core::{
    FacilityId, LotId, MovementKey, ProductId, ProductLotCode, ProgramId, StockCardId,
    StockEventId,
};

use super::{LedgerStore, StagedBatch, StoreError};
use crate::models::{
    CalculatedStockOnHand, PhysicalInventory, PhysicalInventoryLine,
    PhysicalInventoryLineAdjustment, ProductLot, StockCard, StockCardLineItem, StockEvent,
};

#[derive(Debug, Default)]
struct Inner {
    lots: HashMap<LotId, ProductLot>,
    lots_by_code: HashMap<ProductLotCode, LotId>,
    events: HashMap<StockEventId, StockEvent>,
    cards: HashMap<StockCardId, StockCard>,
    /// Kept in apply order; iteration in reverse is newest-first.
    line_items: Vec<StockCardLineItem>,
    inventories: Vec<PhysicalInventory>,
    inventory_lines: Vec<PhysicalInventoryLine>,
    inventory_adjustments: Vec<PhysicalInventoryLineAdjustment>,
    snapshots: HashMap<(StockCardId, NaiveDate), CalculatedStockOnHand>,
}

/// In-memory implementation of [`LedgerStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store wrapped in `Arc`.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of persisted line items, across all cards.
    #[must_use]
    pub fn line_item_count(&self) -> usize {
        self.lock().line_items.len()
    }

    /// Every persisted stock card. Test inspection helper.
    #[must_use]
    pub fn all_cards(&self) -> Vec<StockCard> {
        self.lock().cards.values().cloned().collect()
    }

    /// Every persisted physical-inventory adjustment. Test inspection helper.
    #[must_use]
    pub fn all_adjustments(&self) -> Vec<PhysicalInventoryLineAdjustment> {
        self.lock().inventory_adjustments.clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn applied_movement_keys(
        &self,
        facility_id: FacilityId,
    ) -> Result<Vec<MovementKey>, StoreError> {
        let inner = self.lock();
        let mut keys = Vec::new();
        for item in &inner.line_items {
            let Some(card) = inner.cards.get(&item.stock_card_id) else {
                return Err(StoreError::DataCorruption(format!(
                    "line item {} references missing card {}",
                    item.id, item.stock_card_id
                )));
            };
            if card.facility_id != facility_id {
                continue;
            }
            let lot_code = card
                .lot_id
                .and_then(|lot_id| inner.lots.get(&lot_id))
                .map(|lot| lot.lot_code.clone());
            keys.push(MovementKey {
                product_code: card.product_code.clone(),
                lot_code,
                recorded_at: item.recorded_at,
                signature: item.signature.clone(),
            });
        }
        Ok(keys)
    }

    async fn find_lot(&self, key: &ProductLotCode) -> Result<Option<ProductLot>, StoreError> {
        if key.is_no_lot() {
            return Ok(None);
        }
        let inner = self.lock();
        Ok(inner
            .lots_by_code
            .get(key)
            .and_then(|id| inner.lots.get(id))
            .cloned())
    }

    async fn lot_by_id(&self, id: LotId) -> Result<Option<ProductLot>, StoreError> {
        Ok(self.lock().lots.get(&id).cloned())
    }

    async fn find_stock_card(
        &self,
        facility_id: FacilityId,
        program_id: ProgramId,
        product_id: ProductId,
        lot_id: Option<LotId>,
    ) -> Result<Option<StockCard>, StoreError> {
        Ok(self
            .lock()
            .cards
            .values()
            .find(|card| {
                card.facility_id == facility_id
                    && card.program_id == program_id
                    && card.product_id == product_id
                    && card.lot_id == lot_id
            })
            .cloned())
    }

    async fn stock_card(&self, id: StockCardId) -> Result<Option<StockCard>, StoreError> {
        Ok(self.lock().cards.get(&id).cloned())
    }

    async fn line_items_for_card(
        &self,
        card_id: StockCardId,
    ) -> Result<Vec<StockCardLineItem>, StoreError> {
        // Reverse apply order = newest first, including within one batch.
        Ok(self
            .lock()
            .line_items
            .iter()
            .rev()
            .filter(|item| item.stock_card_id == card_id)
            .cloned()
            .collect())
    }

    async fn snapshots_for_card(
        &self,
        card_id: StockCardId,
        since: Option<NaiveDate>,
    ) -> Result<Vec<CalculatedStockOnHand>, StoreError> {
        let inner = self.lock();
        let mut snapshots: Vec<_> = inner
            .snapshots
            .values()
            .filter(|snap| {
                snap.stock_card_id == card_id
                    && since.is_none_or(|cutoff| snap.occurred_date >= cutoff)
            })
            .cloned()
            .collect();
        snapshots.sort_by_key(|snap| snap.occurred_date);
        Ok(snapshots)
    }

    async fn persist_batch(&self, batch: StagedBatch) -> Result<(), StoreError> {
        let mut inner = self.lock();

        for lot in batch.lots {
            if inner.lots_by_code.contains_key(&lot.key()) {
                return Err(StoreError::Conflict(format!(
                    "lot already exists: {}",
                    lot.key()
                )));
            }
            inner.lots_by_code.insert(lot.key(), lot.id);
            inner.lots.insert(lot.id, lot);
        }
        for event in batch.events {
            inner.events.insert(event.id, event);
        }
        for card in batch.cards {
            inner.cards.insert(card.id, card);
        }
        for item in batch.line_items {
            if !inner.cards.contains_key(&item.stock_card_id) {
                return Err(StoreError::DataCorruption(format!(
                    "line item {} staged for unknown card {}",
                    item.id, item.stock_card_id
                )));
            }
            inner.line_items.push(item);
        }
        inner.inventories.extend(batch.inventories);
        inner.inventory_lines.extend(batch.inventory_lines);
        inner
            .inventory_adjustments
            .extend(batch.inventory_adjustments);
        for snapshot in batch.snapshots {
            inner
                .snapshots
                .insert((snapshot.stock_card_id, snapshot.occurred_date), snapshot);
        }
        Ok(())
    }
}
