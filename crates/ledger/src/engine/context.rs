//! Per-batch lookup cache.
//!
//! A [`BatchContext`] gives one submission a single consistent view of "what
//! already exists": the facility, catalog products, lots, and stock cards the
//! batch touches, plus everything the batch itself stages. It is created
//! fresh inside [`crate::engine::LedgerService::submit`] and dropped with it -
//! sharing one across concurrent batches would let their lot-resolution and
//! snapshot-update steps interleave, so don't.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;

use stockbridge_core::{LotId, ProductCode, ProductId, ProductLotCode, ProgramId};

use crate::catalog::Catalog;
use crate::error::{LedgerError, ReferenceKind};
use crate::models::{CatalogProduct, Facility, ProductLot, StockCard};
use crate::store::LedgerStore;

/// Key for stock-card lookups within one batch. The facility is fixed for the
/// whole batch and therefore not part of the key.
type CardKey = (ProgramId, ProductId, Option<LotId>);

/// Transaction-scoped cache of facility, product, lot, and stock-card lookups.
pub struct BatchContext {
    store: Arc<dyn LedgerStore>,
    catalog: Arc<dyn Catalog>,
    facility: Facility,
    products: HashMap<ProductCode, CatalogProduct>,
    existing_lots: HashMap<ProductLotCode, ProductLot>,
    staged_lots: HashMap<ProductLotCode, ProductLot>,
    staged_lot_order: Vec<ProductLotCode>,
    existing_cards: HashMap<CardKey, StockCard>,
    staged_cards: HashMap<CardKey, StockCard>,
    staged_card_order: Vec<CardKey>,
    earliest_event: HashMap<ProductLotCode, NaiveDate>,
}

impl BatchContext {
    /// Create a fresh context for one batch at one facility.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, catalog: Arc<dyn Catalog>, facility: Facility) -> Self {
        Self {
            store,
            catalog,
            facility,
            products: HashMap::new(),
            existing_lots: HashMap::new(),
            staged_lots: HashMap::new(),
            staged_lot_order: Vec::new(),
            existing_cards: HashMap::new(),
            staged_cards: HashMap::new(),
            staged_card_order: Vec::new(),
            earliest_event: HashMap::new(),
        }
    }

    /// The facility this batch belongs to.
    #[must_use]
    pub const fn facility(&self) -> &Facility {
        &self.facility
    }

    /// The backing store, for lookups the context does not cache.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Resolve a product through the cache, then the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnresolvableReference`] if the catalog has no
    /// entry for the code - fatal for the whole batch.
    pub async fn product(&mut self, code: &ProductCode) -> Result<CatalogProduct, LedgerError> {
        if let Some(product) = self.products.get(code) {
            return Ok(product.clone());
        }
        let product = self.catalog.product_by_code(code).await?.ok_or_else(|| {
            LedgerError::UnresolvableReference {
                kind: ReferenceKind::Product,
                reference: code.to_string(),
            }
        })?;
        self.products.insert(code.clone(), product.clone());
        Ok(product)
    }

    /// Resolve a lot through the staged set, the cache, then the store.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the store lookup fails.
    pub async fn lot(&mut self, key: &ProductLotCode) -> Result<Option<ProductLot>, LedgerError> {
        if let Some(staged) = self.staged_lots.get(key) {
            return Ok(Some(staged.clone()));
        }
        if let Some(existing) = self.existing_lots.get(key) {
            return Ok(Some(existing.clone()));
        }
        match self.store.find_lot(key).await? {
            Some(lot) => {
                self.existing_lots.insert(key.clone(), lot.clone());
                Ok(Some(lot))
            }
            None => Ok(None),
        }
    }

    /// Stage a newly created lot for this batch.
    pub fn stage_lot(&mut self, lot: ProductLot) {
        let key = lot.key();
        if self.staged_lots.insert(key.clone(), lot).is_none() {
            self.staged_lot_order.push(key);
        }
    }

    /// Record that the batch touches `key` on `date`, keeping the earliest
    /// date seen. The projector seeds its snapshot search no later than this.
    pub fn record_event_date(&mut self, key: ProductLotCode, date: NaiveDate) {
        self.earliest_event
            .entry(key)
            .and_modify(|earliest| {
                if date < *earliest {
                    *earliest = date;
                }
            })
            .or_insert(date);
    }

    /// Earliest event date recorded for `key`, if the batch touches it.
    #[must_use]
    pub fn earliest_event_date(&self, key: &ProductLotCode) -> Option<NaiveDate> {
        self.earliest_event.get(key).copied()
    }

    /// Resolve a stock card through the staged set, the cache, then the store.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the store lookup fails.
    pub async fn stock_card(
        &mut self,
        program_id: ProgramId,
        product_id: ProductId,
        lot_id: Option<LotId>,
    ) -> Result<Option<StockCard>, LedgerError> {
        let key = (program_id, product_id, lot_id);
        if let Some(staged) = self.staged_cards.get(&key) {
            return Ok(Some(staged.clone()));
        }
        if let Some(existing) = self.existing_cards.get(&key) {
            return Ok(Some(existing.clone()));
        }
        match self
            .store
            .find_stock_card(self.facility.id, program_id, product_id, lot_id)
            .await?
        {
            Some(card) => {
                self.existing_cards.insert(key, card.clone());
                Ok(Some(card))
            }
            None => Ok(None),
        }
    }

    /// Stage a newly created stock card for this batch.
    pub fn stage_card(&mut self, card: StockCard) {
        let key = (card.program_id, card.product_id, card.lot_id);
        if self.staged_cards.insert(key, card).is_none() {
            self.staged_card_order.push(key);
        }
    }

    /// Drain everything this batch staged, in staging order, for persistence.
    pub fn take_staged(&mut self) -> (Vec<ProductLot>, Vec<StockCard>) {
        let lots = self
            .staged_lot_order
            .drain(..)
            .filter_map(|key| self.staged_lots.remove(&key))
            .collect();
        let cards = self
            .staged_card_order
            .drain(..)
            .filter_map(|key| self.staged_cards.remove(&key))
            .collect();
        (lots, cards)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stockbridge_core::{FacilityId, LotCode};

    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::store::MemoryStore;

    fn context() -> BatchContext {
        let facility = Facility {
            id: FacilityId::random(),
            code: "HF01".to_string(),
            name: "Central Clinic".to_string(),
        };
        BatchContext::new(
            MemoryStore::new_shared(),
            Arc::new(StaticCatalog::new()),
            facility,
        )
    }

    #[tokio::test]
    async fn test_unknown_product_is_unresolvable() {
        let mut ctx = context();
        let err = ctx.product(&ProductCode::from("26A01")).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::UnresolvableReference {
                kind: ReferenceKind::Product,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_staged_lot_visible_to_lookup() {
        let mut ctx = context();
        let key = ProductLotCode::with_lot("26A01", "L1");
        assert!(ctx.lot(&key).await.unwrap().is_none());

        ctx.stage_lot(ProductLot {
            id: LotId::random(),
            product_code: ProductCode::from("26A01"),
            lot_code: LotCode::from("L1"),
            expiration_date: None,
        });
        assert!(ctx.lot(&key).await.unwrap().is_some());

        let (lots, cards) = ctx.take_staged();
        assert_eq!(lots.len(), 1);
        assert!(cards.is_empty());
    }

    #[test]
    fn test_earliest_event_date_keeps_minimum() {
        let mut ctx = context();
        let key = ProductLotCode::with_lot("26A01", "L1");
        let d1 = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();

        ctx.record_event_date(key.clone(), d2);
        ctx.record_event_date(key.clone(), d1);
        ctx.record_event_date(key.clone(), d2);
        assert_eq!(ctx.earliest_event_date(&key), Some(d1));
    }
}
