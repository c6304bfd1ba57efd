//! Persistent store interface for the ledger.
//!
//! The engine consumes storage through the narrow [`LedgerStore`] trait:
//! keyed lookups plus one atomic [`LedgerStore::persist_batch`] write. Two
//! implementations exist - [`PgStore`] for production and [`MemoryStore`] as
//! the deterministic test double.

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use stockbridge_core::{
    FacilityId, LotId, MovementKey, ProductId, ProductLotCode, ProgramId, StockCardId,
};

use crate::config::LedgerConfig;
use crate::models::{
    CalculatedStockOnHand, PhysicalInventory, PhysicalInventoryLine,
    PhysicalInventoryLineAdjustment, ProductLot, StockCard, StockCardLineItem, StockEvent,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g. duplicate lot code).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Everything one batch stages for persistence.
///
/// Produced by the ledger projector, consumed by [`LedgerStore::persist_batch`].
/// Insertion happens in dependency order (lots before cards, cards before line
/// items, ...), but callers depend only on the atomicity contract: after the
/// call either every record is visible or none is.
#[derive(Debug, Default)]
pub struct StagedBatch {
    /// Newly created lots.
    pub lots: Vec<ProductLot>,
    /// Stock events, one per `(recorded_at group, program)`.
    pub events: Vec<StockEvent>,
    /// Newly created stock cards.
    pub cards: Vec<StockCard>,
    /// Line items for new and existing cards.
    pub line_items: Vec<StockCardLineItem>,
    /// Physical count events.
    pub inventories: Vec<PhysicalInventory>,
    /// Counted lines.
    pub inventory_lines: Vec<PhysicalInventoryLine>,
    /// Discrepancy decompositions.
    pub inventory_adjustments: Vec<PhysicalInventoryLineAdjustment>,
    /// Stock-on-hand snapshots; upserted on `(stock_card_id, occurred_date)`.
    pub snapshots: Vec<CalculatedStockOnHand>,
}

impl StagedBatch {
    /// Whether the batch stages no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
            && self.events.is_empty()
            && self.cards.is_empty()
            && self.line_items.is_empty()
            && self.inventories.is_empty()
            && self.inventory_lines.is_empty()
            && self.inventory_adjustments.is_empty()
            && self.snapshots.is_empty()
    }
}

/// Abstract ledger storage.
///
/// Implementations must be thread-safe; the transaction isolation of the
/// backing store is what keeps concurrent batches for the same facility from
/// interleaving non-atomically.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Movement keys of every previously committed movement for a facility.
    ///
    /// Loaded once per submission by the deduplicator.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the lookup fails.
    async fn applied_movement_keys(
        &self,
        facility_id: FacilityId,
    ) -> Result<Vec<MovementKey>, StoreError>;

    /// Look up a lot by its `(product_code, lot_code)` natural key.
    ///
    /// Always `None` for a no-lot key: no `ProductLot` row exists for
    /// product-level tracking.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the lookup fails.
    async fn find_lot(&self, key: &ProductLotCode) -> Result<Option<ProductLot>, StoreError>;

    /// Look up a lot by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the lookup fails.
    async fn lot_by_id(&self, id: LotId) -> Result<Option<ProductLot>, StoreError>;

    /// Look up the stock card for `(facility, program, product, lot?)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the lookup fails.
    async fn find_stock_card(
        &self,
        facility_id: FacilityId,
        program_id: ProgramId,
        product_id: ProductId,
        lot_id: Option<LotId>,
    ) -> Result<Option<StockCard>, StoreError>;

    /// Look up a stock card by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the lookup fails.
    async fn stock_card(&self, id: StockCardId) -> Result<Option<StockCard>, StoreError>;

    /// All line items for a card, newest first by processing time.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the lookup fails.
    async fn line_items_for_card(
        &self,
        card_id: StockCardId,
    ) -> Result<Vec<StockCardLineItem>, StoreError>;

    /// Snapshots for a card, optionally only those on or after `since`,
    /// ascending by date.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the lookup fails.
    async fn snapshots_for_card(
        &self,
        card_id: StockCardId,
        since: Option<NaiveDate>,
    ) -> Result<Vec<CalculatedStockOnHand>, StoreError>;

    /// Persist a whole staged batch atomically.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if any write fails; in that case nothing from the
    /// batch is visible afterwards.
    async fn persist_batch(&self, batch: StagedBatch) -> Result<(), StoreError>;
}

/// Create a `PostgreSQL` connection pool from the ledger configuration.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(config: &LedgerConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(config.database_url.expose_secret())
        .await
}
