//! Ledger records: lots, stock cards, events, line items, snapshots, and
//! physical inventories.
//!
//! Everything here is append-only once persisted, with one exception: a
//! [`CalculatedStockOnHand`] snapshot is overwritten when a later batch
//! reports the same `(stock_card_id, occurred_date)`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockbridge_core::{
    AdjustmentDirection, AdjustmentId, FacilityId, LineItemId, LotCode, LotId, MovementType,
    PhysicalInventoryId, PhysicalInventoryLineId, ProductCode, ProductId, ProductLotCode,
    ProgramId, SnapshotId, StockCardId, StockEventId, UserId,
};

/// A durable lot identity, created once per distinct `(product_code, lot_code)`.
///
/// Subsequent movements reference the lot by identity and never recreate it; a
/// conflicting reported expiration date is flagged, not applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductLot {
    /// Unique lot ID.
    pub id: LotId,
    /// Product this lot belongs to.
    pub product_code: ProductCode,
    /// Lot code as printed on the packaging.
    pub lot_code: LotCode,
    /// Expiration date reported when the lot was first seen.
    pub expiration_date: Option<NaiveDate>,
}

impl ProductLot {
    /// The natural key of this lot.
    #[must_use]
    pub fn key(&self) -> ProductLotCode {
        ProductLotCode {
            product_code: self.product_code.clone(),
            lot_code: Some(self.lot_code.clone()),
        }
    }
}

/// The running aggregate for `(facility, program, product, lot?)`.
///
/// Created on the first movement for that tuple; owns the ordered history of
/// line items and snapshots for the tuple. `lot_id` is `None` for no-lot
/// products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockCard {
    /// Unique stock card ID.
    pub id: StockCardId,
    /// Facility the card belongs to.
    pub facility_id: FacilityId,
    /// Program the product was resolved to when the card was created.
    pub program_id: ProgramId,
    /// Product tracked by this card.
    pub product_id: ProductId,
    /// Product code, denormalized so movement keys can be derived from the
    /// ledger alone.
    pub product_code: ProductCode,
    /// Lot tracked by this card, absent for no-lot products.
    pub lot_id: Option<LotId>,
    /// When the card was created.
    pub created_at: DateTime<Utc>,
}

/// An immutable record of one ingested client submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockEvent {
    /// Unique event ID.
    pub id: StockEventId,
    /// Facility the submission came from.
    pub facility_id: FacilityId,
    /// Program all of this event's line items belong to.
    pub program_id: ProgramId,
    /// Server-side ingestion instant.
    pub processed_at: DateTime<Utc>,
    /// Client submission signature, if supplied.
    pub signature: Option<String>,
    /// User who submitted the batch, if known.
    pub submitted_by: Option<UserId>,
}

/// One signed quantity delta tied to a stock event and a stock card.
///
/// The sign follows [`MovementType::signed_quantity`]: receipts and positive
/// adjustments positive, issues and negative adjustments negative, physical
/// inventory the net credit-minus-debit discrepancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockCardLineItem {
    /// Unique line item ID.
    pub id: LineItemId,
    /// Event this line was ingested with.
    pub stock_event_id: StockEventId,
    /// Card this line applies to.
    pub stock_card_id: StockCardId,
    /// Kind of movement.
    pub movement_type: MovementType,
    /// Declared reason, source, or destination name.
    pub reason: Option<String>,
    /// Client document number (requisition, delivery note).
    pub document_number: Option<String>,
    /// Client movement signature, part of the movement key.
    pub signature: Option<String>,
    /// Signed quantity delta.
    pub quantity: i64,
    /// Quantity originally requested, when the client reported one (issues).
    pub requested_quantity: Option<i64>,
    /// Business date the movement occurred on.
    pub occurred_date: NaiveDate,
    /// Client-declared submission instant, part of the movement key.
    pub recorded_at: DateTime<Utc>,
    /// Server-side ingestion instant.
    pub processed_at: DateTime<Utc>,
}

/// Authoritative stock on hand for a card after all movements up to and
/// including `occurred_date`. At most one snapshot exists per
/// `(stock_card_id, occurred_date)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatedStockOnHand {
    /// Unique snapshot ID.
    pub id: SnapshotId,
    /// Card the snapshot belongs to.
    pub stock_card_id: StockCardId,
    /// Date the snapshot is authoritative for.
    pub occurred_date: NaiveDate,
    /// Stock on hand at end of that date.
    pub stock_on_hand: i64,
}

/// A physical count event covering one or more stock cards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalInventory {
    /// Unique physical inventory ID.
    pub id: PhysicalInventoryId,
    /// Stock event the count was ingested with.
    pub stock_event_id: StockEventId,
    /// Facility the count took place at.
    pub facility_id: FacilityId,
    /// Program the counted products belong to.
    pub program_id: ProgramId,
    /// Date of the count.
    pub occurred_date: NaiveDate,
}

/// One counted card within a physical inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalInventoryLine {
    /// Unique line ID.
    pub id: PhysicalInventoryLineId,
    /// Physical inventory this line belongs to.
    pub physical_inventory_id: PhysicalInventoryId,
    /// Card that was counted.
    pub stock_card_id: StockCardId,
    /// Stock on hand the client counted.
    pub counted_quantity: i64,
}

/// Decomposition of a counted discrepancy into an adjustment reason.
///
/// The net of a line's adjustments (credits minus debits) equals the signed
/// quantity of the corresponding ledger line item, so later reconciliation
/// can explain why the count changed the stock level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalInventoryLineAdjustment {
    /// Unique adjustment ID.
    pub id: AdjustmentId,
    /// Physical inventory line this adjustment explains.
    pub line_id: PhysicalInventoryLineId,
    /// Declared adjustment reason name.
    pub reason: String,
    /// Whether the discrepancy added or removed stock.
    pub direction: AdjustmentDirection,
    /// Magnitude of the adjustment, always non-negative.
    pub quantity: i64,
}
