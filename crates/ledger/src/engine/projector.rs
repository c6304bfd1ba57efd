//! Forward ledger projection.
//!
//! Turns a deduplicated, lot-resolved batch into the records one atomic write
//! will persist: stock events, line items, stock cards, physical inventories,
//! and stock-on-hand snapshots.
//!
//! Apply order is deterministic and independent of network arrival order:
//! requests are grouped by their client-declared `recorded_at` and processed
//! in ascending order, then sub-grouped by resolved program, one stock event
//! per `(group, program)` pair.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use stockbridge_core::{
    AdjustmentDirection, AdjustmentId, LineItemId, LotCode, MovementType, PhysicalInventoryId,
    PhysicalInventoryLineId, ProductLotCode, ProgramId, SnapshotId, StockCardId, StockEventId,
    UserId,
};

use super::context::BatchContext;
use crate::error::{LedgerError, ReferenceKind};
use crate::models::{
    CalculatedStockOnHand, CatalogProduct, MovementRequest, PhysicalInventory,
    PhysicalInventoryLine, PhysicalInventoryLineAdjustment, StockCard, StockCardLineItem,
    StockEvent,
};
use crate::store::StagedBatch;

/// Reason name of a neutral physical count: the count confirms or sets the
/// stock level without explaining a discrepancy, so no adjustment records are
/// staged for it.
pub const NEUTRAL_INVENTORY_REASON: &str = "INVENTORY";

/// One concrete movement within a request: either a lot event, or the single
/// product-level movement of a no-lot request.
struct MovementLine<'a> {
    lot_code: Option<&'a LotCode>,
    quantity: i64,
    stock_on_hand: i64,
    occurred_date: NaiveDate,
    reason: Option<&'a str>,
    document_number: Option<&'a str>,
}

fn movement_lines(request: &MovementRequest) -> Vec<MovementLine<'_>> {
    if request.lot_events.is_empty() {
        return vec![MovementLine {
            lot_code: None,
            quantity: request.quantity,
            stock_on_hand: request.stock_on_hand,
            occurred_date: request.occurred_date,
            reason: request.reason.as_deref(),
            document_number: request.document_number.as_deref(),
        }];
    }
    request
        .lot_events
        .iter()
        .map(|lot| MovementLine {
            lot_code: Some(&lot.lot_code),
            quantity: lot.quantity,
            stock_on_hand: lot.stock_on_hand,
            occurred_date: lot.occurred_date,
            reason: lot.reason.as_deref().or(request.reason.as_deref()),
            document_number: lot
                .document_number
                .as_deref()
                .or(request.document_number.as_deref()),
        })
        .collect()
}

fn program_of(product: &CatalogProduct) -> Result<ProgramId, LedgerError> {
    product
        .program_id
        .ok_or_else(|| LedgerError::UnresolvableReference {
            kind: ReferenceKind::Program,
            reference: product.code.to_string(),
        })
}

fn lot_key(product: &CatalogProduct, lot_code: Option<&LotCode>) -> ProductLotCode {
    match lot_code {
        Some(code) => ProductLotCode::with_lot(product.code.clone(), code.clone()),
        None => ProductLotCode::no_lot(product.code.clone()),
    }
}

/// Resolve (or stage) the stock card one movement line lands on.
async fn card_for_line(
    ctx: &mut BatchContext,
    product: &CatalogProduct,
    program_id: ProgramId,
    lot_code: Option<&LotCode>,
    processed_at: DateTime<Utc>,
) -> Result<StockCardId, LedgerError> {
    let lot_id = match lot_code {
        Some(code) => {
            let key = ProductLotCode::with_lot(product.code.clone(), code.clone());
            let lot = ctx.lot(&key).await?.ok_or_else(|| {
                LedgerError::Internal(format!("lot {key} not resolved before projection"))
            })?;
            Some(lot.id)
        }
        None => None,
    };

    if let Some(card) = ctx.stock_card(program_id, product.id, lot_id).await? {
        return Ok(card.id);
    }
    let card = StockCard {
        id: StockCardId::random(),
        facility_id: ctx.facility().id,
        program_id,
        product_id: product.id,
        product_code: product.code.clone(),
        lot_id,
        created_at: processed_at,
    };
    let id = card.id;
    ctx.stage_card(card);
    Ok(id)
}

/// Project a filtered, lot-resolved batch into a [`StagedBatch`].
///
/// Both walks over the request list happen here: the first stages events,
/// cards, line items, and physical-inventory records in apply order; the
/// second stages the stock-on-hand snapshots from the client-declared values,
/// later declarations overwriting earlier ones per `(card, date)`.
///
/// # Errors
///
/// Returns [`LedgerError::UnresolvableReference`] for a product without a
/// catalog entry or program assignment - fatal before anything is persisted -
/// and `LedgerError::Store` if a lookup fails.
pub async fn project(
    ctx: &mut BatchContext,
    requests: &[MovementRequest],
    submitted_by: Option<UserId>,
    processed_at: DateTime<Utc>,
) -> Result<StagedBatch, LedgerError> {
    let mut batch = StagedBatch::default();

    // Deterministic apply order: ascending recorded_at, submission order within.
    let mut groups: BTreeMap<DateTime<Utc>, Vec<&MovementRequest>> = BTreeMap::new();
    for request in requests {
        groups.entry(request.recorded_at).or_default().push(request);
    }

    for group in groups.values() {
        // One stock event per (recorded_at group, program).
        let mut by_program: Vec<(ProgramId, Vec<&MovementRequest>)> = Vec::new();
        for &request in group {
            let product = ctx.product(&request.product_code).await?;
            let program_id = program_of(&product)?;
            match by_program.iter_mut().find(|(id, _)| *id == program_id) {
                Some((_, list)) => list.push(request),
                None => by_program.push((program_id, vec![request])),
            }
        }

        for (program_id, program_requests) in by_program {
            let event_id = StockEventId::random();
            batch.events.push(StockEvent {
                id: event_id,
                facility_id: ctx.facility().id,
                program_id,
                processed_at,
                signature: program_requests.iter().find_map(|r| r.signature.clone()),
                submitted_by,
            });

            // Lazily created when the event carries explained count lines.
            let mut inventory_id: Option<PhysicalInventoryId> = None;

            for request in program_requests {
                let product = ctx.product(&request.product_code).await?;
                for line in movement_lines(request) {
                    let card_id =
                        card_for_line(ctx, &product, program_id, line.lot_code, processed_at)
                            .await?;
                    let quantity = request.movement_type.signed_quantity(line.quantity);

                    if request.movement_type == MovementType::PhysicalInventory
                        && let Some(reason) = line.reason
                        && reason != NEUTRAL_INVENTORY_REASON
                    {
                        let inv_id = match inventory_id {
                            Some(id) => id,
                            None => {
                                let id = PhysicalInventoryId::random();
                                batch.inventories.push(PhysicalInventory {
                                    id,
                                    stock_event_id: event_id,
                                    facility_id: ctx.facility().id,
                                    program_id,
                                    occurred_date: request.occurred_date,
                                });
                                inventory_id = Some(id);
                                id
                            }
                        };
                        let line_id = PhysicalInventoryLineId::random();
                        batch.inventory_lines.push(PhysicalInventoryLine {
                            id: line_id,
                            physical_inventory_id: inv_id,
                            stock_card_id: card_id,
                            counted_quantity: line.stock_on_hand,
                        });
                        batch
                            .inventory_adjustments
                            .push(PhysicalInventoryLineAdjustment {
                                id: AdjustmentId::random(),
                                line_id,
                                reason: reason.to_string(),
                                direction: if quantity >= 0 {
                                    AdjustmentDirection::Credit
                                } else {
                                    AdjustmentDirection::Debit
                                },
                                quantity: quantity.abs(),
                            });
                    }

                    batch.line_items.push(StockCardLineItem {
                        id: LineItemId::random(),
                        stock_event_id: event_id,
                        stock_card_id: card_id,
                        movement_type: request.movement_type,
                        reason: line.reason.map(ToString::to_string),
                        document_number: line.document_number.map(ToString::to_string),
                        signature: request.signature.clone(),
                        quantity,
                        requested_quantity: request.requested_quantity,
                        occurred_date: line.occurred_date,
                        recorded_at: request.recorded_at,
                        processed_at,
                    });
                }
            }
        }
    }

    stage_snapshots(ctx, &groups, &mut batch, processed_at).await?;

    let (lots, cards) = ctx.take_staged();
    batch.lots = lots;
    batch.cards = cards;
    Ok(batch)
}

/// Second chronological walk: stage each touched card's stock-on-hand
/// snapshot at the line's occurred date, taking the client-declared value.
///
/// Clients report their locally observed on-hand level; the server trusts it
/// as the new snapshot rather than re-deriving it from deltas, which is what
/// keeps server and disconnected-client views converged even after
/// client-side drift.
async fn stage_snapshots(
    ctx: &mut BatchContext,
    groups: &BTreeMap<DateTime<Utc>, Vec<&MovementRequest>>,
    batch: &mut StagedBatch,
    processed_at: DateTime<Utc>,
) -> Result<(), LedgerError> {
    let store = Arc::clone(ctx.store());
    let mut order: Vec<(StockCardId, NaiveDate)> = Vec::new();
    let mut declared: HashMap<(StockCardId, NaiveDate), i64> = HashMap::new();
    let mut existing_ids: HashMap<(StockCardId, NaiveDate), SnapshotId> = HashMap::new();
    let mut prefetched: HashSet<StockCardId> = HashSet::new();

    for group in groups.values() {
        for &request in group {
            let product = ctx.product(&request.product_code).await?;
            let program_id = program_of(&product)?;
            for line in movement_lines(request) {
                let card_id =
                    card_for_line(ctx, &product, program_id, line.lot_code, processed_at).await?;

                if prefetched.insert(card_id) {
                    // Overwrite rather than duplicate: reuse the ids of any
                    // snapshots already persisted for the dates this batch
                    // re-reports. The search starts at the earliest event
                    // date the resolver recorded for this lot.
                    let since = ctx.earliest_event_date(&lot_key(&product, line.lot_code));
                    for snapshot in store.snapshots_for_card(card_id, since).await? {
                        existing_ids.insert((card_id, snapshot.occurred_date), snapshot.id);
                    }
                }

                let key = (card_id, line.occurred_date);
                if !declared.contains_key(&key) {
                    order.push(key);
                }
                declared.insert(key, line.stock_on_hand);
            }
        }
    }

    for key in order {
        if let Some(&stock_on_hand) = declared.get(&key) {
            let (stock_card_id, occurred_date) = key;
            let id = existing_ids
                .get(&key)
                .copied()
                .unwrap_or_else(SnapshotId::random);
            batch.snapshots.push(CalculatedStockOnHand {
                id,
                stock_card_id,
                occurred_date,
                stock_on_hand,
            });
        }
    }
    Ok(())
}
