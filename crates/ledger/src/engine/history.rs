//! Backward stock-on-hand reconstruction.
//!
//! The ledger stores raw signed line items plus one snapshot per
//! `(card, date)` - no per-line stock level. [`StockOnHandTrace`] recovers the
//! exact stock on hand after every historical movement anyway: walk the line
//! items newest first, seed a cursor from the snapshot matching the line's
//! occurred date, report the cursor as the level after the line, then subtract
//! the line's signed quantity to get the level before it. When the occurred
//! date changes, re-seed from that date's own snapshot instead of subtracting
//! across the boundary.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::LedgerError;
use crate::models::{CalculatedStockOnHand, StockCardLineItem};

/// Index snapshots by occurred date for cursor seeding.
#[must_use]
pub fn snapshot_map(snapshots: &[CalculatedStockOnHand]) -> HashMap<NaiveDate, i64> {
    snapshots
        .iter()
        .map(|snapshot| (snapshot.occurred_date, snapshot.stock_on_hand))
        .collect()
}

/// Iterator over `(line_item, stock_on_hand_after)` pairs, newest first.
///
/// `items` must already be sorted by processing time descending, the order
/// [`crate::store::LedgerStore::line_items_for_card`] returns. The iterator
/// is lazy and restartable per stock card; physical-inventory lines subtract
/// their stored net quantity like any other line.
pub struct StockOnHandTrace<'a> {
    items: std::slice::Iter<'a, StockCardLineItem>,
    snapshots: &'a HashMap<NaiveDate, i64>,
    cursor_date: Option<NaiveDate>,
    cursor: i64,
}

impl<'a> StockOnHandTrace<'a> {
    /// Start a trace over `items` seeded from `snapshots`.
    #[must_use]
    pub fn new(items: &'a [StockCardLineItem], snapshots: &'a HashMap<NaiveDate, i64>) -> Self {
        Self {
            items: items.iter(),
            snapshots,
            cursor_date: None,
            cursor: 0,
        }
    }
}

impl<'a> Iterator for StockOnHandTrace<'a> {
    type Item = Result<(&'a StockCardLineItem, i64), LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.next()?;

        if self.cursor_date != Some(item.occurred_date) {
            let Some(&seed) = self.snapshots.get(&item.occurred_date) else {
                return Some(Err(LedgerError::MissingSnapshot {
                    stock_card_id: item.stock_card_id,
                    occurred_date: item.occurred_date,
                }));
            };
            self.cursor_date = Some(item.occurred_date);
            self.cursor = seed;
        }

        let stock_on_hand_after = self.cursor;
        self.cursor -= item.quantity;
        Some(Ok((item, stock_on_hand_after)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use stockbridge_core::{
        LineItemId, MovementType, SnapshotId, StockCardId, StockEventId,
    };

    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn instant(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    fn line(
        card_id: StockCardId,
        movement_type: MovementType,
        quantity: i64,
        day: u32,
        hour: u32,
    ) -> StockCardLineItem {
        StockCardLineItem {
            id: LineItemId::random(),
            stock_event_id: StockEventId::random(),
            stock_card_id: card_id,
            movement_type,
            reason: None,
            document_number: None,
            signature: None,
            quantity,
            requested_quantity: None,
            occurred_date: date(day),
            recorded_at: instant(day, hour),
            processed_at: instant(day, hour),
        }
    }

    fn snapshot(card_id: StockCardId, day: u32, soh: i64) -> CalculatedStockOnHand {
        CalculatedStockOnHand {
            id: SnapshotId::random(),
            stock_card_id: card_id,
            occurred_date: date(day),
            stock_on_hand: soh,
        }
    }

    #[test]
    fn test_trace_steps_back_within_one_date() {
        let card_id = StockCardId::random();
        // Apply order on day 10: +10, -4, +7; snapshot holds the final 13.
        // Trace is newest first.
        let items = vec![
            line(card_id, MovementType::Receive, 7, 10, 14),
            line(card_id, MovementType::Issue, -4, 10, 12),
            line(card_id, MovementType::Receive, 10, 10, 9),
        ];
        let snapshots = snapshot_map(&[snapshot(card_id, 10, 13)]);

        let levels: Vec<i64> = StockOnHandTrace::new(&items, &snapshots)
            .map(|step| step.unwrap().1)
            .collect();
        assert_eq!(levels, vec![13, 6, 10]);
    }

    #[test]
    fn test_trace_reseeds_across_date_boundaries() {
        let card_id = StockCardId::random();
        // Day 10: +10 (soh 10); day 12: -4 (soh 6).
        let items = vec![
            line(card_id, MovementType::Issue, -4, 12, 9),
            line(card_id, MovementType::Receive, 10, 10, 9),
        ];
        let snapshots = snapshot_map(&[snapshot(card_id, 10, 10), snapshot(card_id, 12, 6)]);

        let levels: Vec<i64> = StockOnHandTrace::new(&items, &snapshots)
            .map(|step| step.unwrap().1)
            .collect();
        assert_eq!(levels, vec![6, 10]);
    }

    #[test]
    fn test_earliest_line_matches_snapshot_minus_later_deltas() {
        let card_id = StockCardId::random();
        // N lines sharing one snapshot date: reconstructing backward, the
        // earliest line's post-movement level must equal
        // snapshot - sum(signed quantities of all later lines).
        let items = vec![
            line(card_id, MovementType::Receive, 5, 10, 16),
            line(card_id, MovementType::Issue, -2, 10, 14),
            line(card_id, MovementType::Receive, 8, 10, 11),
            line(card_id, MovementType::Receive, 9, 10, 8),
        ];
        let snapshot_value = 20;
        let snapshots = snapshot_map(&[snapshot(card_id, 10, snapshot_value)]);

        let steps: Vec<(i64, i64)> = StockOnHandTrace::new(&items, &snapshots)
            .map(|step| {
                let (item, after) = step.unwrap();
                (item.quantity, after)
            })
            .collect();

        let later_sum: i64 = steps[..3].iter().map(|(quantity, _)| quantity).sum();
        let earliest_after = steps[3].1;
        assert_eq!(earliest_after, snapshot_value - later_sum);
    }

    #[test]
    fn test_physical_inventory_net_quantity_subtracted() {
        let card_id = StockCardId::random();
        // Day 10: receive 10; day 11: explained count removed 3 (net -3).
        let items = vec![
            line(card_id, MovementType::PhysicalInventory, -3, 11, 9),
            line(card_id, MovementType::Receive, 10, 10, 9),
        ];
        let snapshots = snapshot_map(&[snapshot(card_id, 10, 10), snapshot(card_id, 11, 7)]);

        let levels: Vec<i64> = StockOnHandTrace::new(&items, &snapshots)
            .map(|step| step.unwrap().1)
            .collect();
        assert_eq!(levels, vec![7, 10]);
    }

    #[test]
    fn test_missing_snapshot_is_an_error() {
        let card_id = StockCardId::random();
        let items = vec![line(card_id, MovementType::Receive, 10, 10, 9)];
        let snapshots = HashMap::new();

        let mut trace = StockOnHandTrace::new(&items, &snapshots);
        assert!(matches!(
            trace.next(),
            Some(Err(LedgerError::MissingSnapshot { .. }))
        ));
    }

    #[test]
    fn test_empty_history_yields_nothing() {
        let snapshots = HashMap::new();
        let mut trace = StockOnHandTrace::new(&[], &snapshots);
        assert!(trace.next().is_none());
    }
}
