//! Inbound movement contract: what disconnected clients submit, and what
//! history queries return.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockbridge_core::{LotCode, MovementKey, MovementType, ProductCode};

/// One client-reported stock movement for a product.
///
/// A request with `lot_events` carries one movement per lot; an empty
/// `lot_events` denotes a product-level (no-lot) movement using the request's
/// own `quantity`/`stock_on_hand` fields directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementRequest {
    /// Product the movement applies to.
    pub product_code: ProductCode,
    /// Kind of movement.
    pub movement_type: MovementType,
    /// Client-declared submission instant; defines the apply order.
    pub recorded_at: DateTime<Utc>,
    /// Business date of the movement (product-level).
    pub occurred_date: NaiveDate,
    /// Quantity moved (product-level).
    pub quantity: i64,
    /// Stock on hand the client observed after the movement (product-level).
    pub stock_on_hand: i64,
    /// Declared reason, source, or destination name (product-level).
    pub reason: Option<String>,
    /// Client document number.
    pub document_number: Option<String>,
    /// Quantity originally requested, for issues.
    pub requested_quantity: Option<i64>,
    /// Client movement signature.
    pub signature: Option<String>,
    /// Per-lot movements; empty for no-lot products.
    pub lot_events: Vec<LotEvent>,
}

/// One lot-level movement within a [`MovementRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotEvent {
    /// Lot the movement applies to.
    pub lot_code: LotCode,
    /// Expiration date the client reported for the lot.
    pub expiration_date: Option<NaiveDate>,
    /// Quantity moved.
    pub quantity: i64,
    /// Stock on hand the client observed for this lot after the movement.
    pub stock_on_hand: i64,
    /// Business date of the movement.
    pub occurred_date: NaiveDate,
    /// Declared reason, source, or destination name.
    pub reason: Option<String>,
    /// Client document number.
    pub document_number: Option<String>,
}

impl MovementRequest {
    /// The movement keys this request would commit: one per lot event, or the
    /// single no-lot key for a product-level movement.
    #[must_use]
    pub fn movement_keys(&self) -> Vec<MovementKey> {
        if self.lot_events.is_empty() {
            return vec![MovementKey {
                product_code: self.product_code.clone(),
                lot_code: None,
                recorded_at: self.recorded_at,
                signature: self.signature.clone(),
            }];
        }
        self.lot_events
            .iter()
            .map(|lot| MovementKey {
                product_code: self.product_code.clone(),
                lot_code: Some(lot.lot_code.clone()),
                recorded_at: self.recorded_at,
                signature: self.signature.clone(),
            })
            .collect()
    }
}

/// A half-open processed-at filter for history queries. `None` bounds are
/// unbounded.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TimeRange {
    /// Earliest instant included.
    pub start: Option<DateTime<Utc>>,
    /// Latest instant included.
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// A range covering all of history.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Whether `at` falls inside the range.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| at >= start) && self.end.is_none_or(|end| at <= end)
    }
}

/// One movement in a history response, newest first, with the reconstructed
/// stock on hand immediately after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementHistoryEntry {
    /// Server-side ingestion instant of the movement.
    pub processed_at: DateTime<Utc>,
    /// Business date of the movement.
    pub occurred_date: NaiveDate,
    /// Kind of movement.
    pub movement_type: MovementType,
    /// Signed quantity delta.
    pub quantity: i64,
    /// Stock on hand immediately after this movement.
    pub stock_on_hand_after: i64,
    /// Declared reason, source, or destination name.
    pub reason: Option<String>,
    /// Lot the movement applied to, absent for no-lot products.
    pub lot_code: Option<LotCode>,
    /// Client document number.
    pub document_number: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn request(lot_codes: &[&str]) -> MovementRequest {
        MovementRequest {
            product_code: ProductCode::from("26A01"),
            movement_type: MovementType::Receive,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap(),
            occurred_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            quantity: 10,
            stock_on_hand: 10,
            reason: None,
            document_number: None,
            requested_quantity: None,
            signature: Some("sig-1".to_string()),
            lot_events: lot_codes
                .iter()
                .map(|code| LotEvent {
                    lot_code: LotCode::from(*code),
                    expiration_date: None,
                    quantity: 10,
                    stock_on_hand: 10,
                    occurred_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
                    reason: None,
                    document_number: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_movement_keys_per_lot_event() {
        let keys = request(&["L1", "L2"]).movement_keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].lot_code, Some(LotCode::from("L1")));
        assert_eq!(keys[1].lot_code, Some(LotCode::from("L2")));
    }

    #[test]
    fn test_movement_keys_no_lot_sentinel() {
        let keys = request(&[]).movement_keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].lot_code, None);
        assert_eq!(keys[0].signature.as_deref(), Some("sig-1"));
    }

    #[test]
    fn test_movement_request_wire_round_trip() {
        let original = request(&["L1"]);
        let json = serde_json::to_string(&original).unwrap();
        let back: MovementRequest = serde_json::from_str(&json).unwrap();

        assert_eq!(back.product_code, original.product_code);
        assert_eq!(back.movement_type, original.movement_type);
        assert_eq!(back.recorded_at, original.recorded_at);
        assert_eq!(back.lot_events.len(), 1);
        assert_eq!(back.lot_events[0].lot_code, LotCode::from("L1"));
        // The movement type travels in its wire form
        assert!(json.contains("\"RECEIVE\""));
    }

    #[test]
    fn test_time_range_contains() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 12, 31, 0, 0, 0).unwrap();
        let mid = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();

        let range = TimeRange {
            start: Some(start),
            end: Some(end),
        };
        assert!(range.contains(mid));
        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(start - chrono::Duration::seconds(1)));
        assert!(TimeRange::unbounded().contains(mid));
    }
}
