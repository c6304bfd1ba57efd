//! Stock-movement vocabulary: movement types, adjustment directions, and the
//! movement key used for deduplication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::code::{LotCode, ProductCode};

/// The kind of stock movement a client reports.
///
/// The movement type fixes the sign convention for stored quantities:
/// receipts and positive adjustments are positive, issues and negative
/// adjustments are negative, and physical-inventory lines carry the net
/// adjustment (credit minus debit) declared by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "movement_type", rename_all = "snake_case")
)]
pub enum MovementType {
    /// Stock received from a source (supplier, transfer in).
    Receive,
    /// Stock issued to a destination (dispensing point, transfer out).
    Issue,
    /// Positive inventory adjustment.
    PositiveAdjust,
    /// Negative inventory adjustment.
    NegativeAdjust,
    /// Physical count of stock on hand.
    PhysicalInventory,
}

impl MovementType {
    /// Apply the sign convention to a client-declared quantity.
    ///
    /// Receive/positive-adjust movements store `+|quantity|`, issue/negative-
    /// adjust movements store `-|quantity|`. Physical-inventory quantities are
    /// already the signed net discrepancy and pass through unchanged.
    #[must_use]
    pub const fn signed_quantity(self, quantity: i64) -> i64 {
        match self {
            Self::Receive | Self::PositiveAdjust => quantity.abs(),
            Self::Issue | Self::NegativeAdjust => -quantity.abs(),
            Self::PhysicalInventory => quantity,
        }
    }

    /// Stable string form, matching the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Receive => "RECEIVE",
            Self::Issue => "ISSUE",
            Self::PositiveAdjust => "POSITIVE_ADJUST",
            Self::NegativeAdjust => "NEGATIVE_ADJUST",
            Self::PhysicalInventory => "PHYSICAL_INVENTORY",
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown movement type string.
#[derive(Debug, Error)]
#[error("unknown movement type: {0}")]
pub struct MovementTypeParseError(pub String);

impl std::str::FromStr for MovementType {
    type Err = MovementTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RECEIVE" => Ok(Self::Receive),
            "ISSUE" => Ok(Self::Issue),
            "POSITIVE_ADJUST" => Ok(Self::PositiveAdjust),
            "NEGATIVE_ADJUST" => Ok(Self::NegativeAdjust),
            "PHYSICAL_INVENTORY" => Ok(Self::PhysicalInventory),
            other => Err(MovementTypeParseError(other.to_string())),
        }
    }
}

/// Direction of a physical-inventory discrepancy adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "adjustment_direction", rename_all = "snake_case")
)]
pub enum AdjustmentDirection {
    /// Counted more than expected.
    Credit,
    /// Counted less than expected.
    Debit,
}

/// The natural key of one client-submitted stock movement.
///
/// Uniqueness of this key is the idempotency contract: a re-submitted batch
/// (e.g. after a client-side timeout) carries the same keys and is filtered
/// out before any ledger write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovementKey {
    /// Product code the movement applies to.
    pub product_code: ProductCode,
    /// Lot code, absent for no-lot products.
    pub lot_code: Option<LotCode>,
    /// Client-declared submission instant.
    pub recorded_at: DateTime<Utc>,
    /// Client movement signature, if the client supplied one.
    pub signature: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_sign_convention() {
        assert_eq!(MovementType::Receive.signed_quantity(10), 10);
        assert_eq!(MovementType::Receive.signed_quantity(-10), 10);
        assert_eq!(MovementType::PositiveAdjust.signed_quantity(3), 3);
        assert_eq!(MovementType::Issue.signed_quantity(4), -4);
        assert_eq!(MovementType::Issue.signed_quantity(-4), -4);
        assert_eq!(MovementType::NegativeAdjust.signed_quantity(2), -2);
        // Physical inventory passes the signed net through unchanged
        assert_eq!(MovementType::PhysicalInventory.signed_quantity(-7), -7);
        assert_eq!(MovementType::PhysicalInventory.signed_quantity(7), 7);
    }

    #[test]
    fn test_movement_type_round_trip() {
        for ty in [
            MovementType::Receive,
            MovementType::Issue,
            MovementType::PositiveAdjust,
            MovementType::NegativeAdjust,
            MovementType::PhysicalInventory,
        ] {
            let parsed: MovementType = ty.as_str().parse().unwrap();
            assert_eq!(parsed, ty);
        }
        assert!("RESTOCK".parse::<MovementType>().is_err());
    }

    #[test]
    fn test_movement_key_equality_includes_signature() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        let base = MovementKey {
            product_code: ProductCode::from("26A01"),
            lot_code: Some(LotCode::from("L1")),
            recorded_at: at,
            signature: Some("sig-a".to_string()),
        };
        let same = base.clone();
        let other_signature = MovementKey {
            signature: Some("sig-b".to_string()),
            ..base.clone()
        };

        assert_eq!(base, same);
        assert_ne!(base, other_signature);
    }
}
