//! Unified error handling for the ledger engine.
//!
//! Only genuinely fatal conditions are errors. Expected outcomes on the happy
//! path - duplicate movements, lot expiration conflicts - are carried as
//! values in [`crate::engine::SubmitOutcome`] instead.

use chrono::NaiveDate;
use thiserror::Error;

use stockbridge_core::StockCardId;

use crate::catalog::CatalogError;
use crate::store::StoreError;

/// The kind of entity a failed reference lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// A facility id no catalog entry exists for.
    Facility,
    /// A product code no catalog entry exists for.
    Product,
    /// A product whose catalog entry carries no program assignment.
    Program,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Facility => "facility",
            Self::Product => "product",
            Self::Program => "program",
        };
        f.write_str(s)
    }
}

/// Engine-level error type.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A facility/product/program reference in the batch cannot be resolved.
    ///
    /// This signals a data-integrity problem, not a transient condition: the
    /// whole batch is rejected before any write is staged.
    #[error("unresolvable {kind} reference: {reference}")]
    UnresolvableReference {
        /// What kind of entity could not be resolved.
        kind: ReferenceKind,
        /// The offending reference, rendered for diagnostics.
        reference: String,
    },

    /// The requested stock card does not exist, or is not visible to the
    /// querying facility.
    #[error("stock card not found: {0}")]
    CardNotFound(StockCardId),

    /// A line item's occurred date has no stock-on-hand snapshot to seed the
    /// backward reconstruction from. The ledger is corrupt for this card.
    #[error("missing stock-on-hand snapshot for card {stock_card_id} on {occurred_date}")]
    MissingSnapshot {
        /// The stock card whose snapshot is missing.
        stock_card_id: StockCardId,
        /// The date the snapshot should exist for.
        occurred_date: NaiveDate,
    },

    /// An engine invariant was violated; indicates a bug, not bad input.
    #[error("internal error: {0}")]
    Internal(String),

    /// Catalog lookup failed.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Persistent store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
