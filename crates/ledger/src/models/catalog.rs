//! Catalog models: facilities, programs, and products as resolved through the
//! outbound catalog interface.
//!
//! The catalog itself is an external collaborator; the ledger only consumes
//! these read models and never writes them.

use serde::{Deserialize, Serialize};

use stockbridge_core::{FacilityId, ProductCode, ProductId, ProgramId};

/// A facility (health post, clinic, district warehouse) that owns stock cards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facility {
    /// Unique facility ID.
    pub id: FacilityId,
    /// Facility code.
    pub code: String,
    /// Human-readable name.
    pub name: String,
}

/// A supply program (e.g. essential medicines, rapid test kits).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// Unique program ID.
    pub id: ProgramId,
    /// Program code.
    pub code: String,
    /// Human-readable name.
    pub name: String,
}

/// Catalog entry for a product, as resolved by product code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProduct {
    /// Unique product ID.
    pub id: ProductId,
    /// Product code, the client-facing natural key.
    pub code: ProductCode,
    /// Program this product currently belongs to. A product without a
    /// program assignment cannot appear on the ledger.
    pub program_id: Option<ProgramId>,
    /// Whether stock of this product is subdivided into lots. Kits and other
    /// no-lot products are tracked at the product level only.
    pub tracks_lots: bool,
}
