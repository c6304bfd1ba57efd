//! Integration tests for the Stockbridge stock ledger.
//!
//! The whole pipeline - deduplicate, resolve lots, project, persist - runs
//! against the in-memory store and a static catalog, so these tests need no
//! database and exercise the same engine code the Postgres deployment runs.
//!
//! # Test Categories
//!
//! - `ledger_pipeline` - submission, idempotency, ordering
//! - `history_reconstruction` - backward stock-on-hand traces
//! - `lot_conflicts` - expiration conflict detection and escalation
//! - `physical_inventory` - count ingestion and adjustment decomposition

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use stockbridge_core::{FacilityId, LotCode, MovementType, ProductCode, ProductId, ProgramId};
use stockbridge_ledger::LedgerService;
use stockbridge_ledger::catalog::StaticCatalog;
use stockbridge_ledger::models::{CatalogProduct, Facility, LotEvent, MovementRequest};
use stockbridge_ledger::store::{LedgerStore, MemoryStore};

/// Everything a pipeline test needs: a fresh store, a seeded catalog, and the
/// service wired over both.
pub struct TestContext {
    /// The in-memory store, for direct inspection after submissions.
    pub store: Arc<MemoryStore>,
    /// The service under test.
    pub service: LedgerService,
    /// The seeded facility's id.
    pub facility_id: FacilityId,
}

impl TestContext {
    /// Build a context with the given products registered in the catalog.
    #[must_use]
    pub fn new(products: Vec<CatalogProduct>) -> Self {
        init_tracing();
        let facility = Facility {
            id: FacilityId::random(),
            code: "HF01".to_string(),
            name: "Matala Central Clinic".to_string(),
        };
        let mut catalog = StaticCatalog::new().with_facility(facility.clone());
        for product in products {
            catalog = catalog.with_product(product);
        }
        let store = MemoryStore::new_shared();
        let service = LedgerService::new(
            Arc::clone(&store) as Arc<dyn LedgerStore>,
            Arc::new(catalog),
        );
        Self {
            store,
            service,
            facility_id: facility.id,
        }
    }
}

/// Install a compact test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A lot-tracked catalog product.
#[must_use]
pub fn lot_product(code: &str, program_id: ProgramId) -> CatalogProduct {
    CatalogProduct {
        id: ProductId::random(),
        code: ProductCode::from(code),
        program_id: Some(program_id),
        tracks_lots: true,
    }
}

/// A no-lot (kit) catalog product.
#[must_use]
pub fn no_lot_product(code: &str, program_id: ProgramId) -> CatalogProduct {
    CatalogProduct {
        id: ProductId::random(),
        code: ProductCode::from(code),
        program_id: Some(program_id),
        tracks_lots: false,
    }
}

/// Business date in March 2026.
#[must_use]
pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).expect("valid test date")
}

/// Instant on a March 2026 day.
#[must_use]
pub fn at(d: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, d, hour, 0, 0)
        .single()
        .expect("valid test instant")
}

/// A single-lot movement request. `quantity` is the client-declared
/// magnitude (or signed net for physical inventory), `stock_on_hand` the
/// level the client observed after the movement.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn lot_movement(
    product: &str,
    movement_type: MovementType,
    lot: &str,
    quantity: i64,
    stock_on_hand: i64,
    d: u32,
    hour: u32,
    signature: &str,
) -> MovementRequest {
    MovementRequest {
        product_code: ProductCode::from(product),
        movement_type,
        recorded_at: at(d, hour),
        occurred_date: day(d),
        quantity,
        stock_on_hand,
        reason: None,
        document_number: None,
        requested_quantity: None,
        signature: Some(signature.to_string()),
        lot_events: vec![LotEvent {
            lot_code: LotCode::from(lot),
            expiration_date: None,
            quantity,
            stock_on_hand,
            occurred_date: day(d),
            reason: None,
            document_number: None,
        }],
    }
}

/// A product-level (no-lot) movement request.
#[must_use]
pub fn product_movement(
    product: &str,
    movement_type: MovementType,
    quantity: i64,
    stock_on_hand: i64,
    d: u32,
    hour: u32,
    signature: &str,
) -> MovementRequest {
    MovementRequest {
        product_code: ProductCode::from(product),
        movement_type,
        recorded_at: at(d, hour),
        occurred_date: day(d),
        quantity,
        stock_on_hand,
        reason: None,
        document_number: None,
        requested_quantity: None,
        signature: Some(signature.to_string()),
        lot_events: Vec::new(),
    }
}
