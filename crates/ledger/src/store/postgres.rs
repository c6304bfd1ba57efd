//! `PostgreSQL` ledger store.
//!
//! Uses the sqlx runtime query API with explicit row types so the crate
//! builds without a live database. `persist_batch` wraps one transaction;
//! that transaction is the atomicity contract callers depend on.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use stockbridge_core::{
    FacilityId, LineItemId, LotCode, LotId, MovementKey, MovementType, ProductCode, ProductId,
    ProductLotCode, ProgramId, SnapshotId, StockCardId, StockEventId,
};

use super::{LedgerStore, StagedBatch, StoreError};
use crate::models::{CalculatedStockOnHand, ProductLot, StockCard, StockCardLineItem};

/// Run the ledger schema migrations embedded at build time.
///
/// # Errors
///
/// Returns `sqlx::migrate::MigrateError` if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!().run(pool).await
}

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for lot queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductLotRow {
    id: Uuid,
    product_code: String,
    lot_code: String,
    expiration_date: Option<NaiveDate>,
}

impl From<ProductLotRow> for ProductLot {
    fn from(row: ProductLotRow) -> Self {
        Self {
            id: LotId::new(row.id),
            product_code: ProductCode::from(row.product_code),
            lot_code: LotCode::from(row.lot_code),
            expiration_date: row.expiration_date,
        }
    }
}

/// Internal row type for stock card queries.
#[derive(Debug, sqlx::FromRow)]
struct StockCardRow {
    id: Uuid,
    facility_id: Uuid,
    program_id: Uuid,
    product_id: Uuid,
    product_code: String,
    lot_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<StockCardRow> for StockCard {
    fn from(row: StockCardRow) -> Self {
        Self {
            id: StockCardId::new(row.id),
            facility_id: FacilityId::new(row.facility_id),
            program_id: ProgramId::new(row.program_id),
            product_id: ProductId::new(row.product_id),
            product_code: ProductCode::from(row.product_code),
            lot_id: row.lot_id.map(LotId::new),
            created_at: row.created_at,
        }
    }
}

/// Internal row type for line item queries.
#[derive(Debug, sqlx::FromRow)]
struct LineItemRow {
    id: Uuid,
    stock_event_id: Uuid,
    stock_card_id: Uuid,
    movement_type: MovementType,
    reason: Option<String>,
    document_number: Option<String>,
    signature: Option<String>,
    quantity: i64,
    requested_quantity: Option<i64>,
    occurred_date: NaiveDate,
    recorded_at: DateTime<Utc>,
    processed_at: DateTime<Utc>,
}

impl From<LineItemRow> for StockCardLineItem {
    fn from(row: LineItemRow) -> Self {
        Self {
            id: LineItemId::new(row.id),
            stock_event_id: StockEventId::new(row.stock_event_id),
            stock_card_id: StockCardId::new(row.stock_card_id),
            movement_type: row.movement_type,
            reason: row.reason,
            document_number: row.document_number,
            signature: row.signature,
            quantity: row.quantity,
            requested_quantity: row.requested_quantity,
            occurred_date: row.occurred_date,
            recorded_at: row.recorded_at,
            processed_at: row.processed_at,
        }
    }
}

/// Internal row type for snapshot queries.
#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    id: Uuid,
    stock_card_id: Uuid,
    occurred_date: NaiveDate,
    stock_on_hand: i64,
}

impl From<SnapshotRow> for CalculatedStockOnHand {
    fn from(row: SnapshotRow) -> Self {
        Self {
            id: SnapshotId::new(row.id),
            stock_card_id: StockCardId::new(row.stock_card_id),
            occurred_date: row.occurred_date,
            stock_on_hand: row.stock_on_hand,
        }
    }
}

/// Internal row type for movement key queries.
#[derive(Debug, sqlx::FromRow)]
struct MovementKeyRow {
    product_code: String,
    lot_code: Option<String>,
    recorded_at: DateTime<Utc>,
    signature: Option<String>,
}

impl From<MovementKeyRow> for MovementKey {
    fn from(row: MovementKeyRow) -> Self {
        Self {
            product_code: ProductCode::from(row.product_code),
            lot_code: row.lot_code.map(LotCode::from),
            recorded_at: row.recorded_at,
            signature: row.signature,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// `PostgreSQL` implementation of [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn applied_movement_keys(
        &self,
        facility_id: FacilityId,
    ) -> Result<Vec<MovementKey>, StoreError> {
        let rows = sqlx::query_as::<_, MovementKeyRow>(
            r"
            SELECT c.product_code, l.lot_code, i.recorded_at, i.signature
            FROM stock_card_line_item i
            INNER JOIN stock_card c ON c.id = i.stock_card_id
            LEFT JOIN product_lot l ON l.id = c.lot_id
            WHERE c.facility_id = $1
            ",
        )
        .bind(facility_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_lot(&self, key: &ProductLotCode) -> Result<Option<ProductLot>, StoreError> {
        let Some(lot_code) = &key.lot_code else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, ProductLotRow>(
            r"
            SELECT id, product_code, lot_code, expiration_date
            FROM product_lot
            WHERE product_code = $1 AND lot_code = $2
            ",
        )
        .bind(key.product_code.as_str())
        .bind(lot_code.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn lot_by_id(&self, id: LotId) -> Result<Option<ProductLot>, StoreError> {
        let row = sqlx::query_as::<_, ProductLotRow>(
            r"
            SELECT id, product_code, lot_code, expiration_date
            FROM product_lot
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_stock_card(
        &self,
        facility_id: FacilityId,
        program_id: ProgramId,
        product_id: ProductId,
        lot_id: Option<LotId>,
    ) -> Result<Option<StockCard>, StoreError> {
        let row = sqlx::query_as::<_, StockCardRow>(
            r"
            SELECT id, facility_id, program_id, product_id, product_code, lot_id, created_at
            FROM stock_card
            WHERE facility_id = $1
              AND program_id = $2
              AND product_id = $3
              AND lot_id IS NOT DISTINCT FROM $4
            ",
        )
        .bind(facility_id)
        .bind(program_id)
        .bind(product_id)
        .bind(lot_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn stock_card(&self, id: StockCardId) -> Result<Option<StockCard>, StoreError> {
        let row = sqlx::query_as::<_, StockCardRow>(
            r"
            SELECT id, facility_id, program_id, product_id, product_code, lot_id, created_at
            FROM stock_card
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn line_items_for_card(
        &self,
        card_id: StockCardId,
    ) -> Result<Vec<StockCardLineItem>, StoreError> {
        let rows = sqlx::query_as::<_, LineItemRow>(
            r"
            SELECT id, stock_event_id, stock_card_id, movement_type, reason,
                   document_number, signature, quantity, requested_quantity,
                   occurred_date, recorded_at, processed_at
            FROM stock_card_line_item
            WHERE stock_card_id = $1
            ORDER BY processed_at DESC, entry_seq DESC
            ",
        )
        .bind(card_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn snapshots_for_card(
        &self,
        card_id: StockCardId,
        since: Option<NaiveDate>,
    ) -> Result<Vec<CalculatedStockOnHand>, StoreError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r"
            SELECT id, stock_card_id, occurred_date, stock_on_hand
            FROM calculated_stock_on_hand
            WHERE stock_card_id = $1
              AND ($2::date IS NULL OR occurred_date >= $2)
            ORDER BY occurred_date ASC
            ",
        )
        .bind(card_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn persist_batch(&self, batch: StagedBatch) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for lot in &batch.lots {
            sqlx::query(
                r"
                INSERT INTO product_lot (id, product_code, lot_code, expiration_date)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(lot.id)
            .bind(lot.product_code.as_str())
            .bind(lot.lot_code.as_str())
            .bind(lot.expiration_date)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("uq_product_lot_code")
                {
                    return StoreError::Conflict(format!("lot already exists: {}", lot.key()));
                }
                StoreError::Database(e)
            })?;
        }

        for event in &batch.events {
            sqlx::query(
                r"
                INSERT INTO stock_event (id, facility_id, program_id, processed_at,
                                         signature, submitted_by)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(event.id)
            .bind(event.facility_id)
            .bind(event.program_id)
            .bind(event.processed_at)
            .bind(event.signature.as_deref())
            .bind(event.submitted_by.map(|user| user.as_uuid()))
            .execute(&mut *tx)
            .await?;
        }

        for card in &batch.cards {
            sqlx::query(
                r"
                INSERT INTO stock_card (id, facility_id, program_id, product_id,
                                        product_code, lot_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(card.id)
            .bind(card.facility_id)
            .bind(card.program_id)
            .bind(card.product_id)
            .bind(card.product_code.as_str())
            .bind(card.lot_id)
            .bind(card.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for item in &batch.line_items {
            sqlx::query(
                r"
                INSERT INTO stock_card_line_item (id, stock_event_id, stock_card_id,
                                                  movement_type, reason, document_number,
                                                  signature, quantity, requested_quantity,
                                                  occurred_date, recorded_at, processed_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ",
            )
            .bind(item.id)
            .bind(item.stock_event_id)
            .bind(item.stock_card_id)
            .bind(item.movement_type)
            .bind(item.reason.as_deref())
            .bind(item.document_number.as_deref())
            .bind(item.signature.as_deref())
            .bind(item.quantity)
            .bind(item.requested_quantity)
            .bind(item.occurred_date)
            .bind(item.recorded_at)
            .bind(item.processed_at)
            .execute(&mut *tx)
            .await?;
        }

        for inventory in &batch.inventories {
            sqlx::query(
                r"
                INSERT INTO physical_inventory (id, stock_event_id, facility_id,
                                                program_id, occurred_date)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(inventory.id)
            .bind(inventory.stock_event_id)
            .bind(inventory.facility_id)
            .bind(inventory.program_id)
            .bind(inventory.occurred_date)
            .execute(&mut *tx)
            .await?;
        }

        for line in &batch.inventory_lines {
            sqlx::query(
                r"
                INSERT INTO physical_inventory_line (id, physical_inventory_id,
                                                     stock_card_id, counted_quantity)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(line.id)
            .bind(line.physical_inventory_id)
            .bind(line.stock_card_id)
            .bind(line.counted_quantity)
            .execute(&mut *tx)
            .await?;
        }

        for adjustment in &batch.inventory_adjustments {
            sqlx::query(
                r"
                INSERT INTO physical_inventory_line_adjustment (id, line_id, reason,
                                                                direction, quantity)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(adjustment.id)
            .bind(adjustment.line_id)
            .bind(adjustment.reason.as_str())
            .bind(adjustment.direction)
            .bind(adjustment.quantity)
            .execute(&mut *tx)
            .await?;
        }

        for snapshot in &batch.snapshots {
            sqlx::query(
                r"
                INSERT INTO calculated_stock_on_hand (id, stock_card_id, occurred_date,
                                                      stock_on_hand)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (stock_card_id, occurred_date)
                DO UPDATE SET stock_on_hand = EXCLUDED.stock_on_hand
                ",
            )
            .bind(snapshot.id)
            .bind(snapshot.stock_card_id)
            .bind(snapshot.occurred_date)
            .bind(snapshot.stock_on_hand)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
