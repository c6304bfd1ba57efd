//! Whole-pipeline tests: submission, idempotency, apply order, and the
//! all-or-nothing batch contract.

use stockbridge_core::{MovementType, ProgramId};
use stockbridge_ledger::LedgerError;
use stockbridge_ledger::store::LedgerStore;

use stockbridge_integration_tests::{
    TestContext, lot_movement, lot_product, no_lot_product, product_movement,
};

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_single_batch_applies_all_requests() {
    let program_id = ProgramId::random();
    let ctx = TestContext::new(vec![lot_product("26A01", program_id)]);

    let batch = vec![
        lot_movement("26A01", MovementType::Receive, "L1", 10, 10, 10, 9, "sig-1"),
        lot_movement("26A01", MovementType::Issue, "L1", 4, 6, 12, 9, "sig-2"),
    ];
    let outcome = ctx
        .service
        .submit(ctx.facility_id, batch, None)
        .await
        .expect("batch applies");

    assert_eq!(outcome.applied, 2);
    assert_eq!(outcome.duplicates, 0);
    assert!(outcome.conflicts.is_empty());
    assert_eq!(ctx.store.line_item_count(), 2);
    assert_eq!(ctx.store.all_cards().len(), 1);
}

// =============================================================================
// Idempotency
// =============================================================================

#[tokio::test]
async fn test_resubmitted_batch_is_a_noop() {
    let program_id = ProgramId::random();
    let ctx = TestContext::new(vec![lot_product("26A01", program_id)]);

    let batch = vec![
        lot_movement("26A01", MovementType::Receive, "L1", 10, 10, 10, 9, "sig-1"),
        lot_movement("26A01", MovementType::Issue, "L1", 4, 6, 12, 9, "sig-2"),
    ];

    let first = ctx
        .service
        .submit(ctx.facility_id, batch.clone(), None)
        .await
        .expect("first submission applies");
    assert_eq!(first.applied, 2);

    // Identical retry after e.g. a client-side timeout
    let second = ctx
        .service
        .submit(ctx.facility_id, batch, None)
        .await
        .expect("retry succeeds");
    assert_eq!(second.applied, 0);
    assert_eq!(second.duplicates, 2);

    // No new line items, final stock level unchanged
    assert_eq!(ctx.store.line_item_count(), 2);
    let cards = ctx.store.all_cards();
    let card = &cards[0];
    let snapshots = ctx
        .store
        .snapshots_for_card(card.id, None)
        .await
        .expect("snapshots load");
    assert_eq!(snapshots.last().map(|s| s.stock_on_hand), Some(6));
}

#[tokio::test]
async fn test_partially_duplicate_batch_applies_only_new_requests() {
    let program_id = ProgramId::random();
    let ctx = TestContext::new(vec![lot_product("26A01", program_id)]);

    let receive = lot_movement("26A01", MovementType::Receive, "L1", 10, 10, 10, 9, "sig-1");
    ctx.service
        .submit(ctx.facility_id, vec![receive.clone()], None)
        .await
        .expect("first submission applies");

    let issue = lot_movement("26A01", MovementType::Issue, "L1", 4, 6, 12, 9, "sig-2");
    let outcome = ctx
        .service
        .submit(ctx.facility_id, vec![receive, issue], None)
        .await
        .expect("second submission applies the new request");

    assert_eq!(outcome.applied, 1);
    assert_eq!(outcome.duplicates, 1);
    assert_eq!(ctx.store.line_item_count(), 2);
}

// =============================================================================
// Ordering invariant
// =============================================================================

#[tokio::test]
async fn test_snapshots_honor_delta_arithmetic() {
    let program_id = ProgramId::random();
    let ctx = TestContext::new(vec![lot_product("26A01", program_id)]);

    // Day 10: +10 (soh 10). Day 12: -4 then +3 (soh 6, then 9).
    let batch = vec![
        lot_movement("26A01", MovementType::Receive, "L1", 10, 10, 10, 9, "sig-1"),
        lot_movement("26A01", MovementType::Issue, "L1", 4, 6, 12, 9, "sig-2"),
        lot_movement("26A01", MovementType::Receive, "L1", 3, 9, 12, 11, "sig-3"),
    ];
    ctx.service
        .submit(ctx.facility_id, batch, None)
        .await
        .expect("batch applies");

    let cards = ctx.store.all_cards();
    let card = &cards[0];
    let snapshots = ctx
        .store
        .snapshots_for_card(card.id, None)
        .await
        .expect("snapshots load");
    assert_eq!(snapshots.len(), 2);

    // soh(d2) = soh(d1) + sum of signed quantities in (d1, d2]
    let soh_d1 = snapshots[0].stock_on_hand;
    let soh_d2 = snapshots[1].stock_on_hand;
    assert_eq!(soh_d1, 10);
    assert_eq!(soh_d2, soh_d1 + (-4 + 3));
}

// =============================================================================
// All-or-nothing batches
// =============================================================================

#[tokio::test]
async fn test_unresolvable_product_persists_nothing() {
    let program_id = ProgramId::random();
    let ctx = TestContext::new(vec![lot_product("26A01", program_id)]);

    let batch = vec![
        lot_movement("26A01", MovementType::Receive, "L1", 10, 10, 10, 9, "sig-1"),
        // Not in the catalog: fatal for the whole batch
        lot_movement("99Z99", MovementType::Receive, "L1", 5, 5, 10, 10, "sig-2"),
    ];
    let err = ctx
        .service
        .submit(ctx.facility_id, batch, None)
        .await
        .expect_err("unknown product aborts the batch");

    assert!(matches!(err, LedgerError::UnresolvableReference { .. }));
    assert_eq!(ctx.store.line_item_count(), 0);
    assert!(ctx.store.all_cards().is_empty());
}

// =============================================================================
// No-lot products
// =============================================================================

#[tokio::test]
async fn test_no_lot_product_tracked_at_product_level() {
    let program_id = ProgramId::random();
    let ctx = TestContext::new(vec![no_lot_product("26KIT", program_id)]);

    let batch = vec![
        product_movement("26KIT", MovementType::Receive, 2, 2, 10, 9, "sig-1"),
        product_movement("26KIT", MovementType::Issue, 1, 1, 11, 9, "sig-2"),
    ];
    let outcome = ctx
        .service
        .submit(ctx.facility_id, batch, None)
        .await
        .expect("batch applies");
    assert_eq!(outcome.applied, 2);

    let cards = ctx.store.all_cards();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].lot_id, None, "no lot identity is minted for kits");
}
