//! Backfill batch job integration tests.

mod common;

use common::{dec, operator, spawn_core, Harness};
use uuid::Uuid;

use cash_drawer_service::models::{MovementType, OpenSession, RecordMovement, TenderMethod};
use cash_drawer_service::services::{BackfillJob, BackfillMode, LedgerStore};

/// Open a session with movements and close it; returns the session id.
async fn closed_session(core: &Harness, opening: &str, inflow: &str, closing: &str) -> Uuid {
    let op = operator();
    let session = core
        .sessions
        .open(OpenSession {
            operator_id: op,
            opening_amount: dec(opening),
            notes: None,
        })
        .await
        .unwrap();

    core.movements
        .record(
            RecordMovement {
                session_id: Some(session.session_id),
                movement_type: MovementType::Inflow,
                method: Some(TenderMethod::Cash),
                amount: dec(inflow),
                reason: None,
                payment_id: Some(Uuid::new_v4()),
                refund_id: None,
                created_by: None,
            },
            op,
        )
        .await
        .unwrap();

    core.sessions
        .close(op, dec(closing), Some("shift count".to_string()))
        .await
        .unwrap();

    session.session_id
}

#[tokio::test]
async fn backfill_agrees_with_live_close() {
    let core = spawn_core();
    closed_session(&core, "100.00", "40.00", "140.00").await;
    closed_session(&core, "10.00", "5.00", "15.50").await;

    // Small page size to force multiple keyset pages.
    let job = BackfillJob::new(core.store.clone(), 1);
    let summary = job.run(BackfillMode::DryRun, None).await.unwrap();

    assert_eq!(summary.scanned, 2);
    assert_eq!(
        summary.changed, 0,
        "live close and backfill must agree byte-for-byte"
    );
}

#[tokio::test]
async fn backfill_repairs_corrupted_derived_fields() {
    let core = spawn_core();
    let session_id = closed_session(&core, "100.00", "40.00", "140.00").await;

    // Simulate drifted stored values (the movements stay untouched).
    core.store
        .update_session_reconciliation(session_id, dec("999.00"), Some(dec("-859.00")))
        .await
        .unwrap();

    let job = BackfillJob::new(core.store.clone(), 50);

    // Dry run reports but does not write.
    let summary = job.run(BackfillMode::DryRun, None).await.unwrap();
    assert_eq!(summary.changed, 1);
    let divergence = &summary.divergences[0];
    assert_eq!(divergence.session_id, session_id);
    assert_eq!(divergence.recomputed_expected, dec("140.00"));
    assert_eq!(divergence.recomputed_variance, Some(dec("0.00")));

    let untouched = core.store.get_session(session_id).await.unwrap().unwrap();
    assert_eq!(untouched.expected_cash, Some(dec("999.00")));

    // Write mode repairs.
    let summary = job.run(BackfillMode::Write, None).await.unwrap();
    assert_eq!(summary.changed, 1);

    let repaired = core.store.get_session(session_id).await.unwrap().unwrap();
    assert_eq!(repaired.expected_cash, Some(dec("140.00")));
    assert_eq!(repaired.variance, Some(dec("0.00")));

    // Idempotent: a second pass changes nothing.
    let summary = job.run(BackfillMode::Write, None).await.unwrap();
    assert_eq!(summary.changed, 0);
}

#[tokio::test]
async fn backfill_respects_session_filter() {
    let core = spawn_core();
    let a = closed_session(&core, "100.00", "40.00", "140.00").await;
    let b = closed_session(&core, "10.00", "5.00", "15.00").await;

    core.store
        .update_session_reconciliation(a, dec("0.00"), Some(dec("0.00")))
        .await
        .unwrap();
    core.store
        .update_session_reconciliation(b, dec("0.00"), Some(dec("0.00")))
        .await
        .unwrap();

    let job = BackfillJob::new(core.store.clone(), 50);
    let summary = job.run(BackfillMode::Write, Some(a)).await.unwrap();
    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.changed, 1);

    // The filtered-out session keeps its (wrong) stored values.
    let other = core.store.get_session(b).await.unwrap().unwrap();
    assert_eq!(other.expected_cash, Some(dec("0.00")));
}

#[tokio::test]
async fn open_session_keeps_null_variance() {
    let core = spawn_core();
    let op = operator();

    let session = core
        .sessions
        .open(OpenSession {
            operator_id: op,
            opening_amount: dec("100.00"),
            notes: None,
        })
        .await
        .unwrap();

    core.movements
        .record(
            RecordMovement {
                session_id: Some(session.session_id),
                movement_type: MovementType::Inflow,
                method: Some(TenderMethod::Cash),
                amount: dec("25.00"),
                reason: None,
                payment_id: Some(Uuid::new_v4()),
                refund_id: None,
                created_by: None,
            },
            op,
        )
        .await
        .unwrap();

    let job = BackfillJob::new(core.store.clone(), 50);
    job.run(BackfillMode::Write, None).await.unwrap();

    let refreshed = core
        .store
        .get_session(session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.expected_cash, Some(dec("125.00")));
    assert_eq!(
        refreshed.variance, None,
        "no closing count means no variance, regardless of expected"
    );

    // And the pass is idempotent for open sessions too.
    let summary = job.run(BackfillMode::Write, None).await.unwrap();
    assert_eq!(summary.changed, 0);
}
