//! Movement ledger integration tests.

mod common;

use common::{dec, operator, spawn_core};
use uuid::Uuid;

use cash_drawer_service::error::AppError;
use cash_drawer_service::models::{MovementType, OpenSession, RecordMovement, TenderMethod};

fn cash_inflow(session_id: Uuid, amount: &str, payment_id: Uuid) -> RecordMovement {
    RecordMovement {
        session_id: Some(session_id),
        movement_type: MovementType::Inflow,
        method: Some(TenderMethod::Cash),
        amount: dec(amount),
        reason: None,
        payment_id: Some(payment_id),
        refund_id: None,
        created_by: None,
    }
}

#[tokio::test]
async fn record_rejects_non_positive_amount() {
    let core = spawn_core();
    let op = operator();

    for bad in ["0.00", "-5.00"] {
        let err = core
            .movements
            .record(
                RecordMovement {
                    session_id: None,
                    movement_type: MovementType::Inflow,
                    method: Some(TenderMethod::Cash),
                    amount: dec(bad),
                    reason: Some("test".to_string()),
                    payment_id: None,
                    refund_id: None,
                    created_by: None,
                },
                op,
            )
            .await
            .expect_err("non-positive amount must fail");
        assert!(matches!(err, AppError::Validation(_)));
    }
}

#[tokio::test]
async fn rejects_amount_that_rounds_to_zero() {
    let core = spawn_core();

    // Sub-cent inputs store as 0.00 at two decimal places.
    let err = core
        .movements
        .record(
            RecordMovement {
                session_id: None,
                movement_type: MovementType::Inflow,
                method: Some(TenderMethod::Cash),
                amount: dec("0.004"),
                reason: Some("float adjustment".to_string()),
                payment_id: None,
                refund_id: None,
                created_by: None,
            },
            operator(),
        )
        .await
        .expect_err("sub-cent amount must fail, it would store as zero");
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn manual_adjustment_requires_reason() {
    let core = spawn_core();
    let op = operator();

    let err = core
        .movements
        .record(
            RecordMovement {
                session_id: None,
                movement_type: MovementType::Outflow,
                method: Some(TenderMethod::Cash),
                amount: dec("5.00"),
                reason: Some("   ".to_string()),
                payment_id: None,
                refund_id: None,
                created_by: None,
            },
            op,
        )
        .await
        .expect_err("blank reason on a manual adjustment must fail");
    assert!(matches!(err, AppError::Validation(_)));

    // With a payment link the reason is optional.
    core.movements
        .record(
            RecordMovement {
                session_id: None,
                movement_type: MovementType::Inflow,
                method: Some(TenderMethod::Cash),
                amount: dec("5.00"),
                reason: None,
                payment_id: Some(Uuid::new_v4()),
                refund_id: None,
                created_by: None,
            },
            op,
        )
        .await
        .expect("payment-linked movement needs no reason");
}

#[tokio::test]
async fn actor_is_recorded_as_creator() {
    let core = spawn_core();
    let op = operator();

    let movement = core
        .movements
        .record(
            RecordMovement {
                session_id: None,
                movement_type: MovementType::Outflow,
                method: Some(TenderMethod::Cash),
                amount: dec("1.00"),
                reason: Some("drawer float adjustment".to_string()),
                payment_id: None,
                refund_id: None,
                created_by: None,
            },
            op,
        )
        .await
        .unwrap();

    assert_eq!(movement.created_by, Some(op));
    assert!(core
        .audit
        .actions()
        .contains(&"cash_movement.record".to_string()));
}

#[tokio::test]
async fn sums_are_scoped_by_session_type_and_method() {
    let core = spawn_core();
    let op = operator();

    let session = core
        .sessions
        .open(OpenSession {
            operator_id: op,
            opening_amount: dec("0.00"),
            notes: None,
        })
        .await
        .unwrap();
    let sid = session.session_id;

    core.movements
        .record(cash_inflow(sid, "10.00", Uuid::new_v4()), op)
        .await
        .unwrap();
    core.movements
        .record(cash_inflow(sid, "2.50", Uuid::new_v4()), op)
        .await
        .unwrap();
    core.movements
        .record(
            RecordMovement {
                session_id: Some(sid),
                movement_type: MovementType::Inflow,
                method: Some(TenderMethod::Card),
                amount: dec("99.00"),
                reason: None,
                payment_id: Some(Uuid::new_v4()),
                refund_id: None,
                created_by: None,
            },
            op,
        )
        .await
        .unwrap();
    // A movement outside any session never leaks into session sums.
    core.movements
        .record(
            RecordMovement {
                session_id: None,
                movement_type: MovementType::Inflow,
                method: Some(TenderMethod::Cash),
                amount: dec("1000.00"),
                reason: Some("legacy import".to_string()),
                payment_id: None,
                refund_id: None,
                created_by: None,
            },
            op,
        )
        .await
        .unwrap();

    let cash_in = core
        .movements
        .sum_by_type_and_method(sid, MovementType::Inflow, Some(TenderMethod::Cash))
        .await
        .unwrap();
    assert_eq!(cash_in, dec("12.50"));

    let card_in = core
        .movements
        .sum_by_type_and_method(sid, MovementType::Inflow, Some(TenderMethod::Card))
        .await
        .unwrap();
    assert_eq!(card_in, dec("99.00"));

    let all_in = core
        .movements
        .sum_by_type_and_method(sid, MovementType::Inflow, None)
        .await
        .unwrap();
    assert_eq!(all_in, dec("111.50"));

    let cash_out = core
        .movements
        .sum_by_type_and_method(sid, MovementType::Outflow, Some(TenderMethod::Cash))
        .await
        .unwrap();
    assert_eq!(cash_out, dec("0"));
}
