//! Movement ledger.
//!
//! Append-only: corrections are compensating movements, never edits. No
//! derived counters are kept anywhere; aggregates are always summed from
//! rows so they cannot drift from history.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CashMovement, MovementType, RecordMovement, TenderMethod};
use crate::services::audit::{publish, AuditEvent, AuditSink};
use crate::services::metrics::MOVEMENTS_TOTAL;
use crate::services::reconcile;
use crate::services::store::LedgerStore;

pub struct MovementService {
    store: Arc<dyn LedgerStore>,
    audit: Arc<dyn AuditSink>,
}

impl MovementService {
    pub fn new(store: Arc<dyn LedgerStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Append a movement.
    ///
    /// Manual adjustments (no payment/refund link) require a reason; the
    /// caller is responsible for having authorized the actor, the ledger
    /// only records the actor label. `actor` lands in `created_by`.
    #[instrument(skip(self, input), fields(movement_type = %input.movement_type))]
    pub async fn record(
        &self,
        mut input: RecordMovement,
        actor: Uuid,
    ) -> Result<CashMovement, AppError> {
        // Amounts are stored at two decimal places; validate what will be
        // stored, so a sub-cent input cannot round down to a zero row.
        let amount = reconcile::normalize(input.amount);
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Movement amount must be positive"
            )));
        }

        let manual = input.payment_id.is_none() && input.refund_id.is_none();
        if manual && input.reason.as_deref().map_or(true, |r| r.trim().is_empty()) {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Manual adjustments require a reason"
            )));
        }

        input.created_by.get_or_insert(actor);

        let movement = CashMovement {
            movement_id: Uuid::new_v4(),
            session_id: input.session_id,
            movement_type: input.movement_type.as_str().to_string(),
            method: input.method.map(|m| m.as_str().to_string()),
            amount,
            reason: input.reason,
            payment_id: input.payment_id,
            refund_id: input.refund_id,
            created_by: input.created_by,
            created_utc: Utc::now(),
        };

        let movement = self.store.insert_movement(movement).await?;

        MOVEMENTS_TOTAL
            .with_label_values(&[&movement.movement_type])
            .inc();

        if manual {
            publish(
                self.audit.as_ref(),
                AuditEvent::new(
                    actor,
                    "cash_movement.record",
                    "cash_movement",
                    movement.movement_id,
                    serde_json::json!({
                        "movement_type": movement.movement_type,
                        "method": movement.method,
                        "amount": movement.amount.to_string(),
                        "reason": movement.reason,
                    }),
                ),
            )
            .await;
        }

        Ok(movement)
    }

    /// Sum of a session's movements by type and optional method. Used by
    /// the reconciliation calculator and by live dashboards.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn sum_by_type_and_method(
        &self,
        session_id: Uuid,
        movement_type: MovementType,
        method: Option<TenderMethod>,
    ) -> Result<Decimal, AppError> {
        self.store
            .sum_movements(session_id, movement_type, method)
            .await
    }
}
