//! Refund integrator.
//!
//! Applies a refund against a payment and folds the corresponding outflow
//! back into the movement ledger. Refund row and movement are one atomic
//! store write; the store re-validates the refundable remainder inside that
//! transaction, so concurrent overlapping refunds cannot together exceed
//! the payment amount.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CashMovement, IssueRefund, MovementType, PaymentRefund};
use crate::services::audit::{publish, AuditEvent, AuditSink};
use crate::services::metrics::REFUNDS_TOTAL;
use crate::services::reconcile;
use crate::services::store::{LedgerStore, RefundInsert};

pub struct RefundService {
    store: Arc<dyn LedgerStore>,
    audit: Arc<dyn AuditSink>,
}

impl RefundService {
    pub fn new(store: Arc<dyn LedgerStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Issue a refund against a payment.
    #[instrument(skip(self, input), fields(payment_id = %input.payment_id, actor = %actor))]
    pub async fn issue_refund(
        &self,
        input: IssueRefund,
        actor: Uuid,
    ) -> Result<PaymentRefund, AppError> {
        // Validate the stored two-decimal amount, not the raw input.
        let amount = reconcile::normalize(input.amount);
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Refund amount must be positive"
            )));
        }
        if input.reason.trim().is_empty() {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Refund reason is required"
            )));
        }

        let payment = self
            .store
            .get_payment(input.payment_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Payment {} not found", input.payment_id))
            })?;

        // Pre-check for a friendly error; the store repeats this inside the
        // insert transaction, which is the check that actually holds under
        // concurrency.
        let refunded = self.store.refunded_total(payment.payment_id).await?;
        let remaining = payment.amount - refunded;
        if amount > remaining {
            REFUNDS_TOTAL.with_label_values(&["rejected"]).inc();
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Refund {} exceeds refundable remainder {} on payment {}",
                amount,
                remaining,
                payment.payment_id
            )));
        }

        let session = self.store.find_open_session(actor).await?;
        let now = Utc::now();

        let refund = PaymentRefund {
            refund_id: Uuid::new_v4(),
            invoice_id: payment.invoice_id,
            payment_id: payment.payment_id,
            amount,
            reason: input.reason,
            notes: input.notes,
            refunded_utc: now,
            refunded_by: actor,
        };

        let movement = CashMovement {
            movement_id: Uuid::new_v4(),
            session_id: session.map(|s| s.session_id),
            movement_type: MovementType::Outflow.as_str().to_string(),
            method: Some(payment.method.clone()),
            amount,
            reason: Some(refund.reason.clone()),
            payment_id: Some(payment.payment_id),
            refund_id: Some(refund.refund_id),
            created_by: Some(actor),
            created_utc: now,
        };

        let refund = self
            .store
            .insert_refund(RefundInsert { refund, movement })
            .await
            .inspect_err(|e| {
                if matches!(e, AppError::Conflict(_)) {
                    REFUNDS_TOTAL.with_label_values(&["rejected"]).inc();
                }
            })?;

        REFUNDS_TOTAL.with_label_values(&["ok"]).inc();

        publish(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                "payment_refund.issue",
                "payment_refund",
                refund.refund_id,
                serde_json::json!({
                    "payment_id": refund.payment_id,
                    "amount": refund.amount.to_string(),
                    "reason": refund.reason,
                }),
            ),
        )
        .await;

        Ok(refund)
    }
}
