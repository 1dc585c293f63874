//! Payment intake.
//!
//! Records money received against an invoice: assigns the receipt number,
//! then writes the payment and its inflow movement as one store
//! transaction. The movement is tagged with the receiving operator's active
//! session, if any.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CashMovement, MovementType, Payment, RecordPayment};
use crate::services::audit::{publish, AuditEvent, AuditSink};
use crate::services::metrics::PAYMENTS_TOTAL;
use crate::services::receipt::ReceiptSequence;
use crate::services::reconcile;
use crate::services::store::{LedgerStore, PaymentInsert};

pub struct PaymentService {
    store: Arc<dyn LedgerStore>,
    receipts: Arc<dyn ReceiptSequence>,
    audit: Arc<dyn AuditSink>,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        receipts: Arc<dyn ReceiptSequence>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            receipts,
            audit,
        }
    }

    /// Record a payment for an invoice.
    #[instrument(skip(self, input), fields(invoice_id = %input.invoice_id, actor = %actor))]
    pub async fn record_payment(
        &self,
        input: RecordPayment,
        actor: Uuid,
    ) -> Result<Payment, AppError> {
        // Validate the stored two-decimal amount, not the raw input.
        let amount = reconcile::normalize(input.amount);
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Payment amount must be positive"
            )));
        }

        let receipt_number = self.receipts.next().await?;
        let session = self.store.find_open_session(actor).await?;
        let now = Utc::now();

        let payment = Payment {
            payment_id: Uuid::new_v4(),
            invoice_id: input.invoice_id,
            receipt_number,
            amount,
            method: input.method.as_str().to_string(),
            received_utc: now,
            reference: input.reference,
            notes: input.notes,
            received_by: Some(input.received_by.unwrap_or(actor)),
        };

        let movement = CashMovement {
            movement_id: Uuid::new_v4(),
            session_id: session.map(|s| s.session_id),
            movement_type: MovementType::Inflow.as_str().to_string(),
            method: Some(input.method.as_str().to_string()),
            amount,
            reason: None,
            payment_id: Some(payment.payment_id),
            refund_id: None,
            created_by: Some(actor),
            created_utc: now,
        };

        let payment = self
            .store
            .insert_payment(PaymentInsert { payment, movement })
            .await?;

        PAYMENTS_TOTAL.with_label_values(&[&payment.method]).inc();

        publish(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                "payment.record",
                "payment",
                payment.payment_id,
                serde_json::json!({
                    "invoice_id": payment.invoice_id,
                    "receipt_number": payment.receipt_number,
                    "amount": payment.amount.to_string(),
                    "method": payment.method,
                }),
            ),
        )
        .await;

        Ok(payment)
    }

    pub async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        self.store.get_payment(payment_id).await
    }
}
