//! Session state machine.
//!
//! Governs a drawer's open -> closed lifecycle per operator. All validation
//! happens before any write; a failed close mutates nothing and the
//! operator retries with an explanation.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CashSession, MovementType, OpenSession, SessionClose, TenderMethod};
use crate::services::audit::{publish, AuditEvent, AuditSink};
use crate::services::metrics::SESSIONS_TOTAL;
use crate::services::reconcile;
use crate::services::store::LedgerStore;

pub struct SessionService {
    store: Arc<dyn LedgerStore>,
    audit: Arc<dyn AuditSink>,
}

impl SessionService {
    pub fn new(store: Arc<dyn LedgerStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Open a session for an operator.
    ///
    /// The pre-check gives a friendly conflict in the common case; the
    /// store's uniqueness constraint decides the concurrent one.
    #[instrument(skip(self, input), fields(operator_id = %input.operator_id))]
    pub async fn open(&self, input: OpenSession) -> Result<CashSession, AppError> {
        if input.opening_amount < Decimal::ZERO {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Opening amount must not be negative"
            )));
        }

        if let Some(existing) = self.store.find_open_session(input.operator_id).await? {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Operator {} already has open session {}",
                input.operator_id,
                existing.session_id
            )));
        }

        let session = CashSession {
            session_id: Uuid::new_v4(),
            opened_by: input.operator_id,
            closed_by: None,
            opening_amount: reconcile::normalize(input.opening_amount),
            closing_amount: None,
            expected_cash: None,
            variance: None,
            started_utc: Utc::now(),
            ended_utc: None,
            status: "open".to_string(),
            notes: input.notes,
        };

        let session = self.store.create_session(session).await?;

        SESSIONS_TOTAL.with_label_values(&["opened"]).inc();

        publish(
            self.audit.as_ref(),
            AuditEvent::new(
                input.operator_id,
                "cash_session.open",
                "cash_session",
                session.session_id,
                serde_json::json!({ "opening_amount": session.opening_amount.to_string() }),
            ),
        )
        .await;

        Ok(session)
    }

    /// Close the operator's open session against a counted drawer amount.
    ///
    /// Expected cash comes from the reconciliation calculator over the
    /// session's cash-method movements only. A variance beyond the
    /// two-decimal epsilon requires an explanation in `notes`; without one
    /// the close fails and nothing is written.
    #[instrument(skip(self, notes), fields(operator_id = %operator_id))]
    pub async fn close(
        &self,
        operator_id: Uuid,
        closing_amount: Decimal,
        notes: Option<String>,
    ) -> Result<CashSession, AppError> {
        let session = self
            .store
            .find_open_session(operator_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!(
                    "Operator {} has no open session to close",
                    operator_id
                ))
            })?;

        let cash_in = self
            .store
            .sum_movements(session.session_id, MovementType::Inflow, Some(TenderMethod::Cash))
            .await?;
        let cash_out = self
            .store
            .sum_movements(session.session_id, MovementType::Outflow, Some(TenderMethod::Cash))
            .await?;

        let closing_amount = reconcile::normalize(closing_amount);
        let expected = reconcile::expected_cash(session.opening_amount, cash_in, cash_out);
        let variance = reconcile::normalize(closing_amount - expected);

        let explanation = notes.filter(|n| !n.trim().is_empty());
        if reconcile::requires_explanation(variance) && explanation.is_none() {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Variance of {} requires an explanation in notes",
                variance
            )));
        }

        let closed = self
            .store
            .close_session(
                session.session_id,
                SessionClose {
                    closed_by: operator_id,
                    closing_amount,
                    expected_cash: expected,
                    variance,
                    ended_utc: Utc::now(),
                    notes: explanation,
                },
            )
            .await?;

        SESSIONS_TOTAL.with_label_values(&["closed"]).inc();

        publish(
            self.audit.as_ref(),
            AuditEvent::new(
                operator_id,
                "cash_session.close",
                "cash_session",
                closed.session_id,
                serde_json::json!({
                    "closing_amount": closing_amount.to_string(),
                    "expected": expected.to_string(),
                    "variance": variance.to_string(),
                }),
            ),
        )
        .await;

        Ok(closed)
    }

    /// The operator's current open session. Other components use this to
    /// tag new movements with the active session; it is always a query,
    /// never cached state.
    #[instrument(skip(self), fields(operator_id = %operator_id))]
    pub async fn active_for_operator(
        &self,
        operator_id: Uuid,
    ) -> Result<Option<CashSession>, AppError> {
        self.store.find_open_session(operator_id).await
    }
}
