//! In-memory ledger store.
//!
//! Backs the integration tests and embedded use without a database. A
//! single mutex stands in for the row locks and unique constraints the
//! Postgres store gets from the schema, so the same conflict semantics hold
//! under concurrent callers.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CashMovement, CashSession, MovementType, Payment, PaymentRefund, SessionClose, TenderMethod,
};
use crate::services::store::{LedgerStore, PaymentInsert, RefundInsert};

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, CashSession>,
    movements: Vec<CashMovement>,
    payments: HashMap<Uuid, Payment>,
    refunds: Vec<PaymentRefund>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned mutex only happens if a panic escaped mid-write, which
        // test code treats as fatal anyway.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of all movements, for test assertions.
    pub fn movements(&self) -> Vec<CashMovement> {
        self.lock().movements.clone()
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn create_session(&self, session: CashSession) -> Result<CashSession, AppError> {
        let mut inner = self.lock();
        let duplicate = inner
            .sessions
            .values()
            .any(|s| s.opened_by == session.opened_by && s.is_open());
        if duplicate {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Operator {} already has an open session",
                session.opened_by
            )));
        }
        inner.sessions.insert(session.session_id, session.clone());
        Ok(session)
    }

    async fn find_open_session(&self, operator_id: Uuid) -> Result<Option<CashSession>, AppError> {
        let inner = self.lock();
        let mut open: Vec<&CashSession> = inner
            .sessions
            .values()
            .filter(|s| s.opened_by == operator_id && s.is_open() && s.ended_utc.is_none())
            .collect();
        open.sort_by_key(|s| s.started_utc);
        Ok(open.last().map(|s| (*s).clone()))
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<CashSession>, AppError> {
        Ok(self.lock().sessions.get(&session_id).cloned())
    }

    async fn close_session(
        &self,
        session_id: Uuid,
        close: SessionClose,
    ) -> Result<CashSession, AppError> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Session {} not found", session_id)))?;
        if !session.is_open() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Session {} is not open",
                session_id
            )));
        }
        session.closed_by = Some(close.closed_by);
        session.closing_amount = Some(close.closing_amount);
        session.expected_cash = Some(close.expected_cash);
        session.variance = Some(close.variance);
        session.ended_utc = Some(close.ended_utc);
        session.status = "closed".to_string();
        if close.notes.is_some() {
            session.notes = close.notes;
        }
        Ok(session.clone())
    }

    async fn list_sessions(
        &self,
        after: Option<Uuid>,
        limit: i64,
        session_filter: Option<Uuid>,
    ) -> Result<Vec<CashSession>, AppError> {
        let inner = self.lock();
        let mut sessions: Vec<CashSession> = inner
            .sessions
            .values()
            .filter(|s| session_filter.is_none_or(|id| s.session_id == id))
            .filter(|s| after.is_none_or(|cursor| s.session_id > cursor))
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.session_id);
        sessions.truncate(limit.clamp(1, 1000) as usize);
        Ok(sessions)
    }

    async fn update_session_reconciliation(
        &self,
        session_id: Uuid,
        expected_cash: Decimal,
        variance: Option<Decimal>,
    ) -> Result<(), AppError> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Session {} not found", session_id)))?;
        session.expected_cash = Some(expected_cash);
        session.variance = variance;
        Ok(())
    }

    async fn insert_movement(&self, movement: CashMovement) -> Result<CashMovement, AppError> {
        self.lock().movements.push(movement.clone());
        Ok(movement)
    }

    async fn sum_movements(
        &self,
        session_id: Uuid,
        movement_type: MovementType,
        method: Option<TenderMethod>,
    ) -> Result<Decimal, AppError> {
        let inner = self.lock();
        let sum = inner
            .movements
            .iter()
            .filter(|m| m.session_id == Some(session_id))
            .filter(|m| m.parsed_type() == Some(movement_type))
            .filter(|m| method.is_none_or(|wanted| m.parsed_method() == Some(wanted)))
            .map(|m| m.amount)
            .sum();
        Ok(sum)
    }

    async fn insert_payment(&self, insert: PaymentInsert) -> Result<Payment, AppError> {
        let mut inner = self.lock();
        let duplicate = inner
            .payments
            .values()
            .any(|p| p.receipt_number == insert.payment.receipt_number);
        if duplicate {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Receipt number {} already assigned",
                insert.payment.receipt_number
            )));
        }
        inner
            .payments
            .insert(insert.payment.payment_id, insert.payment.clone());
        inner.movements.push(insert.movement);
        Ok(insert.payment)
    }

    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self.lock().payments.get(&payment_id).cloned())
    }

    async fn max_receipt_number(&self) -> Result<i64, AppError> {
        let inner = self.lock();
        Ok(inner
            .payments
            .values()
            .map(|p| p.receipt_number)
            .max()
            .unwrap_or(0))
    }

    async fn insert_refund(&self, insert: RefundInsert) -> Result<PaymentRefund, AppError> {
        let mut inner = self.lock();
        let payment = inner
            .payments
            .get(&insert.refund.payment_id)
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!(
                    "Payment {} not found",
                    insert.refund.payment_id
                ))
            })?;
        let refunded: Decimal = inner
            .refunds
            .iter()
            .filter(|r| r.payment_id == insert.refund.payment_id)
            .map(|r| r.amount)
            .sum();
        let remaining = payment.amount - refunded;
        if insert.refund.amount > remaining {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Refund {} exceeds refundable remainder {} on payment {}",
                insert.refund.amount,
                remaining,
                insert.refund.payment_id
            )));
        }
        inner.refunds.push(insert.refund.clone());
        inner.movements.push(insert.movement);
        Ok(insert.refund)
    }

    async fn refunded_total(&self, payment_id: Uuid) -> Result<Decimal, AppError> {
        let inner = self.lock();
        Ok(inner
            .refunds
            .iter()
            .filter(|r| r.payment_id == payment_id)
            .map(|r| r.amount)
            .sum())
    }
}
