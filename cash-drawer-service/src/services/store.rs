//! Persistence seam.
//!
//! The drawer services consume a transactional store through this trait so
//! the same core runs against Postgres in production and an in-memory store
//! in tests. The store owns the three races that cannot be closed at the
//! application level: the one-open-session uniqueness, the receipt-number
//! uniqueness, and the refund double-spend re-validation, each of which must
//! be decided inside the store's own transaction/lock.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CashMovement, CashSession, MovementType, Payment, PaymentRefund, SessionClose, TenderMethod,
};

/// Payment row plus its ledger movement, inserted as one atomic unit.
#[derive(Debug, Clone)]
pub struct PaymentInsert {
    pub payment: Payment,
    pub movement: CashMovement,
}

/// Refund row plus its outflow movement, inserted as one atomic unit. The
/// store re-validates the remaining refundable amount inside the same
/// transaction and fails with `Conflict` when the refund would overdraw the
/// payment.
#[derive(Debug, Clone)]
pub struct RefundInsert {
    pub refund: PaymentRefund,
    pub movement: CashMovement,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    // -- sessions ------------------------------------------------------------

    /// Insert a new open session. Fails with `Conflict` when the operator
    /// already has one (unique-constraint backed, so concurrent opens lose
    /// here rather than duplicating state).
    async fn create_session(&self, session: CashSession) -> Result<CashSession, AppError>;

    /// The operator's current open session, if any.
    async fn find_open_session(&self, operator_id: Uuid) -> Result<Option<CashSession>, AppError>;

    async fn get_session(&self, session_id: Uuid) -> Result<Option<CashSession>, AppError>;

    /// Write the close-time fields exactly once. Fails with `Conflict` if
    /// the session is no longer open.
    async fn close_session(
        &self,
        session_id: Uuid,
        close: SessionClose,
    ) -> Result<CashSession, AppError>;

    /// Keyset page of sessions ordered by id, optionally restricted to one
    /// session. Used by the backfill job.
    async fn list_sessions(
        &self,
        after: Option<Uuid>,
        limit: i64,
        session_filter: Option<Uuid>,
    ) -> Result<Vec<CashSession>, AppError>;

    /// Overwrite the derived expected/variance fields only. Backfill's one
    /// write path; never touches movements.
    async fn update_session_reconciliation(
        &self,
        session_id: Uuid,
        expected_cash: Decimal,
        variance: Option<Decimal>,
    ) -> Result<(), AppError>;

    // -- movements -----------------------------------------------------------

    /// Append a movement. Insert-only: the trait exposes no update or
    /// delete for movements.
    async fn insert_movement(&self, movement: CashMovement) -> Result<CashMovement, AppError>;

    /// Sum of stored movement amounts for a session by type and method.
    /// Always a live aggregate over rows, never a cached counter.
    async fn sum_movements(
        &self,
        session_id: Uuid,
        movement_type: MovementType,
        method: Option<TenderMethod>,
    ) -> Result<Decimal, AppError>;

    // -- payments ------------------------------------------------------------

    /// Insert a payment and its inflow movement atomically. A duplicate
    /// receipt number fails with `Conflict`.
    async fn insert_payment(&self, insert: PaymentInsert) -> Result<Payment, AppError>;

    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError>;

    /// Highest receipt number assigned so far, or 0 when no payments exist.
    async fn max_receipt_number(&self) -> Result<i64, AppError>;

    // -- refunds -------------------------------------------------------------

    /// Insert a refund and its outflow movement atomically, re-checking the
    /// refundable remainder inside the transaction.
    async fn insert_refund(&self, insert: RefundInsert) -> Result<PaymentRefund, AppError>;

    /// Sum of refunds already issued against a payment.
    async fn refunded_total(&self, payment_id: Uuid) -> Result<Decimal, AppError>;
}
