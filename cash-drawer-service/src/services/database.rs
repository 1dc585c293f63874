//! Postgres-backed ledger store.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CashMovement, CashSession, MovementType, Payment, PaymentRefund, SessionClose, TenderMethod,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{LedgerStore, PaymentInsert, RefundInsert};

const SESSION_COLUMNS: &str = "session_id, opened_by, closed_by, opening_amount, closing_amount, \
     expected_cash, variance, started_utc, ended_utc, status, notes";

const MOVEMENT_COLUMNS: &str = "movement_id, session_id, movement_type, method, amount, reason, \
     payment_id, refund_id, created_by, created_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "cash-drawer-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    #[instrument(skip(self, session), fields(operator_id = %session.opened_by))]
    async fn create_session(&self, session: CashSession) -> Result<CashSession, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_session"])
            .start_timer();

        let created = sqlx::query_as::<_, CashSession>(&format!(
            r#"
            INSERT INTO cash_sessions ({SESSION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {SESSION_COLUMNS}
            "#,
        ))
        .bind(session.session_id)
        .bind(session.opened_by)
        .bind(session.closed_by)
        .bind(session.opening_amount)
        .bind(session.closing_amount)
        .bind(session.expected_cash)
        .bind(session.variance)
        .bind(session.started_utc)
        .bind(session.ended_utc)
        .bind(&session.status)
        .bind(&session.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Operator {} already has an open session",
                    session.opened_by
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create session: {}", e)),
        })?;

        timer.observe_duration();

        info!(session_id = %created.session_id, "Cash session created");

        Ok(created)
    }

    #[instrument(skip(self), fields(operator_id = %operator_id))]
    async fn find_open_session(&self, operator_id: Uuid) -> Result<Option<CashSession>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_open_session"])
            .start_timer();

        let session = sqlx::query_as::<_, CashSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM cash_sessions
            WHERE opened_by = $1 AND status = 'open' AND ended_utc IS NULL
            ORDER BY started_utc DESC
            LIMIT 1
            "#,
        ))
        .bind(operator_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to find open session: {}", e))
        })?;

        timer.observe_duration();

        Ok(session)
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn get_session(&self, session_id: Uuid) -> Result<Option<CashSession>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_session"])
            .start_timer();

        let session = sqlx::query_as::<_, CashSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM cash_sessions
            WHERE session_id = $1
            "#,
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get session: {}", e)))?;

        timer.observe_duration();

        Ok(session)
    }

    #[instrument(skip(self, close), fields(session_id = %session_id))]
    async fn close_session(
        &self,
        session_id: Uuid,
        close: SessionClose,
    ) -> Result<CashSession, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["close_session"])
            .start_timer();

        // The status guard makes the close single-shot: a session that
        // already closed matches zero rows.
        let closed = sqlx::query_as::<_, CashSession>(&format!(
            r#"
            UPDATE cash_sessions
            SET closed_by = $2,
                closing_amount = $3,
                expected_cash = $4,
                variance = $5,
                ended_utc = $6,
                notes = COALESCE($7, notes),
                status = 'closed'
            WHERE session_id = $1 AND status = 'open'
            RETURNING {SESSION_COLUMNS}
            "#,
        ))
        .bind(session_id)
        .bind(close.closed_by)
        .bind(close.closing_amount)
        .bind(close.expected_cash)
        .bind(close.variance)
        .bind(close.ended_utc)
        .bind(&close.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to close session: {}", e)))?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!("Session {} is not open", session_id))
        })?;

        timer.observe_duration();

        info!(
            session_id = %closed.session_id,
            variance = ?closed.variance,
            "Cash session closed"
        );

        Ok(closed)
    }

    #[instrument(skip(self))]
    async fn list_sessions(
        &self,
        after: Option<Uuid>,
        limit: i64,
        session_filter: Option<Uuid>,
    ) -> Result<Vec<CashSession>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_sessions"])
            .start_timer();

        let limit = limit.clamp(1, 1000);

        let sessions = if let Some(cursor) = after {
            sqlx::query_as::<_, CashSession>(&format!(
                r#"
                SELECT {SESSION_COLUMNS}
                FROM cash_sessions
                WHERE ($1::uuid IS NULL OR session_id = $1)
                  AND session_id > $2
                ORDER BY session_id
                LIMIT $3
                "#,
            ))
            .bind(session_filter)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, CashSession>(&format!(
                r#"
                SELECT {SESSION_COLUMNS}
                FROM cash_sessions
                WHERE ($1::uuid IS NULL OR session_id = $1)
                ORDER BY session_id
                LIMIT $2
                "#,
            ))
            .bind(session_filter)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list sessions: {}", e)))?;

        timer.observe_duration();

        Ok(sessions)
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn update_session_reconciliation(
        &self,
        session_id: Uuid,
        expected_cash: Decimal,
        variance: Option<Decimal>,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_session_reconciliation"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET expected_cash = $2, variance = $3
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .bind(expected_cash)
        .bind(variance)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update reconciliation: {}", e))
        })?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Session {} not found",
                session_id
            )));
        }

        Ok(())
    }

    #[instrument(skip(self, movement), fields(movement_type = %movement.movement_type))]
    async fn insert_movement(&self, movement: CashMovement) -> Result<CashMovement, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_movement"])
            .start_timer();

        let inserted = sqlx::query_as::<_, CashMovement>(&format!(
            r#"
            INSERT INTO cash_movements ({MOVEMENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {MOVEMENT_COLUMNS}
            "#,
        ))
        .bind(movement.movement_id)
        .bind(movement.session_id)
        .bind(&movement.movement_type)
        .bind(&movement.method)
        .bind(movement.amount)
        .bind(&movement.reason)
        .bind(movement.payment_id)
        .bind(movement.refund_id)
        .bind(movement.created_by)
        .bind(movement.created_utc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert movement: {}", e)))?;

        timer.observe_duration();

        Ok(inserted)
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn sum_movements(
        &self,
        session_id: Uuid,
        movement_type: MovementType,
        method: Option<TenderMethod>,
    ) -> Result<Decimal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sum_movements"])
            .start_timer();

        let sum: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM cash_movements
            WHERE session_id = $1
              AND movement_type = $2
              AND ($3::varchar IS NULL OR method = $3)
            "#,
        )
        .bind(session_id)
        .bind(movement_type.as_str())
        .bind(method.map(|m| m.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum movements: {}", e)))?;

        timer.observe_duration();

        Ok(sum)
    }

    #[instrument(skip(self, insert), fields(invoice_id = %insert.payment.invoice_id))]
    async fn insert_payment(&self, insert: PaymentInsert) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_payment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (payment_id, invoice_id, receipt_number, amount, method, received_utc, reference, notes, received_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING payment_id, invoice_id, receipt_number, amount, method, received_utc, reference, notes, received_by
            "#,
        )
        .bind(insert.payment.payment_id)
        .bind(insert.payment.invoice_id)
        .bind(insert.payment.receipt_number)
        .bind(insert.payment.amount)
        .bind(&insert.payment.method)
        .bind(insert.payment.received_utc)
        .bind(&insert.payment.reference)
        .bind(&insert.payment.notes)
        .bind(insert.payment.received_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Receipt number {} already assigned",
                    insert.payment.receipt_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to insert payment: {}", e)),
        })?;

        sqlx::query(&format!(
            r#"
            INSERT INTO cash_movements ({MOVEMENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        ))
        .bind(insert.movement.movement_id)
        .bind(insert.movement.session_id)
        .bind(&insert.movement.movement_type)
        .bind(&insert.movement.method)
        .bind(insert.movement.amount)
        .bind(&insert.movement.reason)
        .bind(insert.movement.payment_id)
        .bind(insert.movement.refund_id)
        .bind(insert.movement.created_by)
        .bind(insert.movement.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert payment movement: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            payment_id = %payment.payment_id,
            receipt_number = payment.receipt_number,
            "Payment recorded"
        );

        Ok(payment)
    }

    #[instrument(skip(self), fields(payment_id = %payment_id))]
    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_payment"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, invoice_id, receipt_number, amount, method, received_utc, reference, notes, received_by
            FROM payments
            WHERE payment_id = $1
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get payment: {}", e)))?;

        timer.observe_duration();

        Ok(payment)
    }

    #[instrument(skip(self))]
    async fn max_receipt_number(&self) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["max_receipt_number"])
            .start_timer();

        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(receipt_number) FROM payments")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to read receipt max: {}", e))
            })?;

        timer.observe_duration();

        Ok(max.unwrap_or(0))
    }

    #[instrument(skip(self, insert), fields(payment_id = %insert.refund.payment_id))]
    async fn insert_refund(&self, insert: RefundInsert) -> Result<PaymentRefund, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_refund"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Lock the payment row, then re-check the refundable remainder
        // inside the transaction. Two overlapping refunds serialize on this
        // lock; the second one re-reads a remainder that already includes
        // the first and fails with a conflict.
        let payment_amount: Option<Decimal> = sqlx::query_scalar(
            "SELECT amount FROM payments WHERE payment_id = $1 FOR UPDATE",
        )
        .bind(insert.refund.payment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock payment: {}", e)))?;

        let payment_amount = payment_amount.ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!(
                "Payment {} not found",
                insert.refund.payment_id
            ))
        })?;

        let refunded: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payment_refunds WHERE payment_id = $1",
        )
        .bind(insert.refund.payment_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum refunds: {}", e)))?;

        let remaining = payment_amount - refunded;
        if insert.refund.amount > remaining {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Refund {} exceeds refundable remainder {} on payment {}",
                insert.refund.amount,
                remaining,
                insert.refund.payment_id
            )));
        }

        let refund = sqlx::query_as::<_, PaymentRefund>(
            r#"
            INSERT INTO payment_refunds (refund_id, invoice_id, payment_id, amount, reason, notes, refunded_utc, refunded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING refund_id, invoice_id, payment_id, amount, reason, notes, refunded_utc, refunded_by
            "#,
        )
        .bind(insert.refund.refund_id)
        .bind(insert.refund.invoice_id)
        .bind(insert.refund.payment_id)
        .bind(insert.refund.amount)
        .bind(&insert.refund.reason)
        .bind(&insert.refund.notes)
        .bind(insert.refund.refunded_utc)
        .bind(insert.refund.refunded_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert refund: {}", e)))?;

        sqlx::query(&format!(
            r#"
            INSERT INTO cash_movements ({MOVEMENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        ))
        .bind(insert.movement.movement_id)
        .bind(insert.movement.session_id)
        .bind(&insert.movement.movement_type)
        .bind(&insert.movement.method)
        .bind(insert.movement.amount)
        .bind(&insert.movement.reason)
        .bind(insert.movement.payment_id)
        .bind(insert.movement.refund_id)
        .bind(insert.movement.created_by)
        .bind(insert.movement.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert refund movement: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            refund_id = %refund.refund_id,
            payment_id = %refund.payment_id,
            amount = %refund.amount,
            "Refund issued"
        );

        Ok(refund)
    }

    #[instrument(skip(self), fields(payment_id = %payment_id))]
    async fn refunded_total(&self, payment_id: Uuid) -> Result<Decimal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["refunded_total"])
            .start_timer();

        let sum: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payment_refunds WHERE payment_id = $1",
        )
        .bind(payment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum refunds: {}", e)))?;

        timer.observe_duration();

        Ok(sum)
    }
}
