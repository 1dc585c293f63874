//! Backfill / recompute batch job.
//!
//! Recomputes stored expected/variance for sessions from raw ledger data
//! using the same calculator as the live close path. Idempotent and safe to
//! re-run: it only ever writes the two derived session fields, never
//! movements.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CashSession, MovementType, TenderMethod};
use crate::services::reconcile;
use crate::services::store::LedgerStore;

/// Whether divergences are reported only or written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillMode {
    DryRun,
    Write,
}

/// One session whose stored fields differ from the recomputation.
#[derive(Debug, Clone)]
pub struct Divergence {
    pub session_id: Uuid,
    pub stored_expected: Option<Decimal>,
    pub recomputed_expected: Decimal,
    pub stored_variance: Option<Decimal>,
    pub recomputed_variance: Option<Decimal>,
}

#[derive(Debug, Default, Clone)]
pub struct BackfillSummary {
    pub scanned: u64,
    pub changed: u64,
    pub divergences: Vec<Divergence>,
}

pub struct BackfillJob {
    store: Arc<dyn LedgerStore>,
    page_size: i64,
}

impl BackfillJob {
    pub fn new(store: Arc<dyn LedgerStore>, page_size: i64) -> Self {
        Self { store, page_size }
    }

    /// Run over all sessions (or one, when filtered), in id-ordered pages.
    #[instrument(skip(self), fields(mode = ?mode))]
    pub async fn run(
        &self,
        mode: BackfillMode,
        session_filter: Option<Uuid>,
    ) -> Result<BackfillSummary, AppError> {
        let mut summary = BackfillSummary::default();
        let mut cursor: Option<Uuid> = None;

        loop {
            let page = self
                .store
                .list_sessions(cursor, self.page_size, session_filter)
                .await?;
            if page.is_empty() {
                break;
            }
            cursor = page.last().map(|s| s.session_id);

            for session in &page {
                summary.scanned += 1;
                if let Some(divergence) = self.recompute(session).await? {
                    if mode == BackfillMode::Write {
                        self.store
                            .update_session_reconciliation(
                                divergence.session_id,
                                divergence.recomputed_expected,
                                divergence.recomputed_variance,
                            )
                            .await?;
                    }
                    summary.changed += 1;
                    summary.divergences.push(divergence);
                }
            }
        }

        info!(
            scanned = summary.scanned,
            changed = summary.changed,
            "Backfill pass complete"
        );

        Ok(summary)
    }

    /// Recompute one session's derived fields; `None` when the stored
    /// values already match exactly (after normalizing to two places).
    async fn recompute(&self, session: &CashSession) -> Result<Option<Divergence>, AppError> {
        let cash_in = self
            .store
            .sum_movements(session.session_id, MovementType::Inflow, Some(TenderMethod::Cash))
            .await?;
        let cash_out = self
            .store
            .sum_movements(session.session_id, MovementType::Outflow, Some(TenderMethod::Cash))
            .await?;

        let expected = reconcile::expected_cash(session.opening_amount, cash_in, cash_out);
        // No closing count means no variance, regardless of expected.
        let variance = reconcile::variance(session.closing_amount, expected);

        let stored_expected = session.expected_cash.map(reconcile::normalize);
        let stored_variance = session.variance.map(reconcile::normalize);

        if stored_expected == Some(expected) && stored_variance == variance {
            return Ok(None);
        }

        Ok(Some(Divergence {
            session_id: session.session_id,
            stored_expected: session.expected_cash,
            recomputed_expected: expected,
            stored_variance: session.variance,
            recomputed_variance: variance,
        }))
    }
}
