//! Receipt numbering.
//!
//! Receipt numbers are unique, sequential, assigned exactly once at
//! payment creation, and never reassigned.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::AppError;
use crate::services::store::LedgerStore;

/// Source of the next receipt number. Swappable without touching callers:
/// a deployment that outgrows [`MaxPlusOneSequence`] can back this with a
/// database sequence or a single-row atomic counter instead.
#[async_trait]
pub trait ReceiptSequence: Send + Sync {
    async fn next(&self) -> Result<i64, AppError>;
}

/// `max(existing) + 1`.
///
/// Known limitation: this read-then-assign is only safe under low write
/// concurrency (a handful of cashiers). Two concurrent callers can read the
/// same max and propose the same number; the unique constraint on
/// `receipt_number` then fails the loser with a conflict instead of
/// silently duplicating a receipt.
pub struct MaxPlusOneSequence {
    store: Arc<dyn LedgerStore>,
}

impl MaxPlusOneSequence {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReceiptSequence for MaxPlusOneSequence {
    async fn next(&self) -> Result<i64, AppError> {
        let max = self.store.max_receipt_number().await?;
        Ok(max + 1)
    }
}
