//! Services module for cash-drawer-service.

pub mod audit;
pub mod backfill;
pub mod database;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod payment;
pub mod receipt;
pub mod reconcile;
pub mod refund;
pub mod session;
pub mod store;

pub use audit::{AuditEvent, AuditSink, TracingAuditSink};
pub use backfill::{BackfillJob, BackfillMode, BackfillSummary, Divergence};
pub use database::PostgresStore;
pub use ledger::MovementService;
pub use memory::InMemoryStore;
pub use metrics::{gather_metrics, init_metrics, record_error};
pub use payment::PaymentService;
pub use receipt::{MaxPlusOneSequence, ReceiptSequence};
pub use refund::RefundService;
pub use session::SessionService;
pub use store::{LedgerStore, PaymentInsert, RefundInsert};
