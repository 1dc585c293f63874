//! Domain models for cash-drawer-service.

mod movement;
mod payment;
mod session;

pub use movement::{CashMovement, MovementType, RecordMovement, TenderMethod};
pub use payment::{IssueRefund, Payment, PaymentRefund, RecordPayment};
pub use session::{CashSession, OpenSession, SessionClose, SessionStatus};
