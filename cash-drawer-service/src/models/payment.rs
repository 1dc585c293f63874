//! Payment and refund models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::TenderMethod;

/// Money received against an invoice.
///
/// `receipt_number` is assigned exactly once, at creation, and is globally
/// unique and increasing in creation order (see `services::receipt` for the
/// concurrency caveat).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub receipt_number: i64,
    pub amount: Decimal,
    pub method: String,
    pub received_utc: DateTime<Utc>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub received_by: Option<Uuid>,
}

impl Payment {
    /// Get parsed tender method.
    pub fn parsed_method(&self) -> Option<TenderMethod> {
        TenderMethod::parse(&self.method)
    }
}

/// Input for recording a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPayment {
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub method: TenderMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub received_by: Option<Uuid>,
}

/// Partial or full reversal of a payment. The sum of refunds against a
/// payment never exceeds that payment's amount.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentRefund {
    pub refund_id: Uuid,
    pub invoice_id: Uuid,
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub reason: String,
    pub notes: Option<String>,
    pub refunded_utc: DateTime<Utc>,
    pub refunded_by: Uuid,
}

/// Input for issuing a refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRefund {
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub reason: String,
    pub notes: Option<String>,
}
