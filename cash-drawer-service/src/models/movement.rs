//! Cash movement ledger model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Movement direction. Direction is carried here, never by the sign of the
/// amount: `amount` is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Inflow,
    Outflow,
}

impl MovementType {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inflow => "inflow",
            Self::Outflow => "outflow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inflow" => Some(Self::Inflow),
            "outflow" => Some(Self::Outflow),
            _ => None,
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tender method. Only `Cash` participates in physical drawer
/// reconciliation; the other methods still flow through the same ledger for
/// reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TenderMethod {
    Cash,
    Card,
    MobileMoney,
    BankTransfer,
}

impl TenderMethod {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::MobileMoney => "mobile_money",
            Self::BankTransfer => "bank_transfer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(Self::Cash),
            "card" => Some(Self::Card),
            "mobile_money" => Some(Self::MobileMoney),
            "bank_transfer" => Some(Self::BankTransfer),
            _ => None,
        }
    }
}

impl std::fmt::Display for TenderMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One ledger entry.
///
/// Immutable once created: there is no update or delete path anywhere in
/// this crate. Corrections are made by inserting a compensating movement.
/// `method` is nullable for legacy/manual rows.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CashMovement {
    pub movement_id: Uuid,
    pub session_id: Option<Uuid>,
    pub movement_type: String,
    pub method: Option<String>,
    pub amount: Decimal,
    pub reason: Option<String>,
    pub payment_id: Option<Uuid>,
    pub refund_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl CashMovement {
    /// Get parsed movement type.
    pub fn parsed_type(&self) -> Option<MovementType> {
        MovementType::parse(&self.movement_type)
    }

    /// Get parsed tender method, if any.
    pub fn parsed_method(&self) -> Option<TenderMethod> {
        self.method.as_deref().and_then(TenderMethod::parse)
    }

    /// A manual adjustment is a movement tied to neither a payment nor a
    /// refund.
    pub fn is_manual_adjustment(&self) -> bool {
        self.payment_id.is_none() && self.refund_id.is_none()
    }
}

/// Input for appending a movement to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMovement {
    pub session_id: Option<Uuid>,
    pub movement_type: MovementType,
    pub method: Option<TenderMethod>,
    pub amount: Decimal,
    pub reason: Option<String>,
    pub payment_id: Option<Uuid>,
    pub refund_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
}
