//! Cash drawer session model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Session lifecycle status. A session transitions open -> closed exactly
/// once and is never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One drawer shift for one operator.
///
/// `expected_cash` and `variance` are derived fields: both are reproducible
/// from `opening_amount` plus the session's cash movements, which is what
/// makes backfill safe. Closed sessions are permanent audit records and are
/// never deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CashSession {
    pub session_id: Uuid,
    pub opened_by: Uuid,
    pub closed_by: Option<Uuid>,
    pub opening_amount: Decimal,
    pub closing_amount: Option<Decimal>,
    pub expected_cash: Option<Decimal>,
    pub variance: Option<Decimal>,
    pub started_utc: DateTime<Utc>,
    pub ended_utc: Option<DateTime<Utc>>,
    pub status: String,
    pub notes: Option<String>,
}

impl CashSession {
    /// Get parsed status.
    pub fn parsed_status(&self) -> Option<SessionStatus> {
        SessionStatus::parse(&self.status)
    }

    pub fn is_open(&self) -> bool {
        self.parsed_status() == Some(SessionStatus::Open)
    }
}

/// Input for opening a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSession {
    pub operator_id: Uuid,
    pub opening_amount: Decimal,
    pub notes: Option<String>,
}

/// Fields written exactly once when a session closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClose {
    pub closed_by: Uuid,
    pub closing_amount: Decimal,
    pub expected_cash: Decimal,
    pub variance: Decimal,
    pub ended_utc: DateTime<Utc>,
    pub notes: Option<String>,
}
