//! Common test utilities for cash-drawer-service integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex, Once};
use uuid::Uuid;

use cash_drawer_service::error::AppError;
use cash_drawer_service::services::audit::{AuditEvent, AuditSink};
use cash_drawer_service::services::{
    InMemoryStore, MaxPlusOneSequence, MovementService, PaymentService, RefundService,
    SessionService,
};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,cash_drawer_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Audit sink that captures every event for assertions.
#[derive(Default)]
pub struct CapturingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl CapturingAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.action).collect()
    }
}

#[async_trait]
impl AuditSink for CapturingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AppError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Audit sink that always fails, for asserting non-fatality.
pub struct FailingAuditSink;

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn record(&self, _event: AuditEvent) -> Result<(), AppError> {
        Err(AppError::InternalError(anyhow::anyhow!("audit sink down")))
    }
}

/// The drawer core wired over an in-memory store.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub audit: Arc<CapturingAuditSink>,
    pub sessions: Arc<SessionService>,
    pub movements: Arc<MovementService>,
    pub payments: Arc<PaymentService>,
    pub refunds: Arc<RefundService>,
}

/// Build a fresh core over an empty store.
pub fn spawn_core() -> Harness {
    init_tracing();

    let store = Arc::new(InMemoryStore::new());
    let audit = Arc::new(CapturingAuditSink::default());
    let ledger_store: Arc<dyn cash_drawer_service::services::LedgerStore> = store.clone();
    let receipts = Arc::new(MaxPlusOneSequence::new(ledger_store.clone()));

    Harness {
        sessions: Arc::new(SessionService::new(ledger_store.clone(), audit.clone())),
        movements: Arc::new(MovementService::new(ledger_store.clone(), audit.clone())),
        payments: Arc::new(PaymentService::new(
            ledger_store.clone(),
            receipts,
            audit.clone(),
        )),
        refunds: Arc::new(RefundService::new(ledger_store, audit.clone())),
        store,
        audit,
    }
}

/// Decimal from a string literal.
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("valid decimal literal")
}

pub fn operator() -> Uuid {
    Uuid::new_v4()
}
