//! Audit sink seam.
//!
//! Every state-changing action is reported here for compliance. The sink is
//! an external collaborator: delivery is fire-and-forget, and a sink failure
//! must never fail the operation that produced the event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;

/// One compliance record: who did what to which subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor: Uuid,
    pub action: String,
    pub subject_type: String,
    pub subject_id: Uuid,
    pub metadata: serde_json::Value,
    /// Network origin, filled in by the transport adapter that wraps the
    /// core. Always absent for events produced in-process.
    pub origin: Option<String>,
    pub recorded_utc: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        actor: Uuid,
        action: &str,
        subject_type: &str,
        subject_id: Uuid,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            actor,
            action: action.to_string(),
            subject_type: subject_type.to_string(),
            subject_id,
            metadata,
            origin: None,
            recorded_utc: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), AppError>;
}

/// Deliver an event, swallowing sink failures. The warn line is the only
/// trace a lost audit record leaves; the primary operation proceeds.
pub async fn publish(sink: &dyn AuditSink, event: AuditEvent) {
    let action = event.action.clone();
    if let Err(e) = sink.record(event).await {
        warn!(action = %action, error = %e, "Audit sink failed, event dropped");
    }
}

/// Default sink: structured log lines. Production deployments swap in a
/// sink that writes the compliance store.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AppError> {
        tracing::info!(
            actor = %event.actor,
            action = %event.action,
            subject_type = %event.subject_type,
            subject_id = %event.subject_id,
            metadata = %event.metadata,
            origin = ?event.origin,
            "audit"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn record(&self, _event: AuditEvent) -> Result<(), AppError> {
            Err(AppError::InternalError(anyhow::anyhow!("sink down")))
        }
    }

    #[tokio::test]
    async fn publish_swallows_sink_failures() {
        let event = AuditEvent::new(
            Uuid::new_v4(),
            "cash_session.open",
            "cash_session",
            Uuid::new_v4(),
            serde_json::json!({}),
        );
        // Must not panic or propagate.
        publish(&FailingSink, event).await;
    }

    #[test]
    fn in_process_events_carry_no_origin() {
        let event = AuditEvent::new(
            Uuid::new_v4(),
            "payment.record",
            "payment",
            Uuid::new_v4(),
            serde_json::json!({}),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert!(value["origin"].is_null());
    }
}
