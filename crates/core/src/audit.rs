//! Audit event emission.
//!
//! The engine describes who did what to which record; delivery belongs to
//! an external sink. Recording is fire-and-forget: a sink that cannot
//! deliver must log and swallow the failure rather than disturb the
//! primary operation.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    PatientCreated,
    RiskAssessed,
    RecordTransferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Success,
    Failure,
}

/// The identity on whose behalf an operation ran.
///
/// Identity resolution is an external concern; callers without one get the
/// system actor, matching unauthenticated internal jobs.
#[derive(Debug, Clone)]
pub struct Actor {
    pub username: String,
    pub role: String,
}

impl Actor {
    pub fn system() -> Self {
        Self {
            username: "system".to_string(),
            role: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    #[serde(rename = "type")]
    pub event_type: AuditEventType,
    pub actor_username: String,
    pub actor_role: String,
    pub description: String,
    pub patient_id: String,
    pub patient_name: String,
    pub status: AuditStatus,
}

/// Destination for audit events.
///
/// Implementations must not return errors or panic on delivery problems;
/// audit failure never blocks the operation that produced the event.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Sink that writes events to the `audit` log target.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        match serde_json::to_string(event) {
            Ok(json) => tracing::info!(target: "audit", "{json}"),
            Err(e) => tracing::warn!(target: "audit", "failed to encode audit event: {e}"),
        }
    }
}

/// Sink that drops every event; for tests and wiring without auditing.
#[derive(Debug, Default, Clone)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}
