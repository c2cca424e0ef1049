use serde::Serialize;

/// Summary of one mutating operation, emitted after the transition has
/// been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub entity_kind: &'static str,
    pub entity_id: String,
    pub operation: &'static str,
    pub before: String,
    pub after: String,
}

impl AuditEvent {
    pub fn new(
        entity_kind: &'static str,
        entity_id: impl Into<String>,
        operation: &'static str,
        before: impl Into<String>,
        after: impl Into<String>,
    ) -> Self {
        Self {
            entity_kind,
            entity_id: entity_id.into(),
            operation,
            before: before.into(),
            after: after.into(),
        }
    }
}

/// Fire-and-forget audit hook invoked once per state transition. The core
/// does not define how events are stored, only that one call is made for
/// every mutating operation.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Default sink forwarding audit events to the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            entity = event.entity_kind,
            id = %event.entity_id,
            operation = event.operation,
            before = %event.before,
            after = %event.after,
            "audit event"
        );
    }
}
