use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::domain::{
    PaymentMethod, PaymentOrderId, PaymentOrderRecord, PaymentStatus,
};
use crate::audit::{AuditEvent, AuditSink};
use crate::clock::Clock;
use crate::procedures::domain::ProcedureId;
use crate::store::StoreError;

/// Hours a pending order stays payable before the sweep expires it.
pub const PAYMENT_EXPIRY_HOURS: i64 = 48;

/// Storage abstraction for payment orders.
pub trait PaymentStore: Send + Sync {
    fn insert_order(&self, record: PaymentOrderRecord)
        -> Result<PaymentOrderRecord, StoreError>;
    fn order(&self, id: &PaymentOrderId) -> Result<Option<PaymentOrderRecord>, StoreError>;
    fn update_order(&self, record: PaymentOrderRecord) -> Result<(), StoreError>;
    fn pending_orders(&self) -> Result<Vec<PaymentOrderRecord>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("operation {operation} is not legal on an order in status {status:?}")]
    InvalidState {
        status: PaymentStatus,
        operation: &'static str,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

static ORDER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_order_id() -> PaymentOrderId {
    let id = ORDER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    PaymentOrderId(format!("pay-{id:06}"))
}

/// Tracks the payment order lifecycle: pending, then accredited, rejected,
/// or swept to expired.
pub struct PaymentLedger<S, A, C> {
    store: Arc<S>,
    audit: Arc<A>,
    clock: C,
    expiry: Duration,
}

impl<S, A, C> PaymentLedger<S, A, C>
where
    S: PaymentStore,
    A: AuditSink,
    C: Clock,
{
    pub fn new(store: Arc<S>, audit: Arc<A>, clock: C) -> Self {
        Self {
            store,
            audit,
            clock,
            expiry: Duration::hours(PAYMENT_EXPIRY_HOURS),
        }
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn create_order(
        &self,
        procedure_id: &ProcedureId,
        amount_cents: i64,
        method: PaymentMethod,
    ) -> Result<PaymentOrderRecord, PaymentError> {
        let now = self.clock.now();
        let record = self.store.insert_order(PaymentOrderRecord {
            id: next_order_id(),
            procedure_id: procedure_id.clone(),
            amount_cents,
            method,
            status: PaymentStatus::Pending,
            created_at: now,
            expires_at: now + self.expiry,
            accredited_at: None,
            receipt_ref: None,
            rejection_reason: None,
        })?;
        self.audit.record(AuditEvent::new(
            "payment_order",
            record.id.to_string(),
            "create",
            "-",
            record.status.label(),
        ));
        info!(order = %record.id, procedure = %record.procedure_id, "payment order created");
        Ok(record)
    }

    /// Mark an order as paid. Accreditation callbacks can be delivered more
    /// than once, so a second call on an already-accredited order is a
    /// no-op rather than an error.
    pub fn accredit(
        &self,
        id: &PaymentOrderId,
        receipt_ref: Option<String>,
    ) -> Result<PaymentOrderRecord, PaymentError> {
        let mut record = self.store.order(id)?.ok_or(StoreError::NotFound)?;
        match record.status {
            PaymentStatus::Accredited => Ok(record),
            PaymentStatus::Pending => {
                record.status = PaymentStatus::Accredited;
                record.accredited_at = Some(self.clock.now());
                record.receipt_ref = receipt_ref;
                self.store.update_order(record.clone())?;
                self.audit.record(AuditEvent::new(
                    "payment_order",
                    record.id.to_string(),
                    "accredit",
                    PaymentStatus::Pending.label(),
                    record.status.label(),
                ));
                info!(order = %record.id, "payment order accredited");
                Ok(record)
            }
            status => Err(PaymentError::InvalidState {
                status,
                operation: "accredit",
            }),
        }
    }

    pub fn reject(
        &self,
        id: &PaymentOrderId,
        reason: impl Into<String>,
    ) -> Result<PaymentOrderRecord, PaymentError> {
        let mut record = self.store.order(id)?.ok_or(StoreError::NotFound)?;
        if record.status != PaymentStatus::Pending {
            return Err(PaymentError::InvalidState {
                status: record.status,
                operation: "reject",
            });
        }
        record.status = PaymentStatus::Rejected;
        record.rejection_reason = Some(reason.into());
        self.store.update_order(record.clone())?;
        self.audit.record(AuditEvent::new(
            "payment_order",
            record.id.to_string(),
            "reject",
            PaymentStatus::Pending.label(),
            record.status.label(),
        ));
        Ok(record)
    }

    /// Move every pending order past its deadline to expired. Safe to run
    /// redundantly: non-pending orders are skipped, so a second sweep over
    /// the same instant transitions nothing.
    pub fn sweep_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<PaymentOrderRecord>, PaymentError> {
        let mut swept = Vec::new();
        for mut record in self.store.pending_orders()? {
            if record.expires_at >= now {
                continue;
            }
            record.status = PaymentStatus::Expired;
            self.store.update_order(record.clone())?;
            self.audit.record(AuditEvent::new(
                "payment_order",
                record.id.to_string(),
                "expire",
                PaymentStatus::Pending.label(),
                record.status.label(),
            ));
            swept.push(record);
        }
        if !swept.is_empty() {
            info!(count = swept.len(), "expired pending payment orders");
        }
        Ok(swept)
    }
}
