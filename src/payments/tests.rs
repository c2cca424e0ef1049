use std::sync::Arc;

use chrono::{Duration, NaiveDate};

use super::domain::{PaymentMethod, PaymentStatus};
use super::ledger::{PaymentError, PaymentLedger, PAYMENT_EXPIRY_HOURS};
use crate::clock::{Clock, FixedClock};
use crate::infra::{MemoryAuditSink, MemoryStore};
use crate::procedures::domain::ProcedureId;

fn fixture() -> (
    PaymentLedger<MemoryStore, MemoryAuditSink, FixedClock>,
    Arc<MemoryAuditSink>,
    FixedClock,
) {
    let store = Arc::new(MemoryStore::default());
    let audit = Arc::new(MemoryAuditSink::default());
    let clock = FixedClock::on(NaiveDate::from_ymd_opt(2025, 6, 2).expect("valid date"));
    (
        PaymentLedger::new(store, audit.clone(), clock),
        audit,
        clock,
    )
}

fn procedure() -> ProcedureId {
    ProcedureId("prc-pay".to_string())
}

#[test]
fn new_orders_are_pending_with_a_48_hour_deadline() {
    let (ledger, _, clock) = fixture();
    let order = ledger
        .create_order(&procedure(), 150_000, PaymentMethod::Card)
        .expect("order creates");

    assert_eq!(order.status, PaymentStatus::Pending);
    assert_eq!(order.created_at, clock.now());
    assert_eq!(
        order.expires_at,
        clock.now() + Duration::hours(PAYMENT_EXPIRY_HOURS)
    );
    assert_eq!(order.accredited_at, None);
}

#[test]
fn accreditation_is_idempotent() {
    let (ledger, audit, clock) = fixture();
    let order = ledger
        .create_order(&procedure(), 150_000, PaymentMethod::BankTransfer)
        .expect("order creates");

    let first = ledger
        .accredit(&order.id, Some("rcpt-001".to_string()))
        .expect("first accreditation");
    assert_eq!(first.status, PaymentStatus::Accredited);
    assert_eq!(first.accredited_at, Some(clock.now()));
    assert_eq!(first.receipt_ref.as_deref(), Some("rcpt-001"));

    // Duplicate callback delivery keeps the original receipt and emits no
    // second audit event.
    let second = ledger
        .accredit(&order.id, Some("rcpt-002".to_string()))
        .expect("second accreditation");
    assert_eq!(second, first);

    let operations: Vec<&str> = audit
        .events()
        .into_iter()
        .map(|event| event.operation)
        .collect();
    assert_eq!(operations, vec!["create", "accredit"]);
}

#[test]
fn accrediting_a_rejected_order_fails() {
    let (ledger, _, _) = fixture();
    let order = ledger
        .create_order(&procedure(), 150_000, PaymentMethod::Cash)
        .expect("order creates");
    ledger
        .reject(&order.id, "insufficient funds")
        .expect("rejection registers");

    let result = ledger.accredit(&order.id, None);
    assert!(matches!(
        result,
        Err(PaymentError::InvalidState {
            status: PaymentStatus::Rejected,
            operation: "accredit",
        })
    ));
}

#[test]
fn rejection_requires_a_pending_order() {
    let (ledger, _, _) = fixture();
    let order = ledger
        .create_order(&procedure(), 150_000, PaymentMethod::Cash)
        .expect("order creates");
    let rejected = ledger
        .reject(&order.id, "insufficient funds")
        .expect("rejection registers");
    assert_eq!(rejected.status, PaymentStatus::Rejected);
    assert_eq!(
        rejected.rejection_reason.as_deref(),
        Some("insufficient funds")
    );

    let result = ledger.reject(&order.id, "again");
    assert!(matches!(result, Err(PaymentError::InvalidState { .. })));
}

#[test]
fn sweep_expires_only_overdue_pending_orders() {
    let (ledger, _, clock) = fixture();
    let ledger = ledger.with_expiry(Duration::hours(1));

    let overdue = ledger
        .create_order(&procedure(), 150_000, PaymentMethod::Card)
        .expect("order creates");
    let paid = ledger
        .create_order(&procedure(), 80_000, PaymentMethod::Card)
        .expect("order creates");
    ledger.accredit(&paid.id, None).expect("accreditation");

    let swept = ledger
        .sweep_expired(clock.now() + Duration::hours(2))
        .expect("sweep runs");
    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].id, overdue.id);
    assert_eq!(swept[0].status, PaymentStatus::Expired);
}

#[test]
fn sweep_leaves_orders_expiring_exactly_now() {
    let (ledger, _, clock) = fixture();
    let ledger = ledger.with_expiry(Duration::hours(1));
    ledger
        .create_order(&procedure(), 150_000, PaymentMethod::Card)
        .expect("order creates");

    let swept = ledger
        .sweep_expired(clock.now() + Duration::hours(1))
        .expect("sweep runs");
    assert!(swept.is_empty());
}

#[test]
fn sweep_is_idempotent() {
    let (ledger, _, clock) = fixture();
    let ledger = ledger.with_expiry(Duration::hours(1));
    ledger
        .create_order(&procedure(), 150_000, PaymentMethod::Card)
        .expect("order creates");

    let deadline = clock.now() + Duration::hours(2);
    let first = ledger.sweep_expired(deadline).expect("first sweep");
    assert_eq!(first.len(), 1);

    let second = ledger.sweep_expired(deadline).expect("second sweep");
    assert!(second.is_empty());
}
