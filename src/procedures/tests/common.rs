use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use crate::clock::FixedClock;
use crate::infra::{MemoryAuditSink, MemoryStore};
use crate::payments::{PaymentLedger, PaymentMethod};
use crate::procedures::domain::{HolderId, HolderRecord, LicenseClass, ProcedureId, ProcedureKind, ProcedureRecord};
use crate::procedures::service::ProcedureService;
use crate::scheduling::domain::{
    AppointmentId, AppointmentKind, AppointmentRecord, AppointmentStatus, ResourceId,
    ResourceKind, ResourceRecord,
};
use crate::scheduling::scheduler::AppointmentStore;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn today() -> NaiveDate {
    date(2025, 6, 2)
}

static FIXTURE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub(super) struct Harness {
    pub(super) store: Arc<MemoryStore>,
    pub(super) audit: Arc<MemoryAuditSink>,
    pub(super) engine: ProcedureService<MemoryStore, MemoryAuditSink, FixedClock>,
    pub(super) ledger: PaymentLedger<MemoryStore, MemoryAuditSink, FixedClock>,
    pub(super) holder: HolderRecord,
}

pub(super) fn harness() -> Harness {
    harness_with_birth_date(date(1990, 3, 20))
}

pub(super) fn harness_with_birth_date(birth_date: NaiveDate) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let audit = Arc::new(MemoryAuditSink::default());
    let clock = FixedClock::on(today());
    let seq = FIXTURE_SEQUENCE.fetch_add(1, Ordering::Relaxed);

    let holder = store
        .insert_holder(HolderRecord {
            id: HolderId(format!("hld-test-{seq:04}")),
            national_id: format!("27{seq:06}"),
            full_name: "Maria Perez".to_string(),
            birth_date,
            email: Some("maria@example.com".to_string()),
        })
        .expect("holder seeds");

    for (id, kind) in [
        ("res-exam", ResourceKind::ExamRoom),
        ("res-med", ResourceKind::MedicalOffice),
        ("res-track", ResourceKind::PracticeTrack),
    ] {
        store
            .insert_resource(ResourceRecord {
                id: ResourceId(id.to_string()),
                name: id.to_string(),
                kind,
                active: true,
                opens_at: NaiveTime::from_hms_opt(8, 0, 0).expect("valid time"),
                closes_at: NaiveTime::from_hms_opt(18, 0, 0).expect("valid time"),
                slot_minutes: 30,
                capacity: 1,
            })
            .expect("resource seeds");
    }

    Harness {
        engine: ProcedureService::new(store.clone(), audit.clone(), clock),
        ledger: PaymentLedger::new(store.clone(), audit.clone(), clock),
        store,
        audit,
        holder,
    }
}

impl Harness {
    pub(super) fn start_procedure(&self, kind: ProcedureKind) -> ProcedureRecord {
        self.engine
            .start(&self.holder.id, kind, LicenseClass::Car)
            .expect("procedure starts")
    }

    /// Same store and audit trail, evaluated at a later date.
    pub(super) fn engine_at(
        &self,
        as_of: NaiveDate,
    ) -> ProcedureService<MemoryStore, MemoryAuditSink, FixedClock> {
        ProcedureService::new(self.store.clone(), self.audit.clone(), FixedClock::on(as_of))
    }

    /// Attach a confirmed appointment so exam registration passes the
    /// scheduling gate.
    pub(super) fn attach_appointment(&self, procedure: &ProcedureId, kind: AppointmentKind) {
        let seq = FIXTURE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let resource = match kind.resource_kind() {
            ResourceKind::ExamRoom => "res-exam",
            ResourceKind::MedicalOffice => "res-med",
            ResourceKind::PracticeTrack => "res-track",
        };
        let starts_at = today()
            .and_hms_opt(9, 0, 0)
            .expect("valid time")
            .and_utc();
        self.store
            .insert_appointment(AppointmentRecord {
                id: AppointmentId(format!("apt-test-{seq:04}")),
                holder_id: self.holder.id.clone(),
                procedure_id: Some(procedure.clone()),
                resource_id: ResourceId(resource.to_string()),
                kind,
                starts_at,
                ends_at: starts_at + chrono::Duration::minutes(30),
                status: AppointmentStatus::Confirmed,
                cancellation_reason: None,
            })
            .expect("appointment seeds");
    }

    pub(super) fn attach_all_appointments(&self, procedure: &ProcedureId) {
        for kind in [
            AppointmentKind::MedicalCheck,
            AppointmentKind::TheoryExam,
            AppointmentKind::PracticalExam,
        ] {
            self.attach_appointment(procedure, kind);
        }
    }

    /// Create and accredit a payment order for the procedure.
    pub(super) fn accredit_payment(&self, procedure: &ProcedureId) {
        let order = self
            .ledger
            .create_order(procedure, 150_000, PaymentMethod::Card)
            .expect("order creates");
        self.ledger
            .accredit(&order.id, Some("receipt".to_string()))
            .expect("order accredits");
    }

    /// Drive an ISSUE procedure through every checkpoint except issuance.
    pub(super) fn procedure_ready_to_issue(&self) -> ProcedureRecord {
        let procedure = self.start_procedure(ProcedureKind::Issue);
        self.attach_all_appointments(&procedure.id);
        self.engine
            .register_documentation(&procedure.id, true, None)
            .expect("documentation approves");
        self.engine
            .register_medical(&procedure.id, true, None)
            .expect("medical passes");
        self.engine
            .register_theory(&procedure.id, 90)
            .expect("theory passes");
        self.engine
            .register_practical(&procedure.id, 0, 1)
            .expect("practical passes");
        self.accredit_payment(&procedure.id);
        self.engine
            .register_payment(&procedure.id)
            .expect("payment registers")
    }
}
