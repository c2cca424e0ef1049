use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    GateSet, HolderId, LicenseClass, LicenseId, LicenseRecord, LicenseStatus,
    MedicalFitnessRecord, PracticalExamRecord, ProcedureId, ProcedureKind, ProcedureRecord,
    TheoryExamRecord,
};
use super::eligibility::{
    practical_passed, theory_passed, Checkpoint, EligibilityEngine, ValidationError,
};
use super::repository::{ProcedureAggregate, ProcedureStore};
use super::state::{transition, ProcedureEvent, ProcedureStatus, TransitionError};
use super::validity::{age_on, license_expiration, license_term_years};
use crate::audit::{AuditEvent, AuditSink};
use crate::clock::Clock;
use crate::scheduling::domain::AppointmentKind;
use crate::store::StoreError;

/// Error raised by the procedure state machine. Everything except
/// `Validation` and `Store` is a legitimate business outcome, expected to
/// surface as a user-facing rejection.
#[derive(Debug, thiserror::Error)]
pub enum ProcedureError {
    #[error("procedure {id} is in terminal status {status:?}")]
    TerminalState {
        id: ProcedureId,
        status: ProcedureStatus,
    },
    #[error("operation {operation} is not legal from status {status:?}")]
    InvalidState {
        status: ProcedureStatus,
        operation: &'static str,
    },
    #[error("requirements not met; missing checkpoints: {missing:?}")]
    RequirementsNotMet { missing: Vec<Checkpoint> },
    #[error("holder {0} has an active disqualification")]
    HolderDisqualified(HolderId),
    #[error("no confirmed {} appointment attached to the procedure", kind.label())]
    MissingAppointment { kind: AppointmentKind },
    #[error("procedure {0} has no accredited payment order")]
    PaymentNotAccredited(ProcedureId),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

static PROCEDURE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static LICENSE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_procedure_id() -> ProcedureId {
    let id = PROCEDURE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ProcedureId(format!("prc-{id:06}"))
}

fn next_license(class: LicenseClass) -> (LicenseId, String) {
    let id = LICENSE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let initial = match class {
        LicenseClass::Motorcycle => 'A',
        LicenseClass::Car => 'B',
        LicenseClass::Truck => 'C',
        LicenseClass::Bus => 'D',
        LicenseClass::Trailer => 'E',
    };
    (LicenseId(format!("lic-{id:06}")), format!("{initial}-{id:08}"))
}

/// Satisfaction of one checkpoint as seen by the engine right now.
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointView {
    pub checkpoint: Checkpoint,
    pub label: &'static str,
    pub satisfied: bool,
}

/// Read model of a procedure: status plus checkpoint truths re-derived at
/// evaluation time.
#[derive(Debug, Clone, Serialize)]
pub struct ProcedureSnapshot {
    pub procedure_id: ProcedureId,
    pub holder_id: HolderId,
    pub kind: ProcedureKind,
    pub status: ProcedureStatus,
    pub status_label: &'static str,
    pub checkpoints: Vec<CheckpointView>,
    pub missing: Vec<Checkpoint>,
    pub may_issue: bool,
}

/// Owns a procedure's status and applies checkpoint outcomes as explicit
/// transitions. Callers must serialize mutations per procedure ID;
/// concurrent reads are safe.
pub struct ProcedureService<S, A, C> {
    store: Arc<S>,
    audit: Arc<A>,
    clock: C,
    eligibility: EligibilityEngine,
}

impl<S, A, C> ProcedureService<S, A, C>
where
    S: ProcedureStore,
    A: AuditSink,
    C: Clock,
{
    pub fn new(store: Arc<S>, audit: Arc<A>, clock: C) -> Self {
        Self {
            store,
            audit,
            clock,
            eligibility: EligibilityEngine::default(),
        }
    }

    pub fn with_eligibility(mut self, eligibility: EligibilityEngine) -> Self {
        self.eligibility = eligibility;
        self
    }

    /// Open a new procedure for a holder. Refused while the holder has an
    /// active disqualification.
    pub fn start(
        &self,
        holder_id: &HolderId,
        kind: ProcedureKind,
        license_class: LicenseClass,
    ) -> Result<ProcedureRecord, ProcedureError> {
        let holder = self
            .store
            .holder(holder_id)?
            .ok_or(StoreError::NotFound)?;
        let today = self.clock.today();

        let disqualified = self
            .store
            .disqualifications(holder_id)?
            .iter()
            .any(|record| record.active_on(today));
        if disqualified {
            warn!(holder = %holder_id, "procedure refused: active disqualification");
            return Err(ProcedureError::HolderDisqualified(holder_id.clone()));
        }

        let record = ProcedureRecord {
            id: next_procedure_id(),
            holder_id: holder.id,
            kind,
            license_class,
            status: ProcedureStatus::Initiated,
            gates: GateSet::default(),
            opened_on: today,
            rejection_reason: None,
        };
        let stored = self.store.insert_procedure(record)?;

        self.audit.record(AuditEvent::new(
            "procedure",
            stored.id.to_string(),
            "start",
            "-",
            stored.status.label(),
        ));
        info!(procedure = %stored.id, kind = kind.label(), "procedure started");
        Ok(stored)
    }

    /// Register the documentation check outcome. A rejection clears the
    /// gate and parks the procedure in `DocsRejected` until documentation
    /// is registered again.
    pub fn register_documentation(
        &self,
        id: &ProcedureId,
        approved: bool,
        reason: Option<String>,
    ) -> Result<ProcedureRecord, ProcedureError> {
        let mut aggregate = self.load(id)?;
        aggregate.procedure.gates.documentation = approved;
        let event = if approved {
            aggregate.procedure.rejection_reason = None;
            ProcedureEvent::DocumentationApproved
        } else {
            aggregate.procedure.rejection_reason = reason;
            ProcedureEvent::DocumentationRejected
        };
        self.commit(aggregate, event)
    }

    /// Register a medical fitness outcome. A failed check is terminal for
    /// the whole procedure. Requires a confirmed medical-office
    /// appointment.
    pub fn register_medical(
        &self,
        id: &ProcedureId,
        passed: bool,
        expires_on: Option<NaiveDate>,
    ) -> Result<ProcedureRecord, ProcedureError> {
        let mut aggregate = self.load(id)?;
        self.guard_open(&aggregate.procedure)?;
        self.require_appointment(&aggregate, AppointmentKind::MedicalCheck)?;

        let record = MedicalFitnessRecord {
            procedure_id: id.clone(),
            passed,
            exam_date: self.clock.today(),
            expires_on,
        };
        let event = if passed {
            ProcedureEvent::MedicalPassed
        } else {
            ProcedureEvent::MedicalFailed
        };
        aggregate.medical.push(record.clone());
        aggregate.procedure.gates.medical = passed;

        let next = self.next_status(&aggregate, event)?;
        self.store.insert_medical(record)?;
        self.persist_status(aggregate.procedure, next, event)
    }

    /// Register a theory exam score (integer percentage). Pass mark is 80.
    /// Requires a confirmed exam-room appointment; a new attempt after a
    /// failure needs `permit_retry` first.
    pub fn register_theory(
        &self,
        id: &ProcedureId,
        score: u32,
    ) -> Result<ProcedureRecord, ProcedureError> {
        if score > 100 {
            return Err(ValidationError::ScoreOutOfRange(score).into());
        }
        let mut aggregate = self.load(id)?;
        self.guard_open(&aggregate.procedure)?;
        self.require_appointment(&aggregate, AppointmentKind::TheoryExam)?;

        let passed = theory_passed(score as u8);
        let record = TheoryExamRecord {
            procedure_id: id.clone(),
            score: score as u8,
            passed,
            exam_date: self.clock.today(),
        };
        let event = if passed {
            ProcedureEvent::TheoryPassed
        } else {
            ProcedureEvent::TheoryFailed
        };
        aggregate.theory.push(record.clone());
        aggregate.procedure.gates.theory = passed;

        let next = self.next_status(&aggregate, event)?;
        self.store.insert_theory(record)?;
        self.persist_status(aggregate.procedure, next, event)
    }

    /// Register a practical exam outcome: pass iff no grade faults and at
    /// most three minor faults.
    pub fn register_practical(
        &self,
        id: &ProcedureId,
        grade_faults: u8,
        minor_faults: u8,
    ) -> Result<ProcedureRecord, ProcedureError> {
        let mut aggregate = self.load(id)?;
        self.guard_open(&aggregate.procedure)?;
        self.require_appointment(&aggregate, AppointmentKind::PracticalExam)?;

        let passed = practical_passed(grade_faults, minor_faults);
        let record = PracticalExamRecord {
            procedure_id: id.clone(),
            grade_faults,
            minor_faults,
            passed,
            exam_date: self.clock.today(),
        };
        let event = if passed {
            ProcedureEvent::PracticalPassed
        } else {
            ProcedureEvent::PracticalFailed
        };
        aggregate.practical.push(record.clone());
        aggregate.procedure.gates.practical = passed;

        let next = self.next_status(&aggregate, event)?;
        self.store.insert_practical(record)?;
        self.persist_status(aggregate.procedure, next, event)
    }

    /// Flip the payment gate once the ledger holds an accredited order for
    /// this procedure.
    pub fn register_payment(&self, id: &ProcedureId) -> Result<ProcedureRecord, ProcedureError> {
        let mut aggregate = self.load(id)?;
        self.guard_open(&aggregate.procedure)?;
        if !aggregate.payments.iter().any(|order| order.is_accredited()) {
            return Err(ProcedureError::PaymentNotAccredited(id.clone()));
        }
        aggregate.procedure.gates.payment = true;
        self.commit(aggregate, ProcedureEvent::PaymentAccredited)
    }

    /// Grant a retry after a failed theory or practical exam. Falls back to
    /// the farthest milestone whose gate is still valid.
    pub fn permit_retry(&self, id: &ProcedureId) -> Result<ProcedureRecord, ProcedureError> {
        let mut aggregate = self.load(id)?;
        aggregate.procedure.rejection_reason = None;
        self.commit(aggregate, ProcedureEvent::RetryPermitted)
    }

    /// Admin override: reject the documentation checkpoint with a reason.
    pub fn reject_documentation(
        &self,
        id: &ProcedureId,
        reason: impl Into<String>,
    ) -> Result<ProcedureRecord, ProcedureError> {
        self.register_documentation(id, false, Some(reason.into()))
    }

    /// Admin override: terminally reject the procedure with a reason.
    pub fn reject(
        &self,
        id: &ProcedureId,
        reason: impl Into<String>,
    ) -> Result<ProcedureRecord, ProcedureError> {
        let mut aggregate = self.load(id)?;
        aggregate.procedure.rejection_reason = Some(reason.into());
        self.commit(aggregate, ProcedureEvent::AdminRejected)
    }

    /// Issue the license. Legal only when every required checkpoint is
    /// currently satisfied; the term and expiry follow the holder's age
    /// and birth date.
    pub fn issue_license(&self, id: &ProcedureId) -> Result<LicenseRecord, ProcedureError> {
        let mut aggregate = self.load(id)?;
        let next = self.next_status(&aggregate, ProcedureEvent::LicenseIssued)?;

        let today = self.clock.today();
        let missing = self.eligibility.missing_checkpoints(&aggregate, today);
        if !missing.is_empty() {
            return Err(ProcedureError::RequirementsNotMet { missing });
        }

        let holder = self
            .store
            .holder(&aggregate.procedure.holder_id)?
            .ok_or(StoreError::NotFound)?;
        let first_issue = self.store.licenses_for_holder(&holder.id)?.is_empty();
        let age = age_on(holder.birth_date, today);
        let term = license_term_years(age, first_issue);
        let expires_on = license_expiration(holder.birth_date, today, term);

        let (license_id, number) = next_license(aggregate.procedure.license_class);
        let record = LicenseRecord {
            id: license_id,
            number,
            holder_id: holder.id,
            procedure_id: id.clone(),
            class: aggregate.procedure.license_class,
            issued_on: today,
            expires_on,
            status: LicenseStatus::Valid,
        };

        // Status transition lands first; a failed update leaves no stored
        // license against a non-issued procedure.
        self.persist_status(aggregate.procedure, next, ProcedureEvent::LicenseIssued)?;
        let license = self.store.insert_license(record)?;
        self.audit.record(AuditEvent::new(
            "license",
            license.id.to_string(),
            "issue",
            "-",
            license.status.label(),
        ));
        info!(
            procedure = %id,
            license = %license.number,
            expires_on = %license.expires_on,
            "license issued"
        );
        Ok(license)
    }

    /// Read model: current status plus checkpoint truths re-derived as of
    /// today.
    pub fn snapshot(&self, id: &ProcedureId) -> Result<ProcedureSnapshot, ProcedureError> {
        let aggregate = self.load(id)?;
        let today = self.clock.today();

        let checkpoints = super::eligibility::required_checkpoints(aggregate.procedure.kind)
            .iter()
            .map(|checkpoint| CheckpointView {
                checkpoint: *checkpoint,
                label: checkpoint.label(),
                satisfied: self
                    .eligibility
                    .checkpoint_satisfied(&aggregate, *checkpoint, today),
            })
            .collect();
        let missing = self.eligibility.missing_checkpoints(&aggregate, today);
        let may_issue = !aggregate.procedure.status.is_final() && missing.is_empty();

        Ok(ProcedureSnapshot {
            procedure_id: aggregate.procedure.id,
            holder_id: aggregate.procedure.holder_id,
            kind: aggregate.procedure.kind,
            status: aggregate.procedure.status,
            status_label: aggregate.procedure.status.label(),
            checkpoints,
            missing,
            may_issue,
        })
    }

    fn load(&self, id: &ProcedureId) -> Result<ProcedureAggregate, ProcedureError> {
        self.store
            .aggregate(id)?
            .ok_or(ProcedureError::Store(StoreError::NotFound))
    }

    fn guard_open(&self, procedure: &ProcedureRecord) -> Result<(), ProcedureError> {
        if procedure.status.is_final() {
            Err(ProcedureError::TerminalState {
                id: procedure.id.clone(),
                status: procedure.status,
            })
        } else {
            Ok(())
        }
    }

    fn require_appointment(
        &self,
        aggregate: &ProcedureAggregate,
        kind: AppointmentKind,
    ) -> Result<(), ProcedureError> {
        let usable = aggregate
            .appointments
            .iter()
            .any(|appointment| appointment.kind == kind && appointment.status.is_usable());
        if usable {
            Ok(())
        } else {
            Err(ProcedureError::MissingAppointment { kind })
        }
    }

    /// Pure transition check over the in-memory aggregate; gate truths are
    /// re-validated against the clock before the table is consulted.
    fn next_status(
        &self,
        aggregate: &ProcedureAggregate,
        event: ProcedureEvent,
    ) -> Result<ProcedureStatus, ProcedureError> {
        let effective = self
            .eligibility
            .effective_gates(aggregate, self.clock.today());
        transition(aggregate.procedure.status, event, &effective).map_err(|err| match err {
            TransitionError::Terminal(status) => ProcedureError::TerminalState {
                id: aggregate.procedure.id.clone(),
                status,
            },
            TransitionError::Invalid { from, event } => ProcedureError::InvalidState {
                status: from,
                operation: event.name(),
            },
        })
    }

    fn commit(
        &self,
        aggregate: ProcedureAggregate,
        event: ProcedureEvent,
    ) -> Result<ProcedureRecord, ProcedureError> {
        let next = self.next_status(&aggregate, event)?;
        self.persist_status(aggregate.procedure, next, event)
    }

    fn persist_status(
        &self,
        mut procedure: ProcedureRecord,
        next: ProcedureStatus,
        event: ProcedureEvent,
    ) -> Result<ProcedureRecord, ProcedureError> {
        let before = procedure.status;
        procedure.status = next;
        self.store.update_procedure(procedure.clone())?;
        self.audit.record(AuditEvent::new(
            "procedure",
            procedure.id.to_string(),
            event.name(),
            before.label(),
            next.label(),
        ));
        info!(
            procedure = %procedure.id,
            event = event.name(),
            from = before.label(),
            to = next.label(),
            "procedure transition"
        );
        Ok(procedure)
    }
}
