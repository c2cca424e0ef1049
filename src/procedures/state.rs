use serde::{Deserialize, Serialize};

use super::domain::GateSet;

/// Closed status enumeration for a procedure. The forward milestones are
/// ordered; rejection states sit beside the track they interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureStatus {
    Initiated,
    DocsOk,
    MedicalOk,
    TheoryOk,
    PracticalOk,
    PaymentOk,
    Issued,
    DocsRejected,
    MedicalRejected,
    TheoryRejected,
    PracticalRejected,
    Rejected,
}

impl ProcedureStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Initiated => "Initiated",
            Self::DocsOk => "Documentation Approved",
            Self::MedicalOk => "Medical Fitness Approved",
            Self::TheoryOk => "Theory Exam Passed",
            Self::PracticalOk => "Practical Exam Passed",
            Self::PaymentOk => "Payment Accredited",
            Self::Issued => "License Issued",
            Self::DocsRejected => "Documentation Rejected",
            Self::MedicalRejected => "Medical Fitness Rejected",
            Self::TheoryRejected => "Theory Exam Failed",
            Self::PracticalRejected => "Practical Exam Failed",
            Self::Rejected => "Rejected",
        }
    }

    /// Terminal states refuse every further mutation.
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Issued | Self::Rejected | Self::MedicalRejected)
    }

    pub const fn is_rejection(self) -> bool {
        matches!(
            self,
            Self::DocsRejected
                | Self::MedicalRejected
                | Self::TheoryRejected
                | Self::PracticalRejected
                | Self::Rejected
        )
    }

    /// Only failed theory and practical exams may be attempted again
    /// without restarting the procedure.
    pub const fn allows_retry(self) -> bool {
        matches!(self, Self::TheoryRejected | Self::PracticalRejected)
    }
}

/// Every mutation the state machine understands. Anything not listed in
/// [`transition`] is rejected rather than recomputed from scattered
/// setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureEvent {
    DocumentationApproved,
    DocumentationRejected,
    MedicalPassed,
    MedicalFailed,
    TheoryPassed,
    TheoryFailed,
    PracticalPassed,
    PracticalFailed,
    PaymentAccredited,
    RetryPermitted,
    AdminRejected,
    LicenseIssued,
}

impl ProcedureEvent {
    pub const fn name(self) -> &'static str {
        match self {
            Self::DocumentationApproved => "documentation_approved",
            Self::DocumentationRejected => "documentation_rejected",
            Self::MedicalPassed => "medical_passed",
            Self::MedicalFailed => "medical_failed",
            Self::TheoryPassed => "theory_passed",
            Self::TheoryFailed => "theory_failed",
            Self::PracticalPassed => "practical_passed",
            Self::PracticalFailed => "practical_failed",
            Self::PaymentAccredited => "payment_accredited",
            Self::RetryPermitted => "retry_permitted",
            Self::AdminRejected => "admin_rejected",
            Self::LicenseIssued => "license_issued",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("status {0:?} is terminal")]
    Terminal(ProcedureStatus),
    #[error("event {event:?} is not legal from status {from:?}")]
    Invalid {
        from: ProcedureStatus,
        event: ProcedureEvent,
    },
}

/// Farthest milestone supported by the gates that are true *and* still
/// valid right now. Priority is fixed: payment over practical over theory
/// over medical over documentation, so out-of-order registration (payment
/// accredited before the exams) is tolerated.
pub fn highest_milestone(gates: &GateSet) -> ProcedureStatus {
    if gates.payment {
        ProcedureStatus::PaymentOk
    } else if gates.practical {
        ProcedureStatus::PracticalOk
    } else if gates.theory {
        ProcedureStatus::TheoryOk
    } else if gates.medical {
        ProcedureStatus::MedicalOk
    } else if gates.documentation {
        ProcedureStatus::DocsOk
    } else {
        ProcedureStatus::Initiated
    }
}

/// The whole (state, event) graph in one place. `effective` carries gate
/// truths already re-validated against the clock, so milestone recomputes
/// never resurrect an expired credential.
pub fn transition(
    current: ProcedureStatus,
    event: ProcedureEvent,
    effective: &GateSet,
) -> Result<ProcedureStatus, TransitionError> {
    use ProcedureEvent as Event;
    use ProcedureStatus as Status;

    if current.is_final() {
        return Err(TransitionError::Terminal(current));
    }

    match event {
        // A freshly failed exam must go through an explicit retry grant
        // before a new attempt is registered.
        Event::TheoryPassed | Event::TheoryFailed if current == Status::TheoryRejected => {
            Err(TransitionError::Invalid {
                from: current,
                event,
            })
        }
        Event::PracticalPassed | Event::PracticalFailed
            if current == Status::PracticalRejected =>
        {
            Err(TransitionError::Invalid {
                from: current,
                event,
            })
        }
        Event::DocumentationApproved
        | Event::MedicalPassed
        | Event::TheoryPassed
        | Event::PracticalPassed
        | Event::PaymentAccredited => Ok(highest_milestone(effective)),
        Event::DocumentationRejected => Ok(Status::DocsRejected),
        Event::MedicalFailed => Ok(Status::MedicalRejected),
        Event::TheoryFailed => Ok(Status::TheoryRejected),
        Event::PracticalFailed => Ok(Status::PracticalRejected),
        Event::RetryPermitted => match current {
            Status::TheoryRejected => Ok(if effective.medical {
                Status::MedicalOk
            } else if effective.documentation {
                Status::DocsOk
            } else {
                Status::Initiated
            }),
            Status::PracticalRejected => Ok(Status::TheoryOk),
            _ => Err(TransitionError::Invalid {
                from: current,
                event,
            }),
        },
        Event::AdminRejected => Ok(Status::Rejected),
        Event::LicenseIssued => Ok(Status::Issued),
    }
}
