//! Procedure lifecycle: checkpoint eligibility, credential validity, and
//! the status state machine.

pub mod domain;
pub mod eligibility;
pub mod repository;
pub mod service;
pub mod state;
pub mod validity;

#[cfg(test)]
mod tests;

pub use domain::{
    DisqualificationRecord, GateSet, HolderId, HolderRecord, LicenseClass, LicenseId,
    LicenseRecord, LicenseStatus, MedicalFitnessRecord, PracticalExamRecord, ProcedureId,
    ProcedureKind, ProcedureRecord, TheoryExamRecord,
};
pub use eligibility::{
    practical_passed, required_checkpoints, theory_passed, theory_score, Checkpoint,
    EligibilityEngine, ValidationError, MAX_MINOR_FAULTS, THEORY_PASS_SCORE,
};
pub use repository::{ProcedureAggregate, ProcedureStore};
pub use service::{
    CheckpointView, ProcedureError, ProcedureService, ProcedureSnapshot,
};
pub use state::{highest_milestone, transition, ProcedureEvent, ProcedureStatus, TransitionError};
pub use validity::{
    age_on, credential_valid, license_expiration, license_term_years, EXAM_RESULT_WINDOW,
    MEDICAL_FITNESS_WINDOW,
};
