//! Which checkpoints a procedure requires and whether they are satisfied
//! right now.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::domain::{GateSet, ProcedureKind};
use super::repository::ProcedureAggregate;
use super::validity::{credential_valid, EXAM_RESULT_WINDOW, MEDICAL_FITNESS_WINDOW};

/// The five sub-approvals a procedure can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    Documentation,
    MedicalFitness,
    TheoryExam,
    PracticalExam,
    Payment,
}

impl Checkpoint {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Documentation => "Documentation",
            Self::MedicalFitness => "Medical Fitness",
            Self::TheoryExam => "Theory Exam",
            Self::PracticalExam => "Practical Exam",
            Self::Payment => "Payment",
        }
    }
}

const FULL_TRACK: [Checkpoint; 5] = [
    Checkpoint::Documentation,
    Checkpoint::MedicalFitness,
    Checkpoint::TheoryExam,
    Checkpoint::PracticalExam,
    Checkpoint::Payment,
];

const ADMINISTRATIVE_TRACK: [Checkpoint; 2] = [Checkpoint::Documentation, Checkpoint::Payment];

/// Fixed checkpoint set per procedure kind. Duplicates and address changes
/// are paperwork only; no exams, no medical fitness.
pub fn required_checkpoints(kind: ProcedureKind) -> &'static [Checkpoint] {
    match kind {
        ProcedureKind::Issue | ProcedureKind::Renew => &FULL_TRACK,
        ProcedureKind::Duplicate | ProcedureKind::AddressChange => &ADMINISTRATIVE_TRACK,
    }
}

pub const THEORY_PASS_SCORE: u8 = 80;
pub const MAX_MINOR_FAULTS: u8 = 3;

/// Malformed checkpoint input. These are caller mistakes, not system
/// failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("score {0} is outside the 0-100 range")]
    ScoreOutOfRange(u32),
    #[error("exam must have at least one question")]
    NoQuestions,
    #[error("correct answers {correct} exceed total questions {total}")]
    CorrectExceedsTotal { correct: u32, total: u32 },
}

/// Integer percentage, truncated rather than rounded.
pub fn theory_score(correct: u32, total: u32) -> Result<u8, ValidationError> {
    if total == 0 {
        return Err(ValidationError::NoQuestions);
    }
    if correct > total {
        return Err(ValidationError::CorrectExceedsTotal { correct, total });
    }
    // Widened so `correct * 100` cannot overflow on large exams.
    Ok((u64::from(correct) * 100 / u64::from(total)) as u8)
}

pub fn theory_passed(score: u8) -> bool {
    score >= THEORY_PASS_SCORE
}

pub fn practical_passed(grade_faults: u8, minor_faults: u8) -> bool {
    grade_faults == 0 && minor_faults <= MAX_MINOR_FAULTS
}

/// Evaluates checkpoint satisfaction against the clock. Stateless apart
/// from the validity windows, which default to the statutory ones.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityEngine {
    medical_window: Months,
    exam_window: Months,
}

impl Default for EligibilityEngine {
    fn default() -> Self {
        Self {
            medical_window: MEDICAL_FITNESS_WINDOW,
            exam_window: EXAM_RESULT_WINDOW,
        }
    }
}

impl EligibilityEngine {
    pub fn new(medical_window: Months, exam_window: Months) -> Self {
        Self {
            medical_window,
            exam_window,
        }
    }

    /// Whether one checkpoint is satisfied at `as_of`. Time-bound facts are
    /// re-derived from the records on every call; a gate flag left `true`
    /// over an expired credential does not count.
    pub fn checkpoint_satisfied(
        &self,
        aggregate: &ProcedureAggregate,
        checkpoint: Checkpoint,
        as_of: NaiveDate,
    ) -> bool {
        let gates = &aggregate.procedure.gates;
        match checkpoint {
            Checkpoint::Documentation => gates.documentation,
            Checkpoint::MedicalFitness => {
                gates.medical
                    && aggregate.latest_medical().is_some_and(|record| {
                        credential_valid(
                            record.passed,
                            record.exam_date,
                            record.expires_on,
                            self.medical_window,
                            as_of,
                        )
                    })
            }
            Checkpoint::TheoryExam => {
                gates.theory
                    && aggregate.latest_theory().is_some_and(|record| {
                        credential_valid(
                            record.passed,
                            record.exam_date,
                            None,
                            self.exam_window,
                            as_of,
                        )
                    })
            }
            Checkpoint::PracticalExam => {
                gates.practical
                    && aggregate.latest_practical().is_some_and(|record| {
                        credential_valid(
                            record.passed,
                            record.exam_date,
                            None,
                            self.exam_window,
                            as_of,
                        )
                    })
            }
            Checkpoint::Payment => aggregate.payments.iter().any(|order| order.is_accredited()),
        }
    }

    /// Gate truths re-validated at `as_of`, for milestone recomputation.
    pub fn effective_gates(&self, aggregate: &ProcedureAggregate, as_of: NaiveDate) -> GateSet {
        GateSet {
            documentation: self.checkpoint_satisfied(aggregate, Checkpoint::Documentation, as_of),
            medical: self.checkpoint_satisfied(aggregate, Checkpoint::MedicalFitness, as_of),
            theory: self.checkpoint_satisfied(aggregate, Checkpoint::TheoryExam, as_of),
            practical: self.checkpoint_satisfied(aggregate, Checkpoint::PracticalExam, as_of),
            payment: self.checkpoint_satisfied(aggregate, Checkpoint::Payment, as_of),
        }
    }

    /// True iff every checkpoint required by the procedure kind is
    /// currently satisfied.
    pub fn requirements_met(&self, aggregate: &ProcedureAggregate, as_of: NaiveDate) -> bool {
        required_checkpoints(aggregate.procedure.kind)
            .iter()
            .all(|checkpoint| self.checkpoint_satisfied(aggregate, *checkpoint, as_of))
    }

    /// Required checkpoints not currently satisfied, in track order.
    pub fn missing_checkpoints(
        &self,
        aggregate: &ProcedureAggregate,
        as_of: NaiveDate,
    ) -> Vec<Checkpoint> {
        required_checkpoints(aggregate.procedure.kind)
            .iter()
            .copied()
            .filter(|checkpoint| !self.checkpoint_satisfied(aggregate, *checkpoint, as_of))
            .collect()
    }
}
