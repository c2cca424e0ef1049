use chrono::{Duration, Utc};

use super::common::date;
use crate::payments::domain::{PaymentMethod, PaymentOrderId, PaymentOrderRecord, PaymentStatus};
use crate::procedures::domain::{
    GateSet, HolderId, LicenseClass, MedicalFitnessRecord, ProcedureId, ProcedureKind,
    ProcedureRecord, TheoryExamRecord,
};
use crate::procedures::eligibility::{
    practical_passed, required_checkpoints, theory_passed, theory_score, Checkpoint,
    EligibilityEngine, ValidationError,
};
use crate::procedures::repository::ProcedureAggregate;
use crate::procedures::state::ProcedureStatus;

fn aggregate(kind: ProcedureKind, gates: GateSet) -> ProcedureAggregate {
    ProcedureAggregate {
        procedure: ProcedureRecord {
            id: ProcedureId("prc-elig".to_string()),
            holder_id: HolderId("hld-elig".to_string()),
            kind,
            license_class: LicenseClass::Car,
            status: ProcedureStatus::Initiated,
            gates,
            opened_on: date(2025, 1, 10),
            rejection_reason: None,
        },
        medical: Vec::new(),
        theory: Vec::new(),
        practical: Vec::new(),
        payments: Vec::new(),
        appointments: Vec::new(),
    }
}

fn order(status: PaymentStatus) -> PaymentOrderRecord {
    let created_at = Utc::now();
    PaymentOrderRecord {
        id: PaymentOrderId("pay-elig".to_string()),
        procedure_id: ProcedureId("prc-elig".to_string()),
        amount_cents: 150_000,
        method: PaymentMethod::Card,
        status,
        created_at,
        expires_at: created_at + Duration::hours(48),
        accredited_at: None,
        receipt_ref: None,
        rejection_reason: None,
    }
}

#[test]
fn theory_score_truncates_the_percentage() {
    assert_eq!(theory_score(47, 60), Ok(78));
    assert_eq!(theory_score(48, 60), Ok(80));
    assert_eq!(theory_score(0, 40), Ok(0));
    assert_eq!(theory_score(40, 40), Ok(100));
}

#[test]
fn theory_score_handles_question_counts_near_u32_max() {
    assert_eq!(theory_score(43_000_000, 43_000_001), Ok(99));
    assert_eq!(theory_score(u32::MAX, u32::MAX), Ok(100));
}

#[test]
fn theory_score_rejects_malformed_input() {
    assert_eq!(theory_score(1, 0), Err(ValidationError::NoQuestions));
    assert_eq!(
        theory_score(41, 40),
        Err(ValidationError::CorrectExceedsTotal {
            correct: 41,
            total: 40
        })
    );
}

#[test]
fn theory_pass_mark_is_eighty() {
    assert!(!theory_passed(79));
    assert!(theory_passed(80));
    assert!(theory_passed(100));
    assert!(!theory_passed(0));
}

#[test]
fn practical_pass_tolerates_three_minor_faults_and_no_grade_faults() {
    assert!(practical_passed(0, 0));
    assert!(practical_passed(0, 3));
    assert!(!practical_passed(0, 4));
    assert!(!practical_passed(1, 0));
}

#[test]
fn issue_and_renew_require_the_full_track() {
    for kind in [ProcedureKind::Issue, ProcedureKind::Renew] {
        assert_eq!(
            required_checkpoints(kind),
            [
                Checkpoint::Documentation,
                Checkpoint::MedicalFitness,
                Checkpoint::TheoryExam,
                Checkpoint::PracticalExam,
                Checkpoint::Payment,
            ]
        );
    }
}

#[test]
fn administrative_kinds_skip_the_exams() {
    for kind in [ProcedureKind::Duplicate, ProcedureKind::AddressChange] {
        assert_eq!(
            required_checkpoints(kind),
            [Checkpoint::Documentation, Checkpoint::Payment]
        );
    }
}

#[test]
fn stale_true_gate_over_expired_medical_does_not_count() {
    let engine = EligibilityEngine::default();
    let mut aggregate = aggregate(
        ProcedureKind::Issue,
        GateSet {
            documentation: true,
            medical: true,
            ..GateSet::default()
        },
    );
    aggregate.medical.push(MedicalFitnessRecord {
        procedure_id: aggregate.procedure.id.clone(),
        passed: true,
        exam_date: date(2024, 1, 10),
        expires_on: None,
    });

    // More than twelve months after the exam.
    let as_of = date(2025, 6, 2);
    assert!(!engine.checkpoint_satisfied(&aggregate, Checkpoint::MedicalFitness, as_of));
    assert!(!engine.requirements_met(&aggregate, as_of));
    assert!(engine
        .missing_checkpoints(&aggregate, as_of)
        .contains(&Checkpoint::MedicalFitness));
}

#[test]
fn medical_gate_without_a_record_is_not_satisfied() {
    let engine = EligibilityEngine::default();
    let aggregate = aggregate(
        ProcedureKind::Issue,
        GateSet {
            medical: true,
            ..GateSet::default()
        },
    );
    assert!(!engine.checkpoint_satisfied(&aggregate, Checkpoint::MedicalFitness, date(2025, 6, 2)));
}

#[test]
fn latest_exam_record_decides_the_checkpoint() {
    let engine = EligibilityEngine::default();
    let mut aggregate = aggregate(
        ProcedureKind::Issue,
        GateSet {
            theory: true,
            ..GateSet::default()
        },
    );
    aggregate.theory.push(TheoryExamRecord {
        procedure_id: aggregate.procedure.id.clone(),
        score: 90,
        passed: true,
        exam_date: date(2025, 4, 1),
    });
    aggregate.theory.push(TheoryExamRecord {
        procedure_id: aggregate.procedure.id.clone(),
        score: 60,
        passed: false,
        exam_date: date(2025, 5, 1),
    });

    assert!(!engine.checkpoint_satisfied(&aggregate, Checkpoint::TheoryExam, date(2025, 6, 2)));
}

#[test]
fn theory_result_lapses_after_six_months() {
    let engine = EligibilityEngine::default();
    let mut aggregate = aggregate(
        ProcedureKind::Issue,
        GateSet {
            theory: true,
            ..GateSet::default()
        },
    );
    aggregate.theory.push(TheoryExamRecord {
        procedure_id: aggregate.procedure.id.clone(),
        score: 90,
        passed: true,
        exam_date: date(2025, 1, 10),
    });

    assert!(engine.checkpoint_satisfied(&aggregate, Checkpoint::TheoryExam, date(2025, 7, 9)));
    assert!(!engine.checkpoint_satisfied(&aggregate, Checkpoint::TheoryExam, date(2025, 7, 10)));
}

#[test]
fn payment_checkpoint_needs_an_accredited_order() {
    let engine = EligibilityEngine::default();
    let as_of = date(2025, 6, 2);

    let mut pending = aggregate(ProcedureKind::Duplicate, GateSet::default());
    pending.payments.push(order(PaymentStatus::Pending));
    assert!(!engine.checkpoint_satisfied(&pending, Checkpoint::Payment, as_of));

    let mut accredited = aggregate(ProcedureKind::Duplicate, GateSet::default());
    accredited.payments.push(order(PaymentStatus::Accredited));
    assert!(engine.checkpoint_satisfied(&accredited, Checkpoint::Payment, as_of));
}

#[test]
fn effective_gates_reflect_revalidated_truth() {
    let engine = EligibilityEngine::default();
    let mut aggregate = aggregate(
        ProcedureKind::Issue,
        GateSet {
            documentation: true,
            medical: true,
            theory: true,
            ..GateSet::default()
        },
    );
    aggregate.medical.push(MedicalFitnessRecord {
        procedure_id: aggregate.procedure.id.clone(),
        passed: true,
        exam_date: date(2025, 5, 1),
        expires_on: None,
    });
    // Theory gate is set but no record backs it up.

    let effective = engine.effective_gates(&aggregate, date(2025, 6, 2));
    assert!(effective.documentation);
    assert!(effective.medical);
    assert!(!effective.theory);
    assert!(!effective.practical);
    assert!(!effective.payment);
}
