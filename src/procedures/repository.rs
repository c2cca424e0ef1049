use serde::{Deserialize, Serialize};

use super::domain::{
    DisqualificationRecord, HolderId, HolderRecord, LicenseRecord, MedicalFitnessRecord,
    PracticalExamRecord, ProcedureId, ProcedureRecord, TheoryExamRecord,
};
use crate::payments::domain::PaymentOrderRecord;
use crate::scheduling::domain::AppointmentRecord;
use crate::store::StoreError;

/// A procedure plus every checkpoint record attached to it, loaded as one
/// unit. No record holds a live reference to another, only IDs; traversal
/// happens through the store, never through the entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureAggregate {
    pub procedure: ProcedureRecord,
    pub medical: Vec<MedicalFitnessRecord>,
    pub theory: Vec<TheoryExamRecord>,
    pub practical: Vec<PracticalExamRecord>,
    pub payments: Vec<PaymentOrderRecord>,
    pub appointments: Vec<AppointmentRecord>,
}

impl ProcedureAggregate {
    /// Most recent medical fitness record by exam date.
    pub fn latest_medical(&self) -> Option<&MedicalFitnessRecord> {
        self.medical.iter().max_by_key(|record| record.exam_date)
    }

    pub fn latest_theory(&self) -> Option<&TheoryExamRecord> {
        self.theory.iter().max_by_key(|record| record.exam_date)
    }

    pub fn latest_practical(&self) -> Option<&PracticalExamRecord> {
        self.practical.iter().max_by_key(|record| record.exam_date)
    }
}

/// Storage abstraction for holders, procedures, and their checkpoint
/// records. CRUD semantics only; the engine owns every rule.
pub trait ProcedureStore: Send + Sync {
    fn holder(&self, id: &HolderId) -> Result<Option<HolderRecord>, StoreError>;
    fn disqualifications(&self, holder: &HolderId)
        -> Result<Vec<DisqualificationRecord>, StoreError>;

    fn insert_procedure(&self, record: ProcedureRecord) -> Result<ProcedureRecord, StoreError>;
    fn procedure(&self, id: &ProcedureId) -> Result<Option<ProcedureRecord>, StoreError>;
    fn update_procedure(&self, record: ProcedureRecord) -> Result<(), StoreError>;
    /// Load the procedure and everything attached to it in one call.
    fn aggregate(&self, id: &ProcedureId) -> Result<Option<ProcedureAggregate>, StoreError>;

    fn insert_medical(&self, record: MedicalFitnessRecord) -> Result<(), StoreError>;
    fn insert_theory(&self, record: TheoryExamRecord) -> Result<(), StoreError>;
    fn insert_practical(&self, record: PracticalExamRecord) -> Result<(), StoreError>;

    fn licenses_for_holder(&self, holder: &HolderId) -> Result<Vec<LicenseRecord>, StoreError>;
    fn insert_license(&self, record: LicenseRecord) -> Result<LicenseRecord, StoreError>;
}
