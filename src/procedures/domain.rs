use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::state::ProcedureStatus;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HolderId(pub String);

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcedureId(pub String);

impl fmt::Display for ProcedureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LicenseId(pub String);

impl fmt::Display for LicenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the holder is asking for. The checkpoint track is fixed per kind,
/// never configured at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureKind {
    Issue,
    Renew,
    Duplicate,
    AddressChange,
}

impl ProcedureKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Issue => "First Issue",
            Self::Renew => "Renewal",
            Self::Duplicate => "Duplicate",
            Self::AddressChange => "Address Change",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseClass {
    Motorcycle,
    Car,
    Truck,
    Bus,
    Trailer,
}

impl LicenseClass {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Motorcycle => "Class A - Motorcycle",
            Self::Car => "Class B - Car",
            Self::Truck => "Class C - Truck",
            Self::Bus => "Class D - Bus",
            Self::Trailer => "Class E - Trailer",
        }
    }
}

/// A person applying for, or holding, licenses. National IDs are unique
/// across holders; the store enforces that on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderRecord {
    pub id: HolderId,
    pub national_id: String,
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub email: Option<String>,
}

/// Court- or authority-imposed bar on starting new procedures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisqualificationRecord {
    pub holder_id: HolderId,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub authority: String,
}

impl DisqualificationRecord {
    /// Active iff it has started and has no end date or has not ended yet.
    pub fn active_on(&self, date: NaiveDate) -> bool {
        self.starts_on <= date && self.ends_on.map_or(true, |end| end >= date)
    }
}

/// Checkpoint booleans as last registered. These are write-side flags;
/// eligibility re-derives the current truth from the attached records on
/// every evaluation, so a stale `true` never satisfies an expired
/// credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSet {
    pub documentation: bool,
    pub medical: bool,
    pub theory: bool,
    pub practical: bool,
    pub payment: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureRecord {
    pub id: ProcedureId,
    pub holder_id: HolderId,
    pub kind: ProcedureKind,
    pub license_class: LicenseClass,
    pub status: ProcedureStatus,
    pub gates: GateSet,
    pub opened_on: NaiveDate,
    pub rejection_reason: Option<String>,
}

/// Outcome of one medical fitness check. A passed record with no explicit
/// expiry is valid for twelve months from the exam date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalFitnessRecord {
    pub procedure_id: ProcedureId,
    pub passed: bool,
    pub exam_date: NaiveDate,
    pub expires_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheoryExamRecord {
    pub procedure_id: ProcedureId,
    pub score: u8,
    pub passed: bool,
    pub exam_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticalExamRecord {
    pub procedure_id: ProcedureId,
    pub grade_faults: u8,
    pub minor_faults: u8,
    pub passed: bool,
    pub exam_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    Valid,
    Expired,
    Suspended,
    Disqualified,
    Duplicate,
}

impl LicenseStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Valid => "Valid",
            Self::Expired => "Expired",
            Self::Suspended => "Suspended",
            Self::Disqualified => "Disqualified",
            Self::Duplicate => "Duplicate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub id: LicenseId,
    pub number: String,
    pub holder_id: HolderId,
    pub procedure_id: ProcedureId,
    pub class: LicenseClass,
    pub issued_on: NaiveDate,
    pub expires_on: NaiveDate,
    pub status: LicenseStatus,
}
