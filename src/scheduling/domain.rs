use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::procedures::domain::{HolderId, ProcedureId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub String);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppointmentId(pub String);

impl fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ExamRoom,
    MedicalOffice,
    PracticeTrack,
}

impl ResourceKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ExamRoom => "Exam Room",
            Self::MedicalOffice => "Medical Office",
            Self::PracticeTrack => "Practice Track",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentKind {
    TheoryExam,
    PracticalExam,
    MedicalCheck,
}

impl AppointmentKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::TheoryExam => "Theory Exam",
            Self::PracticalExam => "Practical Exam",
            Self::MedicalCheck => "Medical Check",
        }
    }

    /// The resource kind this appointment must be booked against.
    pub const fn resource_kind(self) -> ResourceKind {
        match self {
            Self::TheoryExam => ResourceKind::ExamRoom,
            Self::PracticalExam => ResourceKind::PracticeTrack,
            Self::MedicalCheck => ResourceKind::MedicalOffice,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Booked,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Booked => "Booked",
            Self::Confirmed => "Confirmed",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::NoShow => "No Show",
        }
    }

    /// Active appointments occupy their slot; cancelled, completed, and
    /// no-show ones do not.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Booked | Self::Confirmed)
    }

    /// Whether this appointment satisfies an exam checkpoint's scheduling
    /// gate.
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Confirmed | Self::Completed)
    }
}

/// A schedulable entity: exam room, medical office, or practice track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub name: String,
    pub kind: ResourceKind,
    pub active: bool,
    pub opens_at: NaiveTime,
    pub closes_at: NaiveTime,
    /// Booking duration granularity in minutes.
    pub slot_minutes: u32,
    /// Simultaneous active appointments the resource can hold.
    pub capacity: u32,
}

/// Half-open time interval `[starts_at, ends_at)` on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub id: AppointmentId,
    pub holder_id: HolderId,
    pub procedure_id: Option<ProcedureId>,
    pub resource_id: ResourceId,
    pub kind: AppointmentKind,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
}

impl AppointmentRecord {
    /// Two appointments conflict iff both are active and their half-open
    /// intervals intersect; touching endpoints do not overlap.
    pub fn overlaps(&self, other: &AppointmentRecord) -> bool {
        self.status.is_active()
            && other.status.is_active()
            && self.starts_at < other.ends_at
            && other.starts_at < self.ends_at
    }
}
