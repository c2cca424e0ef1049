//! Appointment scheduling with interval overlap detection and free-slot
//! enumeration.

pub mod domain;
pub mod scheduler;


pub use domain::{
    AppointmentId, AppointmentKind, AppointmentRecord, AppointmentStatus, ResourceId,
    ResourceKind, ResourceRecord,
};
pub use scheduler::{
    AppointmentScheduler, AppointmentStore, FreeSlot, FreeSlots, SchedulingError,
};
