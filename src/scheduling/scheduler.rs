use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::info;

use super::domain::{
    AppointmentId, AppointmentKind, AppointmentRecord, AppointmentStatus, ResourceId,
    ResourceKind, ResourceRecord,
};
use crate::audit::{AuditEvent, AuditSink};
use crate::clock::Clock;
use crate::procedures::domain::{HolderId, ProcedureId};
use crate::store::StoreError;

/// Storage abstraction for resources and appointments.
pub trait AppointmentStore: Send + Sync {
    fn resource(&self, id: &ResourceId) -> Result<Option<ResourceRecord>, StoreError>;
    fn resources_of_kind(&self, kind: ResourceKind) -> Result<Vec<ResourceRecord>, StoreError>;
    fn appointment(&self, id: &AppointmentId) -> Result<Option<AppointmentRecord>, StoreError>;
    fn appointments_for_resource(
        &self,
        id: &ResourceId,
    ) -> Result<Vec<AppointmentRecord>, StoreError>;
    fn insert_appointment(
        &self,
        record: AppointmentRecord,
    ) -> Result<AppointmentRecord, StoreError>;
    /// Insert the appointment unless the number of active appointments on
    /// its resource overlapping it has reached `capacity`. Implementations
    /// must run the count and the insert under a single store acquisition;
    /// `Ok(None)` means the slot is taken.
    fn insert_appointment_if_free(
        &self,
        record: AppointmentRecord,
        capacity: u32,
    ) -> Result<Option<AppointmentRecord>, StoreError>;
    fn update_appointment(&self, record: AppointmentRecord) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("appointment interval must start before it ends")]
    EmptyInterval,
    #[error("booking length must be a multiple of {granularity} minutes")]
    MisalignedDuration { granularity: u32 },
    #[error("slot duration must be positive")]
    InvalidSlotDuration,
    #[error("resource {resource} unavailable: {reason}")]
    ResourceUnavailable { resource: ResourceId, reason: String },
    #[error("slot starting {starts_at} on resource {resource} conflicts with an existing booking")]
    SlotConflict {
        resource: ResourceId,
        starts_at: DateTime<Utc>,
    },
    #[error("operation {operation} is not legal on an appointment in status {status:?}")]
    InvalidState {
        status: AppointmentStatus,
        operation: &'static str,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

static APPOINTMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_appointment_id() -> AppointmentId {
    let id = APPOINTMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AppointmentId(format!("apt-{id:06}"))
}

/// A bookable start time on a concrete resource.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FreeSlot {
    pub resource_id: ResourceId,
    pub starts_at: DateTime<Utc>,
}

/// Allocates, confirms, and cancels appointments against resource
/// calendars, with half-open interval overlap detection.
pub struct AppointmentScheduler<S, A, C> {
    store: Arc<S>,
    audit: Arc<A>,
    clock: C,
}

impl<S, A, C> AppointmentScheduler<S, A, C>
where
    S: AppointmentStore,
    A: AuditSink,
    C: Clock,
{
    pub fn new(store: Arc<S>, audit: Arc<A>, clock: C) -> Self {
        Self {
            store,
            audit,
            clock,
        }
    }

    /// Book `[starts_at, ends_at)` on a resource. Fails when the resource
    /// is inactive, of the wrong kind, or closed over the interval, and
    /// when the interval would exceed the resource's concurrent capacity.
    #[allow(clippy::too_many_arguments)]
    pub fn book(
        &self,
        holder_id: &HolderId,
        kind: AppointmentKind,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        resource_id: &ResourceId,
        procedure_id: Option<ProcedureId>,
    ) -> Result<AppointmentRecord, SchedulingError> {
        if starts_at >= ends_at {
            return Err(SchedulingError::EmptyInterval);
        }

        let resource = self
            .store
            .resource(resource_id)?
            .ok_or(StoreError::NotFound)?;
        if !resource.active {
            return Err(SchedulingError::ResourceUnavailable {
                resource: resource.id,
                reason: "resource is inactive".to_string(),
            });
        }
        if resource.kind != kind.resource_kind() {
            return Err(SchedulingError::ResourceUnavailable {
                resource: resource.id,
                reason: format!(
                    "{} appointments require a {}",
                    kind.label(),
                    kind.resource_kind().label()
                ),
            });
        }
        if starts_at.date_naive() != ends_at.date_naive()
            || starts_at.time() < resource.opens_at
            || ends_at.time() > resource.closes_at
        {
            return Err(SchedulingError::ResourceUnavailable {
                resource: resource.id,
                reason: "interval falls outside operating hours".to_string(),
            });
        }
        let minutes = (ends_at - starts_at).num_minutes();
        if resource.slot_minutes > 0 && minutes % i64::from(resource.slot_minutes) != 0 {
            return Err(SchedulingError::MisalignedDuration {
                granularity: resource.slot_minutes,
            });
        }

        let candidate = AppointmentRecord {
            id: next_appointment_id(),
            holder_id: holder_id.clone(),
            procedure_id,
            resource_id: resource.id.clone(),
            kind,
            starts_at,
            ends_at,
            status: AppointmentStatus::Booked,
            cancellation_reason: None,
        };
        let Some(record) = self
            .store
            .insert_appointment_if_free(candidate, resource.capacity.max(1))?
        else {
            return Err(SchedulingError::SlotConflict {
                resource: resource.id,
                starts_at,
            });
        };
        self.audit.record(AuditEvent::new(
            "appointment",
            record.id.to_string(),
            "book",
            "-",
            record.status.label(),
        ));
        info!(
            appointment = %record.id,
            resource = %record.resource_id,
            starts_at = %record.starts_at,
            "appointment booked"
        );
        Ok(record)
    }

    pub fn confirm(&self, id: &AppointmentId) -> Result<AppointmentRecord, SchedulingError> {
        self.change_status(id, "confirm", AppointmentStatus::Confirmed, |status| {
            matches!(status, AppointmentStatus::Booked)
        })
    }

    pub fn cancel(
        &self,
        id: &AppointmentId,
        reason: impl Into<String>,
    ) -> Result<AppointmentRecord, SchedulingError> {
        let mut record =
            self.change_status(id, "cancel", AppointmentStatus::Cancelled, |status| {
                status.is_active()
            })?;
        record.cancellation_reason = Some(reason.into());
        self.store.update_appointment(record.clone())?;
        Ok(record)
    }

    pub fn mark_no_show(&self, id: &AppointmentId) -> Result<AppointmentRecord, SchedulingError> {
        self.change_status(id, "mark_no_show", AppointmentStatus::NoShow, |status| {
            status.is_active()
        })
    }

    /// The holder showed up; the appointment no longer blocks its slot and
    /// satisfies the matching exam checkpoint's scheduling gate.
    pub fn complete(&self, id: &AppointmentId) -> Result<AppointmentRecord, SchedulingError> {
        self.change_status(id, "complete", AppointmentStatus::Completed, |status| {
            matches!(status, AppointmentStatus::Confirmed)
        })
    }

    /// Enumerate conflict-free slot start times across every active
    /// resource of a kind, between `from` and `to` inclusive. The iterator
    /// is lazy over a snapshot of current bookings; re-query after any
    /// booking changes.
    pub fn free_slots(
        &self,
        kind: ResourceKind,
        from: NaiveDate,
        to: NaiveDate,
        slot_minutes: u32,
    ) -> Result<FreeSlots, SchedulingError> {
        if slot_minutes == 0 {
            return Err(SchedulingError::InvalidSlotDuration);
        }
        let mut entries = Vec::new();
        for resource in self.store.resources_of_kind(kind)? {
            if !resource.active {
                continue;
            }
            let appointments = self.store.appointments_for_resource(&resource.id)?;
            entries.push((resource, appointments));
        }
        Ok(FreeSlots::new(entries, from, to, slot_minutes))
    }

    fn change_status(
        &self,
        id: &AppointmentId,
        operation: &'static str,
        next: AppointmentStatus,
        allowed: impl Fn(AppointmentStatus) -> bool,
    ) -> Result<AppointmentRecord, SchedulingError> {
        let mut record = self.store.appointment(id)?.ok_or(StoreError::NotFound)?;
        if !allowed(record.status) {
            return Err(SchedulingError::InvalidState {
                status: record.status,
                operation,
            });
        }
        let before = record.status;
        record.status = next;
        self.store.update_appointment(record.clone())?;
        self.audit.record(AuditEvent::new(
            "appointment",
            record.id.to_string(),
            operation,
            before.label(),
            next.label(),
        ));
        info!(appointment = %record.id, operation, to = next.label(), "appointment updated");
        Ok(record)
    }

    /// Accessor for callers that need the injected clock (demo wiring).
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Lazy, finite iterator over free slot start times. Holds a snapshot of
/// the bookings taken when it was created; it is not restartable against
/// later state.
pub struct FreeSlots {
    entries: std::vec::IntoIter<(ResourceRecord, Vec<AppointmentRecord>)>,
    cursor: Option<Cursor>,
    from: NaiveDate,
    to: NaiveDate,
    slot: Duration,
    slot_minutes: u32,
}

struct Cursor {
    resource: ResourceRecord,
    appointments: Vec<AppointmentRecord>,
    day: NaiveDate,
    time: NaiveTime,
}

impl FreeSlots {
    fn new(
        entries: Vec<(ResourceRecord, Vec<AppointmentRecord>)>,
        from: NaiveDate,
        to: NaiveDate,
        slot_minutes: u32,
    ) -> Self {
        Self {
            entries: entries.into_iter(),
            cursor: None,
            from,
            to,
            slot: Duration::minutes(i64::from(slot_minutes)),
            slot_minutes,
        }
    }

    /// Granularity the iterator was built with, in minutes.
    pub fn slot_minutes(&self) -> u32 {
        self.slot_minutes
    }
}

impl Iterator for FreeSlots {
    type Item = FreeSlot;

    fn next(&mut self) -> Option<FreeSlot> {
        loop {
            let Some(cursor) = self.cursor.as_mut() else {
                let (resource, appointments) = self.entries.next()?;
                self.cursor = Some(Cursor {
                    day: self.from,
                    time: resource.opens_at,
                    resource,
                    appointments,
                });
                continue;
            };

            if cursor.day > self.to {
                self.cursor = None;
                continue;
            }

            let (end_time, wrapped_days) = cursor.time.overflowing_add_signed(self.slot);
            if wrapped_days != 0 || end_time > cursor.resource.closes_at {
                match cursor.day.succ_opt() {
                    Some(next_day) => {
                        cursor.day = next_day;
                        cursor.time = cursor.resource.opens_at;
                    }
                    None => self.cursor = None,
                }
                continue;
            }

            let starts_at = cursor.day.and_time(cursor.time).and_utc();
            let ends_at = cursor.day.and_time(end_time).and_utc();
            cursor.time = end_time;

            let overlapping = cursor
                .appointments
                .iter()
                .filter(|appointment| {
                    appointment.status.is_active()
                        && appointment.starts_at < ends_at
                        && starts_at < appointment.ends_at
                })
                .count();
            if (overlapping as u32) < cursor.resource.capacity.max(1) {
                return Some(FreeSlot {
                    resource_id: cursor.resource.id.clone(),
                    starts_at,
                });
            }
        }
    }
}
