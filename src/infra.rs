//! In-memory implementations of the storage collaborators, used by the
//! demo binary and exercised throughout the test suites.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::audit::{AuditEvent, AuditSink};
use crate::payments::domain::{PaymentOrderId, PaymentOrderRecord, PaymentStatus};
use crate::payments::ledger::PaymentStore;
use crate::procedures::domain::{
    DisqualificationRecord, HolderId, HolderRecord, LicenseId, LicenseRecord,
    MedicalFitnessRecord, PracticalExamRecord, ProcedureId, ProcedureRecord, TheoryExamRecord,
};
use crate::procedures::repository::{ProcedureAggregate, ProcedureStore};
use crate::scheduling::domain::{
    AppointmentId, AppointmentRecord, ResourceId, ResourceKind, ResourceRecord,
};
use crate::scheduling::scheduler::AppointmentStore;
use crate::store::StoreError;

#[derive(Default)]
struct Inner {
    holders: HashMap<HolderId, HolderRecord>,
    disqualifications: Vec<DisqualificationRecord>,
    procedures: HashMap<ProcedureId, ProcedureRecord>,
    medical: Vec<MedicalFitnessRecord>,
    theory: Vec<TheoryExamRecord>,
    practical: Vec<PracticalExamRecord>,
    licenses: HashMap<LicenseId, LicenseRecord>,
    orders: HashMap<PaymentOrderId, PaymentOrderRecord>,
    resources: HashMap<ResourceId, ResourceRecord>,
    appointments: HashMap<AppointmentId, AppointmentRecord>,
}

/// Single-process store backing all three collaborator traits. One lock
/// covers everything; the conditional appointment insert counts overlaps
/// and commits without releasing it.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }

    /// Seed a holder. National IDs are unique across holders.
    pub fn insert_holder(&self, record: HolderRecord) -> Result<HolderRecord, StoreError> {
        let mut inner = self.lock();
        if inner.holders.contains_key(&record.id)
            || inner
                .holders
                .values()
                .any(|holder| holder.national_id == record.national_id)
        {
            return Err(StoreError::Conflict);
        }
        inner.holders.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    pub fn insert_disqualification(&self, record: DisqualificationRecord) {
        self.lock().disqualifications.push(record);
    }

    pub fn insert_resource(&self, record: ResourceRecord) -> Result<ResourceRecord, StoreError> {
        let mut inner = self.lock();
        if inner.resources.contains_key(&record.id) {
            return Err(StoreError::Conflict);
        }
        inner.resources.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    pub fn licenses(&self) -> Vec<LicenseRecord> {
        self.lock().licenses.values().cloned().collect()
    }
}

impl ProcedureStore for MemoryStore {
    fn holder(&self, id: &HolderId) -> Result<Option<HolderRecord>, StoreError> {
        Ok(self.lock().holders.get(id).cloned())
    }

    fn disqualifications(
        &self,
        holder: &HolderId,
    ) -> Result<Vec<DisqualificationRecord>, StoreError> {
        Ok(self
            .lock()
            .disqualifications
            .iter()
            .filter(|record| &record.holder_id == holder)
            .cloned()
            .collect())
    }

    fn insert_procedure(&self, record: ProcedureRecord) -> Result<ProcedureRecord, StoreError> {
        let mut inner = self.lock();
        if inner.procedures.contains_key(&record.id) {
            return Err(StoreError::Conflict);
        }
        inner.procedures.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn procedure(&self, id: &ProcedureId) -> Result<Option<ProcedureRecord>, StoreError> {
        Ok(self.lock().procedures.get(id).cloned())
    }

    fn update_procedure(&self, record: ProcedureRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.procedures.contains_key(&record.id) {
            return Err(StoreError::NotFound);
        }
        inner.procedures.insert(record.id.clone(), record);
        Ok(())
    }

    fn aggregate(&self, id: &ProcedureId) -> Result<Option<ProcedureAggregate>, StoreError> {
        let inner = self.lock();
        let Some(procedure) = inner.procedures.get(id).cloned() else {
            return Ok(None);
        };
        Ok(Some(ProcedureAggregate {
            medical: inner
                .medical
                .iter()
                .filter(|record| &record.procedure_id == id)
                .cloned()
                .collect(),
            theory: inner
                .theory
                .iter()
                .filter(|record| &record.procedure_id == id)
                .cloned()
                .collect(),
            practical: inner
                .practical
                .iter()
                .filter(|record| &record.procedure_id == id)
                .cloned()
                .collect(),
            payments: inner
                .orders
                .values()
                .filter(|record| &record.procedure_id == id)
                .cloned()
                .collect(),
            appointments: inner
                .appointments
                .values()
                .filter(|record| record.procedure_id.as_ref() == Some(id))
                .cloned()
                .collect(),
            procedure,
        }))
    }

    fn insert_medical(&self, record: MedicalFitnessRecord) -> Result<(), StoreError> {
        self.lock().medical.push(record);
        Ok(())
    }

    fn insert_theory(&self, record: TheoryExamRecord) -> Result<(), StoreError> {
        self.lock().theory.push(record);
        Ok(())
    }

    fn insert_practical(&self, record: PracticalExamRecord) -> Result<(), StoreError> {
        self.lock().practical.push(record);
        Ok(())
    }

    fn licenses_for_holder(&self, holder: &HolderId) -> Result<Vec<LicenseRecord>, StoreError> {
        Ok(self
            .lock()
            .licenses
            .values()
            .filter(|record| &record.holder_id == holder)
            .cloned()
            .collect())
    }

    fn insert_license(&self, record: LicenseRecord) -> Result<LicenseRecord, StoreError> {
        let mut inner = self.lock();
        if inner.licenses.contains_key(&record.id)
            || inner
                .licenses
                .values()
                .any(|license| license.number == record.number)
        {
            return Err(StoreError::Conflict);
        }
        inner.licenses.insert(record.id.clone(), record.clone());
        Ok(record)
    }
}

impl PaymentStore for MemoryStore {
    fn insert_order(
        &self,
        record: PaymentOrderRecord,
    ) -> Result<PaymentOrderRecord, StoreError> {
        let mut inner = self.lock();
        if inner.orders.contains_key(&record.id) {
            return Err(StoreError::Conflict);
        }
        inner.orders.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn order(&self, id: &PaymentOrderId) -> Result<Option<PaymentOrderRecord>, StoreError> {
        Ok(self.lock().orders.get(id).cloned())
    }

    fn update_order(&self, record: PaymentOrderRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.orders.contains_key(&record.id) {
            return Err(StoreError::NotFound);
        }
        inner.orders.insert(record.id.clone(), record);
        Ok(())
    }

    fn pending_orders(&self) -> Result<Vec<PaymentOrderRecord>, StoreError> {
        Ok(self
            .lock()
            .orders
            .values()
            .filter(|record| record.status == PaymentStatus::Pending)
            .cloned()
            .collect())
    }
}

impl AppointmentStore for MemoryStore {
    fn resource(&self, id: &ResourceId) -> Result<Option<ResourceRecord>, StoreError> {
        Ok(self.lock().resources.get(id).cloned())
    }

    fn resources_of_kind(&self, kind: ResourceKind) -> Result<Vec<ResourceRecord>, StoreError> {
        let mut resources: Vec<ResourceRecord> = self
            .lock()
            .resources
            .values()
            .filter(|record| record.kind == kind)
            .cloned()
            .collect();
        resources.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(resources)
    }

    fn appointment(&self, id: &AppointmentId) -> Result<Option<AppointmentRecord>, StoreError> {
        Ok(self.lock().appointments.get(id).cloned())
    }

    fn appointments_for_resource(
        &self,
        id: &ResourceId,
    ) -> Result<Vec<AppointmentRecord>, StoreError> {
        Ok(self
            .lock()
            .appointments
            .values()
            .filter(|record| &record.resource_id == id)
            .cloned()
            .collect())
    }

    fn insert_appointment(
        &self,
        record: AppointmentRecord,
    ) -> Result<AppointmentRecord, StoreError> {
        let mut inner = self.lock();
        if inner.appointments.contains_key(&record.id) {
            return Err(StoreError::Conflict);
        }
        inner
            .appointments
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn insert_appointment_if_free(
        &self,
        record: AppointmentRecord,
        capacity: u32,
    ) -> Result<Option<AppointmentRecord>, StoreError> {
        let mut inner = self.lock();
        if inner.appointments.contains_key(&record.id) {
            return Err(StoreError::Conflict);
        }
        let overlapping = inner
            .appointments
            .values()
            .filter(|existing| {
                existing.resource_id == record.resource_id && existing.overlaps(&record)
            })
            .count();
        if overlapping as u32 >= capacity {
            return Ok(None);
        }
        inner
            .appointments
            .insert(record.id.clone(), record.clone());
        Ok(Some(record))
    }

    fn update_appointment(&self, record: AppointmentRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.appointments.contains_key(&record.id) {
            return Err(StoreError::NotFound);
        }
        inner.appointments.insert(record.id.clone(), record);
        Ok(())
    }
}

/// Audit sink that collects events for assertions.
#[derive(Default, Clone)]
pub struct MemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .expect("audit mutex poisoned")
            .push(event);
    }
}
