// libs/appointment-cell/src/services/store.rs
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentChanges, AppointmentError, AppointmentStatus, NewAppointment, StatusChange,
};

/// Persistence for appointments. At most one active (`scheduled`/`confirmed`)
/// appointment may exist per `(doctor_id, appointment_date, appointment_time)`.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Start times held by active appointments for the doctor on `date`.
    async fn list_active_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<HashSet<NaiveTime>, AppointmentError>;

    /// Every appointment of the doctor on `date`, any status, ordered by time.
    async fn list_for_doctor(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, AppointmentError>;

    /// Atomic insert-if-no-active-appointment. Fails with `SlotUnavailable` when the
    /// slot is already held, including when a concurrent caller won the race.
    async fn create_if_absent(&self, appointment: NewAppointment) -> Result<Appointment, AppointmentError>;

    /// Applies the status change only while the stored status still equals
    /// `change.from`. `None` means the row is missing or moved on.
    async fn transition(&self, appointment_id: Uuid, change: StatusChange) -> Result<Option<Appointment>, AppointmentError>;

    /// Applies descriptive changes only while the appointment is active.
    /// `None` means the row is missing or terminal.
    async fn update_details(
        &self,
        appointment_id: Uuid,
        changes: AppointmentChanges,
    ) -> Result<Option<Appointment>, AppointmentError>;
}

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    rows: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.rows.read().await.get(&appointment_id).cloned())
    }

    async fn list_active_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<HashSet<NaiveTime>, AppointmentError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|row| row.doctor_id == doctor_id && row.appointment_date == date && row.is_active())
            .map(|row| row.appointment_time)
            .collect())
    }

    async fn list_for_doctor(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        let rows = self.rows.read().await;
        let mut appointments: Vec<Appointment> = rows
            .values()
            .filter(|row| row.doctor_id == doctor_id && row.appointment_date == date)
            .cloned()
            .collect();
        appointments.sort_by_key(|row| (row.appointment_time, row.created_at));
        Ok(appointments)
    }

    async fn create_if_absent(&self, appointment: NewAppointment) -> Result<Appointment, AppointmentError> {
        // check and insert under one write guard
        let mut rows = self.rows.write().await;

        let taken = rows.values().any(|row| {
            row.doctor_id == appointment.doctor_id
                && row.appointment_date == appointment.appointment_date
                && row.appointment_time == appointment.appointment_time
                && row.is_active()
        });
        if taken {
            return Err(AppointmentError::SlotUnavailable);
        }

        let now = Utc::now();
        let created = Appointment {
            id: Uuid::new_v4(),
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            appointment_date: appointment.appointment_date,
            appointment_time: appointment.appointment_time,
            duration_minutes: appointment.duration_minutes,
            appointment_type: appointment.appointment_type,
            status: AppointmentStatus::Scheduled,
            reason: appointment.reason,
            chief_complaint: appointment.chief_complaint,
            notes: appointment.notes,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };
        rows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn transition(&self, appointment_id: Uuid, change: StatusChange) -> Result<Option<Appointment>, AppointmentError> {
        let mut rows = self.rows.write().await;

        let Some(row) = rows.get_mut(&appointment_id) else {
            return Ok(None);
        };
        if row.status != change.from {
            return Ok(None);
        }

        row.status = change.to;
        if change.to == AppointmentStatus::Cancelled {
            row.cancel_reason = change.cancel_reason;
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn update_details(
        &self,
        appointment_id: Uuid,
        changes: AppointmentChanges,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut rows = self.rows.write().await;

        match rows.get_mut(&appointment_id) {
            Some(row) if row.is_active() => {
                changes.apply_to(row);
                row.updated_at = Utc::now();
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }
}
