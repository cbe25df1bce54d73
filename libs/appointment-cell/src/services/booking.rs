// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::{DayOfWeek, ScheduleStore, SlotComputer};
use shared_models::auth::{Role, User};
use shared_utils::clock::Clock;
use shared_utils::time::{parse_date, parse_hhmm};

use crate::models::{
    Appointment, AppointmentChanges, AppointmentError, AppointmentStatus, AppointmentType,
    BookAppointmentRequest, CancelAppointmentRequest, NewAppointment, StatusChange,
    StatusTransitionRequest, UpdateAppointmentRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notification::{AppointmentEvent, AppointmentEventKind, NotificationDispatcher};
use crate::services::store::AppointmentStore;
use crate::state::AppointmentCellState;

/// Conditional writes lost to concurrent writers before giving up.
const MAX_TRANSITION_ATTEMPTS: usize = 3;

pub struct AppointmentBookingService {
    schedules: Arc<dyn ScheduleStore>,
    appointments: Arc<dyn AppointmentStore>,
    slot_computer: SlotComputer,
    lifecycle_service: AppointmentLifecycleService,
    notifications: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl AppointmentBookingService {
    pub fn new(state: &AppointmentCellState) -> Self {
        Self {
            schedules: Arc::clone(&state.schedules),
            appointments: Arc::clone(&state.appointments),
            slot_computer: SlotComputer::new(state.config.slot_duration_minutes),
            lifecycle_service: AppointmentLifecycleService::new(),
            notifications: state.notifications.clone(),
            clock: Arc::clone(&state.clock),
        }
    }

    pub fn slot_duration_minutes(&self) -> u32 {
        self.slot_computer.duration_minutes()
    }

    /// Open slot start times for the doctor on `date`, read from current store state.
    #[instrument(skip(self))]
    pub async fn list_open_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<NaiveTime>, AppointmentError> {
        let now = self.clock.now();
        let schedule = self.schedules.get(doctor_id, DayOfWeek::of(date)).await?;
        let booked = self.appointments.list_active_slots(doctor_id, date).await?;

        let slots = self.slot_computer.compute_open_slots(schedule.as_ref(), &booked, date, now);
        debug!("{} open slots for doctor {} on {}", slots.len(), doctor_id, date);
        Ok(slots)
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.id, doctor_id = %request.doctor_id))]
    pub async fn book_appointment(
        &self,
        user: &User,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = self.resolve_patient(user, request.patient_id)?;

        let appointment_date = parse_date(&request.appointment_date).ok_or_else(|| {
            AppointmentError::InvalidRequest(format!(
                "Invalid appointment_date '{}', expected YYYY-MM-DD",
                request.appointment_date
            ))
        })?;
        let appointment_time = parse_hhmm(&request.appointment_time).ok_or_else(|| {
            AppointmentError::InvalidRequest(format!(
                "Invalid appointment_time '{}', expected HH:MM",
                request.appointment_time
            ))
        })?;
        let appointment_type: AppointmentType = request.appointment_type.parse()?;

        if appointment_date < self.clock.now().date() {
            return Err(AppointmentError::PastDate);
        }

        // never trust a slot list the client cached
        let open_slots = self.list_open_slots(request.doctor_id, appointment_date).await?;
        if !open_slots.contains(&appointment_time) {
            warn!(
                "Requested slot {} {} is not open for doctor {}",
                appointment_date, request.appointment_time, request.doctor_id
            );
            return Err(AppointmentError::SlotUnavailable);
        }

        let appointment = self.appointments
            .create_if_absent(NewAppointment {
                doctor_id: request.doctor_id,
                patient_id,
                appointment_date,
                appointment_time,
                duration_minutes: self.slot_computer.duration_minutes() as i32,
                appointment_type,
                reason: request.reason,
                chief_complaint: request.chief_complaint,
                notes: request.notes,
            })
            .await?;

        info!(
            "Appointment {} booked for patient {} with doctor {} at {} {}",
            appointment.id, patient_id, appointment.doctor_id, appointment_date, request.appointment_time
        );
        self.notifications
            .dispatch(AppointmentEvent::new(AppointmentEventKind::Booked, appointment.clone()));

        Ok(appointment)
    }

    pub async fn get_appointment(&self, user: &User, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        self.ensure_participant(user, &appointment)?;
        Ok(appointment)
    }

    pub async fn list_doctor_appointments(
        &self,
        user: &User,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if !user.is_admin() && !user.acts_as(Role::Doctor, &doctor_id) {
            return Err(AppointmentError::Forbidden);
        }
        self.appointments.list_for_doctor(doctor_id, date).await
    }

    /// Descriptive updates only. Doctor, date and time are fixed once booked;
    /// moving an appointment is a cancel followed by a new booking.
    #[instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn update_appointment(
        &self,
        user: &User,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        if !request.other_fields.is_empty() {
            let fields: Vec<&str> = request.other_fields.keys().map(String::as_str).collect();
            return Err(AppointmentError::InvalidRequest(format!(
                "Fields cannot be updated: {}",
                fields.join(", ")
            )));
        }

        let changes = AppointmentChanges {
            appointment_type: request
                .appointment_type
                .as_deref()
                .map(str::parse::<AppointmentType>)
                .transpose()?,
            reason: request.reason,
            chief_complaint: request.chief_complaint,
            notes: request.notes,
        };
        if changes.is_empty() {
            return Err(AppointmentError::InvalidRequest("No updatable fields supplied".to_string()));
        }

        let appointment = self.load(appointment_id).await?;
        self.ensure_participant(user, &appointment)?;
        if appointment.status.is_terminal() {
            return Err(AppointmentError::AlreadyTerminal);
        }

        let updated = match self.appointments.update_details(appointment_id, changes).await? {
            Some(updated) => updated,
            // went terminal between the read and the write
            None => {
                self.load(appointment_id).await?;
                return Err(AppointmentError::AlreadyTerminal);
            }
        };

        info!("Appointment {} updated by {}", appointment_id, user.id);
        self.notifications
            .dispatch(AppointmentEvent::new(AppointmentEventKind::Updated, updated.clone()));
        Ok(updated)
    }

    pub async fn cancel_appointment(
        &self,
        user: &User,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        self.apply_transition(user, appointment_id, AppointmentStatus::Cancelled, request.reason)
            .await
    }

    pub async fn transition_status(
        &self,
        user: &User,
        appointment_id: Uuid,
        request: StatusTransitionRequest,
    ) -> Result<Appointment, AppointmentError> {
        let target: AppointmentStatus = request.status.parse()?;
        self.apply_transition(user, appointment_id, target, request.reason).await
    }

    #[instrument(skip(self, user, reason), fields(user_id = %user.id))]
    async fn apply_transition(
        &self,
        user: &User,
        appointment_id: Uuid,
        target: AppointmentStatus,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let appointment = self.load(appointment_id).await?;

            self.lifecycle_service.authorize_transition(user, &appointment, &target)?;
            let effect = self.lifecycle_service
                .validate_status_transition(&appointment.status, &target)?;

            let change = StatusChange {
                from: appointment.status,
                to: target,
                cancel_reason: if target == AppointmentStatus::Cancelled { reason.clone() } else { None },
            };

            match self.appointments.transition(appointment_id, change).await? {
                Some(updated) => {
                    info!("Appointment {} moved {} -> {}", appointment_id, appointment.status, target);
                    self.notifications
                        .dispatch(AppointmentEvent::transition(updated.clone(), effect));
                    return Ok(updated);
                }
                None => {
                    debug!(
                        "Appointment {} changed status concurrently (attempt {}), re-reading",
                        appointment_id, attempt
                    );
                }
            }
        }

        warn!("Gave up moving appointment {} to {}", appointment_id, target);
        Err(AppointmentError::Storage(format!(
            "Appointment {} kept changing status during update",
            appointment_id
        )))
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    fn ensure_participant(&self, user: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
        if user.is_admin() || appointment.involves(&user.id) {
            Ok(())
        } else {
            Err(AppointmentError::Forbidden)
        }
    }

    /// Patients book for themselves; admins book on behalf of a named patient.
    fn resolve_patient(&self, user: &User, requested: Option<Uuid>) -> Result<Uuid, AppointmentError> {
        match user.role() {
            Role::Patient => {
                let own_id = Uuid::parse_str(&user.id).map_err(|_| {
                    AppointmentError::InvalidRequest("Caller id is not a valid UUID".to_string())
                })?;
                match requested {
                    Some(patient_id) if patient_id != own_id => Err(AppointmentError::Forbidden),
                    _ => Ok(own_id),
                }
            }
            Role::Admin => requested.ok_or_else(|| {
                AppointmentError::InvalidRequest("patient_id is required when booking on behalf of a patient".to_string())
            }),
            _ => Err(AppointmentError::Forbidden),
        }
    }
}
