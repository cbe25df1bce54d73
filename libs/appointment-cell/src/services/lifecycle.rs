// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use shared_models::auth::{Role, User};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

/// Outcome of an approved transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEffect {
    /// The appointment stops holding its `(doctor, date, time)` slot.
    pub releases_slot: bool,
}

pub struct AppointmentLifecycleService;

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::Completed,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Cancelled,
                AppointmentStatus::Completed,
                AppointmentStatus::NoShow,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
            AppointmentStatus::NoShow => vec![],
        }
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<TransitionEffect, AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if current_status.is_terminal() {
            warn!("Transition attempted out of terminal status {}", current_status);
            return Err(AppointmentError::AlreadyTerminal);
        }

        if !self.get_valid_transitions(current_status).contains(new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidRequest(format!(
                "Cannot move appointment from {} to {}",
                current_status, new_status
            )));
        }

        Ok(TransitionEffect {
            releases_slot: new_status.is_terminal(),
        })
    }

    /// Cancellation is open to the patient, the assigned doctor and admins.
    /// Every other transition needs the assigned doctor or an admin.
    pub fn authorize_transition(
        &self,
        user: &User,
        appointment: &Appointment,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        let is_assigned_doctor = user.acts_as(Role::Doctor, &appointment.doctor_id);
        let is_patient = user.acts_as(Role::Patient, &appointment.patient_id);

        let allowed = match new_status {
            AppointmentStatus::Cancelled => user.is_admin() || is_assigned_doctor || is_patient,
            _ => user.is_admin() || is_assigned_doctor,
        };

        if !allowed {
            warn!(
                "User {} may not move appointment {} to {}",
                user.id, appointment.id, new_status
            );
            return Err(AppointmentError::Forbidden);
        }
        Ok(())
    }
}
