// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use doctor_cell::models::ScheduleError;
use shared_models::error::AppError;
use shared_utils::time::hhmm;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub appointment_time: NaiveTime,
    pub duration_minutes: i32,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub chief_complaint: Option<String>,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Holds its slot exclusively.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.patient_id.to_string() == user_id || self.doctor_id.to_string() == user_id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no_show" => Ok(AppointmentStatus::NoShow),
            other => Err(AppointmentError::InvalidStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    ClinicVisit,
    Telemedicine,
    Emergency,
    FollowUp,
    #[serde(rename = "walk-in", alias = "walk_in")]
    WalkIn,
}

impl AppointmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentType::ClinicVisit => "clinic_visit",
            AppointmentType::Telemedicine => "telemedicine",
            AppointmentType::Emergency => "emergency",
            AppointmentType::FollowUp => "follow_up",
            AppointmentType::WalkIn => "walk-in",
        }
    }
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentType {
    type Err = AppointmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "clinic_visit" => Ok(AppointmentType::ClinicVisit),
            "telemedicine" => Ok(AppointmentType::Telemedicine),
            "emergency" => Ok(AppointmentType::Emergency),
            "follow_up" => Ok(AppointmentType::FollowUp),
            "walk-in" | "walk_in" => Ok(AppointmentType::WalkIn),
            other => Err(AppointmentError::InvalidRequest(format!(
                "Unknown appointment type '{}'",
                other
            ))),
        }
    }
}

// ==============================================================================
// STORE PAYLOADS
// ==============================================================================

/// Insert payload for `AppointmentStore::create_if_absent`. Inserted as `scheduled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub appointment_time: NaiveTime,
    pub duration_minutes: i32,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
    pub chief_complaint: Option<String>,
    pub notes: Option<String>,
}

/// Descriptive fields that may change while an appointment is active.
/// Doctor, date and time are deliberately absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentChanges {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub appointment_type: Option<AppointmentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chief_complaint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AppointmentChanges {
    pub fn is_empty(&self) -> bool {
        self.appointment_type.is_none()
            && self.reason.is_none()
            && self.chief_complaint.is_none()
            && self.notes.is_none()
    }

    pub fn apply_to(&self, appointment: &mut Appointment) {
        if let Some(appointment_type) = self.appointment_type {
            appointment.appointment_type = appointment_type;
        }
        if let Some(reason) = &self.reason {
            appointment.reason = Some(reason.clone());
        }
        if let Some(chief_complaint) = &self.chief_complaint {
            appointment.chief_complaint = Some(chief_complaint.clone());
        }
        if let Some(notes) = &self.notes {
            appointment.notes = Some(notes.clone());
        }
    }
}

/// Compare-and-set status change: applies only while the stored status is still `from`.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
    pub cancel_reason: Option<String>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    /// Defaults to the caller when a patient books for themself; required for admins.
    pub patient_id: Option<Uuid>,
    pub appointment_date: String,
    pub appointment_time: String,
    pub appointment_type: String,
    pub reason: Option<String>,
    pub chief_complaint: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub appointment_type: Option<String>,
    pub reason: Option<String>,
    pub chief_complaint: Option<String>,
    pub notes: Option<String>,
    /// Anything else the client sent. Must be empty.
    #[serde(flatten)]
    pub other_fields: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransitionRequest {
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateQuery {
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSlotsResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub duration_minutes: u32,
    pub slots: Vec<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Appointment date is in the past")]
    PastDate,

    #[error("Appointment slot not available")]
    SlotUnavailable,

    #[error("Appointment not found")]
    NotFound,

    #[error("Not authorized for this appointment")]
    Forbidden,

    #[error("Appointment is already in a terminal status")]
    AlreadyTerminal,

    #[error("Unrecognized appointment status '{0}'")]
    InvalidStatus(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<ScheduleError> for AppointmentError {
    fn from(error: ScheduleError) -> Self {
        match error {
            ScheduleError::InvalidRequest(msg) => AppointmentError::InvalidRequest(msg),
            ScheduleError::NotFound => AppointmentError::NotFound,
            ScheduleError::Forbidden => AppointmentError::Forbidden,
            ScheduleError::Storage(msg) => AppointmentError::Storage(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        let message = error.to_string();
        match error {
            AppointmentError::InvalidRequest(msg) => AppError::BadRequest(msg),
            AppointmentError::PastDate | AppointmentError::InvalidStatus(_) => AppError::BadRequest(message),
            AppointmentError::SlotUnavailable | AppointmentError::AlreadyTerminal => AppError::Conflict(message),
            AppointmentError::NotFound => AppError::NotFound(message),
            AppointmentError::Forbidden => AppError::Forbidden(message),
            AppointmentError::Storage(msg) => AppError::Database(msg),
        }
    }
}
