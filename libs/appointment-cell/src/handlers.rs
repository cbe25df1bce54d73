// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::time::{format_hhmm, parse_date};

use crate::models::{
    AppointmentError, BookAppointmentRequest, CancelAppointmentRequest, DateQuery, OpenSlotsResponse,
    StatusTransitionRequest, UpdateAppointmentRequest,
};
use crate::services::booking::AppointmentBookingService;
use crate::state::AppointmentCellState;

fn query_date(query: &DateQuery) -> Result<NaiveDate, AppointmentError> {
    parse_date(&query.date).ok_or_else(|| {
        AppointmentError::InvalidRequest(format!("Invalid date '{}', expected YYYY-MM-DD", query.date))
    })
}

// ==============================================================================
// SLOT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_open_slots(
    State(state): State<AppointmentCellState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> Result<Json<OpenSlotsResponse>, AppError> {
    let date = query_date(&query)?;
    let booking_service = AppointmentBookingService::new(&state);

    let slots = booking_service.list_open_slots(doctor_id, date).await?;

    Ok(Json(OpenSlotsResponse {
        doctor_id,
        date,
        duration_minutes: booking_service.slot_duration_minutes(),
        slots: slots.iter().map(format_hhmm).collect(),
    }))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.book_appointment(&user, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.get_appointment(&user, appointment_id).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .update_appointment(&user, appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    request: Option<Json<CancelAppointmentRequest>>,
) -> Result<Json<Value>, AppError> {
    let request = request.map(|Json(body)| body).unwrap_or_default();
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .cancel_appointment(&user, appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn transition_status(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<StatusTransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .transition_status(&user, appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": format!("Appointment marked {}", appointment.status)
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<AppointmentCellState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let date = query_date(&query)?;
    let booking_service = AppointmentBookingService::new(&state);

    let appointments = booking_service
        .list_doctor_appointments(&user, doctor_id, date)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": date,
        "appointments": appointments,
        "total": appointments.len()
    })))
}
