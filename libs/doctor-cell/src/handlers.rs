use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{DayOfWeek, UpsertScheduleRequest, WeeklyScheduleResponse};
use crate::services::schedule::ScheduleService;
use crate::state::DoctorCellState;

#[axum::debug_handler]
pub async fn get_weekly_schedule(
    State(state): State<DoctorCellState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<WeeklyScheduleResponse>, AppError> {
    let schedule_service = ScheduleService::new(state.schedules.clone());
    let days = schedule_service.get_weekly_schedule(doctor_id).await?;

    Ok(Json(WeeklyScheduleResponse { doctor_id, days }))
}

#[axum::debug_handler]
pub async fn upsert_weekly_schedule(
    State(state): State<DoctorCellState>,
    Path((doctor_id, day_of_week)): Path<(Uuid, String)>,
    Extension(user): Extension<User>,
    Json(request): Json<UpsertScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let day_of_week: DayOfWeek = day_of_week.parse()?;
    let schedule_service = ScheduleService::new(state.schedules.clone());

    let schedule = schedule_service
        .upsert_weekly_schedule(&user, doctor_id, day_of_week, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule,
        "message": "Weekly schedule saved"
    })))
}
