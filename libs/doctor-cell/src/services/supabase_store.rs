use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{DayOfWeek, ScheduleError, ScheduleUpdate, WeeklySchedule};
use crate::services::store::ScheduleStore;

const TABLE_PATH: &str = "/rest/v1/weekly_schedules";

/// `weekly_schedules` table with a unique index on `(doctor_id, day_of_week)`.
pub struct SupabaseScheduleStore {
    supabase: Arc<SupabaseClient>,
    storage_key: String,
}

impl SupabaseScheduleStore {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), config.storage_key())
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, storage_key: &str) -> Self {
        Self {
            supabase,
            storage_key: storage_key.to_string(),
        }
    }
}

fn storage_error(error: DatabaseError) -> ScheduleError {
    ScheduleError::Storage(error.to_string())
}

/// Key columns plus the supplied ones. Omitted columns keep their stored value
/// on conflict and take the table default on insert.
fn upsert_body(doctor_id: Uuid, day_of_week: DayOfWeek, update: ScheduleUpdate) -> Value {
    let mut body = json!({
        "doctor_id": doctor_id,
        "day_of_week": day_of_week,
        "updated_at": Utc::now(),
    });

    if let Some(is_available) = update.is_available {
        body["is_available"] = json!(is_available);
    }
    if let Some(time_slots) = update.time_slots {
        body["time_slots"] = json!(time_slots);
    }
    if let Some(break_time) = update.break_time {
        body["break_time"] = json!(break_time);
    }
    if let Some(notes) = update.notes {
        body["notes"] = json!(notes);
    }
    body
}

#[async_trait]
impl ScheduleStore for SupabaseScheduleStore {
    async fn get(&self, doctor_id: Uuid, day_of_week: DayOfWeek) -> Result<Option<WeeklySchedule>, ScheduleError> {
        debug!("Fetching {} schedule for doctor {}", day_of_week, doctor_id);

        let path = format!("{}?doctor_id=eq.{}&day_of_week=eq.{}", TABLE_PATH, doctor_id, day_of_week);
        let rows: Vec<WeeklySchedule> = self.supabase
            .request(Method::GET, &path, Some(&self.storage_key), None)
            .await
            .map_err(storage_error)?;

        Ok(rows.into_iter().next())
    }

    async fn list(&self, doctor_id: Uuid) -> Result<Vec<WeeklySchedule>, ScheduleError> {
        debug!("Fetching weekly schedule for doctor {}", doctor_id);

        let path = format!("{}?doctor_id=eq.{}", TABLE_PATH, doctor_id);
        let mut rows: Vec<WeeklySchedule> = self.supabase
            .request(Method::GET, &path, Some(&self.storage_key), None)
            .await
            .map_err(storage_error)?;

        // text column, so ordering by weekday happens here
        rows.sort_by_key(|row| row.day_of_week);
        Ok(rows)
    }

    async fn upsert(
        &self,
        doctor_id: Uuid,
        day_of_week: DayOfWeek,
        update: ScheduleUpdate,
    ) -> Result<WeeklySchedule, ScheduleError> {
        let path = format!("{}?on_conflict=doctor_id,day_of_week", TABLE_PATH);
        let body = upsert_body(doctor_id, day_of_week, update);

        let rows: Vec<WeeklySchedule> = self.supabase
            .request_with_headers(
                Method::POST,
                &path,
                Some(&self.storage_key),
                Some(body),
                Some(SupabaseClient::merge_duplicates_headers()),
            )
            .await
            .map_err(storage_error)?;

        rows.into_iter()
            .next()
            .ok_or_else(|| ScheduleError::Storage("Upsert returned no row".to_string()))
    }
}
