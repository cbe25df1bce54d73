// libs/appointment-cell/src/services/supabase_store.rs
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};
use shared_utils::time::hhmm;

use crate::models::{Appointment, AppointmentChanges, AppointmentError, NewAppointment, StatusChange};
use crate::services::store::AppointmentStore;

const TABLE_PATH: &str = "/rest/v1/appointments";
const ACTIVE_FILTER: &str = "status=in.(scheduled,confirmed)";

/// `appointments` table. Exclusivity comes from the partial unique index
/// `(doctor_id, appointment_date, appointment_time) WHERE status IN ('scheduled','confirmed')`.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    storage_key: String,
}

#[derive(Deserialize)]
struct SlotRow {
    #[serde(with = "hhmm")]
    appointment_time: NaiveTime,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), config.storage_key())
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, storage_key: &str) -> Self {
        Self {
            supabase,
            storage_key: storage_key.to_string(),
        }
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Option<Appointment>, AppointmentError> {
        let rows: Vec<Appointment> = self.supabase
            .request_with_headers(
                Method::PATCH,
                path,
                Some(&self.storage_key),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(storage_error)?;

        Ok(rows.into_iter().next())
    }
}

fn storage_error(error: DatabaseError) -> AppointmentError {
    AppointmentError::Storage(error.to_string())
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        debug!("Fetching appointment {}", appointment_id);

        let path = format!("{}?id=eq.{}", TABLE_PATH, appointment_id);
        let rows: Vec<Appointment> = self.supabase
            .request(Method::GET, &path, Some(&self.storage_key), None)
            .await
            .map_err(storage_error)?;

        Ok(rows.into_iter().next())
    }

    async fn list_active_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<HashSet<NaiveTime>, AppointmentError> {
        let path = format!(
            "{}?doctor_id=eq.{}&appointment_date=eq.{}&{}&select=appointment_time",
            TABLE_PATH, doctor_id, date, ACTIVE_FILTER
        );
        let rows: Vec<SlotRow> = self.supabase
            .request(Method::GET, &path, Some(&self.storage_key), None)
            .await
            .map_err(storage_error)?;

        Ok(rows.into_iter().map(|row| row.appointment_time).collect())
    }

    async fn list_for_doctor(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "{}?doctor_id=eq.{}&appointment_date=eq.{}&order=appointment_time.asc,created_at.asc",
            TABLE_PATH, doctor_id, date
        );
        self.supabase
            .request(Method::GET, &path, Some(&self.storage_key), None)
            .await
            .map_err(storage_error)
    }

    async fn create_if_absent(&self, appointment: NewAppointment) -> Result<Appointment, AppointmentError> {
        let mut body = serde_json::to_value(&appointment)
            .map_err(|e| AppointmentError::Storage(e.to_string()))?;
        body["status"] = json!("scheduled");

        let result: Result<Vec<Appointment>, DatabaseError> = self.supabase
            .request_with_headers(
                Method::POST,
                TABLE_PATH,
                Some(&self.storage_key),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await;

        match result {
            Ok(rows) => rows
                .into_iter()
                .next()
                .ok_or_else(|| AppointmentError::Storage("Insert returned no row".to_string())),
            Err(DatabaseError::Conflict(detail)) => {
                warn!(
                    "Slot {} {} for doctor {} already held: {}",
                    appointment.appointment_date, appointment.appointment_time, appointment.doctor_id, detail
                );
                Err(AppointmentError::SlotUnavailable)
            }
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn transition(&self, appointment_id: Uuid, change: StatusChange) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("{}?id=eq.{}&status=eq.{}", TABLE_PATH, appointment_id, change.from);

        let mut body = json!({
            "status": change.to,
            "updated_at": Utc::now(),
        });
        if let Some(reason) = change.cancel_reason {
            body["cancel_reason"] = json!(reason);
        }

        self.patch(&path, body).await
    }

    async fn update_details(
        &self,
        appointment_id: Uuid,
        changes: AppointmentChanges,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("{}?id=eq.{}&{}", TABLE_PATH, appointment_id, ACTIVE_FILTER);

        let mut body = serde_json::to_value(&changes)
            .map_err(|e| AppointmentError::Storage(e.to_string()))?;
        body["updated_at"] = json!(Utc::now());

        self.patch(&path, body).await
    }
}
