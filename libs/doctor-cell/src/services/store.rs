use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{DayOfWeek, ScheduleError, ScheduleUpdate, WeeklySchedule};

/// Persistence for weekly templates, unique on `(doctor_id, day_of_week)`.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn get(&self, doctor_id: Uuid, day_of_week: DayOfWeek) -> Result<Option<WeeklySchedule>, ScheduleError>;

    /// Every stored weekday for the doctor, monday first.
    async fn list(&self, doctor_id: Uuid) -> Result<Vec<WeeklySchedule>, ScheduleError>;

    /// Writes only the supplied columns, creating the row with defaults when the
    /// weekday is new. Concurrent updates of different columns all persist.
    async fn upsert(
        &self,
        doctor_id: Uuid,
        day_of_week: DayOfWeek,
        update: ScheduleUpdate,
    ) -> Result<WeeklySchedule, ScheduleError>;
}

#[derive(Default)]
pub struct InMemoryScheduleStore {
    rows: RwLock<HashMap<(Uuid, DayOfWeek), WeeklySchedule>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn get(&self, doctor_id: Uuid, day_of_week: DayOfWeek) -> Result<Option<WeeklySchedule>, ScheduleError> {
        Ok(self.rows.read().await.get(&(doctor_id, day_of_week)).cloned())
    }

    async fn list(&self, doctor_id: Uuid) -> Result<Vec<WeeklySchedule>, ScheduleError> {
        let rows = self.rows.read().await;
        let mut days: Vec<WeeklySchedule> = rows
            .values()
            .filter(|row| row.doctor_id == doctor_id)
            .cloned()
            .collect();
        days.sort_by_key(|row| row.day_of_week);
        Ok(days)
    }

    async fn upsert(
        &self,
        doctor_id: Uuid,
        day_of_week: DayOfWeek,
        update: ScheduleUpdate,
    ) -> Result<WeeklySchedule, ScheduleError> {
        // read-merge-write under one write guard
        let mut rows = self.rows.write().await;
        let row = rows
            .entry((doctor_id, day_of_week))
            .or_insert_with(|| WeeklySchedule::new(doctor_id, day_of_week));

        update.apply_to(row);
        row.updated_at = Some(Utc::now());
        Ok(row.clone())
    }
}
