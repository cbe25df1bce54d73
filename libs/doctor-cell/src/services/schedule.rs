use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::{Role, User};

use crate::models::{DayOfWeek, ScheduleError, UpsertScheduleRequest, WeeklySchedule};
use crate::services::store::ScheduleStore;

pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    pub async fn get_weekly_schedule(&self, doctor_id: Uuid) -> Result<Vec<WeeklySchedule>, ScheduleError> {
        debug!("Fetching weekly schedule for doctor: {}", doctor_id);
        self.store.list(doctor_id).await
    }

    /// Validates the supplied fields and hands only those to the store, which
    /// merges them into the stored row. Only the doctor themself or an admin may do this.
    pub async fn upsert_weekly_schedule(
        &self,
        user: &User,
        doctor_id: Uuid,
        day_of_week: DayOfWeek,
        request: UpsertScheduleRequest,
    ) -> Result<WeeklySchedule, ScheduleError> {
        if !user.is_admin() && !user.acts_as(Role::Doctor, &doctor_id) {
            warn!("User {} attempted to edit the schedule of doctor {}", user.id, doctor_id);
            return Err(ScheduleError::Forbidden);
        }

        let update = request.validate()?;

        let saved = self.store.upsert(doctor_id, day_of_week, update).await?;
        info!("Saved {} schedule for doctor {}", day_of_week, doctor_id);
        Ok(saved)
    }
}
