use std::sync::Arc;

use shared_config::AppConfig;

use crate::services::store::ScheduleStore;

#[derive(Clone)]
pub struct DoctorCellState {
    pub config: Arc<AppConfig>,
    pub schedules: Arc<dyn ScheduleStore>,
}

impl DoctorCellState {
    pub fn new(config: Arc<AppConfig>, schedules: Arc<dyn ScheduleStore>) -> Self {
        Self { config, schedules }
    }
}
