use std::sync::Arc;

use doctor_cell::ScheduleStore;
use shared_config::AppConfig;
use shared_utils::clock::{Clock, SystemClock};

use crate::services::notification::NotificationDispatcher;
use crate::services::store::AppointmentStore;

#[derive(Clone)]
pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub notifications: NotificationDispatcher,
    pub clock: Arc<dyn Clock>,
}

impl AppointmentCellState {
    pub fn new(
        config: Arc<AppConfig>,
        schedules: Arc<dyn ScheduleStore>,
        appointments: Arc<dyn AppointmentStore>,
    ) -> Self {
        let notifications = NotificationDispatcher::from_config(&config);
        let clock = Arc::new(SystemClock::with_offset_minutes(config.clinic_utc_offset_minutes));

        Self {
            config,
            schedules,
            appointments,
            notifications,
            clock,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifications(mut self, notifications: NotificationDispatcher) -> Self {
        self.notifications = notifications;
        self
    }
}
