use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};
use tracing::warn;

use appointment_cell::router::appointment_routes;
use appointment_cell::{AppointmentCellState, AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
use doctor_cell::router::doctor_routes;
use doctor_cell::{DoctorCellState, InMemoryScheduleStore, ScheduleStore, SupabaseScheduleStore};
use shared_config::{AppConfig, StorageBackend};

pub fn create_router(config: Arc<AppConfig>) -> Router {
    // both cells read the same schedule store
    let (schedules, appointments): (Arc<dyn ScheduleStore>, Arc<dyn AppointmentStore>) =
        match config.storage_backend {
            StorageBackend::Supabase => (
                Arc::new(SupabaseScheduleStore::new(&config)),
                Arc::new(SupabaseAppointmentStore::new(&config)),
            ),
            StorageBackend::Memory => {
                warn!("Using in-memory storage, data is lost on restart");
                (
                    Arc::new(InMemoryScheduleStore::new()),
                    Arc::new(InMemoryAppointmentStore::new()),
                )
            }
        };

    let doctor_state = DoctorCellState::new(config.clone(), schedules.clone());
    let appointment_state = AppointmentCellState::new(config, schedules, appointments);

    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/doctors", doctor_routes(doctor_state))
        .nest("/appointments", appointment_routes(appointment_state))
}
