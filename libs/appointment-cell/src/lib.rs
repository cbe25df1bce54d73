pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use models::*;
pub use services::booking::AppointmentBookingService;
pub use services::lifecycle::{AppointmentLifecycleService, TransitionEffect};
pub use services::notification::{
    AppointmentEvent, AppointmentEventKind, LogNotifier, NotificationDispatcher, Notifier, WebhookNotifier,
};
pub use services::store::{AppointmentStore, InMemoryAppointmentStore};
pub use services::supabase_store::SupabaseAppointmentStore;
pub use state::AppointmentCellState;
