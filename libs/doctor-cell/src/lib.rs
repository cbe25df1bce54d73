pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use models::*;
pub use services::schedule::ScheduleService;
pub use services::slots::SlotComputer;
pub use services::store::{InMemoryScheduleStore, ScheduleStore};
pub use services::supabase_store::SupabaseScheduleStore;
pub use state::DoctorCellState;
