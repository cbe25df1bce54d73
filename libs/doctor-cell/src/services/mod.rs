pub mod schedule;
pub mod slots;
pub mod store;
pub mod supabase_store;
