pub mod booking;
pub mod lifecycle;
pub mod notification;
pub mod store;
pub mod supabase_store;
