use std::env;
use tracing::warn;

pub const DEFAULT_SLOT_DURATION_MINUTES: u32 = 30;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub slot_duration_minutes: u32,
    pub clinic_utc_offset_minutes: i32,
    pub notification_webhook_url: Option<String>,
    pub storage_backend: StorageBackend,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, storage requests will use the anon key");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            slot_duration_minutes: parse_slot_duration(env::var("SLOT_DURATION_MINUTES").ok()),
            clinic_utc_offset_minutes: env::var("CLINIC_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|raw| match raw.trim().parse::<i32>() {
                    Ok(offset) if offset.abs() < 24 * 60 => Some(offset),
                    _ => {
                        warn!("CLINIC_UTC_OFFSET_MINUTES={} is invalid, using UTC", raw);
                        None
                    }
                })
                .unwrap_or(0),
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            storage_backend: parse_storage_backend(env::var("STORAGE_BACKEND").ok()),
            port: env::var("PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_PORT),
        };

        if config.storage_backend == StorageBackend::Supabase && !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Key used for server-side storage calls. Authorization is decided by
    /// the services before any storage call is made.
    pub fn storage_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

fn parse_slot_duration(raw: Option<String>) -> u32 {
    match raw {
        None => DEFAULT_SLOT_DURATION_MINUTES,
        Some(value) => match value.trim().parse::<u32>() {
            Ok(minutes) if minutes > 0 && minutes < 24 * 60 => minutes,
            _ => {
                warn!(
                    "SLOT_DURATION_MINUTES={} is invalid, using {}",
                    value, DEFAULT_SLOT_DURATION_MINUTES
                );
                DEFAULT_SLOT_DURATION_MINUTES
            }
        },
    }
}

fn parse_storage_backend(raw: Option<String>) -> StorageBackend {
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("supabase") => StorageBackend::Supabase,
        Some("memory") => StorageBackend::Memory,
        Some(other) => {
            warn!("Unknown STORAGE_BACKEND '{}', using supabase", other);
            StorageBackend::Supabase
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_duration_falls_back_on_bad_input() {
        assert_eq!(parse_slot_duration(None), 30);
        assert_eq!(parse_slot_duration(Some("15".into())), 15);
        assert_eq!(parse_slot_duration(Some("0".into())), 30);
        assert_eq!(parse_slot_duration(Some("soon".into())), 30);
    }

    #[test]
    fn storage_backend_parsing() {
        assert_eq!(parse_storage_backend(None), StorageBackend::Supabase);
        assert_eq!(parse_storage_backend(Some("memory".into())), StorageBackend::Memory);
        assert_eq!(parse_storage_backend(Some("redis".into())), StorageBackend::Supabase);
    }
}
