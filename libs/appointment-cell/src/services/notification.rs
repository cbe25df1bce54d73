// libs/appointment-cell/src/services/notification.rs
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use shared_config::AppConfig;

use crate::models::{Appointment, AppointmentStatus};
use crate::services::lifecycle::TransitionEffect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentEventKind {
    Booked,
    Updated,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl From<AppointmentStatus> for AppointmentEventKind {
    fn from(status: AppointmentStatus) -> Self {
        match status {
            AppointmentStatus::Scheduled => AppointmentEventKind::Booked,
            AppointmentStatus::Confirmed => AppointmentEventKind::Confirmed,
            AppointmentStatus::Cancelled => AppointmentEventKind::Cancelled,
            AppointmentStatus::Completed => AppointmentEventKind::Completed,
            AppointmentStatus::NoShow => AppointmentEventKind::NoShow,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentEvent {
    pub kind: AppointmentEventKind,
    pub appointment: Appointment,
    /// The appointment's slot is bookable again.
    pub releases_slot: bool,
    pub occurred_at: DateTime<Utc>,
}

impl AppointmentEvent {
    pub fn new(kind: AppointmentEventKind, appointment: Appointment) -> Self {
        Self {
            kind,
            appointment,
            releases_slot: false,
            occurred_at: Utc::now(),
        }
    }

    /// Event for a status change that has been persisted.
    pub fn transition(appointment: Appointment, effect: TransitionEffect) -> Self {
        Self {
            releases_slot: effect.releases_slot,
            ..Self::new(appointment.status.into(), appointment)
        }
    }
}

/// Outbound delivery of appointment events. Failures never reach the caller
/// of a booking or transition.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &AppointmentEvent) -> anyhow::Result<()>;
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &AppointmentEvent) -> anyhow::Result<()> {
        info!(
            "Appointment {} {:?}: doctor {} patient {} at {} {} (slot released: {})",
            event.appointment.id,
            event.kind,
            event.appointment.doctor_id,
            event.appointment.patient_id,
            event.appointment.appointment_date,
            event.appointment.appointment_time.format("%H:%M"),
            event.releases_slot,
        );
        Ok(())
    }
}

/// POSTs each event as JSON to a fixed URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &AppointmentEvent) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .context("webhook request failed")?
            .error_for_status()
            .context("webhook rejected event")?;
        Ok(())
    }
}

/// Fans events out to every notifier on a background task.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifiers: Arc<Vec<Arc<dyn Notifier>>>,
}

impl NotificationDispatcher {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self {
            notifiers: Arc::new(notifiers),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let mut notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(LogNotifier)];
        if let Some(url) = &config.notification_webhook_url {
            notifiers.push(Arc::new(WebhookNotifier::new(url.clone())));
        }
        Self::new(notifiers)
    }

    pub fn dispatch(&self, event: AppointmentEvent) {
        let notifiers = Arc::clone(&self.notifiers);

        tokio::spawn(async move {
            for notifier in notifiers.iter() {
                if let Err(e) = notifier.notify(&event).await {
                    warn!(
                        "Failed to deliver {:?} event for appointment {}: {:#}",
                        event.kind, event.appointment.id, e
                    );
                }
            }
        });
    }
}
