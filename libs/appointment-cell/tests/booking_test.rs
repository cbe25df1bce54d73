use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures::future::join_all;
use tokio::sync::Mutex;
use uuid::Uuid;

use appointment_cell::{
    Appointment, AppointmentBookingService, AppointmentCellState, AppointmentChanges, AppointmentError,
    AppointmentEvent, AppointmentEventKind, AppointmentStatus, AppointmentStore, BookAppointmentRequest,
    CancelAppointmentRequest, InMemoryAppointmentStore, NewAppointment, NotificationDispatcher, Notifier,
    StatusChange, StatusTransitionRequest, UpdateAppointmentRequest,
};
use doctor_cell::{DayOfWeek, InMemoryScheduleStore, ScheduleStore, ScheduleUpdate, TimeInterval};
use shared_models::auth::User;
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::{TestConfig, TestUser};

const MONDAY: &str = "2026-10-19";

fn t(value: &str) -> NaiveTime {
    NaiveTime::parse_from_str(value, "%H:%M").unwrap()
}

/// Wednesday before the booked Monday.
fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 14).unwrap().and_hms_opt(8, 0, 0).unwrap()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<AppointmentEvent>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &AppointmentEvent) -> anyhow::Result<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

impl RecordingNotifier {
    async fn wait_for(&self, count: usize) -> Vec<AppointmentEvent> {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if self.events.lock().await.len() >= count {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("notifications were not delivered");
        self.events.lock().await.clone()
    }
}

struct Clinic {
    service: Arc<AppointmentBookingService>,
    doctor: TestUser,
    notifier: Arc<RecordingNotifier>,
}

impl Clinic {
    async fn new() -> Self {
        Self::with_appointments(Arc::new(InMemoryAppointmentStore::new())).await
    }

    async fn with_appointments(appointments: Arc<dyn AppointmentStore>) -> Self {
        let doctor = TestUser::doctor("doctor@clinic.test");

        let schedules = Arc::new(InMemoryScheduleStore::new());
        schedules
            .upsert(doctor.uuid(), DayOfWeek::Monday, ScheduleUpdate {
                is_available: Some(true),
                time_slots: Some(vec![TimeInterval::new(t("09:00"), t("12:00"))]),
                break_time: Some(Some(TimeInterval::new(t("10:30"), t("11:00")))),
                notes: None,
            })
            .await
            .unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppointmentCellState::new(
            TestConfig::default().to_arc(),
            schedules,
            appointments,
        )
        .with_clock(Arc::new(FixedClock(now())))
        .with_notifications(NotificationDispatcher::new(vec![notifier.clone() as Arc<dyn Notifier>]));

        Self {
            service: Arc::new(AppointmentBookingService::new(&state)),
            doctor,
            notifier,
        }
    }

    fn doctor_id(&self) -> Uuid {
        self.doctor.uuid()
    }

    fn request(&self, date: &str, time: &str) -> BookAppointmentRequest {
        BookAppointmentRequest {
            doctor_id: self.doctor_id(),
            patient_id: None,
            appointment_date: date.to_string(),
            appointment_time: time.to_string(),
            appointment_type: "clinic_visit".to_string(),
            reason: Some("Persistent cough".to_string()),
            chief_complaint: None,
            notes: None,
        }
    }

    async fn open_slots(&self) -> Vec<String> {
        self.service
            .list_open_slots(self.doctor_id(), monday())
            .await
            .unwrap()
            .iter()
            .map(|slot| slot.format("%H:%M").to_string())
            .collect()
    }
}

fn patient() -> User {
    TestUser::patient("patient@clinic.test").to_user()
}

#[tokio::test]
async fn booking_removes_slot_and_cancelling_restores_it() {
    let clinic = Clinic::new().await;
    let patient = patient();

    assert_eq!(clinic.open_slots().await, vec!["09:00", "09:30", "10:00", "11:00", "11:30"]);

    let appointment = clinic
        .service
        .book_appointment(&patient, clinic.request(MONDAY, "09:30"))
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    assert_eq!(appointment.patient_id.to_string(), patient.id);
    assert_eq!(appointment.duration_minutes, 30);
    assert_eq!(clinic.open_slots().await, vec!["09:00", "10:00", "11:00", "11:30"]);

    let cancelled = clinic
        .service
        .cancel_appointment(&patient, appointment.id, CancelAppointmentRequest {
            reason: Some("Feeling better".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("Feeling better"));
    assert_eq!(clinic.open_slots().await, vec!["09:00", "09:30", "10:00", "11:00", "11:30"]);

    // the freed slot can be booked again
    clinic
        .service
        .book_appointment(&patient, clinic.request(MONDAY, "09:30"))
        .await
        .unwrap();

    // each event is delivered on its own task, so only the multiset is fixed
    let events = clinic.notifier.wait_for(3).await;
    assert_eq!(events.len(), 3);
    let kinds: Vec<AppointmentEventKind> = events.iter().map(|event| event.kind).collect();
    assert_eq!(kinds.iter().filter(|kind| **kind == AppointmentEventKind::Booked).count(), 2);
    assert!(kinds.contains(&AppointmentEventKind::Cancelled));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_for_one_slot_admit_exactly_one() {
    let clinic = Clinic::new().await;

    let attempts = (0..16).map(|_| {
        let service = Arc::clone(&clinic.service);
        let request = clinic.request(MONDAY, "10:00");
        tokio::spawn(async move { service.book_appointment(&patient(), request).await })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let booked = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(booked, 1);
    for result in results.iter().filter(|result| result.is_err()) {
        assert_matches!(result, Err(AppointmentError::SlotUnavailable));
    }

    assert!(!clinic.open_slots().await.contains(&"10:00".to_string()));
}

#[tokio::test]
async fn booking_validates_date_time_and_type() {
    let clinic = Clinic::new().await;
    let patient = patient();

    let result = clinic.service.book_appointment(&patient, clinic.request("2026-10-13", "09:00")).await;
    assert_matches!(result, Err(AppointmentError::PastDate));

    let result = clinic.service.book_appointment(&patient, clinic.request(MONDAY, "9:30")).await;
    assert_matches!(result, Err(AppointmentError::InvalidRequest(_)));

    let result = clinic.service.book_appointment(&patient, clinic.request("19/10/2026", "09:30")).await;
    assert_matches!(result, Err(AppointmentError::InvalidRequest(_)));

    let mut request = clinic.request(MONDAY, "09:30");
    request.appointment_type = "house_call".to_string();
    let result = clinic.service.book_appointment(&patient, request).await;
    assert_matches!(result, Err(AppointmentError::InvalidRequest(_)));

    let mut request = clinic.request(MONDAY, "09:30");
    request.appointment_type = "walk-in".to_string();
    assert!(clinic.service.book_appointment(&patient, request).await.is_ok());
}

#[tokio::test]
async fn booking_outside_open_slots_is_unavailable() {
    let clinic = Clinic::new().await;
    let patient = patient();

    // inside the break
    let result = clinic.service.book_appointment(&patient, clinic.request(MONDAY, "10:30")).await;
    assert_matches!(result, Err(AppointmentError::SlotUnavailable));

    // off the slot grid
    let result = clinic.service.book_appointment(&patient, clinic.request(MONDAY, "09:15")).await;
    assert_matches!(result, Err(AppointmentError::SlotUnavailable));

    // tuesday has no schedule row
    let result = clinic.service.book_appointment(&patient, clinic.request("2026-10-20", "09:00")).await;
    assert_matches!(result, Err(AppointmentError::SlotUnavailable));
}

#[tokio::test]
async fn only_patients_and_admins_book() {
    let clinic = Clinic::new().await;

    let mut for_someone_else = clinic.request(MONDAY, "09:00");
    for_someone_else.patient_id = Some(Uuid::new_v4());
    let result = clinic.service.book_appointment(&patient(), for_someone_else).await;
    assert_matches!(result, Err(AppointmentError::Forbidden));

    let result = clinic
        .service
        .book_appointment(&clinic.doctor.to_user(), clinic.request(MONDAY, "09:00"))
        .await;
    assert_matches!(result, Err(AppointmentError::Forbidden));

    let admin = TestUser::admin("front-desk@clinic.test").to_user();
    let result = clinic.service.book_appointment(&admin, clinic.request(MONDAY, "09:00")).await;
    assert_matches!(result, Err(AppointmentError::InvalidRequest(_)));

    let patient_id = Uuid::new_v4();
    let mut on_behalf = clinic.request(MONDAY, "09:00");
    on_behalf.patient_id = Some(patient_id);
    let appointment = clinic.service.book_appointment(&admin, on_behalf).await.unwrap();
    assert_eq!(appointment.patient_id, patient_id);
}

#[tokio::test]
async fn second_cancel_is_rejected_and_keeps_first_reason() {
    let clinic = Clinic::new().await;
    let patient = patient();
    let appointment = clinic
        .service
        .book_appointment(&patient, clinic.request(MONDAY, "11:00"))
        .await
        .unwrap();

    clinic
        .service
        .cancel_appointment(&patient, appointment.id, CancelAppointmentRequest {
            reason: Some("Travel".to_string()),
        })
        .await
        .unwrap();

    let result = clinic
        .service
        .cancel_appointment(&clinic.doctor.to_user(), appointment.id, CancelAppointmentRequest {
            reason: Some("Doctor unavailable".to_string()),
        })
        .await;
    assert_matches!(result, Err(AppointmentError::AlreadyTerminal));

    let stored = clinic.service.get_appointment(&patient, appointment.id).await.unwrap();
    assert_eq!(stored.cancel_reason.as_deref(), Some("Travel"));
}

#[tokio::test]
async fn confirmation_requires_the_assigned_doctor() {
    let clinic = Clinic::new().await;
    let patient = patient();
    let appointment = clinic
        .service
        .book_appointment(&patient, clinic.request(MONDAY, "09:00"))
        .await
        .unwrap();

    let confirm = || StatusTransitionRequest { status: "confirmed".to_string(), reason: None };

    let result = clinic.service.transition_status(&patient, appointment.id, confirm()).await;
    assert_matches!(result, Err(AppointmentError::Forbidden));

    let other_doctor = TestUser::doctor("locum@clinic.test").to_user();
    let result = clinic.service.transition_status(&other_doctor, appointment.id, confirm()).await;
    assert_matches!(result, Err(AppointmentError::Forbidden));

    let confirmed = clinic
        .service
        .transition_status(&clinic.doctor.to_user(), appointment.id, confirm())
        .await
        .unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    // a confirmed appointment still holds its slot
    assert!(!clinic.open_slots().await.contains(&"09:00".to_string()));
    let events = clinic.notifier.wait_for(2).await;
    let confirmation = events
        .iter()
        .find(|event| event.kind == AppointmentEventKind::Confirmed)
        .expect("confirmation event");
    assert!(!confirmation.releases_slot);
}

#[tokio::test]
async fn terminal_transitions_release_the_slot() {
    let clinic = Clinic::new().await;
    let patient = patient();
    let doctor = clinic.doctor.to_user();

    let first = clinic
        .service
        .book_appointment(&patient, clinic.request(MONDAY, "09:00"))
        .await
        .unwrap();
    let second = clinic
        .service
        .book_appointment(&patient, clinic.request(MONDAY, "09:30"))
        .await
        .unwrap();

    let no_show = clinic
        .service
        .transition_status(&doctor, first.id, StatusTransitionRequest { status: "no_show".to_string(), reason: None })
        .await
        .unwrap();
    assert_eq!(no_show.status, AppointmentStatus::NoShow);
    assert!(no_show.cancel_reason.is_none());

    clinic
        .service
        .transition_status(&doctor, second.id, StatusTransitionRequest { status: "completed".to_string(), reason: None })
        .await
        .unwrap();

    assert_eq!(clinic.open_slots().await, vec!["09:00", "09:30", "10:00", "11:00", "11:30"]);

    let result = clinic
        .service
        .transition_status(&doctor, second.id, StatusTransitionRequest { status: "cancelled".to_string(), reason: None })
        .await;
    assert_matches!(result, Err(AppointmentError::AlreadyTerminal));

    // bookings hold a slot, the two terminal moves hand theirs back
    let events = clinic.notifier.wait_for(4).await;
    assert_eq!(events.len(), 4);
    for event in &events {
        let terminal = matches!(event.kind, AppointmentEventKind::NoShow | AppointmentEventKind::Completed);
        assert_eq!(event.releases_slot, terminal, "{:?}", event.kind);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_cancel_and_no_show_admit_exactly_one() {
    let clinic = Clinic::new().await;
    let patient = patient();
    let appointment_id = clinic
        .service
        .book_appointment(&patient, clinic.request(MONDAY, "11:30"))
        .await
        .unwrap()
        .id;

    let cancel = {
        let service = Arc::clone(&clinic.service);
        let patient = patient.clone();
        tokio::spawn(async move {
            service
                .cancel_appointment(&patient, appointment_id, CancelAppointmentRequest {
                    reason: Some("Travel".to_string()),
                })
                .await
        })
    };
    let no_show = {
        let service = Arc::clone(&clinic.service);
        let doctor = clinic.doctor.to_user();
        tokio::spawn(async move {
            service
                .transition_status(&doctor, appointment_id, StatusTransitionRequest {
                    status: "no_show".to_string(),
                    reason: None,
                })
                .await
        })
    };

    let results = [cancel.await.unwrap(), no_show.await.unwrap()];
    let winners: Vec<&Appointment> = results.iter().filter_map(|result| result.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    for result in results.iter().filter(|result| result.is_err()) {
        assert_matches!(result, Err(AppointmentError::AlreadyTerminal));
    }

    let stored = clinic.service.get_appointment(&patient, appointment_id).await.unwrap();
    assert_eq!(stored.status, winners[0].status);
}

/// Moves the appointment to `no_show` right before the first cancel write lands,
/// as a competing writer would between the caller's read and its write.
#[derive(Default)]
struct CompetingNoShowStore {
    inner: InMemoryAppointmentStore,
    raced: AtomicBool,
}

#[async_trait]
impl AppointmentStore for CompetingNoShowStore {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        self.inner.get(appointment_id).await
    }

    async fn list_active_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<HashSet<NaiveTime>, AppointmentError> {
        self.inner.list_active_slots(doctor_id, date).await
    }

    async fn list_for_doctor(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        self.inner.list_for_doctor(doctor_id, date).await
    }

    async fn create_if_absent(&self, appointment: NewAppointment) -> Result<Appointment, AppointmentError> {
        self.inner.create_if_absent(appointment).await
    }

    async fn transition(&self, appointment_id: Uuid, change: StatusChange) -> Result<Option<Appointment>, AppointmentError> {
        if change.to == AppointmentStatus::Cancelled && !self.raced.swap(true, Ordering::SeqCst) {
            let competing = StatusChange { from: change.from, to: AppointmentStatus::NoShow, cancel_reason: None };
            self.inner.transition(appointment_id, competing).await?;
        }
        self.inner.transition(appointment_id, change).await
    }

    async fn update_details(
        &self,
        appointment_id: Uuid,
        changes: AppointmentChanges,
    ) -> Result<Option<Appointment>, AppointmentError> {
        self.inner.update_details(appointment_id, changes).await
    }
}

#[tokio::test]
async fn cancel_losing_to_a_concurrent_no_show_is_already_terminal() {
    let store = Arc::new(CompetingNoShowStore::default());
    let clinic = Clinic::with_appointments(store.clone()).await;
    let patient = patient();
    let appointment = clinic
        .service
        .book_appointment(&patient, clinic.request(MONDAY, "10:00"))
        .await
        .unwrap();

    let result = clinic
        .service
        .cancel_appointment(&patient, appointment.id, CancelAppointmentRequest {
            reason: Some("Travel".to_string()),
        })
        .await;
    assert_matches!(result, Err(AppointmentError::AlreadyTerminal));
    assert!(store.raced.load(Ordering::SeqCst));

    let stored = clinic.service.get_appointment(&patient, appointment.id).await.unwrap();
    assert_eq!(stored.status, AppointmentStatus::NoShow);
    assert!(stored.cancel_reason.is_none());
}

#[tokio::test]
async fn unknown_status_and_backwards_moves_are_rejected() {
    let clinic = Clinic::new().await;
    let doctor = clinic.doctor.to_user();
    let appointment = clinic
        .service
        .book_appointment(&patient(), clinic.request(MONDAY, "11:30"))
        .await
        .unwrap();

    let result = clinic
        .service
        .transition_status(&doctor, appointment.id, StatusTransitionRequest { status: "rescheduled".to_string(), reason: None })
        .await;
    assert_matches!(result, Err(AppointmentError::InvalidStatus(status)) if status == "rescheduled");

    let result = clinic
        .service
        .transition_status(&doctor, appointment.id, StatusTransitionRequest { status: "scheduled".to_string(), reason: None })
        .await;
    assert_matches!(result, Err(AppointmentError::InvalidRequest(_)));

    let result = clinic
        .service
        .transition_status(&doctor, Uuid::new_v4(), StatusTransitionRequest { status: "confirmed".to_string(), reason: None })
        .await;
    assert_matches!(result, Err(AppointmentError::NotFound));
}

#[tokio::test]
async fn updates_touch_only_descriptive_fields() {
    let clinic = Clinic::new().await;
    let patient = patient();
    let appointment = clinic
        .service
        .book_appointment(&patient, clinic.request(MONDAY, "10:00"))
        .await
        .unwrap();

    let move_attempt: UpdateAppointmentRequest =
        serde_json::from_str(r#"{"appointment_time": "11:00", "notes": "earlier please"}"#).unwrap();
    let result = clinic.service.update_appointment(&patient, appointment.id, move_attempt).await;
    assert_matches!(result, Err(AppointmentError::InvalidRequest(msg)) if msg.contains("appointment_time"));

    let result = clinic
        .service
        .update_appointment(&patient, appointment.id, UpdateAppointmentRequest::default())
        .await;
    assert_matches!(result, Err(AppointmentError::InvalidRequest(_)));

    let updated = clinic
        .service
        .update_appointment(&patient, appointment.id, UpdateAppointmentRequest {
            appointment_type: Some("telemedicine".to_string()),
            notes: Some("Prefers video".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updated.notes.as_deref(), Some("Prefers video"));
    assert_eq!(updated.appointment_time, appointment.appointment_time);
    assert_eq!(updated.reason, appointment.reason);

    let stranger = TestUser::patient("stranger@clinic.test").to_user();
    let result = clinic
        .service
        .update_appointment(&stranger, appointment.id, UpdateAppointmentRequest {
            notes: Some("hijack".to_string()),
            ..Default::default()
        })
        .await;
    assert_matches!(result, Err(AppointmentError::Forbidden));

    clinic
        .service
        .cancel_appointment(&patient, appointment.id, CancelAppointmentRequest::default())
        .await
        .unwrap();
    let result = clinic
        .service
        .update_appointment(&patient, appointment.id, UpdateAppointmentRequest {
            notes: Some("too late".to_string()),
            ..Default::default()
        })
        .await;
    assert_matches!(result, Err(AppointmentError::AlreadyTerminal));
}

#[tokio::test]
async fn appointments_are_visible_to_participants_only() {
    let clinic = Clinic::new().await;
    let patient = patient();
    let appointment = clinic
        .service
        .book_appointment(&patient, clinic.request(MONDAY, "09:00"))
        .await
        .unwrap();

    assert!(clinic.service.get_appointment(&clinic.doctor.to_user(), appointment.id).await.is_ok());

    let stranger = TestUser::patient("stranger@clinic.test").to_user();
    let result = clinic.service.get_appointment(&stranger, appointment.id).await;
    assert_matches!(result, Err(AppointmentError::Forbidden));

    let result = clinic.service.get_appointment(&patient, Uuid::new_v4()).await;
    assert_matches!(result, Err(AppointmentError::NotFound));
}

#[tokio::test]
async fn doctor_day_list_includes_every_status_in_time_order() {
    let clinic = Clinic::new().await;
    let patient = patient();
    let doctor = clinic.doctor.to_user();

    let late = clinic
        .service
        .book_appointment(&patient, clinic.request(MONDAY, "11:30"))
        .await
        .unwrap();
    let early = clinic
        .service
        .book_appointment(&patient, clinic.request(MONDAY, "09:00"))
        .await
        .unwrap();
    clinic
        .service
        .cancel_appointment(&patient, early.id, CancelAppointmentRequest::default())
        .await
        .unwrap();

    let listed = clinic
        .service
        .list_doctor_appointments(&doctor, clinic.doctor_id(), monday())
        .await
        .unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|appointment| appointment.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);
    assert_eq!(listed[0].status, AppointmentStatus::Cancelled);

    let result = clinic
        .service
        .list_doctor_appointments(&patient, clinic.doctor_id(), monday())
        .await;
    assert_matches!(result, Err(AppointmentError::Forbidden));
}
