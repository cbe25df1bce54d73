use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use shared_utils::time::{hhmm, parse_hhmm};

// ==============================================================================
// WEEKLY SCHEDULE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = ScheduleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        DayOfWeek::ALL
            .into_iter()
            .find(|day| day.as_str() == lowered)
            .ok_or_else(|| ScheduleError::InvalidRequest(format!("Unknown day of week '{}'", value)))
    }
}

/// Half-open `[start_time, end_time)` interval on the clinic's wall clock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeInterval {
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

impl TimeInterval {
    pub fn new(start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self { start_time, end_time }
    }

    pub fn is_well_formed(&self) -> bool {
        self.start_time < self.end_time
    }
}

/// Recurring template for one doctor on one weekday, unique on `(doctor_id, day_of_week)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklySchedule {
    pub doctor_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub is_available: bool,
    #[serde(default)]
    pub time_slots: Vec<TimeInterval>,
    pub break_time: Option<TimeInterval>,
    pub notes: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WeeklySchedule {
    /// Base row for a weekday the doctor has not configured yet. It yields no
    /// slots until working hours are supplied.
    pub fn new(doctor_id: Uuid, day_of_week: DayOfWeek) -> Self {
        Self {
            doctor_id,
            day_of_week,
            is_available: true,
            time_slots: Vec::new(),
            break_time: None,
            notes: None,
            updated_at: None,
        }
    }
}

/// Validated columns for one schedule write. `None` leaves the stored value as
/// it is; `break_time: Some(None)` clears the break.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleUpdate {
    pub is_available: Option<bool>,
    pub time_slots: Option<Vec<TimeInterval>>,
    pub break_time: Option<Option<TimeInterval>>,
    pub notes: Option<String>,
}

impl ScheduleUpdate {
    pub fn apply_to(self, schedule: &mut WeeklySchedule) {
        if let Some(is_available) = self.is_available {
            schedule.is_available = is_available;
        }
        if let Some(time_slots) = self.time_slots {
            schedule.time_slots = time_slots;
        }
        if let Some(break_time) = self.break_time {
            schedule.break_time = break_time;
        }
        if let Some(notes) = self.notes {
            schedule.notes = Some(notes);
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalInput {
    pub start_time: String,
    pub end_time: String,
}

impl IntervalInput {
    pub fn validate(&self) -> Result<TimeInterval, ScheduleError> {
        let start_time = parse_hhmm(&self.start_time).ok_or_else(|| {
            ScheduleError::InvalidRequest(format!("Invalid start_time '{}', expected HH:MM", self.start_time))
        })?;
        let end_time = parse_hhmm(&self.end_time).ok_or_else(|| {
            ScheduleError::InvalidRequest(format!("Invalid end_time '{}', expected HH:MM", self.end_time))
        })?;

        let interval = TimeInterval::new(start_time, end_time);
        if !interval.is_well_formed() {
            return Err(ScheduleError::InvalidRequest(format!(
                "Interval {}-{} must start before it ends",
                self.start_time, self.end_time
            )));
        }
        Ok(interval)
    }
}

/// Fields supplied by an upsert. Absent fields keep their stored value;
/// `"break_time": null` clears the break.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpsertScheduleRequest {
    pub is_available: Option<bool>,
    pub time_slots: Option<Vec<IntervalInput>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub break_time: Option<Option<IntervalInput>>,
    pub notes: Option<String>,
}

impl UpsertScheduleRequest {
    /// Parses the supplied intervals, leaving absent fields absent.
    pub fn validate(self) -> Result<ScheduleUpdate, ScheduleError> {
        let time_slots = self.time_slots
            .map(|slots| slots.iter().map(IntervalInput::validate).collect::<Result<Vec<_>, _>>())
            .transpose()?;

        let break_time = match self.break_time {
            Some(Some(input)) => Some(Some(input.validate()?)),
            Some(None) => Some(None),
            None => None,
        };

        Ok(ScheduleUpdate {
            is_available: self.is_available,
            time_slots,
            break_time,
            notes: self.notes,
        })
    }
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyScheduleResponse {
    pub doctor_id: Uuid,
    pub days: Vec<WeeklySchedule>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Schedule not found")]
    NotFound,

    #[error("Not authorized to manage this doctor's schedule")]
    Forbidden,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<ScheduleError> for shared_models::error::AppError {
    fn from(error: ScheduleError) -> Self {
        use shared_models::error::AppError;

        let message = error.to_string();
        match error {
            ScheduleError::InvalidRequest(msg) => AppError::BadRequest(msg),
            ScheduleError::NotFound => AppError::NotFound(message),
            ScheduleError::Forbidden => AppError::Forbidden(message),
            ScheduleError::Storage(msg) => AppError::Database(msg),
        }
    }
}
