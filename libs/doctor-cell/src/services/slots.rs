use std::collections::{BTreeSet, HashSet};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tracing::debug;

use crate::models::{TimeInterval, WeeklySchedule};

/// Derives the bookable slot start times for one doctor on one date.
///
/// Pure and synchronous: the caller supplies the weekday template, the times
/// already held by active appointments and the clinic's current wall-clock time.
#[derive(Debug, Clone, Copy)]
pub struct SlotComputer {
    duration_minutes: u32,
}

impl SlotComputer {
    pub fn new(duration_minutes: u32) -> Self {
        Self { duration_minutes: duration_minutes.max(1) }
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Open slots for `date`, sorted ascending and de-duplicated.
    ///
    /// A missing template behaves like `is_available = false`. Inverted or empty
    /// working intervals contribute nothing. A candidate is dropped if it overlaps
    /// the break at all, is already booked, or does not start strictly after `now`.
    pub fn compute_open_slots(
        &self,
        schedule: Option<&WeeklySchedule>,
        booked_times: &HashSet<NaiveTime>,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Vec<NaiveTime> {
        let Some(schedule) = schedule else {
            debug!("No weekly schedule for {}, no slots", date);
            return Vec::new();
        };

        if !schedule.is_available || schedule.time_slots.is_empty() {
            return Vec::new();
        }

        let mut open = BTreeSet::new();

        for interval in &schedule.time_slots {
            for start in self.candidates(interval) {
                let end = start + self.duration_minutes;

                if let Some(break_time) = &schedule.break_time {
                    if start < minutes_of(break_time.end_time) && end > minutes_of(break_time.start_time) {
                        continue;
                    }
                }

                let Some(time) = time_of(start) else { continue };

                if booked_times.contains(&time) {
                    continue;
                }

                if date.and_time(time) <= now {
                    continue;
                }

                open.insert(time);
            }
        }

        open.into_iter().collect()
    }

    /// Candidate starts, in minutes since midnight, stepping by the slot duration
    /// from the interval start while the whole slot still fits before its end.
    fn candidates(&self, interval: &TimeInterval) -> impl Iterator<Item = u32> {
        let start = minutes_of(interval.start_time);
        let end = minutes_of(interval.end_time);
        let step = self.duration_minutes;

        (0..)
            .map(move |n: u32| start + n * step)
            .take_while(move |candidate| candidate + step <= end)
    }
}

fn minutes_of(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

fn time_of(minutes: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
}
