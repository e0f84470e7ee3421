//! Weekly recurrence rule used to pick delivery times for queued posts

use time::{Duration, OffsetDateTime, UtcOffset, Weekday};

/// Publication slot: an hour of day (UTC) on a set of weekdays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSlot {
    pub hour: u8,
    pub weekdays: Vec<Weekday>,
}

impl ScheduleSlot {
    pub fn new(hour: u8, weekdays: Vec<Weekday>) -> Self {
        Self { hour, weekdays }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Schedule has no slots")]
    Empty,
    #[error("Slot at hour {0} has no weekdays")]
    NoWeekdays(u8),
    #[error("Invalid hour {0}: must be 0-23")]
    InvalidHour(u8),
    #[error("Invalid weekday '{0}'")]
    InvalidWeekday(String),
}

/// A fixed weekly recurrence rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklySchedule {
    slots: Vec<ScheduleSlot>,
}

impl WeeklySchedule {
    pub fn new(slots: Vec<ScheduleSlot>) -> Result<Self, ScheduleError> {
        if let Some(slot) = slots.iter().find(|s| s.hour > 23) {
            return Err(ScheduleError::InvalidHour(slot.hour));
        }
        if slots.is_empty() {
            return Err(ScheduleError::Empty);
        }
        if let Some(slot) = slots.iter().find(|s| s.weekdays.is_empty()) {
            return Err(ScheduleError::NoWeekdays(slot.hour));
        }
        Ok(Self { slots })
    }

    pub fn slots(&self) -> &[ScheduleSlot] {
        &self.slots
    }

    /// Soonest slot occurrence strictly after `now`.
    ///
    /// Scans today and the next seven days, so a slot on today's weekday
    /// whose hour has passed rolls over to next week.
    pub fn next_after(&self, now: OffsetDateTime) -> OffsetDateTime {
        let now_utc = now.to_offset(UtcOffset::UTC);
        let today = now_utc.date();

        (0..=7)
            .filter_map(|offset| today.checked_add(Duration::days(offset)))
            .flat_map(|day| {
                self.slots
                    .iter()
                    .filter(move |slot| slot.weekdays.contains(&day.weekday()))
                    .filter_map(move |slot| day.with_hms(slot.hour, 0, 0).ok())
            })
            .map(|candidate| candidate.assume_utc())
            .filter(|candidate| *candidate > now_utc)
            .min()
            .expect("validated schedule has a slot within eight days")
    }
}

impl Default for WeeklySchedule {
    fn default() -> Self {
        Self {
            slots: vec![
                ScheduleSlot::new(13, vec![Weekday::Tuesday, Weekday::Thursday]),
                ScheduleSlot::new(15, vec![Weekday::Saturday]),
            ],
        }
    }
}

/// Parse a weekday name ("tue", "Tuesday", ...)
pub fn parse_weekday(name: &str) -> Result<Weekday, ScheduleError> {
    let lower = name.trim().to_lowercase();
    let weekday = match lower.get(..3) {
        Some("mon") => Weekday::Monday,
        Some("tue") => Weekday::Tuesday,
        Some("wed") => Weekday::Wednesday,
        Some("thu") => Weekday::Thursday,
        Some("fri") => Weekday::Friday,
        Some("sat") => Weekday::Saturday,
        Some("sun") => Weekday::Sunday,
        _ => return Err(ScheduleError::InvalidWeekday(name.to_string())),
    };
    Ok(weekday)
}
