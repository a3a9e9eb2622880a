use time::{Date, OffsetDateTime};

use crate::model::TimeLabel;

/// The fixed daily slot set, from the reference calendar.
const DEFAULT_TIMES: &[&str] = &["10:00", "11:00", "14:00", "15:00"];

/// Which date is open for booking and which labels a day carries.
/// The calendar is a single resource with one bookable day: tomorrow.
#[derive(Debug, Clone)]
pub struct SlotPolicy {
    pub times: Vec<TimeLabel>,
}

impl Default for SlotPolicy {
    fn default() -> Self {
        Self {
            times: DEFAULT_TIMES
                .iter()
                .map(|s| TimeLabel::parse(s).unwrap())
                .collect(),
        }
    }
}

impl SlotPolicy {
    /// Parse a comma-separated list of HH:MM labels (`SLOTLINE_SLOT_TIMES`).
    /// Rejects the whole list on any bad token so a typo doesn't silently
    /// shrink the schedule.
    pub fn from_spec(spec: &str) -> Option<Self> {
        let mut times = Vec::new();
        for token in spec.split(',') {
            times.push(TimeLabel::parse(token.trim())?);
        }
        if times.is_empty() {
            return None;
        }
        Some(Self { times })
    }

    /// The date currently open for booking.
    pub fn bookable_date(&self) -> Date {
        let today = OffsetDateTime::now_utc().date();
        today.next_day().unwrap_or(today)
    }
}
