use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

/// Opaque identity key for the person booking — a phone number as received
/// from the transport, never validated or interpreted.
pub type Identity = String;

/// ISO calendar date format (`YYYY-MM-DD`) — the only date representation
/// that crosses the store boundary.
pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

pub fn format_date(date: Date) -> String {
    // Infallible for a valid Date with this format description.
    date.format(&DATE_FORMAT).unwrap_or_default()
}

pub fn parse_date(s: &str) -> Option<Date> {
    Date::parse(s, &DATE_FORMAT).ok()
}

/// Zero-padded `HH:MM` time-of-day label. Labels are a fixed per-day set,
/// not instants; ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeLabel {
    hour: u8,
    minute: u8,
}

impl TimeLabel {
    /// Parse a strict `HH:MM` token: two digits, colon, two digits,
    /// hour < 24, minute < 60. Anything else is not a time label.
    pub fn parse(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() != 5 || b[2] != b':' {
            return None;
        }
        if !(b[0].is_ascii_digit() && b[1].is_ascii_digit() && b[3].is_ascii_digit() && b[4].is_ascii_digit()) {
            return None;
        }
        let hour = (b[0] - b'0') * 10 + (b[1] - b'0');
        let minute = (b[3] - b'0') * 10 + (b[4] - b'0');
        if hour >= 24 || minute >= 60 {
            return None;
        }
        Some(Self { hour, minute })
    }
}

impl std::fmt::Display for TimeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// A bookable (date, time) unit with at most one occupant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub date: Date,
    pub time: TimeLabel,
    /// Phone number currently holding the slot; `None` = free.
    pub occupant: Option<Identity>,
}

impl Slot {
    pub fn is_free(&self) -> bool {
        self.occupant.is_none()
    }
}
