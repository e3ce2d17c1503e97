//! Wall-clock access for link-event timestamps
//!
//! Decoders never call the system clock directly; they go through a
//! [`Clock`] so that replays and tests can pin "now".

use chrono::{Duration, Local, NaiveDateTime};

/// Timestamp layout used for every link-event attribute (ISO-8601, whole seconds)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Source of the current local time
pub trait Clock {
    /// Current local wall time
    fn now(&self) -> NaiveDateTime;

    /// Local wall time `seconds` before now, `None` if out of range
    ///
    /// Fractional seconds are kept to the millisecond; truncation to whole
    /// seconds happens only in [`format_timestamp`].
    fn ago(&self, seconds: f64) -> Option<NaiveDateTime> {
        if !seconds.is_finite() {
            return None;
        }
        Duration::try_milliseconds((seconds * 1000.0) as i64)
            .and_then(|d| self.now().checked_sub_signed(d))
    }
}

/// Clock backed by the host's local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock frozen at a preset instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    instant: NaiveDateTime,
}

impl FixedClock {
    /// Create a clock that always reports `instant`
    pub fn new(instant: NaiveDateTime) -> Self {
        Self { instant }
    }

    /// Parse an instant in [`TIMESTAMP_FORMAT`]
    pub fn parse(text: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
            .ok()
            .map(Self::new)
    }

    /// Move the clock forward
    ///
    /// Returns `false` and leaves the clock untouched if the result would
    /// be out of range.
    pub fn advance(&mut self, seconds: i64) -> bool {
        match Duration::try_seconds(seconds).and_then(|d| self.instant.checked_add_signed(d)) {
            Some(instant) => {
                self.instant = instant;
                true
            }
            None => false,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.instant
    }
}

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SS`
pub fn format_timestamp(t: NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}
