use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone, Timelike};
use std::time::Duration;

/// Daily local-time interval `[start_hour, end_hour)` during which polling is
/// permitted. A window may span midnight (`start_hour > end_hour`); equal
/// hours describe a window that never opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessWindow {
    start_hour: u32,
    end_hour: u32,
}

impl Default for BusinessWindow {
    fn default() -> Self {
        Self::new(7, 22)
    }
}

impl BusinessWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour: start_hour.min(24),
            end_hour: end_hour.min(24),
        }
    }

    pub fn contains_hour(&self, hour: u32) -> bool {
        if self.start_hour == self.end_hour {
            false
        } else if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }

    pub fn is_open_at(&self, at: DateTime<Local>) -> bool {
        self.contains_hour(at.hour())
    }

    pub fn is_open_now(&self) -> bool {
        self.is_open_at(Local::now())
    }

    /// Next moment the window opens, strictly after `from` when currently
    /// closed; `from` itself when already open.
    pub fn next_open_at(&self, from: DateTime<Local>) -> DateTime<Local> {
        if self.is_open_at(from) {
            return from;
        }
        if self.start_hour >= 24 || self.start_hour == self.end_hour {
            // Window never opens; report the far end of the day repeatedly.
            return from + ChronoDuration::hours(24);
        }

        let mut candidate = from
            .date_naive()
            .and_hms_opt(self.start_hour, 0, 0)
            .unwrap_or(from.naive_local());
        if candidate <= from.naive_local() {
            candidate += ChronoDuration::days(1);
        }

        Local
            .from_local_datetime(&candidate)
            .earliest()
            .unwrap_or(from + ChronoDuration::hours(1))
    }

    /// How long until the window opens, zero when already open.
    pub fn time_until_open(&self, from: DateTime<Local>) -> Duration {
        let opens_at = self.next_open_at(from);
        (opens_at - from).to_std().unwrap_or(Duration::ZERO)
    }
}
