//! Injectable wall-clock source.
//!
//! Every day-boundary decision (order retention dates, EOD rollover,
//! cross-day detection) goes through [`Clock`] so the logic stays
//! testable without real wall-clock dependencies.

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current UTC calendar date.
    fn today_utc(&self) -> NaiveDate {
        self.now_utc().date_naive()
    }
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replay tooling.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Clock frozen at the given instant.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Moves the clock to a new instant.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_advances_on_set() {
        let start = "2026-03-01T23:59:00Z".parse::<DateTime<Utc>>().unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.today_utc(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());

        clock.set("2026-03-02T00:01:00Z".parse().unwrap());
        assert_eq!(clock.today_utc(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }
}
