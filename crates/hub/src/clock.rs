//! Time ports: wall clock and sunrise/sunset source.
//!
//! Every time-dependent computation in the services reads through these
//! seams, so tests can pin the clock and the sun schedule.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock, UTC.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for deterministic tests.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock lock poisoned") = now;
    }

    pub fn advance_seconds(&self, seconds: i64) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += chrono::Duration::seconds(seconds);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

// ---------------------------------------------------------------------------
// Sun times
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SunEvent {
    Sunrise,
    Sunset,
}

pub trait SunTimes: Send + Sync {
    fn sunrise(&self, date: NaiveDate) -> DateTime<Utc>;
    fn sunset(&self, date: NaiveDate) -> DateTime<Utc>;

    /// Daytime is the closed interval [sunrise, sunset].
    fn is_daytime(&self, at: DateTime<Utc>) -> bool {
        let date = at.date_naive();
        self.sunrise(date) <= at && at <= self.sunset(date)
    }
}

/// Fixed daily schedule. An astronomical adapter would implement the same
/// trait; the hub only needs "when does the sun rise/set today".
pub struct FixedSunTimes {
    sunrise: NaiveTime,
    sunset: NaiveTime,
}

impl FixedSunTimes {
    pub fn new(sunrise: NaiveTime, sunset: NaiveTime) -> Self {
        Self { sunrise, sunset }
    }
}

impl Default for FixedSunTimes {
    /// 07:00/19:00 UTC, the stock schedule.
    fn default() -> Self {
        Self {
            sunrise: NaiveTime::from_hms_opt(7, 0, 0).expect("valid time"),
            sunset: NaiveTime::from_hms_opt(19, 0, 0).expect("valid time"),
        }
    }
}

impl SunTimes for FixedSunTimes {
    fn sunrise(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(self.sunrise).and_utc()
    }

    fn sunset(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(self.sunset).and_utc()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
