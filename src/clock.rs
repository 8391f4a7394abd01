//! Time source for the engine.
//!
//! Version transitions stamp `created_at`/`superseded_date` and activation
//! windows start at "today", so the engine reads time through [`Clock`]
//! rather than calling `Utc::now()` directly.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, NaiveDate, Utc};

/// Abstracts the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// The current UTC calendar date.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// # Example
///
/// ```
/// use payroll_engine::clock::{Clock, FixedClock};
/// use chrono::NaiveDate;
///
/// let clock = FixedClock::on(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
/// assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
///
/// clock.set_date(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
/// assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
/// ```
#[derive(Debug)]
pub struct FixedClock {
    time: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    /// A clock fixed at `time`.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: RwLock::new(time),
        }
    }

    /// A clock fixed at midnight UTC on `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    /// Moves the clock to `time`.
    pub fn set(&self, time: DateTime<Utc>) {
        *self.time.write().unwrap_or_else(PoisonError::into_inner) = time;
    }

    /// Moves the clock to midnight UTC on `date`.
    pub fn set_date(&self, date: NaiveDate) {
        self.set(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.read().unwrap_or_else(PoisonError::into_inner)
    }
}
