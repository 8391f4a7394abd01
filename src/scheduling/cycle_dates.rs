//! Raw cycle date calculation.
//!
//! Produces the *original* due dates of a pay cycle over a window, before
//! any holiday or weekend adjustment. Nothing here consults holidays.

use std::collections::VecDeque;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::{EngineError, EngineResult};
use crate::models::{Payroll, PayrollCycle, PayrollDateType};

/// Longest accepted processing lead time, in business days.
pub const MAX_PROCESSING_DAYS: u32 = 60;

/// The schedule parameters that determine raw dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSchedule {
    /// Recurrence pattern.
    pub cycle: PayrollCycle,
    /// How the date within a cycle is chosen.
    pub date_type: PayrollDateType,
    /// Day of month or ISO weekday, depending on the date type.
    pub date_value: Option<u32>,
    /// Phase anchor for weekly and fortnightly cycles.
    pub anchor: NaiveDate,
}

impl CycleSchedule {
    /// The schedule of a payroll version, anchored on its go-live date.
    pub fn for_payroll(payroll: &Payroll) -> Self {
        Self {
            cycle: payroll.cycle,
            date_type: payroll.date_type,
            date_value: payroll.date_value,
            anchor: payroll.go_live_date,
        }
    }

    /// Checks that the cycle, date type and date value can produce dates.
    pub fn validate(&self) -> EngineResult<()> {
        self.pattern().map(|_| ())
    }

    /// Checks a payroll version's schedule and its processing lead time.
    pub fn validate_payroll(payroll: &Payroll) -> EngineResult<()> {
        if payroll.processing_days_before_eft > MAX_PROCESSING_DAYS {
            return Err(invalid(format!(
                "processing_days_before_eft must be at most {}, got {}",
                MAX_PROCESSING_DAYS, payroll.processing_days_before_eft
            )));
        }
        Self::for_payroll(payroll).validate()
    }

    fn pattern(&self) -> EngineResult<Pattern> {
        let cycle = self.cycle;
        let date_type = self.date_type;

        if let Some(step) = cycle.step_days() {
            if date_type == PayrollDateType::LastBusinessDay {
                return Err(invalid(format!(
                    "{} cycles cannot use the {} date type",
                    cycle, date_type
                )));
            }
            let weekday = self
                .date_value
                .and_then(iso_weekday)
                .ok_or_else(|| {
                    invalid(format!(
                        "{} cycles need a weekday between 1 and 7, got {:?}",
                        cycle, self.date_value
                    ))
                })?;
            return Ok(Pattern::Every {
                step: Duration::days(step),
                weekday,
            });
        }

        let quarterly = cycle == PayrollCycle::Quarterly;
        let picks = match date_type {
            PayrollDateType::DayOfWeek => {
                return Err(invalid(format!(
                    "{} cycles cannot use the {} date type",
                    cycle, date_type
                )));
            }
            PayrollDateType::LastBusinessDay if cycle == PayrollCycle::SemiMonthly => {
                vec![DayPick::Day(15), DayPick::MonthEnd]
            }
            PayrollDateType::LastBusinessDay => vec![DayPick::MonthEnd],
            PayrollDateType::FixedDate => {
                let max_day = if cycle == PayrollCycle::SemiMonthly { 15 } else { 31 };
                let day = self
                    .date_value
                    .filter(|d| (1..=max_day).contains(d))
                    .ok_or_else(|| {
                        invalid(format!(
                            "{} {} needs a day between 1 and {}, got {:?}",
                            cycle, date_type, max_day, self.date_value
                        ))
                    })?;
                if cycle == PayrollCycle::SemiMonthly {
                    vec![DayPick::Day(day), DayPick::Day(day + 15)]
                } else {
                    vec![DayPick::Day(day)]
                }
            }
        };

        Ok(Pattern::Monthly { picks, quarterly })
    }
}

fn invalid(message: String) -> EngineError {
    EngineError::InvalidConfiguration { message }
}

fn iso_weekday(value: u32) -> Option<Weekday> {
    match value {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

#[derive(Debug, Clone)]
enum Pattern {
    Every { step: Duration, weekday: Weekday },
    Monthly { picks: Vec<DayPick>, quarterly: bool },
}

#[derive(Debug, Clone, Copy)]
enum DayPick {
    Day(u32),
    MonthEnd,
}

/// Number of days in `month` of `year`.
fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next.0, next.1, 1)
        .and_then(|first| first.pred_opt())
        .map_or(31, |last| last.day())
}

/// The last calendar day of `date`'s month.
pub(crate) fn month_end(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(
        date.year(),
        date.month(),
        days_in_month(date.year(), date.month()),
    )
    .unwrap_or(date)
}

fn clamped_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day.min(days_in_month(year, month)))
}

/// Lazily yields the raw dates of a schedule within an inclusive window.
///
/// Dates come out in ascending order without duplicates.
#[derive(Debug, Clone)]
pub struct RawDates {
    pattern: Pattern,
    window_start: NaiveDate,
    window_end: NaiveDate,
    next_step_date: NaiveDate,
    month_cursor: (i32, u32),
    buffer: VecDeque<NaiveDate>,
    done: bool,
}

impl RawDates {
    fn new(schedule: &CycleSchedule, window_start: NaiveDate, window_end: NaiveDate) -> EngineResult<Self> {
        let pattern = schedule.pattern()?;

        let next_step_date = match &pattern {
            Pattern::Every { step, weekday } => {
                let anchor = schedule.anchor;
                let offset = (weekday.num_days_from_monday() + 7
                    - anchor.weekday().num_days_from_monday())
                    % 7;
                let step_days = step.num_days();
                anchor
                    .checked_add_signed(Duration::days(i64::from(offset)))
                    .and_then(|first| {
                        let behind = (window_start - first).num_days();
                        if behind > 0 {
                            let steps = (behind + step_days - 1) / step_days;
                            first.checked_add_signed(Duration::days(steps * step_days))
                        } else {
                            Some(first)
                        }
                    })
            }
            Pattern::Monthly { .. } => Some(window_start),
        };

        // No representable first date means the window yields nothing
        Ok(Self {
            pattern,
            window_start,
            window_end,
            next_step_date: next_step_date.unwrap_or(window_end),
            month_cursor: (window_start.year(), window_start.month()),
            buffer: VecDeque::new(),
            done: window_end < window_start || next_step_date.is_none(),
        })
    }

    fn fill_month(&mut self) {
        let (year, month) = self.month_cursor;
        self.month_cursor = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };

        let Pattern::Monthly { picks, quarterly } = &self.pattern else {
            return;
        };
        match NaiveDate::from_ymd_opt(year, month, 1) {
            Some(first) if first <= self.window_end => {}
            _ => {
                self.done = true;
                return;
            }
        }
        if *quarterly && month % 3 != 0 {
            return;
        }

        let mut dates: Vec<NaiveDate> = picks
            .iter()
            .filter_map(|pick| match pick {
                DayPick::Day(day) => clamped_day(year, month, *day),
                DayPick::MonthEnd => clamped_day(year, month, 31),
            })
            .collect();
        dates.sort();
        dates.dedup();
        self.buffer.extend(dates);
    }
}

impl Iterator for RawDates {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        loop {
            if let Some(date) = self.buffer.pop_front() {
                if date > self.window_end {
                    self.done = true;
                    self.buffer.clear();
                    return None;
                }
                if date >= self.window_start {
                    return Some(date);
                }
                continue;
            }
            if self.done {
                return None;
            }
            match self.pattern {
                Pattern::Every { step, .. } => {
                    let date = self.next_step_date;
                    if date > self.window_end {
                        self.done = true;
                        return None;
                    }
                    match date.checked_add_signed(step) {
                        Some(next) => self.next_step_date = next,
                        None => self.done = true,
                    }
                    if date >= self.window_start {
                        return Some(date);
                    }
                }
                Pattern::Monthly { .. } => self.fill_month(),
            }
        }
    }
}

/// Returns a lazy iterator over the raw dates of `schedule` in the window.
///
/// Fails with `InvalidConfiguration` when the schedule cannot produce dates.
pub fn raw_dates(
    schedule: &CycleSchedule,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> EngineResult<RawDates> {
    RawDates::new(schedule, window_start, window_end)
}

/// Collects every raw date of `schedule` within the inclusive window.
///
/// # Example
///
/// ```
/// use payroll_engine::models::{PayrollCycle, PayrollDateType};
/// use payroll_engine::scheduling::{CycleSchedule, generate_raw_dates};
/// use chrono::NaiveDate;
///
/// let schedule = CycleSchedule {
///     cycle: PayrollCycle::Monthly,
///     date_type: PayrollDateType::FixedDate,
///     date_value: Some(31),
///     anchor: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
/// };
/// let dates = generate_raw_dates(
///     &schedule,
///     NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
///     NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
/// )
/// .unwrap();
///
/// assert_eq!(dates, vec![
///     NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
///     NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
///     NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
/// ]);
/// ```
pub fn generate_raw_dates(
    schedule: &CycleSchedule,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> EngineResult<Vec<NaiveDate>> {
    Ok(raw_dates(schedule, window_start, window_end)?.collect())
}
