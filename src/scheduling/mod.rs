//! Scheduling logic for the payroll engine.
//!
//! This module contains the pure date calculations: business-day calendars
//! and the calendar adjuster, raw cycle date calculation, adjustment rule
//! resolution, and payroll date planning. Nothing here touches storage.

mod adjustment;
mod business_day;
mod cycle_dates;
mod date_generator;

pub use adjustment::{AdjustmentRuleResolver, AdjustmentStrategy, ResolvedStrategy};
pub use business_day::{
    AdjustDirection, Adjustment, BusinessCalendar, CalendarAdjuster, HolidayProvider, HolidayTable,
    MAX_BUSINESS_DAY_OFFSET,
};
pub use cycle_dates::{
    CycleSchedule, MAX_PROCESSING_DAYS, RawDates, generate_raw_dates, raw_dates,
};
pub use date_generator::{DatePlan, PayrollDateGenerator, PlannedDate};
