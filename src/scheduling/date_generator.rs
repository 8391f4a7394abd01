//! Payroll date planning.
//!
//! Turns a payroll version's schedule into planned EFT and processing dates
//! over a window. Planning is pure; persisting the plan is the engine's job.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::models::{GenerationWarning, Payroll};

use super::adjustment::AdjustmentRuleResolver;
use super::business_day::{AdjustDirection, CalendarAdjuster};
use super::cycle_dates::{CycleSchedule, raw_dates};

/// One date the generator intends to materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedDate {
    /// The cycle's date before adjustment.
    pub original_eft_date: NaiveDate,
    /// The business day money moves.
    pub adjusted_eft_date: NaiveDate,
    /// The processing deadline.
    pub processing_date: NaiveDate,
}

/// The planned dates of one payroll version over a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatePlan {
    /// The payroll version planned for.
    pub payroll_id: uuid::Uuid,
    /// Planned dates in ascending original-date order.
    pub dates: Vec<PlannedDate>,
    /// Whether `max_dates` cut the window short.
    pub truncated: bool,
    /// The first raw date left out when truncated.
    pub next_window_start: Option<NaiveDate>,
    /// Soft degradations encountered while planning.
    pub warnings: Vec<GenerationWarning>,
}

/// Plans payroll dates from cycle rules, adjustment rules and holidays.
#[derive(Debug, Clone)]
pub struct PayrollDateGenerator {
    adjuster: CalendarAdjuster,
    resolver: Arc<AdjustmentRuleResolver>,
}

impl PayrollDateGenerator {
    /// Creates a generator.
    pub fn new(adjuster: CalendarAdjuster, resolver: Arc<AdjustmentRuleResolver>) -> Self {
        Self { adjuster, resolver }
    }

    /// The calendar adjuster used for EFT and processing dates.
    pub fn adjuster(&self) -> &CalendarAdjuster {
        &self.adjuster
    }

    /// Plans at most `max_dates` dates for `payroll` in the inclusive window.
    ///
    /// The window never starts before the payroll's go-live date. When more
    /// raw dates exist, the plan is truncated and `next_window_start` tells
    /// the caller where to resume. A passed `deadline` aborts with
    /// [`EngineError::Timeout`]. Holiday gaps over the planned dates are
    /// reported as warnings.
    pub fn plan(
        &self,
        payroll: &Payroll,
        window_start: NaiveDate,
        window_end: NaiveDate,
        max_dates: usize,
        deadline: Option<Instant>,
    ) -> EngineResult<DatePlan> {
        if max_dates == 0 {
            return Err(EngineError::InvalidConfiguration {
                message: "max_dates must be at least 1".to_string(),
            });
        }

        CycleSchedule::validate_payroll(payroll)?;
        let schedule = CycleSchedule::for_payroll(payroll);
        let start = window_start.max(payroll.go_live_date);
        let mut raw: Vec<NaiveDate> = raw_dates(&schedule, start, window_end)?
            .take(max_dates.saturating_add(1))
            .collect();

        let truncated = raw.len() > max_dates;
        let next_window_start = if truncated { raw.get(max_dates).copied() } else { None };
        raw.truncate(max_dates);

        let mut plan = DatePlan {
            payroll_id: payroll.id,
            dates: Vec::with_capacity(raw.len()),
            truncated,
            next_window_start,
            warnings: Vec::new(),
        };

        let (Some(first), Some(last)) = (raw.first().copied(), raw.last().copied()) else {
            return Ok(plan);
        };

        let calendar = self.adjuster.calendar(
            &payroll.holiday_country,
            payroll.holiday_region.as_deref(),
            first.year() - 1..=last.year() + 1,
        );
        let resolved = self.resolver.resolve(payroll.cycle, payroll.date_type);

        let lead_days = i32::try_from(payroll.processing_days_before_eft).unwrap_or(i32::MAX);
        for original in raw {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(EngineError::Timeout {
                    operation: format!("plan dates for payroll {}", payroll.id),
                });
            }

            let adjusted = resolved.strategy.apply(original, &calendar)?;
            let processing = calendar.adjust(
                calendar.add_business_days(adjusted, -lead_days)?,
                AdjustDirection::Earlier,
            )?;
            plan.dates.push(PlannedDate {
                original_eft_date: original,
                adjusted_eft_date: adjusted,
                processing_date: processing,
            });
        }

        let earliest = plan.dates.iter().map(|d| d.processing_date).min().unwrap_or(first);
        let latest = plan
            .dates
            .iter()
            .map(|d| d.original_eft_date.max(d.adjusted_eft_date))
            .max()
            .unwrap_or(last);
        plan.warnings.extend(calendar.warning_for(earliest, latest));
        plan.warnings.extend(resolved.warning.clone());

        debug!(
            payroll_id = %payroll.id,
            planned = plan.dates.len(),
            truncated = plan.truncated,
            "Planned payroll dates"
        );
        Ok(plan)
    }
}
