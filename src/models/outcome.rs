//! Results returned by engine operations.
//!
//! Outcomes separate hard failure (an `Err`), partial success (a
//! [`BatchOutcome`] with failures) and soft degradation (warnings attached to
//! an otherwise successful result).

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{Payroll, PayrollCycle, PayrollDate, PayrollDateType, VersionState};
use crate::error::EngineError;

/// A condition that degraded an operation without failing it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum GenerationWarning {
    /// No holiday set exists for the country; only weekends were skipped.
    UnknownHolidayRegion {
        /// The country code that had no holiday set.
        country: String,
    },
    /// The country is known but has no holiday data for some years the
    /// dates fall in; those years only skipped weekends.
    HolidayYearsMissing {
        /// The country code.
        country: String,
        /// Years without holiday data, ascending.
        years: Vec<i32>,
    },
    /// A custom rule expression was not executed; the default rule applied.
    CustomRuleIgnored {
        /// Cycle of the rule.
        cycle: PayrollCycle,
        /// Date type of the rule.
        date_type: PayrollDateType,
        /// The stored expression.
        expression: String,
    },
}

impl std::fmt::Display for GenerationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationWarning::UnknownHolidayRegion { country } => {
                write!(f, "No holidays known for '{}'; adjusted for weekends only", country)
            }
            GenerationWarning::HolidayYearsMissing { country, years } => {
                let years: Vec<String> = years.iter().map(i32::to_string).collect();
                write!(
                    f,
                    "No holidays loaded for '{}' in {}; adjusted for weekends only",
                    country,
                    years.join(", ")
                )
            }
            GenerationWarning::CustomRuleIgnored {
                cycle,
                date_type,
                expression,
            } => write!(
                f,
                "Custom rule '{}' for {}/{} ignored; default adjustment applied",
                expression, cycle, date_type
            ),
        }
    }
}

/// The result of generating dates for a payroll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationOutcome {
    /// The payroll version the dates belong to.
    pub payroll_id: Uuid,
    /// Rows for every planned date, new and pre-existing, by original date.
    pub dates: Vec<PayrollDate>,
    /// How many rows were inserted.
    pub created: usize,
    /// How many planned dates already existed.
    pub skipped: usize,
    /// Whether `max_dates` cut the window short.
    pub truncated: bool,
    /// Where the next page starts when truncated.
    pub next_window_start: Option<NaiveDate>,
    /// Soft degradations encountered.
    pub warnings: Vec<GenerationWarning>,
}

/// The result of making a version current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionOutcome {
    /// The version that is now current.
    pub payroll: Payroll,
    /// The version it replaced, as stored after supersession.
    pub superseded: Option<Payroll>,
    /// Dates generated for the new version, when the schedule was regenerated.
    pub generation: Option<GenerationOutcome>,
    /// Dates of the previous version on or after the go-live date that were replaced.
    pub removed_dates: usize,
    /// Explicit reassignments carried over to the new version's dates.
    pub carried_forward: usize,
}

/// One entry of a payroll family's version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionHistoryEntry {
    /// Identity of the version.
    pub payroll_id: Uuid,
    /// Position in the family.
    pub version_number: u32,
    /// Whether this is the family's current version.
    pub is_current: bool,
    /// Lifecycle state.
    pub state: VersionState,
    /// When the version's schedule takes effect.
    pub go_live_date: NaiveDate,
    /// When the version was superseded.
    pub superseded_date: Option<DateTime<Utc>>,
    /// The version this one replaced.
    pub parent_payroll_id: Option<Uuid>,
    /// Why the version was created.
    pub version_reason: Option<String>,
    /// Who created the version.
    pub created_by_user_id: Uuid,
    /// When the version was created.
    pub created_at: DateTime<Utc>,
}

impl From<&Payroll> for VersionHistoryEntry {
    fn from(payroll: &Payroll) -> Self {
        VersionHistoryEntry {
            payroll_id: payroll.id,
            version_number: payroll.version_number,
            is_current: payroll.is_current(),
            state: payroll.version_state,
            go_live_date: payroll.go_live_date,
            superseded_date: payroll.superseded_date,
            parent_payroll_id: payroll.parent_payroll_id,
            version_reason: payroll.version_reason.clone(),
            created_by_user_id: payroll.created_by_user_id,
            created_at: payroll.created_at,
        }
    }
}

/// A batch item that failed, with the input that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure<I> {
    /// The rejected input.
    pub input: I,
    /// Why it was rejected.
    pub error: EngineError,
}

/// The result of a batch operation whose items succeed or fail independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome<T, I> {
    /// Items that were applied.
    pub applied: Vec<T>,
    /// Items that were rejected.
    pub failed: Vec<BatchFailure<I>>,
}

impl<T, I> Default for BatchOutcome<T, I> {
    fn default() -> Self {
        Self {
            applied: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T, I> BatchOutcome<T, I> {
    /// Returns true if every item was applied.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Returns true if nothing was applied and something failed.
    pub fn is_total_failure(&self) -> bool {
        self.applied.is_empty() && !self.failed.is_empty()
    }
}
