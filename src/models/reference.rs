//! Immutable reference data: pay cycles, date types and adjustment rules.

use serde::{Deserialize, Serialize};

/// The recurrence pattern of a payroll.
///
/// # Example
///
/// ```
/// use payroll_engine::models::PayrollCycle;
///
/// let cycle: PayrollCycle = serde_json::from_str("\"biweekly\"").unwrap();
/// assert_eq!(cycle, PayrollCycle::Fortnightly);
/// assert_eq!(cycle.to_string(), "Fortnightly");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayrollCycle {
    /// Every week on a fixed weekday.
    Weekly,
    /// Every second week on a fixed weekday.
    #[serde(alias = "biweekly")]
    Fortnightly,
    /// Twice a month.
    #[serde(alias = "bi_monthly")]
    SemiMonthly,
    /// Once a month.
    Monthly,
    /// Once a quarter, in the last month of the quarter.
    Quarterly,
}

impl PayrollCycle {
    /// Returns true for cycles whose dates are expressed as a weekday.
    pub fn is_weekday_based(self) -> bool {
        matches!(self, PayrollCycle::Weekly | PayrollCycle::Fortnightly)
    }

    /// Step in days between consecutive dates for weekday-based cycles.
    pub fn step_days(self) -> Option<i64> {
        match self {
            PayrollCycle::Weekly => Some(7),
            PayrollCycle::Fortnightly => Some(14),
            _ => None,
        }
    }
}

impl std::fmt::Display for PayrollCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayrollCycle::Weekly => write!(f, "Weekly"),
            PayrollCycle::Fortnightly => write!(f, "Fortnightly"),
            PayrollCycle::SemiMonthly => write!(f, "SemiMonthly"),
            PayrollCycle::Monthly => write!(f, "Monthly"),
            PayrollCycle::Quarterly => write!(f, "Quarterly"),
        }
    }
}

/// How a due date is picked within a cycle period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayrollDateType {
    /// A fixed day: day-of-month for monthly cycles, weekday for weekly ones.
    #[serde(alias = "dom")]
    FixedDate,
    /// The last business day of the month.
    #[serde(alias = "eom")]
    LastBusinessDay,
    /// A fixed weekday (1 = Monday ..= 7 = Sunday).
    #[serde(alias = "dow")]
    DayOfWeek,
}

impl std::fmt::Display for PayrollDateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayrollDateType::FixedDate => write!(f, "FixedDate"),
            PayrollDateType::LastBusinessDay => write!(f, "LastBusinessDay"),
            PayrollDateType::DayOfWeek => write!(f, "DayOfWeek"),
        }
    }
}

/// A stored adjustment rule for one (cycle, date type) pair.
///
/// `rule_code` is the legacy free-text field; it is mapped onto
/// [`AdjustmentStrategy`](crate::scheduling::AdjustmentStrategy) when rules
/// are loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRule {
    /// The cycle this rule applies to.
    pub cycle: PayrollCycle,
    /// The date type this rule applies to.
    pub date_type: PayrollDateType,
    /// The stored rule expression.
    pub rule_code: String,
    /// Human-readable description shown to administrators.
    #[serde(default)]
    pub rule_description: String,
}
