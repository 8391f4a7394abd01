//! Adjustment strategies and the rule resolver.
//!
//! Stored adjustment rules carry a free-text `rule_code`. It is parsed once,
//! when rules are loaded, into the closed [`AdjustmentStrategy`] set; stored
//! code is never executed.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{AdjustmentRule, GenerationWarning, PayrollCycle, PayrollDateType};

use crate::error::EngineResult;

use super::business_day::{AdjustDirection, BusinessCalendar};

/// Largest shift a rule code may ask for.
const MAX_RULE_SHIFT: u32 = 31;

/// How a raw cycle date becomes an EFT date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AdjustmentStrategy {
    /// Move to the nearest business day in the given direction.
    Calendar(AdjustDirection),
    /// Move to the previous business day, then `n` business days earlier.
    ShiftEarlierBusinessDays(u32),
    /// The `n`-th business day counting back from month end (1 = last).
    ShiftToNthBusinessDayBeforeMonthEnd(u32),
    /// An expression that is kept for reference but applied as the default.
    Custom(String),
}

impl Default for AdjustmentStrategy {
    fn default() -> Self {
        AdjustmentStrategy::Calendar(AdjustDirection::Earlier)
    }
}

impl AdjustmentStrategy {
    /// Maps a legacy `rule_code` onto a strategy.
    ///
    /// Unrecognised codes, and shifts of more than 31 business days, become
    /// [`AdjustmentStrategy::Custom`].
    ///
    /// # Example
    ///
    /// ```
    /// use payroll_engine::scheduling::{AdjustDirection, AdjustmentStrategy};
    ///
    /// assert_eq!(
    ///     AdjustmentStrategy::from_rule_code("Previous_Business_Day"),
    ///     AdjustmentStrategy::Calendar(AdjustDirection::Earlier)
    /// );
    /// assert_eq!(
    ///     AdjustmentStrategy::from_rule_code("nth_business_day_before_month_end(2)"),
    ///     AdjustmentStrategy::ShiftToNthBusinessDayBeforeMonthEnd(2)
    /// );
    /// assert!(matches!(
    ///     AdjustmentStrategy::from_rule_code("return date - 3"),
    ///     AdjustmentStrategy::Custom(_)
    /// ));
    /// ```
    pub fn from_rule_code(rule_code: &str) -> Self {
        let code = rule_code.trim().to_ascii_lowercase();
        match code.as_str() {
            "previous_business_day" | "earlier" | "before" => {
                return AdjustmentStrategy::Calendar(AdjustDirection::Earlier);
            }
            "next_business_day" | "later" | "after" => {
                return AdjustmentStrategy::Calendar(AdjustDirection::Later);
            }
            _ => {}
        }

        if let Some(n) = call_argument(&code, "shift_earlier_business_days").filter(|n| *n <= MAX_RULE_SHIFT) {
            return AdjustmentStrategy::ShiftEarlierBusinessDays(n);
        }
        if let Some(n) = call_argument(&code, "nth_business_day_before_month_end")
            .filter(|n| (1..=MAX_RULE_SHIFT).contains(n))
        {
            return AdjustmentStrategy::ShiftToNthBusinessDayBeforeMonthEnd(n);
        }

        AdjustmentStrategy::Custom(rule_code.trim().to_string())
    }

    /// Applies the strategy to `raw` using `calendar`.
    pub fn apply(&self, raw: NaiveDate, calendar: &BusinessCalendar) -> EngineResult<NaiveDate> {
        match self {
            AdjustmentStrategy::Calendar(direction) => calendar.adjust(raw, *direction),
            AdjustmentStrategy::ShiftEarlierBusinessDays(n) => {
                let adjusted = calendar.adjust(raw, AdjustDirection::Earlier)?;
                let back = i32::try_from(*n).unwrap_or(i32::MAX);
                calendar.add_business_days(adjusted, -back)
            }
            AdjustmentStrategy::ShiftToNthBusinessDayBeforeMonthEnd(n) => {
                calendar.nth_business_day_before_month_end(raw, *n)
            }
            AdjustmentStrategy::Custom(_) => AdjustmentStrategy::default().apply(raw, calendar),
        }
    }
}

/// Parses `name(N)` into `N`.
fn call_argument(code: &str, name: &str) -> Option<u32> {
    code.strip_prefix(name)?
        .trim()
        .strip_prefix('(')?
        .strip_suffix(')')?
        .trim()
        .parse()
        .ok()
}

/// The strategy chosen for a (cycle, date type) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStrategy {
    /// The strategy to apply.
    pub strategy: AdjustmentStrategy,
    /// Set when a custom rule was ignored in favour of the default.
    pub warning: Option<GenerationWarning>,
}

/// Looks up adjustment rules by their unique (cycle, date type) key.
///
/// # Example
///
/// ```
/// use payroll_engine::models::{AdjustmentRule, PayrollCycle, PayrollDateType};
/// use payroll_engine::scheduling::{AdjustmentRuleResolver, AdjustmentStrategy};
///
/// let resolver = AdjustmentRuleResolver::new(vec![AdjustmentRule {
///     cycle: PayrollCycle::Monthly,
///     date_type: PayrollDateType::LastBusinessDay,
///     rule_code: "nth_business_day_before_month_end(2)".to_string(),
///     rule_description: "Second last business day".to_string(),
/// }]);
///
/// let resolved = resolver.resolve(PayrollCycle::Monthly, PayrollDateType::LastBusinessDay);
/// assert_eq!(resolved.strategy, AdjustmentStrategy::ShiftToNthBusinessDayBeforeMonthEnd(2));
///
/// let resolved = resolver.resolve(PayrollCycle::Weekly, PayrollDateType::DayOfWeek);
/// assert_eq!(resolved.strategy, AdjustmentStrategy::default());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AdjustmentRuleResolver {
    rules: HashMap<(PayrollCycle, PayrollDateType), (AdjustmentRule, AdjustmentStrategy)>,
}

impl AdjustmentRuleResolver {
    /// Builds a resolver, mapping each rule's code onto a strategy.
    ///
    /// A later rule for the same (cycle, date type) pair replaces an earlier one.
    pub fn new(rules: Vec<AdjustmentRule>) -> Self {
        let mut resolver = Self::default();
        for rule in rules {
            let strategy = AdjustmentStrategy::from_rule_code(&rule.rule_code);
            if let AdjustmentStrategy::Custom(expression) = &strategy {
                warn!(
                    cycle = %rule.cycle,
                    date_type = %rule.date_type,
                    expression = %expression,
                    "Adjustment rule code not recognised; default adjustment will apply"
                );
            }
            if resolver
                .rules
                .insert((rule.cycle, rule.date_type), (rule.clone(), strategy))
                .is_some()
            {
                warn!(
                    cycle = %rule.cycle,
                    date_type = %rule.date_type,
                    "Duplicate adjustment rule replaced an earlier one"
                );
            }
        }
        resolver
    }

    /// The stored rule for a pair, if any.
    pub fn rule(&self, cycle: PayrollCycle, date_type: PayrollDateType) -> Option<&AdjustmentRule> {
        self.rules.get(&(cycle, date_type)).map(|(rule, _)| rule)
    }

    /// Number of loaded rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no rules are loaded.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Resolves the strategy for a pair, falling back to the default.
    pub fn resolve(&self, cycle: PayrollCycle, date_type: PayrollDateType) -> ResolvedStrategy {
        match self.rules.get(&(cycle, date_type)) {
            Some((_, AdjustmentStrategy::Custom(expression))) => ResolvedStrategy {
                strategy: AdjustmentStrategy::Custom(expression.clone()),
                warning: Some(GenerationWarning::CustomRuleIgnored {
                    cycle,
                    date_type,
                    expression: expression.clone(),
                }),
            },
            Some((_, strategy)) => {
                debug!(cycle = %cycle, date_type = %date_type, ?strategy, "Using custom adjustment rule");
                ResolvedStrategy {
                    strategy: strategy.clone(),
                    warning: None,
                }
            }
            None => ResolvedStrategy {
                strategy: AdjustmentStrategy::default(),
                warning: None,
            },
        }
    }
}
