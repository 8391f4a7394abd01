//! Business-day calendars and the calendar adjuster.
//!
//! A [`BusinessCalendar`] knows the weekends and public holidays of one
//! country (and optionally one region) and moves dates onto business days.
//! Holidays come from a [`HolidayProvider`], the external reference set.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::RangeInclusive;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::models::{GenerationWarning, Holiday};

use super::cycle_dates::month_end;

/// Largest number of business days [`BusinessCalendar::add_business_days`] moves.
pub const MAX_BUSINESS_DAY_OFFSET: u32 = 366;

/// Which way to move a date that is not a business day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustDirection {
    /// Move to the previous business day.
    #[default]
    Earlier,
    /// Move to the next business day.
    Later,
}

impl AdjustDirection {
    fn step(self) -> Duration {
        match self {
            AdjustDirection::Earlier => Duration::days(-1),
            AdjustDirection::Later => Duration::days(1),
        }
    }

    /// The neighbouring day of `date` in this direction.
    fn next(self, date: NaiveDate) -> EngineResult<NaiveDate> {
        date.checked_add_signed(self.step())
            .ok_or_else(|| EngineError::InvalidConfiguration {
                message: format!("No calendar day exists {} {}", self.preposition(), date),
            })
    }

    fn preposition(self) -> &'static str {
        match self {
            AdjustDirection::Earlier => "before",
            AdjustDirection::Later => "after",
        }
    }
}

/// Read-only lookup of public holidays.
///
/// Returns `None` when the provider has no data for the country in that
/// year, which callers treat as "weekends only" rather than as an error.
pub trait HolidayProvider: Send + Sync {
    /// Holidays of `country_code` falling in `year`.
    fn holidays_for_country(&self, country_code: &str, year: i32) -> Option<Vec<Holiday>>;
}

/// An in-memory holiday set keyed by upper-case country code.
///
/// A year counts as covered for a country once a holiday in that year is
/// inserted or the year is registered with [`HolidayTable::cover_year`].
///
/// # Example
///
/// ```
/// use payroll_engine::models::Holiday;
/// use payroll_engine::scheduling::{HolidayProvider, HolidayTable};
/// use chrono::NaiveDate;
///
/// let mut table = HolidayTable::new(vec![Holiday {
///     date: NaiveDate::from_ymd_opt(2025, 12, 25).unwrap(),
///     name: "Christmas Day".to_string(),
///     country_code: "AU".to_string(),
///     is_global: true,
///     regions: vec![],
/// }]);
///
/// assert_eq!(table.holidays_for_country("au", 2025).unwrap().len(), 1);
/// assert!(table.holidays_for_country("AU", 2026).is_none());
/// assert!(table.holidays_for_country("ZZ", 2025).is_none());
///
/// table.cover_year("AU", 2026);
/// assert!(table.holidays_for_country("AU", 2026).unwrap().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct HolidayTable {
    by_country: HashMap<String, Vec<Holiday>>,
    covered: HashMap<String, BTreeSet<i32>>,
}

impl HolidayTable {
    /// Builds a table from a flat list of holidays.
    pub fn new(holidays: Vec<Holiday>) -> Self {
        let mut table = Self::default();
        for holiday in holidays {
            table.insert(holiday);
        }
        table
    }

    /// Adds one holiday, covering its year for its country.
    pub fn insert(&mut self, holiday: Holiday) {
        let country = holiday.country_code.to_ascii_uppercase();
        self.covered
            .entry(country.clone())
            .or_default()
            .insert(holiday.date.year());
        self.by_country.entry(country).or_default().push(holiday);
    }

    /// Marks `year` as covered for `country_code`, even without holidays.
    pub fn cover_year(&mut self, country_code: &str, year: i32) {
        self.covered
            .entry(country_code.to_ascii_uppercase())
            .or_default()
            .insert(year);
    }

    /// Returns true if holiday data exists for `country_code` in `year`.
    pub fn covers(&self, country_code: &str, year: i32) -> bool {
        self.covered
            .get(&country_code.to_ascii_uppercase())
            .is_some_and(|years| years.contains(&year))
    }

    /// Number of holidays across all countries.
    pub fn len(&self) -> usize {
        self.by_country.values().map(Vec::len).sum()
    }

    /// Returns true if no holidays are loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HolidayProvider for HolidayTable {
    fn holidays_for_country(&self, country_code: &str, year: i32) -> Option<Vec<Holiday>> {
        if !self.covers(country_code, year) {
            return None;
        }
        let holidays = self
            .by_country
            .get(&country_code.to_ascii_uppercase())
            .map(|holidays| {
                holidays
                    .iter()
                    .filter(|h| h.date.year() == year)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Some(holidays)
    }
}

/// Weekends and holidays of one country and region over a span of years.
#[derive(Debug, Clone)]
pub struct BusinessCalendar {
    country: String,
    holidays: HashSet<NaiveDate>,
    covered_years: BTreeSet<i32>,
}

impl BusinessCalendar {
    /// A calendar that only skips Saturdays and Sundays.
    pub fn weekends_only(country: &str) -> Self {
        Self {
            country: country.to_string(),
            holidays: HashSet::new(),
            covered_years: BTreeSet::new(),
        }
    }

    /// Loads the holidays of `country`/`region` for every year in `years`.
    ///
    /// Years the provider has no data for fall back to weekend-only
    /// adjustment; [`BusinessCalendar::warning_for`] reports them. A country
    /// with no data in any year is logged as unknown.
    pub fn load(
        provider: &dyn HolidayProvider,
        country: &str,
        region: Option<&str>,
        years: RangeInclusive<i32>,
    ) -> Self {
        let mut calendar = Self::weekends_only(country);

        for year in years {
            if let Some(holidays) = provider.holidays_for_country(country, year) {
                calendar.covered_years.insert(year);
                calendar.holidays.extend(
                    holidays
                        .into_iter()
                        .filter(|h| h.applies_to(region))
                        .map(|h| h.date),
                );
            }
        }

        if calendar.covered_years.is_empty() {
            warn!(country = %country, "No holiday set for country; adjusting for weekends only");
        }
        calendar
    }

    /// The country this calendar was built for.
    pub fn country(&self) -> &str {
        &self.country
    }

    /// Whether holidays were found for the country in any loaded year.
    pub fn holidays_known(&self) -> bool {
        !self.covered_years.is_empty()
    }

    /// Whether holidays were loaded for `year`.
    pub fn covers(&self, year: i32) -> bool {
        self.covered_years.contains(&year)
    }

    /// The soft warning for results whose dates lie between `from` and `to`.
    ///
    /// An unknown country yields [`GenerationWarning::UnknownHolidayRegion`];
    /// a known country missing some of those years yields
    /// [`GenerationWarning::HolidayYearsMissing`], which is also logged.
    pub fn warning_for(&self, from: NaiveDate, to: NaiveDate) -> Option<GenerationWarning> {
        if !self.holidays_known() {
            return Some(GenerationWarning::UnknownHolidayRegion {
                country: self.country.clone(),
            });
        }

        let years: Vec<i32> = (from.min(to).year()..=from.max(to).year())
            .filter(|year| !self.covers(*year))
            .collect();
        if years.is_empty() {
            return None;
        }
        warn!(
            country = %self.country,
            years = ?years,
            "No holiday data for years; adjusting for weekends only"
        );
        Some(GenerationWarning::HolidayYearsMissing {
            country: self.country.clone(),
            years,
        })
    }

    /// Returns true if `date` is a loaded holiday.
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// Returns true if `date` is neither a weekend nor a holiday.
    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.is_holiday(date)
    }

    /// Moves `date` one day at a time in `direction` until it is a business day.
    ///
    /// Fails with [`EngineError::InvalidConfiguration`] if the search runs
    /// off the representable calendar.
    ///
    /// # Example
    ///
    /// ```
    /// use payroll_engine::scheduling::{AdjustDirection, BusinessCalendar};
    /// use chrono::NaiveDate;
    ///
    /// let calendar = BusinessCalendar::weekends_only("AU");
    /// // 2025-01-18 is a Saturday
    /// let saturday = NaiveDate::from_ymd_opt(2025, 1, 18).unwrap();
    /// assert_eq!(
    ///     calendar.adjust(saturday, AdjustDirection::Earlier)?,
    ///     NaiveDate::from_ymd_opt(2025, 1, 17).unwrap()
    /// );
    /// assert_eq!(
    ///     calendar.adjust(saturday, AdjustDirection::Later)?,
    ///     NaiveDate::from_ymd_opt(2025, 1, 20).unwrap()
    /// );
    /// # Ok::<(), payroll_engine::error::EngineError>(())
    /// ```
    pub fn adjust(&self, date: NaiveDate, direction: AdjustDirection) -> EngineResult<NaiveDate> {
        let mut current = date;
        while !self.is_business_day(current) {
            current = direction.next(current)?;
        }
        Ok(current)
    }

    /// Moves `days` business days away from `date` (backwards when negative).
    ///
    /// The starting date itself is not counted; zero returns `date` unchanged.
    /// At most [`MAX_BUSINESS_DAY_OFFSET`] days in either direction.
    pub fn add_business_days(&self, date: NaiveDate, days: i32) -> EngineResult<NaiveDate> {
        let mut remaining = days.unsigned_abs();
        if remaining > MAX_BUSINESS_DAY_OFFSET {
            return Err(EngineError::InvalidConfiguration {
                message: format!(
                    "Cannot move {} business days; the limit is {}",
                    days, MAX_BUSINESS_DAY_OFFSET
                ),
            });
        }

        let direction = if days < 0 {
            AdjustDirection::Earlier
        } else {
            AdjustDirection::Later
        };
        let mut current = date;
        while remaining > 0 {
            current = direction.next(current)?;
            if self.is_business_day(current) {
                remaining -= 1;
            }
        }
        Ok(current)
    }

    /// The `n`-th business day counting back from the end of `date`'s month.
    ///
    /// `n = 1` is the month's last business day. `n = 0` is treated as 1.
    pub fn nth_business_day_before_month_end(&self, date: NaiveDate, n: u32) -> EngineResult<NaiveDate> {
        let last = self.adjust(month_end(date), AdjustDirection::Earlier)?;
        let back = i32::try_from(n.saturating_sub(1)).unwrap_or(i32::MAX);
        self.add_business_days(last, -back)
    }
}

/// A date moved onto a business day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Adjustment {
    /// The date before adjustment.
    pub original: NaiveDate,
    /// The business day.
    pub date: NaiveDate,
    /// Set when holidays were unknown for the dates involved.
    pub warning: Option<GenerationWarning>,
}

/// Adjusts single dates against the holiday reference set.
#[derive(Clone)]
pub struct CalendarAdjuster {
    provider: Arc<dyn HolidayProvider>,
}

impl CalendarAdjuster {
    /// Creates an adjuster over `provider`.
    pub fn new(provider: Arc<dyn HolidayProvider>) -> Self {
        Self { provider }
    }

    /// Builds a calendar covering `years`.
    pub fn calendar(
        &self,
        country: &str,
        region: Option<&str>,
        years: RangeInclusive<i32>,
    ) -> BusinessCalendar {
        BusinessCalendar::load(self.provider.as_ref(), country, region, years)
    }

    /// Returns the nearest business day to `date` in `direction`.
    pub fn adjust(
        &self,
        date: NaiveDate,
        country: &str,
        region: Option<&str>,
        direction: AdjustDirection,
    ) -> EngineResult<Adjustment> {
        let calendar = self.calendar(country, region, date.year() - 1..=date.year() + 1);
        let adjusted = calendar.adjust(date, direction)?;
        Ok(Adjustment {
            original: date,
            date: adjusted,
            warning: calendar.warning_for(date, adjusted),
        })
    }
}

impl std::fmt::Debug for CalendarAdjuster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarAdjuster").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn make_date(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
    }

    fn holiday(date: &str, name: &str, country: &str) -> Holiday {
        Holiday {
            date: make_date(date),
            name: name.to_string(),
            country_code: country.to_string(),
            is_global: true,
            regions: vec![],
        }
    }

    fn au_table() -> HolidayTable {
        let mut table = HolidayTable::new(vec![
            holiday("2025-01-01", "New Year's Day", "AU"),
            holiday("2025-01-27", "Australia Day", "AU"),
            holiday("2025-12-25", "Christmas Day", "AU"),
            holiday("2025-12-26", "Boxing Day", "AU"),
        ]);
        table.insert(Holiday {
            date: make_date("2025-11-04"),
            name: "Melbourne Cup".to_string(),
            country_code: "AU".to_string(),
            is_global: false,
            regions: vec!["VIC".to_string()],
        });
        table
    }

    fn adjuster() -> CalendarAdjuster {
        CalendarAdjuster::new(Arc::new(au_table()))
    }

    #[test]
    fn test_saturday_moves_to_friday() {
        let result = adjuster().adjust(make_date("2025-01-18"), "AU", None, AdjustDirection::Earlier).unwrap();
        assert_eq!(result.date, make_date("2025-01-17"));
        assert!(result.warning.is_none());
    }

    #[test]
    fn test_business_day_is_unchanged() {
        let result = adjuster().adjust(make_date("2025-01-15"), "AU", None, AdjustDirection::Earlier).unwrap();
        assert_eq!(result.date, make_date("2025-01-15"));
    }

    #[test]
    fn test_holiday_moves_to_previous_business_day() {
        // Australia Day observed Monday 27th; Friday 24th is the previous business day
        let result = adjuster().adjust(make_date("2025-01-27"), "AU", None, AdjustDirection::Earlier).unwrap();
        assert_eq!(result.date, make_date("2025-01-24"));
    }

    #[test]
    fn test_consecutive_holidays_skipped() {
        let result = adjuster().adjust(make_date("2025-12-26"), "AU", None, AdjustDirection::Earlier).unwrap();
        assert_eq!(result.date, make_date("2025-12-24"));

        let result = adjuster().adjust(make_date("2025-12-25"), "AU", None, AdjustDirection::Later).unwrap();
        assert_eq!(result.date, make_date("2025-12-29"));
    }

    #[test]
    fn test_regional_holiday_only_applies_in_region() {
        let cup_day = make_date("2025-11-04");
        let vic = adjuster().adjust(cup_day, "AU", Some("VIC"), AdjustDirection::Earlier).unwrap();
        assert_eq!(vic.date, make_date("2025-11-03"));

        let nsw = adjuster().adjust(cup_day, "AU", Some("NSW"), AdjustDirection::Earlier).unwrap();
        assert_eq!(nsw.date, cup_day);
    }

    #[test]
    fn test_unknown_country_degrades_to_weekends_with_warning() {
        // 2025-01-01 is a holiday in AU but the country "ZZ" has no holiday set
        let result = adjuster().adjust(make_date("2025-01-01"), "ZZ", None, AdjustDirection::Earlier).unwrap();
        assert_eq!(result.date, make_date("2025-01-01"));
        assert_eq!(
            result.warning,
            Some(GenerationWarning::UnknownHolidayRegion {
                country: "ZZ".to_string()
            })
        );
    }

    #[test]
    fn test_country_lookup_is_case_insensitive() {
        let result = adjuster().adjust(make_date("2025-01-27"), "au", None, AdjustDirection::Earlier).unwrap();
        assert_eq!(result.date, make_date("2025-01-24"));
        assert!(result.warning.is_none());
    }

    #[test]
    fn test_add_business_days_backwards_skips_weekend() {
        let calendar = BusinessCalendar::weekends_only("AU");
        // Tuesday minus 2 business days is the previous Friday
        assert_eq!(
            calendar.add_business_days(make_date("2025-01-14"), -2).unwrap(),
            make_date("2025-01-10")
        );
        assert_eq!(
            calendar.add_business_days(make_date("2025-01-14"), 0).unwrap(),
            make_date("2025-01-14")
        );
        assert_eq!(
            calendar.add_business_days(make_date("2025-01-17"), 1).unwrap(),
            make_date("2025-01-20")
        );
    }

    #[test]
    fn test_nth_business_day_before_month_end() {
        let calendar = BusinessCalendar::load(&au_table(), "AU", None, 2025..=2025);
        // May 2025 ends on a Saturday
        assert_eq!(
            calendar.nth_business_day_before_month_end(make_date("2025-05-15"), 1).unwrap(),
            make_date("2025-05-30")
        );
        assert_eq!(
            calendar.nth_business_day_before_month_end(make_date("2025-05-15"), 2).unwrap(),
            make_date("2025-05-29")
        );
        // December: 31st Wednesday, 30th, 29th, then 26th/25th are holidays
        assert_eq!(
            calendar.nth_business_day_before_month_end(make_date("2025-12-01"), 4).unwrap(),
            make_date("2025-12-24")
        );
    }

    #[test]
    fn test_covered_year_without_holidays_is_known() {
        let mut table = HolidayTable::default();
        table.cover_year("NZ", 2025);
        let calendar = BusinessCalendar::load(&table, "NZ", None, 2025..=2025);
        assert!(calendar.holidays_known());
        assert!(calendar
            .warning_for(make_date("2025-01-01"), make_date("2025-12-31"))
            .is_none());
    }

    #[test]
    fn test_table_only_answers_for_covered_years() {
        let table = au_table();
        assert!(table.covers("au", 2025));
        assert!(!table.covers("AU", 2026));
        assert!(table.holidays_for_country("AU", 2026).is_none());
    }

    #[test]
    fn test_uncovered_year_keeps_other_years_holidays() {
        let calendar = BusinessCalendar::load(&au_table(), "AU", None, 2025..=2026);
        assert!(calendar.covers(2025));
        assert!(!calendar.covers(2026));
        assert_eq!(
            calendar.adjust(make_date("2025-12-25"), AdjustDirection::Earlier).unwrap(),
            make_date("2025-12-24")
        );
        assert!(calendar
            .warning_for(make_date("2025-01-01"), make_date("2025-12-31"))
            .is_none());
        assert_eq!(
            calendar.warning_for(make_date("2025-12-15"), make_date("2026-01-15")),
            Some(GenerationWarning::HolidayYearsMissing {
                country: "AU".to_string(),
                years: vec![2026],
            })
        );
    }

    #[test]
    fn test_adjusting_in_uncovered_year_warns() {
        // 2026-01-01 is a Thursday and no 2026 data is loaded for AU
        let result = adjuster()
            .adjust(make_date("2026-01-01"), "AU", None, AdjustDirection::Earlier)
            .unwrap();
        assert_eq!(result.date, make_date("2026-01-01"));
        assert_eq!(
            result.warning,
            Some(GenerationWarning::HolidayYearsMissing {
                country: "AU".to_string(),
                years: vec![2026],
            })
        );
    }

    #[test]
    fn test_stepping_past_calendar_bounds_fails() {
        let calendar = BusinessCalendar::weekends_only("AU");
        assert!(matches!(
            calendar.add_business_days(NaiveDate::MAX, 1),
            Err(EngineError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            calendar.add_business_days(NaiveDate::MIN, -1),
            Err(EngineError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_add_business_days_rejects_huge_offsets() {
        let calendar = BusinessCalendar::weekends_only("AU");
        let result = calendar.add_business_days(make_date("2025-01-14"), -200_000_000);
        assert!(matches!(result, Err(EngineError::InvalidConfiguration { .. })));
    }

    proptest! {
        #[test]
        fn prop_adjust_lands_on_nearest_business_day(
            offset in 0i64..3650,
            later in any::<bool>(),
        ) {
            let calendar = BusinessCalendar::load(&au_table(), "AU", None, 2024..=2035);
            let date = make_date("2025-01-01") + Duration::days(offset);
            let direction = if later { AdjustDirection::Later } else { AdjustDirection::Earlier };

            let adjusted = calendar.adjust(date, direction).unwrap();

            prop_assert!(calendar.is_business_day(adjusted));
            let mut day = date;
            while day != adjusted {
                prop_assert!(!calendar.is_business_day(day));
                day += direction.step();
            }
        }
    }
}
