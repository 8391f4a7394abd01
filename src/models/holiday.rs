//! Public holiday model.
//!
//! Holidays are external reference data keyed by country. A holiday either
//! applies to the whole country (`is_global`) or to the listed regions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A public holiday observed in a country or some of its regions.
///
/// # Example
///
/// ```
/// use payroll_engine::models::Holiday;
/// use chrono::NaiveDate;
///
/// let holiday = Holiday {
///     date: NaiveDate::from_ymd_opt(2026, 1, 26).unwrap(),
///     name: "Australia Day".to_string(),
///     country_code: "AU".to_string(),
///     is_global: true,
///     regions: vec![],
/// };
/// assert!(holiday.applies_to(Some("VIC")));
/// assert!(holiday.applies_to(None));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    /// The date of the holiday.
    pub date: NaiveDate,
    /// The name of the holiday (e.g., "Australia Day").
    pub name: String,
    /// ISO country code the holiday belongs to.
    pub country_code: String,
    /// Whether the holiday is observed country-wide.
    #[serde(default)]
    pub is_global: bool,
    /// Regions observing the holiday when it is not global (e.g., "VIC").
    #[serde(default)]
    pub regions: Vec<String>,
}

impl Holiday {
    /// Checks whether this holiday is observed in `region`.
    ///
    /// Global holidays apply everywhere. Regional holidays apply only when a
    /// region is given and listed, compared case-insensitively.
    pub fn applies_to(&self, region: Option<&str>) -> bool {
        if self.is_global {
            return true;
        }
        match region {
            Some(region) => self.regions.iter().any(|r| r.eq_ignore_ascii_case(region)),
            None => false,
        }
    }
}
