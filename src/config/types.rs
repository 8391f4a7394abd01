//! Configuration types for the payroll engine.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{AdjustmentRule, Holiday};
use crate::scheduling::HolidayTable;

/// Defaults applied to new payrolls that do not specify a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollDefaults {
    /// Country whose holidays govern adjustment.
    pub holiday_country: String,
    /// Optional region within the country.
    #[serde(default)]
    pub holiday_region: Option<String>,
    /// Business days between processing and the EFT date.
    pub processing_days_before_eft: u32,
}

impl Default for PayrollDefaults {
    fn default() -> Self {
        Self {
            holiday_country: "AU".to_string(),
            holiday_region: None,
            processing_days_before_eft: 2,
        }
    }
}

/// Bounds on date generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// How far past today (or go-live, if later) activation generates dates.
    pub horizon_days: u32,
    /// Upper bound on dates produced by one generation call.
    pub max_dates_per_request: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            horizon_days: 365,
            max_dates_per_request: 500,
        }
    }
}

/// HTTP adapter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address to bind, e.g. "127.0.0.1:3000".
    pub bind_addr: String,
    /// Wall-clock budget for one request's planning work.
    pub request_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

/// Contents of `engine.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Payroll defaults.
    #[serde(default)]
    pub defaults: PayrollDefaults,
    /// Generation bounds.
    #[serde(default)]
    pub generation: GenerationSettings,
    /// HTTP adapter settings.
    #[serde(default)]
    pub server: ServerSettings,
}

/// Contents of `adjustment_rules.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AdjustmentRulesConfig {
    /// The stored rules.
    #[serde(default)]
    pub rules: Vec<AdjustmentRule>,
}

/// One holiday entry in a holiday file.
#[derive(Debug, Clone, Deserialize)]
pub struct HolidayEntry {
    /// The date of the holiday.
    pub date: NaiveDate,
    /// The holiday's name.
    pub name: String,
    /// Regions observing the holiday; empty means country-wide.
    #[serde(default)]
    pub regions: Vec<String>,
}

/// Contents of one `holidays/*.yaml` file.
#[derive(Debug, Clone, Deserialize)]
pub struct HolidayFile {
    /// ISO country code every entry belongs to.
    pub country_code: String,
    /// Years the file covers even if they list no holidays. Years of the
    /// listed holidays are always covered.
    #[serde(default)]
    pub years: Vec<i32>,
    /// The country's holidays.
    #[serde(default)]
    pub holidays: Vec<HolidayEntry>,
}

impl HolidayFile {
    /// Converts the file's entries into holidays.
    pub fn into_holidays(self) -> Vec<Holiday> {
        let country_code = self.country_code;
        self.holidays
            .into_iter()
            .map(|entry| Holiday {
                date: entry.date,
                name: entry.name,
                country_code: country_code.clone(),
                is_global: entry.regions.is_empty(),
                regions: entry.regions,
            })
            .collect()
    }
}

/// The complete engine configuration loaded from a directory.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    settings: EngineSettings,
    adjustment_rules: Vec<AdjustmentRule>,
    holidays: Arc<HolidayTable>,
}

impl EngineConfig {
    /// Creates a configuration from its component parts.
    pub fn new(
        settings: EngineSettings,
        adjustment_rules: Vec<AdjustmentRule>,
        holidays: HolidayTable,
    ) -> Self {
        Self {
            settings,
            adjustment_rules,
            holidays: Arc::new(holidays),
        }
    }

    /// Returns the engine settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns the stored adjustment rules.
    pub fn adjustment_rules(&self) -> &[AdjustmentRule] {
        &self.adjustment_rules
    }

    /// Returns the holiday reference set.
    pub fn holidays(&self) -> Arc<HolidayTable> {
        Arc::clone(&self.holidays)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(EngineSettings::default(), Vec::new(), HolidayTable::default())
    }
}
