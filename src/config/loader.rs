//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading the engine
//! configuration and its reference data from YAML files.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::models::AdjustmentRule;
use crate::scheduling::HolidayTable;

use super::types::{AdjustmentRulesConfig, EngineConfig, EngineSettings, HolidayFile};

/// Loads and provides access to engine configuration.
///
/// # Directory Structure
///
/// The configuration directory should have the following structure:
/// ```text
/// config/
/// ├── engine.yaml            # Defaults, generation bounds, server settings
/// ├── adjustment_rules.yaml  # Custom adjustment rules per cycle/date type
/// └── holidays/
///     ├── au.yaml            # One file per country
///     └── us.yaml
/// ```
///
/// # Example
///
/// ```no_run
/// use payroll_engine::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config")?;
/// println!("Default country: {}", loader.settings().defaults.holiday_country);
/// # Ok::<(), payroll_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: EngineConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// Returns an error if any required file is missing or contains invalid
    /// YAML, or if the holidays directory holds no holiday files.
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let settings = Self::load_yaml::<EngineSettings>(&path.join("engine.yaml"))?;
        let rules = Self::load_yaml::<AdjustmentRulesConfig>(&path.join("adjustment_rules.yaml"))?;
        let holidays = Self::load_holidays(&path.join("holidays"))?;

        info!(
            path = %path.display(),
            adjustment_rules = rules.rules.len(),
            holidays = holidays.len(),
            "Loaded engine configuration"
        );

        Ok(Self {
            config: EngineConfig::new(settings, rules.rules, holidays),
        })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Loads every holiday file from the holidays directory.
    fn load_holidays(holidays_dir: &Path) -> EngineResult<HolidayTable> {
        let dir_str = holidays_dir.display().to_string();

        let entries = fs::read_dir(holidays_dir).map_err(|_| EngineError::ConfigNotFound {
            path: dir_str.clone(),
        })?;

        let mut table = HolidayTable::default();
        let mut files = 0;

        for entry in entries {
            let entry = entry.map_err(|_| EngineError::ConfigNotFound {
                path: dir_str.clone(),
            })?;

            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "yaml") {
                let file = Self::load_yaml::<HolidayFile>(&path)?;
                for year in &file.years {
                    table.cover_year(&file.country_code, *year);
                }
                for holiday in file.into_holidays() {
                    table.insert(holiday);
                }
                files += 1;
            }
        }

        if files == 0 {
            return Err(EngineError::ConfigNotFound {
                path: format!("{} (no holiday files found)", dir_str),
            });
        }

        Ok(table)
    }

    /// Returns the underlying engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Consumes the loader, returning the configuration.
    pub fn into_config(self) -> EngineConfig {
        self.config
    }

    /// Returns the engine settings.
    pub fn settings(&self) -> &EngineSettings {
        self.config.settings()
    }

    /// Returns the stored adjustment rules.
    pub fn adjustment_rules(&self) -> &[AdjustmentRule] {
        self.config.adjustment_rules()
    }
}
