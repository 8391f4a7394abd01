//! Configuration loading and management for the payroll engine.
//!
//! This module loads engine settings, adjustment rules and the holiday
//! reference set from YAML files.
//!
//! # Example
//!
//! ```no_run
//! use payroll_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config").unwrap();
//! println!("Horizon: {} days", config.settings().generation.horizon_days);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    AdjustmentRulesConfig, EngineConfig, EngineSettings, GenerationSettings, HolidayEntry,
    HolidayFile, PayrollDefaults, ServerSettings,
};
