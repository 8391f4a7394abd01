//! Payroll date generation and versioning engine
//!
//! This crate generates payroll pay dates from cycle rules, moves them onto
//! business days using holiday calendars, keeps an immutable version history
//! of each payroll's configuration, and tracks which consultant is
//! responsible for every pay date.

#![warn(missing_docs)]

pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod scheduling;
pub mod store;
