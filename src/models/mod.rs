//! Core data models for the payroll engine.
//!
//! This module contains all the domain models used throughout the engine.

mod assignment;
mod holiday;
mod outcome;
mod payroll;
mod payroll_date;
mod reference;

pub use assignment::{AssignmentChange, PayrollAssignment, PayrollAssignmentAudit};
pub use holiday::Holiday;
pub use outcome::{
    BatchFailure, BatchOutcome, GenerationOutcome, GenerationWarning, VersionHistoryEntry,
    VersionOutcome,
};
pub use payroll::{
    ConsultantTeam, NewPayroll, Payroll, PayrollChanges, PayrollStatus, VersionState,
};
pub use payroll_date::PayrollDate;
pub use reference::{AdjustmentRule, PayrollCycle, PayrollDateType};
