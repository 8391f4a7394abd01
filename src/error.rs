//! Error types for the payroll engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for every failure the scheduling and versioning operations can report.

use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// The main error type for the payroll engine.
///
/// All fallible operations return this error type. Soft conditions such as
/// truncated generation or unknown holiday regions are not errors; they are
/// reported on the operation's outcome instead.
///
/// # Example
///
/// ```
/// use payroll_engine::error::EngineError;
///
/// let error = EngineError::ConfigNotFound {
///     path: "/missing/engine.yaml".to_string(),
/// };
/// assert_eq!(error.to_string(), "Configuration file not found: /missing/engine.yaml");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// The cycle, date type and date value cannot produce a date.
    #[error("Invalid payroll configuration: {message}")]
    InvalidConfiguration {
        /// A description of what made the configuration invalid.
        message: String,
    },

    /// A payroll family does not have exactly one current version.
    #[error("Versioning invariant violated for payroll family {family_id}: {current_count} current versions")]
    VersioningInvariantViolation {
        /// The root payroll id of the family.
        family_id: Uuid,
        /// How many current versions were found.
        current_count: usize,
    },

    /// A payroll date with the same original EFT date already exists.
    #[error("Payroll {payroll_id} already has a date for {original_eft_date}")]
    DuplicateDate {
        /// The payroll version that owns the existing row.
        payroll_id: Uuid,
        /// The original EFT date that collided.
        original_eft_date: NaiveDate,
    },

    /// Another change in the same batch already targets this payroll date.
    #[error("Payroll date {payroll_date_id} already has a pending change in this batch")]
    AssignmentConflict {
        /// The payroll date targeted twice.
        payroll_date_id: Uuid,
    },

    /// The caller's view of the current assignee is out of date.
    #[error("Payroll date {payroll_date_id} is assigned to {actual:?}, not {expected:?}")]
    StaleAssignment {
        /// The payroll date being reassigned.
        payroll_date_id: Uuid,
        /// The consultant the caller expected.
        expected: Option<Uuid>,
        /// The consultant actually assigned.
        actual: Option<Uuid>,
    },

    /// The change would leave the assignment as it already is.
    #[error("Payroll date {payroll_date_id} is already assigned to {consultant_id}")]
    AssignmentUnchanged {
        /// The payroll date.
        payroll_date_id: Uuid,
        /// The consultant already assigned.
        consultant_id: Uuid,
    },

    /// No payroll exists with the given id.
    #[error("Payroll not found: {payroll_id}")]
    PayrollNotFound {
        /// The id that was not found.
        payroll_id: Uuid,
    },

    /// No payroll date matched the lookup.
    #[error("Payroll date not found: {reference}")]
    PayrollDateNotFound {
        /// The id or (payroll, date) pair that was looked up.
        reference: String,
    },

    /// The operation requires the current version of the family.
    #[error("Payroll {payroll_id} is not the current version")]
    VersionNotCurrent {
        /// The payroll version that was addressed.
        payroll_id: Uuid,
    },

    /// The operation requires a draft version.
    #[error("Payroll {payroll_id} is not a draft version")]
    VersionNotDraft {
        /// The payroll version that was addressed.
        payroll_id: Uuid,
    },

    /// The draft's parent has been superseded since the draft was created.
    #[error("Draft {payroll_id} was based on {parent_id}, which is no longer current")]
    StaleVersion {
        /// The draft being activated.
        payroll_id: Uuid,
        /// The parent recorded on the draft.
        parent_id: Uuid,
    },

    /// The family already has a draft awaiting activation.
    #[error("Payroll family {family_id} already has a pending draft {draft_id}")]
    PendingDraft {
        /// The root payroll id of the family.
        family_id: Uuid,
        /// The pending draft.
        draft_id: Uuid,
    },

    /// The payroll has no backup consultant to fall back to.
    #[error("Payroll {payroll_id} has no backup consultant")]
    NoBackupConsultant {
        /// The payroll version that was addressed.
        payroll_id: Uuid,
    },

    /// The operation ran past its deadline and applied nothing.
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
    },
}

impl EngineError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::ConfigNotFound { .. } => "CONFIG_NOT_FOUND",
            EngineError::ConfigParseError { .. } => "CONFIG_PARSE_ERROR",
            EngineError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            EngineError::VersioningInvariantViolation { .. } => "VERSIONING_INVARIANT_VIOLATION",
            EngineError::DuplicateDate { .. } => "DUPLICATE_DATE",
            EngineError::AssignmentConflict { .. } => "ASSIGNMENT_CONFLICT",
            EngineError::StaleAssignment { .. } => "STALE_ASSIGNMENT",
            EngineError::AssignmentUnchanged { .. } => "ASSIGNMENT_UNCHANGED",
            EngineError::PayrollNotFound { .. } => "PAYROLL_NOT_FOUND",
            EngineError::PayrollDateNotFound { .. } => "PAYROLL_DATE_NOT_FOUND",
            EngineError::VersionNotCurrent { .. } => "VERSION_NOT_CURRENT",
            EngineError::VersionNotDraft { .. } => "VERSION_NOT_DRAFT",
            EngineError::StaleVersion { .. } => "STALE_VERSION",
            EngineError::PendingDraft { .. } => "PENDING_DRAFT",
            EngineError::NoBackupConsultant { .. } => "NO_BACKUP_CONSULTANT",
            EngineError::Timeout { .. } => "TIMEOUT",
        }
    }
}

impl Serialize for EngineError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("EngineError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
