//! Consultant assignments and their audit trail.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The consultant currently responsible for a payroll date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollAssignment {
    /// Identity of the assignment.
    pub id: Uuid,
    /// The payroll date; at most one assignment per date.
    pub payroll_date_id: Uuid,
    /// The responsible consultant.
    pub consultant_id: Uuid,
    /// The consultant first assigned to this date, when it has changed since.
    pub original_consultant_id: Option<Uuid>,
    /// Whether the consultant is covering as a backup.
    pub is_backup: bool,
    /// The actor who made the assignment.
    pub assigned_by: Uuid,
    /// When the assignment was made.
    pub assigned_at: DateTime<Utc>,
}

/// An append-only record of one assignment change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollAssignmentAudit {
    /// Identity of the audit row.
    pub id: Uuid,
    /// The payroll date whose assignment changed.
    pub payroll_date_id: Uuid,
    /// The assignment after the change.
    pub assignment_id: Uuid,
    /// The previous consultant; `None` for the first assignment.
    pub from_consultant_id: Option<Uuid>,
    /// The new consultant.
    pub to_consultant_id: Uuid,
    /// The actor who made the change.
    pub changed_by: Uuid,
    /// Why the change was made.
    pub change_reason: String,
    /// When the change was made.
    pub created_at: DateTime<Utc>,
}

/// One requested reassignment in a bulk commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentChange {
    /// Any version of the payroll family.
    pub payroll_id: Uuid,
    /// The adjusted or original EFT date of the payroll date.
    pub date: NaiveDate,
    /// The consultant the caller believes is assigned.
    pub from_consultant_id: Option<Uuid>,
    /// The consultant to assign.
    pub to_consultant_id: Uuid,
}
