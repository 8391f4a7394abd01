//! Request types for the payroll engine API.
//!
//! Payroll creation and assignment changes reuse the model types directly;
//! the structures here cover the remaining endpoints.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AssignmentChange, PayrollChanges};
use crate::scheduling::AdjustDirection;

/// Request body for `POST /payrolls/:id/dates/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateDatesRequest {
    /// First day of the window (inclusive).
    pub window_start: NaiveDate,
    /// Last day of the window (inclusive).
    pub window_end: NaiveDate,
    /// Upper bound on generated dates; the configured maximum when absent.
    #[serde(default)]
    pub max_dates: Option<usize>,
}

/// Request body for `POST /payrolls/:id/versions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVersionRequest {
    /// Field changes for the new version.
    #[serde(default)]
    pub changes: PayrollChanges,
    /// Why the version is being created.
    #[serde(default)]
    pub reason: Option<String>,
    /// Store the version as a draft instead of activating it.
    #[serde(default)]
    pub draft: bool,
}

/// Request body for `POST /payrolls/:id/versions/simple`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimpleVersionRequest {
    /// Why the version is being created.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Request body for `POST /versions/activate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateVersionsRequest {
    /// The drafts to activate.
    pub version_ids: Vec<Uuid>,
}

/// Request body for `POST /versions/activate-due`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateDueRequest {
    /// Drafts going live on or before this date are activated.
    pub as_of: NaiveDate,
}

/// Request body for `POST /assignments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignConsultantRequest {
    /// The payroll date to assign.
    pub payroll_date_id: Uuid,
    /// The consultant to assign.
    pub consultant_id: Uuid,
    /// Whether the consultant is covering as a backup.
    #[serde(default)]
    pub is_backup: bool,
    /// Why the assignment is being made.
    #[serde(default = "default_reason")]
    pub reason: String,
}

/// Request body for `POST /assignments/commit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitAssignmentsRequest {
    /// Changes to apply in order.
    pub changes: Vec<AssignmentChange>,
    /// Why the changes are being made.
    #[serde(default = "default_reason")]
    pub reason: String,
}

/// Request body for `POST /dates/:id/backup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallBackRequest {
    /// Why the backup is taking over.
    #[serde(default = "default_reason")]
    pub reason: String,
}

/// Request body for `PUT /dates/:id/notes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNotesRequest {
    /// The new notes; `null` clears them.
    pub notes: Option<String>,
}

/// Query parameters for `GET /calendar/adjust`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustDateQuery {
    /// The date to move onto a business day.
    pub date: NaiveDate,
    /// Country whose holidays apply.
    pub country: String,
    /// Optional region within the country.
    #[serde(default)]
    pub region: Option<String>,
    /// Direction to move; earlier by default.
    #[serde(default)]
    pub direction: AdjustDirection,
}

fn default_reason() -> String {
    "Not specified".to_string()
}
