//! Generated payroll dates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One pay date of a payroll version.
///
/// `original_eft_date` is the date the cycle produces before any adjustment;
/// it is unique per payroll version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollDate {
    /// Identity of the row.
    pub id: Uuid,
    /// The payroll version that owns this date.
    pub payroll_id: Uuid,
    /// The cycle's date before holiday and weekend adjustment.
    pub original_eft_date: NaiveDate,
    /// The business day money moves.
    pub adjusted_eft_date: NaiveDate,
    /// The deadline for processing the pay run.
    pub processing_date: NaiveDate,
    /// Administrator notes.
    pub notes: Option<String>,
    /// When the row was generated.
    pub created_at: DateTime<Utc>,
}
