//! Payroll configuration model.
//!
//! A [`Payroll`] row is one version of a payroll's configuration. Versions of
//! the same payroll form a family linked backwards through
//! `parent_payroll_id`; `family_id` names the family's first version.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PayrollCycle, PayrollDateType};

/// Operational status of a payroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayrollStatus {
    /// Being onboarded.
    #[default]
    Implementation,
    /// Running.
    Active,
    /// No longer processed.
    Inactive,
}

/// Position of a version in its family's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionState {
    /// Created but not yet activated.
    Draft,
    /// The single active version of the family.
    Current,
    /// Replaced by a newer version.
    Superseded,
}

/// The consultants responsible for a payroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsultantTeam {
    /// Assigned to every generated date by default.
    #[serde(default)]
    pub primary: Option<Uuid>,
    /// Fallback when the primary is unavailable.
    #[serde(default)]
    pub backup: Option<Uuid>,
    /// Manager overseeing the payroll.
    #[serde(default)]
    pub manager: Option<Uuid>,
}

/// One version of a payroll configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payroll {
    /// Identity of this version.
    pub id: Uuid,
    /// Identity of the family's first version.
    pub family_id: Uuid,
    /// The client this payroll belongs to.
    pub client_id: Uuid,
    /// Display name.
    pub name: String,
    /// Recurrence pattern.
    pub cycle: PayrollCycle,
    /// How the date within a cycle is chosen.
    pub date_type: PayrollDateType,
    /// Parameter for the date type (day of month or ISO weekday).
    pub date_value: Option<u32>,
    /// Number of employees paid by this payroll.
    pub employee_count: Option<u32>,
    /// Responsible consultants.
    pub consultants: ConsultantTeam,
    /// Operational status.
    pub status: PayrollStatus,
    /// Lifecycle state of this version.
    pub version_state: VersionState,
    /// First day this version's schedule takes effect.
    pub go_live_date: NaiveDate,
    /// When this version was superseded; `None` unless superseded.
    pub superseded_date: Option<DateTime<Utc>>,
    /// Monotonic per family, starting at 1.
    pub version_number: u32,
    /// Why this version was created.
    pub version_reason: Option<String>,
    /// The version this one replaced.
    pub parent_payroll_id: Option<Uuid>,
    /// The actor who created this version.
    pub created_by_user_id: Uuid,
    /// When this version was created.
    pub created_at: DateTime<Utc>,
    /// Business days between processing and the EFT date.
    pub processing_days_before_eft: u32,
    /// Country whose holidays govern adjustment.
    pub holiday_country: String,
    /// Optional region within the country.
    pub holiday_region: Option<String>,
}

impl Payroll {
    /// Returns true if this is the family's active version.
    pub fn is_current(&self) -> bool {
        self.version_state == VersionState::Current
    }

    /// Returns true if this version is awaiting activation.
    pub fn is_draft(&self) -> bool {
        self.version_state == VersionState::Draft
    }

    /// Returns true if this version produces or assigns dates differently
    /// from `other`: a schedule field or the primary consultant differs.
    pub fn dates_differ_from(&self, other: &Payroll) -> bool {
        self.cycle != other.cycle
            || self.date_type != other.date_type
            || self.date_value != other.date_value
            || self.go_live_date != other.go_live_date
            || self.processing_days_before_eft != other.processing_days_before_eft
            || self.holiday_country != other.holiday_country
            || self.holiday_region != other.holiday_region
            || self.consultants.primary != other.consultants.primary
    }

    /// Builds the next version of this payroll with `changes` applied.
    ///
    /// The result is a draft: the caller decides whether it becomes current.
    pub fn next_version(
        &self,
        version_number: u32,
        changes: &PayrollChanges,
        reason: Option<String>,
        actor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Payroll {
        let mut next = Payroll {
            id: Uuid::new_v4(),
            parent_payroll_id: Some(self.id),
            version_number,
            version_reason: reason,
            version_state: VersionState::Draft,
            superseded_date: None,
            created_by_user_id: actor_id,
            created_at: now,
            ..self.clone()
        };
        changes.apply_to(&mut next);
        next
    }
}

/// Input for creating a brand new payroll family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayroll {
    /// The client this payroll belongs to.
    pub client_id: Uuid,
    /// Display name.
    pub name: String,
    /// Recurrence pattern.
    pub cycle: PayrollCycle,
    /// How the date within a cycle is chosen.
    pub date_type: PayrollDateType,
    /// Parameter for the date type.
    #[serde(default)]
    pub date_value: Option<u32>,
    /// Number of employees paid by this payroll.
    #[serde(default)]
    pub employee_count: Option<u32>,
    /// Responsible consultants.
    #[serde(default)]
    pub consultants: ConsultantTeam,
    /// Operational status.
    #[serde(default)]
    pub status: PayrollStatus,
    /// First day the schedule takes effect.
    pub go_live_date: NaiveDate,
    /// Defaults to the configured value when absent.
    #[serde(default)]
    pub processing_days_before_eft: Option<u32>,
    /// Defaults to the configured country when absent.
    #[serde(default)]
    pub holiday_country: Option<String>,
    /// Optional region within the country.
    #[serde(default)]
    pub holiday_region: Option<String>,
}

/// Field changes for a new payroll version; `None` keeps the current value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PayrollChanges {
    /// New display name.
    pub name: Option<String>,
    /// New recurrence pattern.
    pub cycle: Option<PayrollCycle>,
    /// New date type.
    pub date_type: Option<PayrollDateType>,
    /// New date value.
    pub date_value: Option<u32>,
    /// New employee count.
    pub employee_count: Option<u32>,
    /// New primary consultant.
    pub primary_consultant_id: Option<Uuid>,
    /// New backup consultant.
    pub backup_consultant_id: Option<Uuid>,
    /// New manager.
    pub manager_id: Option<Uuid>,
    /// New operational status.
    pub status: Option<PayrollStatus>,
    /// New go-live date.
    pub go_live_date: Option<NaiveDate>,
    /// New processing lead time.
    pub processing_days_before_eft: Option<u32>,
    /// New holiday country.
    pub holiday_country: Option<String>,
    /// New holiday region.
    pub holiday_region: Option<String>,
}

impl PayrollChanges {
    /// Returns true if any change alters which dates the payroll produces.
    ///
    /// # Example
    ///
    /// ```
    /// use payroll_engine::models::PayrollChanges;
    ///
    /// let changes = PayrollChanges { employee_count: Some(40), ..Default::default() };
    /// assert!(!changes.affects_schedule());
    ///
    /// let changes = PayrollChanges { date_value: Some(20), ..Default::default() };
    /// assert!(changes.affects_schedule());
    /// ```
    pub fn affects_schedule(&self) -> bool {
        self.cycle.is_some()
            || self.date_type.is_some()
            || self.date_value.is_some()
            || self.go_live_date.is_some()
            || self.processing_days_before_eft.is_some()
            || self.holiday_country.is_some()
            || self.holiday_region.is_some()
    }

    /// Returns true if a version with these changes must regenerate its
    /// future dates: the schedule or the default assignee changes.
    pub fn regenerates_dates(&self) -> bool {
        self.affects_schedule() || self.primary_consultant_id.is_some()
    }

    /// Overwrites the fields of `payroll` named by these changes.
    pub fn apply_to(&self, payroll: &mut Payroll) {
        if let Some(name) = &self.name {
            payroll.name = name.clone();
        }
        if let Some(cycle) = self.cycle {
            payroll.cycle = cycle;
        }
        if let Some(date_type) = self.date_type {
            payroll.date_type = date_type;
        }
        if self.date_value.is_some() {
            payroll.date_value = self.date_value;
        }
        if self.employee_count.is_some() {
            payroll.employee_count = self.employee_count;
        }
        if self.primary_consultant_id.is_some() {
            payroll.consultants.primary = self.primary_consultant_id;
        }
        if self.backup_consultant_id.is_some() {
            payroll.consultants.backup = self.backup_consultant_id;
        }
        if self.manager_id.is_some() {
            payroll.consultants.manager = self.manager_id;
        }
        if let Some(status) = self.status {
            payroll.status = status;
        }
        if let Some(go_live_date) = self.go_live_date {
            payroll.go_live_date = go_live_date;
        }
        if let Some(days) = self.processing_days_before_eft {
            payroll.processing_days_before_eft = days;
        }
        if let Some(country) = &self.holiday_country {
            payroll.holiday_country = country.clone();
        }
        if self.holiday_region.is_some() {
            payroll.holiday_region = self.holiday_region.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payroll() -> Payroll {
        let id = Uuid::new_v4();
        Payroll {
            id,
            family_id: id,
            client_id: Uuid::new_v4(),
            name: "Acme Monthly".to_string(),
            cycle: PayrollCycle::Monthly,
            date_type: PayrollDateType::FixedDate,
            date_value: Some(15),
            employee_count: Some(25),
            consultants: ConsultantTeam {
                primary: Some(Uuid::new_v4()),
                backup: None,
                manager: None,
            },
            status: PayrollStatus::Active,
            version_state: VersionState::Current,
            go_live_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            superseded_date: None,
            version_number: 1,
            version_reason: None,
            parent_payroll_id: None,
            created_by_user_id: Uuid::new_v4(),
            created_at: Utc::now(),
            processing_days_before_eft: 2,
            holiday_country: "AU".to_string(),
            holiday_region: None,
        }
    }

    #[test]
    fn test_next_version_links_parent_and_copies_fields() {
        let current = sample_payroll();
        let actor = Uuid::new_v4();
        let changes = PayrollChanges {
            date_value: Some(20),
            ..Default::default()
        };

        let next = current.next_version(2, &changes, Some("move to 20th".into()), actor, Utc::now());

        assert_ne!(next.id, current.id);
        assert_eq!(next.family_id, current.family_id);
        assert_eq!(next.parent_payroll_id, Some(current.id));
        assert_eq!(next.version_number, 2);
        assert_eq!(next.date_value, Some(20));
        assert_eq!(next.name, current.name);
        assert_eq!(next.consultants, current.consultants);
        assert_eq!(next.version_state, VersionState::Draft);
        assert_eq!(next.created_by_user_id, actor);
    }

    #[test]
    fn test_apply_changes_replaces_primary_only() {
        let mut payroll = sample_payroll();
        let backup = Uuid::new_v4();
        payroll.consultants.backup = Some(backup);
        let new_primary = Uuid::new_v4();

        PayrollChanges {
            primary_consultant_id: Some(new_primary),
            ..Default::default()
        }
        .apply_to(&mut payroll);

        assert_eq!(payroll.consultants.primary, Some(new_primary));
        assert_eq!(payroll.consultants.backup, Some(backup));
    }

    #[test]
    fn test_consultant_change_does_not_affect_schedule() {
        let changes = PayrollChanges {
            primary_consultant_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(!changes.affects_schedule());
        assert!(changes.regenerates_dates());
    }

    #[test]
    fn test_metadata_changes_keep_dates() {
        let changes = PayrollChanges {
            name: Some("Renamed".to_string()),
            employee_count: Some(99),
            backup_consultant_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(!changes.regenerates_dates());

        let current = sample_payroll();
        let next = current.next_version(2, &changes, None, Uuid::new_v4(), Utc::now());
        assert!(!next.dates_differ_from(&current));

        let moved = current.next_version(
            2,
            &PayrollChanges {
                holiday_region: Some("VIC".to_string()),
                ..Default::default()
            },
            None,
            Uuid::new_v4(),
            Utc::now(),
        );
        assert!(moved.dates_differ_from(&current));
    }

    #[test]
    fn test_deserialize_partial_changes() {
        let json = r#"{"go_live_date": "2025-07-01", "cycle": "fortnightly"}"#;
        let changes: PayrollChanges = serde_json::from_str(json).unwrap();
        assert_eq!(changes.cycle, Some(PayrollCycle::Fortnightly));
        assert_eq!(
            changes.go_live_date,
            Some(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap())
        );
        assert!(changes.name.is_none());
    }
}
