//! Payroll version management.
//!
//! A payroll family is an append-only chain of versions linked by
//! `parent_payroll_id`. Exactly one version per family is current; older
//! versions are superseded and never modified again apart from that one
//! transition. A family may also hold a single draft, which becomes current
//! on activation.

use std::sync::PoisonError;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    BatchFailure, BatchOutcome, Payroll, PayrollChanges, PayrollDate, VersionHistoryEntry,
    VersionOutcome, VersionState,
};
use crate::scheduling::{CycleSchedule, DatePlan};
use crate::store::Transaction;

use super::assignments::{AssignedDates, CarriedAssignments, assign_new_dates, emit_audit};
use super::{PayrollEngine, persist_plan};

impl PayrollEngine {
    /// Creates a new current version of a payroll family with `changes` applied.
    ///
    /// `original_id` may name any version of the family. In one transaction
    /// the current version is superseded and the new one becomes current.
    /// When the changes touch the schedule or the primary consultant, the
    /// family's dates from the later of the new go-live date and today are
    /// replaced by the new schedule, and explicit reassignments on replaced
    /// dates are carried forward to matching new dates. Earlier dates and
    /// their assignments are never touched.
    pub fn create_version(
        &self,
        original_id: Uuid,
        changes: PayrollChanges,
        reason: Option<String>,
        actor_id: Uuid,
    ) -> EngineResult<VersionOutcome> {
        let family_id = self.family_of(original_id)?;
        let lock = self.store.family_lock(family_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.current_of(family_id)?;
        self.ensure_no_draft(family_id)?;

        let now = self.clock.now();
        let version_number = self.store.read(|t| t.max_version_number(family_id)) + 1;
        let mut next = current.next_version(version_number, &changes, reason, actor_id, now);
        next.version_state = VersionState::Current;
        CycleSchedule::validate_payroll(&next)?;

        let regeneration = if changes.regenerates_dates() {
            Some(self.regeneration(&next)?)
        } else {
            None
        };
        self.transition(&current, next, regeneration, actor_id, now)
    }

    /// Creates a new current version without touching the schedule.
    ///
    /// The new version copies every field of the current one. No dates are
    /// regenerated; existing dates stay with the version that owns them.
    pub fn create_version_simple(
        &self,
        payroll_id: Uuid,
        reason: Option<String>,
        actor_id: Uuid,
    ) -> EngineResult<VersionOutcome> {
        let family_id = self.family_of(payroll_id)?;
        let lock = self.store.family_lock(family_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.current_of(family_id)?;
        self.ensure_no_draft(family_id)?;

        let now = self.clock.now();
        let version_number = self.store.read(|t| t.max_version_number(family_id)) + 1;
        let mut next =
            current.next_version(version_number, &PayrollChanges::default(), reason, actor_id, now);
        next.version_state = VersionState::Current;

        self.transition(&current, next, None, actor_id, now)
    }

    /// Stores a draft version to be activated later.
    ///
    /// Nothing else changes until [`PayrollEngine::activate`]. A family
    /// holds at most one draft.
    pub fn create_draft_version(
        &self,
        original_id: Uuid,
        changes: PayrollChanges,
        reason: Option<String>,
        actor_id: Uuid,
    ) -> EngineResult<Payroll> {
        let family_id = self.family_of(original_id)?;
        let lock = self.store.family_lock(family_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.current_of(family_id)?;
        self.ensure_no_draft(family_id)?;

        let now = self.clock.now();
        let version_number = self.store.read(|t| t.max_version_number(family_id)) + 1;
        let draft = current.next_version(version_number, &changes, reason, actor_id, now);
        CycleSchedule::validate_payroll(&draft)?;

        self.store.write(|tx| {
            tx.put_payroll(draft.clone());
            Ok(())
        })?;

        info!(
            payroll_id = %draft.id,
            family_id = %family_id,
            version_number = draft.version_number,
            go_live_date = %draft.go_live_date,
            actor_id = %actor_id,
            "Created draft payroll version"
        );
        Ok(draft)
    }

    /// Deletes a draft version.
    pub fn discard_draft(&self, draft_id: Uuid, actor_id: Uuid) -> EngineResult<Payroll> {
        let family_id = self.family_of(draft_id)?;
        let lock = self.store.family_lock(family_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let draft = self.store.read(|t| t.payroll(draft_id).cloned())?;
        if !draft.is_draft() {
            return Err(EngineError::VersionNotDraft { payroll_id: draft_id });
        }
        let removed = self.store.write(|tx| tx.remove_payroll(draft_id))?;

        info!(
            payroll_id = %draft_id,
            family_id = %family_id,
            actor_id = %actor_id,
            "Discarded draft payroll version"
        );
        Ok(removed)
    }

    /// Makes a draft the family's current version.
    ///
    /// Fails with [`EngineError::StaleVersion`] if the version the draft was
    /// based on is no longer current.
    pub fn activate(&self, version_id: Uuid, actor_id: Uuid) -> EngineResult<VersionOutcome> {
        let family_id = self.family_of(version_id)?;
        let lock = self.store.family_lock(family_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let draft = self.store.read(|t| t.payroll(version_id).cloned())?;
        if !draft.is_draft() {
            return Err(EngineError::VersionNotDraft { payroll_id: version_id });
        }

        let current = self.current_of(family_id)?;
        if draft.parent_payroll_id != Some(current.id) {
            return Err(EngineError::StaleVersion {
                payroll_id: version_id,
                parent_id: draft.parent_payroll_id.unwrap_or_default(),
            });
        }

        let next = Payroll {
            version_state: VersionState::Current,
            ..draft
        };
        let regeneration = if next.dates_differ_from(&current) {
            Some(self.regeneration(&next)?)
        } else {
            None
        };
        self.transition(&current, next, regeneration, actor_id, self.clock.now())
    }

    /// Activates several drafts, each independently.
    pub fn activate_payroll_versions(
        &self,
        version_ids: Vec<Uuid>,
        actor_id: Uuid,
    ) -> BatchOutcome<VersionOutcome, Uuid> {
        let mut outcome = BatchOutcome::default();
        for version_id in version_ids {
            match self.activate(version_id, actor_id) {
                Ok(activated) => outcome.applied.push(activated),
                Err(error) => {
                    warn!(payroll_id = %version_id, error = %error, "Failed to activate version");
                    outcome.failed.push(BatchFailure {
                        input: version_id,
                        error,
                    });
                }
            }
        }
        outcome
    }

    /// Activates every draft whose go-live date is on or before `as_of`.
    pub fn activate_due_versions(
        &self,
        as_of: NaiveDate,
        actor_id: Uuid,
    ) -> BatchOutcome<VersionOutcome, Uuid> {
        let due: Vec<Uuid> = self.store.read(|t| {
            t.drafts()
                .into_iter()
                .filter(|draft| draft.go_live_date <= as_of)
                .map(|draft| draft.id)
                .collect()
        });
        info!(as_of = %as_of, due = due.len(), "Activating due payroll versions");
        self.activate_payroll_versions(due, actor_id)
    }

    /// The current version of the family `payroll_id` belongs to.
    pub fn get_latest_version(&self, payroll_id: Uuid) -> EngineResult<Payroll> {
        let family_id = self.family_of(payroll_id)?;
        self.current_of(family_id)
    }

    /// Every version of the family, oldest first.
    pub fn get_version_history(&self, payroll_id: Uuid) -> EngineResult<Vec<VersionHistoryEntry>> {
        let family_id = self.family_of(payroll_id)?;
        Ok(self.store.read(|t| {
            t.family_versions(family_id)
                .into_iter()
                .map(VersionHistoryEntry::from)
                .collect()
        }))
    }

    /// Every date of the family across versions, by adjusted EFT date.
    pub fn family_schedule(&self, payroll_id: Uuid) -> EngineResult<Vec<PayrollDate>> {
        let family_id = self.family_of(payroll_id)?;
        Ok(self
            .store
            .read(|t| t.family_dates(family_id).into_iter().cloned().collect()))
    }

    /// Replaces the free-text notes of a payroll date.
    pub fn update_date_notes(
        &self,
        payroll_date_id: Uuid,
        notes: Option<String>,
        actor_id: Uuid,
    ) -> EngineResult<PayrollDate> {
        let updated = self.store.write(|tx| tx.set_date_notes(payroll_date_id, notes))?;
        info!(
            payroll_date_id = %payroll_date_id,
            actor_id = %actor_id,
            "Updated payroll date notes"
        );
        Ok(updated)
    }

    fn ensure_no_draft(&self, family_id: Uuid) -> EngineResult<()> {
        match self.store.read(|t| t.draft_of_family(family_id).map(|d| d.id)) {
            Some(draft_id) => Err(EngineError::PendingDraft { family_id, draft_id }),
            None => Ok(()),
        }
    }

    /// Plans `next` from the later of its go-live date and today.
    fn regeneration(&self, next: &Payroll) -> EngineResult<Regeneration> {
        let cutoff = next.go_live_date.max(self.clock.today());
        let plan = self.plan_horizon(next, cutoff)?;
        Ok(Regeneration { plan, cutoff })
    }

    /// Supersedes `current` with `next` in one transaction.
    ///
    /// With a regeneration, the family's dates from its cutoff onwards are
    /// replaced by the plan's dates. The caller holds the family lock.
    fn transition(
        &self,
        current: &Payroll,
        next: Payroll,
        regeneration: Option<Regeneration>,
        actor_id: Uuid,
        now: DateTime<Utc>,
    ) -> EngineResult<VersionOutcome> {
        let superseded = Payroll {
            version_state: VersionState::Superseded,
            superseded_date: Some(now),
            ..current.clone()
        };

        let (outcome, audits) = self.store.write(|tx| {
            tx.put_payroll(superseded.clone());
            tx.put_payroll(next.clone());

            let mut outcome = VersionOutcome {
                payroll: next.clone(),
                superseded: Some(superseded.clone()),
                generation: None,
                removed_dates: 0,
                carried_forward: 0,
            };
            let Some(Regeneration { plan, cutoff }) = regeneration else {
                return Ok((outcome, Vec::new()));
            };

            let (removed_dates, carried) = remove_replaced_dates(tx, current, &next, cutoff)?;
            let persisted = persist_plan(tx, &next, plan, now)?;
            let AssignedDates {
                audits,
                carried_forward,
            } = assign_new_dates(tx, &next, &persisted.created, &carried, actor_id, now)?;

            outcome.generation = Some(persisted.outcome);
            outcome.removed_dates = removed_dates;
            outcome.carried_forward = carried_forward;
            Ok((outcome, audits))
        })?;
        audits.iter().for_each(emit_audit);

        info!(
            payroll_id = %outcome.payroll.id,
            superseded_id = %current.id,
            family_id = %current.family_id,
            version_number = outcome.payroll.version_number,
            removed_dates = outcome.removed_dates,
            carried_forward = outcome.carried_forward,
            actor_id = %actor_id,
            "Payroll version is now current"
        );
        Ok(outcome)
    }
}

/// A new version's plan and the date its dates replace the family's from.
struct Regeneration {
    plan: DatePlan,
    cutoff: NaiveDate,
}

/// Deletes the family's dates whose original and adjusted EFT dates are
/// both on or after `cutoff`.
///
/// Returns how many were deleted and the explicit reassignments among
/// them, keyed by original EFT date. A reassignment is explicit when the
/// assignee is not the superseded version's primary consultant.
fn remove_replaced_dates(
    tx: &mut Transaction<'_>,
    current: &Payroll,
    next: &Payroll,
    cutoff: NaiveDate,
) -> EngineResult<(usize, CarriedAssignments)> {
    let replaced: Vec<(Uuid, NaiveDate)> = tx
        .family_dates(current.family_id)
        .into_iter()
        .filter(|d| {
            d.payroll_id != next.id
                && d.adjusted_eft_date >= cutoff
                && d.original_eft_date >= cutoff
        })
        .map(|d| (d.id, d.original_eft_date))
        .collect();

    let mut carried = CarriedAssignments::new();
    for (date_id, original) in &replaced {
        if let Some(assignment) = tx.assignment(*date_id) {
            if Some(assignment.consultant_id) != current.consultants.primary {
                carried.insert(*original, assignment.clone());
            }
        }
        tx.remove_date(*date_id)?;
    }
    Ok((replaced.len(), carried))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::models::PayrollCycle;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    fn changes_to_day(day: u32, go_live: &str) -> PayrollChanges {
        PayrollChanges {
            date_value: Some(day),
            go_live_date: Some(make_date(go_live)),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_version_supersedes_and_links() {
        let (engine, _) = test_engine();
        let v1 = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;
        let actor = Uuid::new_v4();

        let outcome = engine
            .create_version(v1.id, changes_to_day(20, "2025-04-01"), Some("Move to 20th".into()), actor)
            .unwrap();

        let v2 = &outcome.payroll;
        assert_eq!(v2.version_number, 2);
        assert_eq!(v2.parent_payroll_id, Some(v1.id));
        assert_eq!(v2.family_id, v1.family_id);
        assert!(v2.is_current());
        assert_eq!(v2.created_by_user_id, actor);

        let superseded = outcome.superseded.as_ref().unwrap();
        assert_eq!(superseded.version_state, VersionState::Superseded);
        assert!(superseded.superseded_date.is_some());

        assert_eq!(engine.get_latest_version(v1.id).unwrap().id, v2.id);
        assert_eq!(engine.get_latest_version(v2.id).unwrap().id, v2.id);
    }

    #[test]
    fn test_create_version_replaces_dates_from_go_live() {
        let (engine, _) = test_engine();
        let v1 = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;

        let outcome = engine
            .create_version(v1.id, changes_to_day(20, "2025-04-01"), None, Uuid::new_v4())
            .unwrap();

        // January to March stay with version 1; April onwards is replaced
        assert_eq!(outcome.removed_dates, 9);
        let generation = outcome.generation.unwrap();
        assert_eq!(generation.dates[0].original_eft_date, make_date("2025-04-20"));

        let schedule = engine.family_schedule(v1.id).unwrap();
        let v1_dates = schedule.iter().filter(|d| d.payroll_id == v1.id).count();
        assert_eq!(v1_dates, 3);
        assert!(schedule
            .iter()
            .filter(|d| d.payroll_id == outcome.payroll.id)
            .all(|d| d.original_eft_date.format("%d").to_string() == "20"));
    }

    #[test]
    fn test_explicit_reassignments_are_carried_forward() {
        let (engine, _) = test_engine();
        let primary = Uuid::new_v4();
        let created = engine.create_payroll(monthly_payroll(Some(primary)), Uuid::new_v4()).unwrap();
        let v1 = created.payroll;
        let dates = created.generation.unwrap().dates;

        // August 15th: explicitly reassigned
        let cover = Uuid::new_v4();
        engine
            .assign_consultant(dates[7].id, cover, false, Uuid::new_v4(), "Cover")
            .unwrap();

        let new_primary = Uuid::new_v4();
        let outcome = engine
            .create_version(
                v1.id,
                PayrollChanges {
                    primary_consultant_id: Some(new_primary),
                    processing_days_before_eft: Some(1),
                    go_live_date: Some(make_date("2025-06-01")),
                    ..Default::default()
                },
                None,
                Uuid::new_v4(),
            )
            .unwrap();

        assert_eq!(outcome.carried_forward, 1);
        let new_dates = outcome.generation.unwrap().dates;
        let august = new_dates
            .iter()
            .find(|d| d.original_eft_date == make_date("2025-08-15"))
            .unwrap();
        let september = new_dates
            .iter()
            .find(|d| d.original_eft_date == make_date("2025-09-15"))
            .unwrap();

        let assignee = |id: Uuid| engine.assignment_for(id).unwrap().map(|a| a.consultant_id);
        assert_eq!(assignee(august.id), Some(cover));
        assert_eq!(assignee(september.id), Some(new_primary));
    }

    #[test]
    fn test_simple_version_keeps_dates() {
        let (engine, _) = test_engine();
        let v1 = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;

        let outcome = engine
            .create_version_simple(v1.id, Some("Contract renewal".into()), Uuid::new_v4())
            .unwrap();

        assert!(outcome.generation.is_none());
        assert_eq!(outcome.payroll.go_live_date, v1.go_live_date);
        assert_eq!(outcome.payroll.date_value, v1.date_value);
        assert_eq!(engine.store().read(|t| t.dates_of_payroll(v1.id).len()), 12);
        assert!(engine.store().read(|t| t.dates_of_payroll(outcome.payroll.id).is_empty()));
    }

    #[test]
    fn test_metadata_version_keeps_past_dates_and_assignments() {
        let (engine, clock) = test_engine();
        let primary = Uuid::new_v4();
        let created = engine.create_payroll(monthly_payroll(Some(primary)), Uuid::new_v4()).unwrap();
        let v1 = created.payroll;
        let dates = created.generation.unwrap().dates;
        let audits = engine.store().read(|t| t.audit_count());

        clock.set_date(make_date("2025-07-01"));
        let outcome = engine
            .create_version(
                v1.id,
                PayrollChanges {
                    employee_count: Some(99),
                    ..Default::default()
                },
                Some("Headcount update".into()),
                Uuid::new_v4(),
            )
            .unwrap();

        assert_eq!(outcome.payroll.employee_count, Some(99));
        assert_eq!(outcome.removed_dates, 0);
        assert!(outcome.generation.is_none());
        assert_eq!(engine.store().read(|t| t.dates_of_payroll(v1.id).len()), 12);
        assert_eq!(engine.store().read(|t| t.audit_count()), audits);
        for date in &dates {
            let assignee = engine.assignment_for(date.id).unwrap().map(|a| a.consultant_id);
            assert_eq!(assignee, Some(primary));
        }
    }

    #[test]
    fn test_schedule_change_with_past_go_live_replaces_from_today() {
        let (engine, clock) = test_engine();
        let primary = Uuid::new_v4();
        let created = engine.create_payroll(monthly_payroll(Some(primary)), Uuid::new_v4()).unwrap();
        let v1 = created.payroll;
        let january = created.generation.unwrap().dates[0].clone();

        clock.set_date(make_date("2025-07-01"));
        let outcome = engine
            .create_version(
                v1.id,
                PayrollChanges {
                    date_value: Some(20),
                    ..Default::default()
                },
                None,
                Uuid::new_v4(),
            )
            .unwrap();

        // Go-live stays 2025-01-01; only July onwards is replaced
        assert_eq!(outcome.payroll.go_live_date, v1.go_live_date);
        assert_eq!(outcome.removed_dates, 6);
        let generation = outcome.generation.unwrap();
        assert_eq!(generation.created, 12);
        assert_eq!(generation.dates[0].original_eft_date, make_date("2025-07-20"));

        let kept = engine.store().read(|t| {
            t.dates_of_payroll(v1.id)
                .into_iter()
                .map(|d| d.original_eft_date)
                .collect::<Vec<_>>()
        });
        assert_eq!(kept.len(), 6);
        assert!(kept.iter().all(|d| *d < make_date("2025-07-01")));
        let assignee = engine.assignment_for(january.id).unwrap().map(|a| a.consultant_id);
        assert_eq!(assignee, Some(primary));
    }

    #[test]
    fn test_activating_metadata_draft_keeps_dates() {
        let (engine, clock) = test_engine();
        let v1 = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;
        let draft = engine
            .create_draft_version(
                v1.id,
                PayrollChanges {
                    name: Some("Acme monthly (renamed)".to_string()),
                    ..Default::default()
                },
                None,
                Uuid::new_v4(),
            )
            .unwrap();

        clock.set_date(make_date("2025-09-01"));
        let activated = engine.activate(draft.id, Uuid::new_v4()).unwrap();

        assert_eq!(activated.removed_dates, 0);
        assert!(activated.generation.is_none());
        assert_eq!(engine.store().read(|t| t.dates_of_payroll(v1.id).len()), 12);
    }

    #[test]
    fn test_excessive_processing_days_are_rejected() {
        let (engine, _) = test_engine();
        let v1 = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;

        let result = engine.create_version(
            v1.id,
            PayrollChanges {
                processing_days_before_eft: Some(200_000_000),
                ..Default::default()
            },
            None,
            Uuid::new_v4(),
        );
        assert!(matches!(result, Err(EngineError::InvalidConfiguration { .. })));

        let result = engine.create_draft_version(
            v1.id,
            PayrollChanges {
                processing_days_before_eft: Some(crate::scheduling::MAX_PROCESSING_DAYS + 1),
                ..Default::default()
            },
            None,
            Uuid::new_v4(),
        );
        assert!(matches!(result, Err(EngineError::InvalidConfiguration { .. })));
        assert_eq!(engine.get_latest_version(v1.id).unwrap().id, v1.id);
    }

    #[test]
    fn test_chain_integrity() {
        let (engine, _) = test_engine();
        let v1 = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;
        for (day, go_live) in [(10, "2025-03-01"), (12, "2025-05-01"), (25, "2025-07-01")] {
            engine
                .create_version(v1.id, changes_to_day(day, go_live), None, Uuid::new_v4())
                .unwrap();
        }
        engine.create_version_simple(v1.id, None, Uuid::new_v4()).unwrap();

        let history = engine.get_version_history(v1.id).unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history.iter().filter(|h| h.is_current).count(), 1);
        assert!(history.last().unwrap().is_current);
        assert_eq!(history[0].parent_payroll_id, None);
        for pair in history.windows(2) {
            assert_eq!(pair[1].parent_payroll_id, Some(pair[0].payroll_id));
            assert_eq!(pair[1].version_number, pair[0].version_number + 1);
            assert!(pair[0].superseded_date.is_some());
        }
    }

    #[test]
    fn test_history_is_immutable() {
        let (engine, clock) = test_engine();
        let v1 = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;
        engine
            .create_version(v1.id, changes_to_day(20, "2025-03-01"), None, Uuid::new_v4())
            .unwrap();
        let before = engine.get_version_history(v1.id).unwrap();

        clock.set_date(make_date("2025-02-01"));
        engine
            .create_version(v1.id, changes_to_day(22, "2025-05-01"), None, Uuid::new_v4())
            .unwrap();
        let after = engine.get_version_history(v1.id).unwrap();

        // Version 1 was superseded earlier and must be byte-for-byte unchanged
        assert_eq!(after[0], before[0]);
        // Version 2 changed only by its supersession
        assert_eq!(after[1].go_live_date, before[1].go_live_date);
        assert_eq!(after[1].created_at, before[1].created_at);
        assert!(before[1].is_current && !after[1].is_current);
    }

    #[test]
    fn test_draft_lifecycle() {
        let (engine, _) = test_engine();
        let v1 = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;

        let draft = engine
            .create_draft_version(v1.id, changes_to_day(28, "2025-07-01"), None, Uuid::new_v4())
            .unwrap();
        assert!(draft.is_draft());
        assert_eq!(engine.get_latest_version(v1.id).unwrap().id, v1.id);

        let blocked = engine.create_version_simple(v1.id, None, Uuid::new_v4());
        assert_eq!(
            blocked.map(|o| o.payroll.id),
            Err(EngineError::PendingDraft {
                family_id: v1.family_id,
                draft_id: draft.id
            })
        );

        let activated = engine.activate(draft.id, Uuid::new_v4()).unwrap();
        assert_eq!(activated.payroll.id, draft.id);
        assert!(activated.payroll.is_current());
        assert_eq!(engine.get_latest_version(v1.id).unwrap().id, draft.id);

        let again = engine.activate(draft.id, Uuid::new_v4());
        assert!(matches!(again, Err(EngineError::VersionNotDraft { .. })));
    }

    #[test]
    fn test_discard_draft() {
        let (engine, _) = test_engine();
        let v1 = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;
        let draft = engine
            .create_draft_version(v1.id, changes_to_day(28, "2025-07-01"), None, Uuid::new_v4())
            .unwrap();

        engine.discard_draft(draft.id, Uuid::new_v4()).unwrap();

        assert_eq!(engine.get_version_history(v1.id).unwrap().len(), 1);
        assert!(engine.create_version_simple(v1.id, None, Uuid::new_v4()).is_ok());
        assert!(matches!(
            engine.discard_draft(v1.id, Uuid::new_v4()),
            Err(EngineError::VersionNotDraft { .. })
        ));
    }

    #[test]
    fn test_stale_draft_cannot_activate() {
        let (engine, _) = test_engine();
        let v1 = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;
        let draft = engine
            .create_draft_version(v1.id, changes_to_day(28, "2025-07-01"), None, Uuid::new_v4())
            .unwrap();

        // Import a newer current version behind the engine's back
        let store = engine.store();
        let mut superseded = v1.clone();
        superseded.version_state = VersionState::Superseded;
        superseded.superseded_date = Some(Utc::now());
        store.seed_payroll(superseded);
        store.seed_payroll(Payroll {
            id: Uuid::new_v4(),
            version_number: 3,
            parent_payroll_id: Some(v1.id),
            ..v1.clone()
        });

        let result = engine.activate(draft.id, Uuid::new_v4());
        assert_eq!(
            result.map(|o| o.payroll.id),
            Err(EngineError::StaleVersion {
                payroll_id: draft.id,
                parent_id: v1.id
            })
        );
    }

    #[test]
    fn test_activate_due_versions() {
        let (engine, _) = test_engine();
        let a = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;
        let b = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;
        let due = engine
            .create_draft_version(a.id, changes_to_day(5, "2025-03-01"), None, Uuid::new_v4())
            .unwrap();
        let later = engine
            .create_draft_version(b.id, changes_to_day(5, "2025-09-01"), None, Uuid::new_v4())
            .unwrap();

        let outcome = engine.activate_due_versions(make_date("2025-03-01"), Uuid::new_v4());

        assert!(outcome.is_complete());
        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(outcome.applied[0].payroll.id, due.id);
        assert!(engine.store().read(|t| t.payroll(later.id).map(|p| p.is_draft())).unwrap());
    }

    #[test]
    fn test_batch_activation_isolates_failures() {
        let (engine, _) = test_engine();
        let v1 = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;
        let draft = engine
            .create_draft_version(v1.id, changes_to_day(3, "2025-02-01"), None, Uuid::new_v4())
            .unwrap();
        let missing = Uuid::new_v4();

        let outcome = engine.activate_payroll_versions(vec![missing, v1.id, draft.id], Uuid::new_v4());

        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(
            outcome.failed[0].error,
            EngineError::PayrollNotFound { payroll_id: missing }
        );
        assert!(matches!(
            outcome.failed[1].error,
            EngineError::VersionNotDraft { .. }
        ));
    }

    #[test]
    fn test_corrupted_family_is_rejected_without_repair() {
        let (engine, _) = test_engine();
        let v1 = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;
        engine.store().seed_payroll(Payroll {
            id: Uuid::new_v4(),
            version_number: 2,
            parent_payroll_id: Some(v1.id),
            ..v1.clone()
        });
        let history_before = engine.get_version_history(v1.id).unwrap();

        let result = engine.create_version(v1.id, changes_to_day(9, "2025-03-01"), None, Uuid::new_v4());

        assert_eq!(
            result.map(|o| o.payroll.id),
            Err(EngineError::VersioningInvariantViolation {
                family_id: v1.family_id,
                current_count: 2
            })
        );
        assert_eq!(engine.get_version_history(v1.id).unwrap(), history_before);
    }

    #[test]
    fn test_invalid_changes_leave_family_untouched() {
        let (engine, _) = test_engine();
        let v1 = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;

        let result = engine.create_version(
            v1.id,
            PayrollChanges {
                cycle: Some(PayrollCycle::Weekly),
                date_value: Some(9),
                ..Default::default()
            },
            None,
            Uuid::new_v4(),
        );

        assert!(matches!(result, Err(EngineError::InvalidConfiguration { .. })));
        assert_eq!(engine.get_version_history(v1.id).unwrap().len(), 1);
    }

    #[test]
    fn test_update_date_notes() {
        let (engine, _) = test_engine();
        let outcome = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap();
        let date = outcome.generation.unwrap().dates[0].clone();

        let updated = engine
            .update_date_notes(date.id, Some("Client closed".into()), Uuid::new_v4())
            .unwrap();

        assert_eq!(updated.notes.as_deref(), Some("Client closed"));
        assert_eq!(updated.adjusted_eft_date, date.adjusted_eft_date);
    }

    #[test]
    fn test_concurrent_versions_keep_one_current() {
        let (engine, _) = test_engine();
        let engine = Arc::new(engine);
        let v1 = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;

        let handles: Vec<_> = (1..=8u32)
            .map(|day| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    engine.create_version(v1.id, changes_to_day(day, "2025-06-01"), None, Uuid::new_v4())
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }

        let history = engine.get_version_history(v1.id).unwrap();
        assert_eq!(history.len(), 9);
        assert_eq!(history.iter().filter(|h| h.is_current).count(), 1);
        let numbers: Vec<u32> = history.iter().map(|h| h.version_number).collect();
        assert_eq!(numbers, (1..=9).collect::<Vec<_>>());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_exactly_one_current_after_any_sequence(
            ops in prop::collection::vec((0u8..4, 1u32..=28), 1..12)
        ) {
            let (engine, _) = test_engine();
            let v1 = engine.create_payroll(monthly_payroll(None), Uuid::new_v4()).unwrap().payroll;
            let actor = Uuid::new_v4();

            for (op, day) in ops {
                let changes = changes_to_day(day, "2025-04-01");
                // Failures such as PendingDraft are expected; the invariant must hold regardless
                let _ = match op {
                    0 => engine.create_version(v1.id, changes, None, actor).map(|_| ()),
                    1 => engine.create_version_simple(v1.id, None, actor).map(|_| ()),
                    2 => engine.create_draft_version(v1.id, changes, None, actor).map(|_| ()),
                    _ => {
                        let drafts: Vec<Uuid> = engine.store().read(|t| {
                            t.draft_of_family(v1.family_id).map(|d| d.id).into_iter().collect()
                        });
                        engine.activate_payroll_versions(drafts, actor);
                        Ok(())
                    }
                };

                let history = engine.get_version_history(v1.id).unwrap();
                prop_assert_eq!(history.iter().filter(|h| h.is_current).count(), 1);
                prop_assert!(history.iter().filter(|h| h.state == VersionState::Draft).count() <= 1);
            }
        }
    }
}
