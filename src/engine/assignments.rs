//! Consultant assignments and their audit trail.
//!
//! Every payroll date has at most one assignment. Each change to it writes
//! an append-only audit row before the assignment itself is replaced, and
//! emits a structured event on the `payroll_engine::audit` target.

use std::collections::HashMap;
use std::sync::PoisonError;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    AssignmentChange, BatchFailure, BatchOutcome, Payroll, PayrollAssignment,
    PayrollAssignmentAudit, PayrollDate,
};
use crate::store::Transaction;

use super::PayrollEngine;

/// Explicit reassignments of a superseded version, keyed by original EFT date.
pub(super) type CarriedAssignments = HashMap<NaiveDate, PayrollAssignment>;

/// Audit rows written while assigning freshly generated dates.
#[derive(Debug, Default)]
pub(super) struct AssignedDates {
    pub audits: Vec<PayrollAssignmentAudit>,
    pub carried_forward: usize,
}

struct AssignmentWrite {
    assignment: PayrollAssignment,
    audit: Option<PayrollAssignmentAudit>,
}

/// Assigns or reassigns a payroll date inside `tx`.
///
/// Assigning the consultant already assigned (with the same backup flag)
/// changes nothing and writes no audit row.
fn write_assignment(
    tx: &mut Transaction<'_>,
    payroll_date_id: Uuid,
    consultant_id: Uuid,
    is_backup: bool,
    actor_id: Uuid,
    reason: &str,
    now: DateTime<Utc>,
) -> EngineResult<AssignmentWrite> {
    tx.payroll_date(payroll_date_id)?;
    let existing = tx.assignment(payroll_date_id).cloned();

    if let Some(existing) = &existing {
        if existing.consultant_id == consultant_id && existing.is_backup == is_backup {
            return Ok(AssignmentWrite {
                assignment: existing.clone(),
                audit: None,
            });
        }
    }

    let assignment = PayrollAssignment {
        id: existing.as_ref().map_or_else(Uuid::new_v4, |e| e.id),
        payroll_date_id,
        consultant_id,
        original_consultant_id: existing
            .as_ref()
            .map(|e| e.original_consultant_id.unwrap_or(e.consultant_id)),
        is_backup,
        assigned_by: actor_id,
        assigned_at: now,
    };
    let audit = PayrollAssignmentAudit {
        id: Uuid::new_v4(),
        payroll_date_id,
        assignment_id: assignment.id,
        from_consultant_id: existing.map(|e| e.consultant_id),
        to_consultant_id: consultant_id,
        changed_by: actor_id,
        change_reason: reason.to_string(),
        created_at: now,
    };

    tx.append_audit(audit.clone());
    tx.put_assignment(assignment.clone())?;
    Ok(AssignmentWrite {
        assignment,
        audit: Some(audit),
    })
}

/// Assigns newly created dates of `payroll`.
///
/// A date whose original EFT date was explicitly reassigned in the previous
/// version keeps that consultant; every other date goes to the primary
/// consultant. Without a primary consultant such dates stay unassigned.
pub(super) fn assign_new_dates(
    tx: &mut Transaction<'_>,
    payroll: &Payroll,
    created: &[PayrollDate],
    carried: &CarriedAssignments,
    actor_id: Uuid,
    now: DateTime<Utc>,
) -> EngineResult<AssignedDates> {
    let mut assigned = AssignedDates::default();

    for date in created {
        let write = match carried.get(&date.original_eft_date) {
            Some(previous) => {
                assigned.carried_forward += 1;
                let reason = format!("Carried forward to version {}", payroll.version_number);
                write_assignment(
                    tx,
                    date.id,
                    previous.consultant_id,
                    previous.is_backup,
                    actor_id,
                    &reason,
                    now,
                )?
            }
            None => match payroll.consultants.primary {
                Some(primary) => write_assignment(
                    tx,
                    date.id,
                    primary,
                    false,
                    actor_id,
                    "Default assignment to primary consultant",
                    now,
                )?,
                None => continue,
            },
        };
        assigned.audits.extend(write.audit);
    }
    Ok(assigned)
}

/// Emits the structured audit event for one assignment change.
pub(super) fn emit_audit(audit: &PayrollAssignmentAudit) {
    info!(
        target: "payroll_engine::audit",
        payroll_date_id = %audit.payroll_date_id,
        assignment_id = %audit.assignment_id,
        from_consultant_id = ?audit.from_consultant_id,
        to_consultant_id = %audit.to_consultant_id,
        actor_id = %audit.changed_by,
        reason = %audit.change_reason,
        "Consultant assignment changed"
    );
}

impl PayrollEngine {
    /// Assigns a consultant to a payroll date, replacing any current assignment.
    pub fn assign_consultant(
        &self,
        payroll_date_id: Uuid,
        consultant_id: Uuid,
        is_backup: bool,
        assigned_by: Uuid,
        reason: &str,
    ) -> EngineResult<PayrollAssignment> {
        let family_id = self.family_of_date(payroll_date_id)?;
        let lock = self.store.family_lock(family_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let now = self.clock.now();
        let write = self.store.write(|tx| {
            write_assignment(tx, payroll_date_id, consultant_id, is_backup, assigned_by, reason, now)
        })?;
        if let Some(audit) = &write.audit {
            emit_audit(audit);
        }
        Ok(write.assignment)
    }

    /// Applies a batch of reassignments.
    ///
    /// Items are applied in order, each in its own transaction; a failed
    /// item never undoes the ones before it. An item fails when its payroll
    /// or date cannot be found, when an earlier item in the batch moved the
    /// same date to a different consultant, when `from_consultant_id` is
    /// given and no longer matches the assignee, or when the date already
    /// has the target consultant. Every applied item writes one audit row.
    pub fn commit_payroll_assignments(
        &self,
        changes: Vec<AssignmentChange>,
        actor_id: Uuid,
        reason: &str,
    ) -> BatchOutcome<PayrollAssignment, AssignmentChange> {
        let mut outcome = BatchOutcome::default();
        let mut targeted: HashMap<Uuid, Uuid> = HashMap::new();

        for change in changes {
            match self.commit_assignment_change(&change, &mut targeted, actor_id, reason) {
                Ok(assignment) => outcome.applied.push(assignment),
                Err(error) => {
                    warn!(
                        payroll_id = %change.payroll_id,
                        date = %change.date,
                        error = %error,
                        "Rejected assignment change"
                    );
                    outcome.failed.push(BatchFailure {
                        input: change,
                        error,
                    });
                }
            }
        }

        info!(
            applied = outcome.applied.len(),
            failed = outcome.failed.len(),
            actor_id = %actor_id,
            "Committed assignment changes"
        );
        outcome
    }

    fn commit_assignment_change(
        &self,
        change: &AssignmentChange,
        targeted: &mut HashMap<Uuid, Uuid>,
        actor_id: Uuid,
        reason: &str,
    ) -> EngineResult<PayrollAssignment> {
        let family_id = self.family_of(change.payroll_id)?;
        let lock = self.store.family_lock(family_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let payroll_date_id = self
            .store
            .read(|t| t.find_family_date(family_id, change.date).map(|d| d.id))
            .ok_or_else(|| EngineError::PayrollDateNotFound {
                reference: format!("payroll {} on {}", change.payroll_id, change.date),
            })?;

        match targeted.get(&payroll_date_id) {
            Some(destination) if *destination != change.to_consultant_id => {
                return Err(EngineError::AssignmentConflict { payroll_date_id });
            }
            _ => {
                targeted.insert(payroll_date_id, change.to_consultant_id);
            }
        }

        let now = self.clock.now();
        let (assignment, audit) = self.store.write(|tx| {
            let actual = tx.assignment(payroll_date_id).map(|a| a.consultant_id);
            if let Some(expected) = change.from_consultant_id {
                if actual != Some(expected) {
                    return Err(EngineError::StaleAssignment {
                        payroll_date_id,
                        expected: Some(expected),
                        actual,
                    });
                }
            }
            let write = write_assignment(
                tx,
                payroll_date_id,
                change.to_consultant_id,
                false,
                actor_id,
                reason,
                now,
            )?;
            match write.audit {
                Some(audit) => Ok((write.assignment, audit)),
                None => Err(EngineError::AssignmentUnchanged {
                    payroll_date_id,
                    consultant_id: change.to_consultant_id,
                }),
            }
        })?;
        emit_audit(&audit);
        Ok(assignment)
    }

    /// Hands a payroll date to the family's backup consultant.
    pub fn fall_back_to_backup(
        &self,
        payroll_date_id: Uuid,
        assigned_by: Uuid,
        reason: &str,
    ) -> EngineResult<PayrollAssignment> {
        let family_id = self.family_of_date(payroll_date_id)?;
        let lock = self.store.family_lock(family_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.current_of(family_id)?;
        let backup = current
            .consultants
            .backup
            .ok_or(EngineError::NoBackupConsultant {
                payroll_id: current.id,
            })?;

        let now = self.clock.now();
        let write = self.store.write(|tx| {
            write_assignment(tx, payroll_date_id, backup, true, assigned_by, reason, now)
        })?;
        if let Some(audit) = &write.audit {
            emit_audit(audit);
        }
        Ok(write.assignment)
    }

    /// The current assignment of a payroll date, if any.
    pub fn assignment_for(&self, payroll_date_id: Uuid) -> EngineResult<Option<PayrollAssignment>> {
        self.store.read(|t| {
            t.payroll_date(payroll_date_id)?;
            Ok(t.assignment(payroll_date_id).cloned())
        })
    }

    /// Audit rows of a payroll date, oldest first.
    ///
    /// The history outlives the date: rows remain readable after a new
    /// version replaced the date.
    pub fn assignment_history(&self, payroll_date_id: Uuid) -> EngineResult<Vec<PayrollAssignmentAudit>> {
        self.store.read(|t| {
            let audits: Vec<PayrollAssignmentAudit> =
                t.audits_for(payroll_date_id).into_iter().cloned().collect();
            if audits.is_empty() {
                t.payroll_date(payroll_date_id)?;
            }
            Ok(audits)
        })
    }

    fn family_of_date(&self, payroll_date_id: Uuid) -> EngineResult<Uuid> {
        self.store.read(|t| {
            let date = t.payroll_date(payroll_date_id)?;
            t.payroll(date.payroll_id).map(|p| p.family_id)
        })
    }
}
