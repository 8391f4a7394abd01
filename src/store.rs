//! In-memory payroll store.
//!
//! Holds payroll versions, payroll dates, consultant assignments and the
//! assignment audit trail, enforcing the constraints a relational schema
//! would: exactly one current version per family, unique
//! `(payroll_id, original_eft_date)`, and at most one assignment per payroll
//! date. Writes go through [`PayrollStore::write`], which applies all of a
//! transaction's changes or none of them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::NaiveDate;
use tracing::error;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{Payroll, PayrollAssignment, PayrollAssignmentAudit, PayrollDate};

/// Shared storage for every payroll family.
///
/// Table access is guarded by one `RwLock` held only for short reads and
/// atomic commits. Version transitions additionally serialize on a
/// per-family mutex from [`PayrollStore::family_lock`], so different
/// families never wait on each other's planning work.
#[derive(Debug, Default)]
pub struct PayrollStore {
    tables: RwLock<Tables>,
    family_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl PayrollStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against a consistent view of the tables.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        f(&tables)
    }

    /// Runs `f` as one transaction.
    ///
    /// If `f` fails, or leaves any family it touched without exactly one
    /// current version, every change it made is rolled back.
    pub fn write<T>(&self, f: impl FnOnce(&mut Transaction<'_>) -> EngineResult<T>) -> EngineResult<T> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let mut tx = Transaction {
            tables: &mut *tables,
            undo: Vec::new(),
            touched_families: HashSet::new(),
        };

        let result = f(&mut tx).and_then(|value| tx.validate().map(|()| value));
        if result.is_err() {
            tx.rollback();
        }
        result
    }

    /// The mutex that serializes version transitions of one family.
    pub fn family_lock(&self, family_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.family_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(family_id).or_default())
    }

    /// Imports a payroll row as-is, bypassing every constraint check.
    ///
    /// Used for migrating existing data. Families left with zero or several
    /// current versions are reported by later operations, never repaired.
    pub fn seed_payroll(&self, payroll: Payroll) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if payroll.is_current() {
            tables.current_by_family.insert(payroll.family_id, payroll.id);
        }
        let members = tables.families.entry(payroll.family_id).or_default();
        if !members.contains(&payroll.id) {
            members.push(payroll.id);
        }
        tables.payrolls.insert(payroll.id, payroll);
    }
}

/// The stored rows.
///
/// Only reachable through [`PayrollStore::read`] and [`Transaction`].
#[derive(Debug, Default)]
pub struct Tables {
    payrolls: HashMap<Uuid, Payroll>,
    families: HashMap<Uuid, Vec<Uuid>>,
    current_by_family: HashMap<Uuid, Uuid>,
    dates: HashMap<Uuid, PayrollDate>,
    dates_by_payroll: HashMap<Uuid, BTreeMap<NaiveDate, Uuid>>,
    assignments: HashMap<Uuid, PayrollAssignment>,
    audits: Vec<PayrollAssignmentAudit>,
}

impl Tables {
    /// Looks up one payroll version.
    pub fn payroll(&self, payroll_id: Uuid) -> EngineResult<&Payroll> {
        self.payrolls
            .get(&payroll_id)
            .ok_or(EngineError::PayrollNotFound { payroll_id })
    }

    /// Every version of a family, ordered by version number.
    pub fn family_versions(&self, family_id: Uuid) -> Vec<&Payroll> {
        let mut versions: Vec<&Payroll> = self
            .families
            .get(&family_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.payrolls.get(id))
            .collect();
        versions.sort_by_key(|p| p.version_number);
        versions
    }

    /// The family's current version.
    ///
    /// Fails with [`EngineError::VersioningInvariantViolation`] unless
    /// exactly one version is current and the current index agrees.
    pub fn current_version(&self, family_id: Uuid) -> EngineResult<&Payroll> {
        let current: Vec<&Payroll> = self
            .family_versions(family_id)
            .into_iter()
            .filter(|p| p.is_current())
            .collect();

        match (current.as_slice(), self.current_by_family.get(&family_id)) {
            ([only], Some(indexed)) if only.id == *indexed => Ok(*only),
            _ => Err(EngineError::VersioningInvariantViolation {
                family_id,
                current_count: current.len(),
            }),
        }
    }

    /// The family's pending draft, if any.
    pub fn draft_of_family(&self, family_id: Uuid) -> Option<&Payroll> {
        self.family_versions(family_id)
            .into_iter()
            .find(|p| p.is_draft())
    }

    /// Every pending draft in the store.
    pub fn drafts(&self) -> Vec<&Payroll> {
        let mut drafts: Vec<&Payroll> = self.payrolls.values().filter(|p| p.is_draft()).collect();
        drafts.sort_by_key(|p| (p.go_live_date, p.created_at));
        drafts
    }

    /// The highest version number used in a family, including drafts.
    pub fn max_version_number(&self, family_id: Uuid) -> u32 {
        self.family_versions(family_id)
            .last()
            .map_or(0, |p| p.version_number)
    }

    /// Looks up one payroll date.
    pub fn payroll_date(&self, payroll_date_id: Uuid) -> EngineResult<&PayrollDate> {
        self.dates
            .get(&payroll_date_id)
            .ok_or_else(|| EngineError::PayrollDateNotFound {
                reference: payroll_date_id.to_string(),
            })
    }

    /// Dates owned by one version, ordered by original EFT date.
    pub fn dates_of_payroll(&self, payroll_id: Uuid) -> Vec<&PayrollDate> {
        self.dates_by_payroll
            .get(&payroll_id)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter_map(|id| self.dates.get(id))
            .collect()
    }

    /// Dates owned by any version of a family, ordered by adjusted EFT date.
    pub fn family_dates(&self, family_id: Uuid) -> Vec<&PayrollDate> {
        let mut dates: Vec<&PayrollDate> = self
            .families
            .get(&family_id)
            .into_iter()
            .flatten()
            .flat_map(|id| self.dates_of_payroll(*id))
            .collect();
        dates.sort_by_key(|d| (d.adjusted_eft_date, d.original_eft_date));
        dates
    }

    /// The family's date for `original_eft_date`, whichever version owns it.
    pub fn family_date_by_original(
        &self,
        family_id: Uuid,
        original_eft_date: NaiveDate,
    ) -> Option<&PayrollDate> {
        self.families
            .get(&family_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.dates_by_payroll.get(id)?.get(&original_eft_date))
            .find_map(|id| self.dates.get(id))
    }

    /// The family's date whose adjusted, or failing that original, EFT
    /// date is `date`.
    pub fn find_family_date(&self, family_id: Uuid, date: NaiveDate) -> Option<&PayrollDate> {
        let dates = self.family_dates(family_id);
        dates
            .iter()
            .find(|d| d.adjusted_eft_date == date)
            .or_else(|| dates.iter().find(|d| d.original_eft_date == date))
            .copied()
    }

    /// The assignment of a payroll date.
    pub fn assignment(&self, payroll_date_id: Uuid) -> Option<&PayrollAssignment> {
        self.assignments.get(&payroll_date_id)
    }

    /// Audit rows of a payroll date in the order they were written.
    pub fn audits_for(&self, payroll_date_id: Uuid) -> Vec<&PayrollAssignmentAudit> {
        self.audits
            .iter()
            .filter(|a| a.payroll_date_id == payroll_date_id)
            .collect()
    }

    /// Total number of audit rows.
    pub fn audit_count(&self) -> usize {
        self.audits.len()
    }
}

enum Undo {
    PayrollInserted { id: Uuid, family_id: Uuid },
    PayrollReplaced(Payroll),
    PayrollRemoved { payroll: Payroll, position: usize },
    CurrentIndex { family_id: Uuid, previous: Option<Uuid> },
    DateInserted { id: Uuid, payroll_id: Uuid, original_eft_date: NaiveDate },
    DateReplaced(PayrollDate),
    DateRemoved(PayrollDate),
    AssignmentSet { payroll_date_id: Uuid, previous: Option<PayrollAssignment> },
    AuditAppended,
}

/// An open write transaction.
///
/// Dereferences to [`Tables`], so reads inside the transaction see its own
/// uncommitted writes.
pub struct Transaction<'a> {
    tables: &'a mut Tables,
    undo: Vec<Undo>,
    touched_families: HashSet<Uuid>,
}

impl Deref for Transaction<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        self.tables
    }
}

impl Transaction<'_> {
    /// Inserts a payroll version, or replaces the stored row with the same id.
    pub fn put_payroll(&mut self, payroll: Payroll) {
        let (id, family_id, is_current) = (payroll.id, payroll.family_id, payroll.is_current());

        match self.tables.payrolls.insert(id, payroll) {
            Some(previous) => self.undo.push(Undo::PayrollReplaced(previous)),
            None => {
                self.tables.families.entry(family_id).or_default().push(id);
                self.undo.push(Undo::PayrollInserted { id, family_id });
            }
        }

        let indexed = self.tables.current_by_family.get(&family_id).copied();
        if is_current && indexed != Some(id) {
            self.tables.current_by_family.insert(family_id, id);
            self.undo.push(Undo::CurrentIndex {
                family_id,
                previous: indexed,
            });
        } else if !is_current && indexed == Some(id) {
            self.tables.current_by_family.remove(&family_id);
            self.undo.push(Undo::CurrentIndex {
                family_id,
                previous: indexed,
            });
        }
        self.touched_families.insert(family_id);
    }

    /// Deletes a payroll version that owns no dates.
    pub fn remove_payroll(&mut self, payroll_id: Uuid) -> EngineResult<Payroll> {
        let payroll = self
            .tables
            .payrolls
            .remove(&payroll_id)
            .ok_or(EngineError::PayrollNotFound { payroll_id })?;

        let family_id = payroll.family_id;
        let members = self.tables.families.entry(family_id).or_default();
        let position = members.iter().position(|id| *id == payroll_id).unwrap_or(members.len());
        members.retain(|id| *id != payroll_id);

        if self.tables.current_by_family.get(&family_id) == Some(&payroll_id) {
            self.tables.current_by_family.remove(&family_id);
            self.undo.push(Undo::CurrentIndex {
                family_id,
                previous: Some(payroll_id),
            });
        }
        self.undo.push(Undo::PayrollRemoved {
            payroll: payroll.clone(),
            position,
        });
        self.touched_families.insert(family_id);
        Ok(payroll)
    }

    /// Inserts a payroll date.
    ///
    /// Fails with [`EngineError::DuplicateDate`] if the version already has
    /// a date for the same original EFT date.
    pub fn insert_date(&mut self, date: PayrollDate) -> EngineResult<()> {
        let by_original = self.tables.dates_by_payroll.entry(date.payroll_id).or_default();
        if by_original.contains_key(&date.original_eft_date) {
            return Err(EngineError::DuplicateDate {
                payroll_id: date.payroll_id,
                original_eft_date: date.original_eft_date,
            });
        }
        by_original.insert(date.original_eft_date, date.id);
        self.undo.push(Undo::DateInserted {
            id: date.id,
            payroll_id: date.payroll_id,
            original_eft_date: date.original_eft_date,
        });
        self.tables.dates.insert(date.id, date);
        Ok(())
    }

    /// Replaces the notes of a payroll date.
    pub fn set_date_notes(
        &mut self,
        payroll_date_id: Uuid,
        notes: Option<String>,
    ) -> EngineResult<PayrollDate> {
        let date = self
            .tables
            .dates
            .get_mut(&payroll_date_id)
            .ok_or_else(|| EngineError::PayrollDateNotFound {
                reference: payroll_date_id.to_string(),
            })?;
        let previous = std::mem::replace(&mut date.notes, notes);
        let updated = date.clone();
        self.undo.push(Undo::DateReplaced(PayrollDate {
            notes: previous,
            ..updated.clone()
        }));
        Ok(updated)
    }

    /// Deletes a payroll date and its assignment. Audit rows are kept.
    pub fn remove_date(&mut self, payroll_date_id: Uuid) -> EngineResult<PayrollDate> {
        let date = self
            .tables
            .dates
            .remove(&payroll_date_id)
            .ok_or_else(|| EngineError::PayrollDateNotFound {
                reference: payroll_date_id.to_string(),
            })?;
        if let Some(by_original) = self.tables.dates_by_payroll.get_mut(&date.payroll_id) {
            by_original.remove(&date.original_eft_date);
        }
        self.undo.push(Undo::DateRemoved(date.clone()));

        if let Some(previous) = self.tables.assignments.remove(&payroll_date_id) {
            self.undo.push(Undo::AssignmentSet {
                payroll_date_id,
                previous: Some(previous),
            });
        }
        Ok(date)
    }

    /// Inserts or replaces the assignment of a payroll date.
    pub fn put_assignment(&mut self, assignment: PayrollAssignment) -> EngineResult<()> {
        let payroll_date_id = assignment.payroll_date_id;
        if !self.tables.dates.contains_key(&payroll_date_id) {
            return Err(EngineError::PayrollDateNotFound {
                reference: payroll_date_id.to_string(),
            });
        }
        let previous = self.tables.assignments.insert(payroll_date_id, assignment);
        self.undo.push(Undo::AssignmentSet {
            payroll_date_id,
            previous,
        });
        Ok(())
    }

    /// Appends an audit row.
    pub fn append_audit(&mut self, audit: PayrollAssignmentAudit) {
        self.tables.audits.push(audit);
        self.undo.push(Undo::AuditAppended);
    }

    fn validate(&self) -> EngineResult<()> {
        for family_id in &self.touched_families {
            if let Err(err) = self.tables.current_version(*family_id) {
                error!(family_id = %family_id, error = %err, "Rejecting commit");
                return Err(err);
            }
        }
        Ok(())
    }

    fn rollback(&mut self) {
        let tables = &mut *self.tables;
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::PayrollInserted { id, family_id } => {
                    tables.payrolls.remove(&id);
                    if let Some(members) = tables.families.get_mut(&family_id) {
                        members.retain(|member| *member != id);
                        if members.is_empty() {
                            tables.families.remove(&family_id);
                        }
                    }
                }
                Undo::PayrollReplaced(previous) => {
                    tables.payrolls.insert(previous.id, previous);
                }
                Undo::PayrollRemoved { payroll, position } => {
                    let members = tables.families.entry(payroll.family_id).or_default();
                    members.insert(position.min(members.len()), payroll.id);
                    tables.payrolls.insert(payroll.id, payroll);
                }
                Undo::CurrentIndex {
                    family_id,
                    previous,
                } => match previous {
                    Some(id) => {
                        tables.current_by_family.insert(family_id, id);
                    }
                    None => {
                        tables.current_by_family.remove(&family_id);
                    }
                },
                Undo::DateInserted {
                    id,
                    payroll_id,
                    original_eft_date,
                } => {
                    tables.dates.remove(&id);
                    if let Some(by_original) = tables.dates_by_payroll.get_mut(&payroll_id) {
                        by_original.remove(&original_eft_date);
                    }
                }
                Undo::DateReplaced(previous) => {
                    tables.dates.insert(previous.id, previous);
                }
                Undo::DateRemoved(date) => {
                    tables
                        .dates_by_payroll
                        .entry(date.payroll_id)
                        .or_default()
                        .insert(date.original_eft_date, date.id);
                    tables.dates.insert(date.id, date);
                }
                Undo::AssignmentSet {
                    payroll_date_id,
                    previous,
                } => match previous {
                    Some(assignment) => {
                        tables.assignments.insert(payroll_date_id, assignment);
                    }
                    None => {
                        tables.assignments.remove(&payroll_date_id);
                    }
                },
                Undo::AuditAppended => {
                    tables.audits.pop();
                }
            }
        }
    }
}
