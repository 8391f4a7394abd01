//! The payroll engine.
//!
//! [`PayrollEngine`] ties the pure scheduling logic to the store: it
//! creates payroll families, persists generated dates, manages the version
//! chain and tracks consultant assignments. Operations on one family are
//! serialized by the family's lock; different families run in parallel.

mod assignments;
mod versioning;

use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Days, NaiveDate, Utc};
use tracing::{error, info};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::{EngineConfig, EngineSettings};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    GenerationOutcome, NewPayroll, Payroll, PayrollDate, VersionOutcome, VersionState,
};
use crate::scheduling::{
    AdjustmentRuleResolver, CalendarAdjuster, CycleSchedule, DatePlan, PayrollDateGenerator,
};
use crate::store::{PayrollStore, Transaction};

use assignments::{CarriedAssignments, assign_new_dates, emit_audit};

/// Generates, versions and assigns payroll dates.
///
/// # Example
///
/// ```
/// use payroll_engine::config::EngineConfig;
/// use payroll_engine::engine::PayrollEngine;
/// use payroll_engine::models::{NewPayroll, PayrollCycle, PayrollDateType};
/// use chrono::NaiveDate;
/// use uuid::Uuid;
///
/// let engine = PayrollEngine::from_config(&EngineConfig::default());
/// let outcome = engine.create_payroll(
///     NewPayroll {
///         client_id: Uuid::new_v4(),
///         name: "Acme monthly".to_string(),
///         cycle: PayrollCycle::Monthly,
///         date_type: PayrollDateType::FixedDate,
///         date_value: Some(15),
///         employee_count: None,
///         consultants: Default::default(),
///         status: Default::default(),
///         go_live_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
///         processing_days_before_eft: None,
///         holiday_country: None,
///         holiday_region: None,
///     },
///     Uuid::new_v4(),
/// )?;
///
/// assert_eq!(outcome.payroll.version_number, 1);
/// assert!(outcome.generation.is_some());
/// # Ok::<(), payroll_engine::error::EngineError>(())
/// ```
pub struct PayrollEngine {
    store: Arc<PayrollStore>,
    generator: PayrollDateGenerator,
    settings: EngineSettings,
    clock: Arc<dyn Clock>,
    planning_timeout: Option<Duration>,
}

impl PayrollEngine {
    /// Creates an engine over an empty store.
    pub fn new(config: &EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_store(config, clock, Arc::new(PayrollStore::new()))
    }

    /// Creates an engine using the system clock.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    /// Creates an engine over an existing store.
    pub fn with_store(config: &EngineConfig, clock: Arc<dyn Clock>, store: Arc<PayrollStore>) -> Self {
        let generator = PayrollDateGenerator::new(
            CalendarAdjuster::new(config.holidays()),
            Arc::new(AdjustmentRuleResolver::new(config.adjustment_rules().to_vec())),
        );
        Self {
            store,
            generator,
            settings: config.settings().clone(),
            clock,
            planning_timeout: None,
        }
    }

    /// Bounds the wall-clock time spent planning dates for one operation.
    ///
    /// Planning that overruns fails with [`EngineError::Timeout`] before
    /// anything is written.
    pub fn with_planning_timeout(mut self, timeout: Duration) -> Self {
        self.planning_timeout = Some(timeout);
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &PayrollStore {
        &self.store
    }

    /// The date generator.
    pub fn generator(&self) -> &PayrollDateGenerator {
        &self.generator
    }

    /// The engine settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The engine's time source.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Creates a new payroll family.
    ///
    /// The payroll becomes version 1 and current immediately. Dates are
    /// generated from go-live over the configured horizon and assigned to
    /// the primary consultant.
    pub fn create_payroll(&self, new: NewPayroll, actor_id: Uuid) -> EngineResult<VersionOutcome> {
        let now = self.clock.now();
        let defaults = &self.settings.defaults;
        let id = Uuid::new_v4();

        let payroll = Payroll {
            id,
            family_id: id,
            client_id: new.client_id,
            name: new.name,
            cycle: new.cycle,
            date_type: new.date_type,
            date_value: new.date_value,
            employee_count: new.employee_count,
            consultants: new.consultants,
            status: new.status,
            version_state: VersionState::Current,
            go_live_date: new.go_live_date,
            superseded_date: None,
            version_number: 1,
            version_reason: None,
            parent_payroll_id: None,
            created_by_user_id: actor_id,
            created_at: now,
            processing_days_before_eft: new
                .processing_days_before_eft
                .unwrap_or(defaults.processing_days_before_eft),
            holiday_country: new
                .holiday_country
                .unwrap_or_else(|| defaults.holiday_country.clone()),
            holiday_region: new.holiday_region.or_else(|| defaults.holiday_region.clone()),
        };
        CycleSchedule::validate_payroll(&payroll)?;

        let plan = self.plan_horizon(&payroll, payroll.go_live_date)?;
        let (generation, assigned) = self.store.write(|tx| {
            tx.put_payroll(payroll.clone());
            let persisted = persist_plan(tx, &payroll, plan, now)?;
            let assigned = assign_new_dates(
                tx,
                &payroll,
                &persisted.created,
                &CarriedAssignments::new(),
                actor_id,
                now,
            )?;
            Ok((persisted.outcome, assigned))
        })?;
        assigned.audits.iter().for_each(emit_audit);

        info!(
            payroll_id = %payroll.id,
            client_id = %payroll.client_id,
            cycle = %payroll.cycle,
            date_type = %payroll.date_type,
            dates = generation.created,
            actor_id = %actor_id,
            "Created payroll"
        );

        Ok(VersionOutcome {
            payroll,
            superseded: None,
            generation: Some(generation),
            removed_dates: 0,
            carried_forward: 0,
        })
    }

    /// Generates and stores dates for the current version in a window.
    ///
    /// At most `max_dates` dates are produced (the configured maximum when
    /// `None`, and never more than it). Dates whose original EFT date
    /// already exists anywhere in the family are left untouched and
    /// reported as skipped, so repeating a call creates nothing new.
    pub fn generate_dates(
        &self,
        payroll_id: Uuid,
        window_start: NaiveDate,
        window_end: NaiveDate,
        max_dates: Option<usize>,
    ) -> EngineResult<GenerationOutcome> {
        let family_id = self.family_of(payroll_id)?;
        let lock = self.store.family_lock(family_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.current_of(family_id)?;
        if current.id != payroll_id {
            return Err(EngineError::VersionNotCurrent { payroll_id });
        }

        let limit = self.settings.generation.max_dates_per_request;
        let max_dates = max_dates.map_or(limit, |requested| requested.min(limit));
        let plan = self
            .generator
            .plan(&current, window_start, window_end, max_dates, self.deadline())?;

        let now = self.clock.now();
        let (outcome, assigned) = self.store.write(|tx| {
            let persisted = persist_plan(tx, &current, plan, now)?;
            let assigned = assign_new_dates(
                tx,
                &current,
                &persisted.created,
                &CarriedAssignments::new(),
                current.created_by_user_id,
                now,
            )?;
            Ok((persisted.outcome, assigned))
        })?;
        assigned.audits.iter().for_each(emit_audit);

        info!(
            payroll_id = %payroll_id,
            created = outcome.created,
            skipped = outcome.skipped,
            truncated = outcome.truncated,
            "Generated payroll dates"
        );
        Ok(outcome)
    }

    fn family_of(&self, payroll_id: Uuid) -> EngineResult<Uuid> {
        self.store.read(|t| t.payroll(payroll_id).map(|p| p.family_id))
    }

    /// Reads the family's current version, logging invariant violations.
    fn current_of(&self, family_id: Uuid) -> EngineResult<Payroll> {
        self.store
            .read(|t| t.current_version(family_id).cloned())
            .inspect_err(|err| {
                if matches!(err, EngineError::VersioningInvariantViolation { .. }) {
                    error!(family_id = %family_id, error = %err, "Payroll family is inconsistent");
                }
            })
    }

    fn deadline(&self) -> Option<Instant> {
        self.planning_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout))
    }

    /// Plans `payroll` from `from` (never before go-live) to `from` or
    /// today, whichever is later, plus the horizon.
    fn plan_horizon(&self, payroll: &Payroll, from: NaiveDate) -> EngineResult<DatePlan> {
        let base = from.max(self.clock.today());
        let end = base
            .checked_add_days(Days::new(u64::from(self.settings.generation.horizon_days)))
            .unwrap_or(NaiveDate::MAX);
        self.generator.plan(
            payroll,
            from,
            end,
            self.settings.generation.max_dates_per_request,
            self.deadline(),
        )
    }
}

impl std::fmt::Debug for PayrollEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayrollEngine")
            .field("settings", &self.settings)
            .field("planning_timeout", &self.planning_timeout)
            .finish_non_exhaustive()
    }
}

struct PersistedPlan {
    outcome: GenerationOutcome,
    created: Vec<PayrollDate>,
}

/// Inserts a plan's dates for `payroll`, skipping dates the family already has.
fn persist_plan(
    tx: &mut Transaction<'_>,
    payroll: &Payroll,
    plan: DatePlan,
    now: DateTime<Utc>,
) -> EngineResult<PersistedPlan> {
    let mut dates = Vec::with_capacity(plan.dates.len());
    let mut created = Vec::new();
    let mut skipped = 0;

    for planned in plan.dates {
        if let Some(existing) = tx.family_date_by_original(payroll.family_id, planned.original_eft_date) {
            dates.push(existing.clone());
            skipped += 1;
            continue;
        }

        let row = PayrollDate {
            id: Uuid::new_v4(),
            payroll_id: payroll.id,
            original_eft_date: planned.original_eft_date,
            adjusted_eft_date: planned.adjusted_eft_date,
            processing_date: planned.processing_date,
            notes: None,
            created_at: now,
        };
        match tx.insert_date(row.clone()) {
            Ok(()) => {
                created.push(row.clone());
                dates.push(row);
            }
            Err(EngineError::DuplicateDate { .. }) => {
                if let Some(existing) = tx.family_date_by_original(payroll.family_id, planned.original_eft_date) {
                    dates.push(existing.clone());
                }
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(PersistedPlan {
        outcome: GenerationOutcome {
            payroll_id: payroll.id,
            created: created.len(),
            skipped,
            dates,
            truncated: plan.truncated,
            next_window_start: plan.next_window_start,
            warnings: plan.warnings,
        },
        created,
    })
}
