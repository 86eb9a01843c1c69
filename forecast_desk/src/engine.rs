//! Method-change orchestration over the record store and the acknowledgment workflow
//!
//! `ForecastEngine` is the single mutation entry point for a project. Every
//! change recomputes what it has to, updates the in-memory state, then writes
//! through to the repository. A failed write is logged and retried by
//! `resync`; it never undoes the in-memory change.

use crate::acknowledgment::{Acknowledgment, AcknowledgmentStore, ReviewExit, ReviewState};
use crate::calendar::{current_month, rolling_window, MonthKey};
use crate::config::DeskConfig;
use crate::error::{DeskError, Result};
use crate::persistence::{ProjectRepository, ProjectSnapshot};
use crate::rationale::{CsiRationaleProvider, Rationale, RationaleProvider};
use crate::record::{ForecastRecord, ForecastType, RecordDraft};
use crate::store::{ForecastTotals, RecordStore};
use chrono::Utc;
use curve_math::{seed_for, DistributionCalculator, MathError, Method, Weight};
use tracing::{debug, info, warn};

/// Amounts closer than this are treated as unchanged by `upsert`
const AMOUNT_EPSILON: f64 = 1e-9;

/// What a method change did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodChange {
    /// Requested method was already active
    Unchanged,
    /// Distribution recomputed, no review involved
    Recomputed,
    /// Switched to AI_FORECAST and a review is now pending
    ReviewOpened,
    /// Switched to AI_FORECAST; an earlier acceptance still stands
    Reapplied,
}

/// Result of `ForecastEngine::upsert`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertOutcome {
    /// The record did not exist before
    pub inserted: bool,
    /// Set when the method changed
    pub method_change: Option<MethodChange>,
    /// The distribution was recomputed from method, weight and budget
    pub recomputed: bool,
    /// Months overwritten by raw cell edits
    pub edited_months: Vec<MonthKey>,
}

/// Forecast engine for one project
pub struct ForecastEngine<R: ProjectRepository> {
    project_id: String,
    config: DeskConfig,
    calculator: DistributionCalculator,
    window: Vec<MonthKey>,
    records: RecordStore,
    acknowledgments: AcknowledgmentStore,
    repository: R,
    rationale: Box<dyn RationaleProvider>,
    unsynced_acknowledgments: Vec<Acknowledgment>,
    out_of_sync: bool,
}

impl<R: ProjectRepository> ForecastEngine<R> {
    /// Start a session: read the project's records, log and memo
    pub fn open(project_id: impl Into<String>, config: DeskConfig, repository: R) -> Result<Self> {
        let project_id = project_id.into();
        config.validate()?;
        let calculator = config.calculator()?;
        let start = config.start_month.unwrap_or_else(current_month);
        let window = rolling_window(start, config.month_count);

        let snapshot = repository
            .load(&project_id)?
            .unwrap_or_else(|| ProjectSnapshot::empty(project_id.clone()));

        let records = RecordStore::from_records(snapshot.records)?;
        if let Some(record) = records
            .records()
            .iter()
            .find(|r| r.monthly_distribution().len() != config.month_count)
        {
            return Err(DeskError::DataError(format!(
                "Record {} spans {} months but the project is configured for {}",
                record.id(),
                record.monthly_distribution().len(),
                config.month_count
            )));
        }
        let mut acknowledgments =
            AcknowledgmentStore::restore(snapshot.acknowledgments, snapshot.previous_methods);
        acknowledgments.rebuild_pending(records.records().iter().map(|r| (r.id(), r.method())));

        info!(
            project = %project_id,
            records = records.len(),
            acknowledgments = acknowledgments.log().len(),
            pending = acknowledgments.pending_reviews().count(),
            "opened forecast project"
        );

        Ok(Self {
            project_id,
            config,
            calculator,
            window,
            records,
            acknowledgments,
            repository,
            rationale: Box::new(CsiRationaleProvider),
            unsynced_acknowledgments: Vec::new(),
            out_of_sync: false,
        })
    }

    /// Replace the default CSI rationale templates
    pub fn with_rationale_provider<P: RationaleProvider + 'static>(mut self, provider: P) -> Self {
        self.rationale = Box::new(provider);
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    /// Months assigned to newly created records
    pub fn window(&self) -> &[MonthKey] {
        &self.window
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn record(&self, record_id: &str) -> Result<&ForecastRecord> {
        self.records
            .get(record_id)
            .ok_or_else(|| DeskError::RecordNotFound(record_id.to_string()))
    }

    pub fn acknowledgments(&self) -> &AcknowledgmentStore {
        &self.acknowledgments
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repository
    }

    /// Whether some write to the repository failed since the last successful resync
    pub fn is_out_of_sync(&self) -> bool {
        self.out_of_sync
    }

    /// Distribution the calculator produces for a record id with these inputs
    pub fn distribution_for(
        &self,
        record_id: &str,
        budget: f64,
        method: Method,
        weight: Weight,
    ) -> Result<Vec<f64>> {
        let amounts = self
            .calculator
            .calculate(budget, method, weight, seed_for(record_id))?;

        let expected = curve_math::sanitize_amount(budget);
        let total: f64 = amounts.iter().sum();
        if (total - expected).abs() > self.config.sum_tolerance {
            return Err(MathError::CalculationError(format!(
                "{} distribution for {} sums to {:.2}, expected {:.2}",
                method, record_id, total, expected
            ))
            .into());
        }
        Ok(amounts)
    }

    /// Add a new MANUAL record with a freshly computed distribution
    pub fn create_record(&mut self, draft: RecordDraft) -> Result<&ForecastRecord> {
        if self.records.contains(&draft.id) {
            return Err(DeskError::DataError(format!(
                "Record {} already exists",
                draft.id
            )));
        }

        let amounts = self.distribution_for(&draft.id, draft.budget, Method::Manual, draft.weight)?;
        let record = ForecastRecord::from_draft(draft, &self.window, &amounts)?;
        let record_id = record.id().to_string();
        debug!(record = %record_id, budget = record.budget(), "created forecast record");

        self.records.put(record);
        self.persist_records();
        self.record(&record_id)
    }

    /// Change a record's method, opening a review when it moves into AI_FORECAST
    pub fn set_method(&mut self, record_id: &str, method: Method) -> Result<MethodChange> {
        let current = self.record(record_id)?.method();
        if current == method {
            return Ok(MethodChange::Unchanged);
        }
        if self.acknowledgments.is_pending(record_id) {
            return Err(DeskError::ReviewPending(record_id.to_string()));
        }

        if !method.is_ai() {
            self.recompute(record_id, method)?;
            self.persist_records();
            return Ok(MethodChange::Recomputed);
        }

        self.acknowledgments.remember_previous_method(record_id, current);
        self.recompute(record_id, method)?;

        let change = if self.acknowledgments.has_accepted(record_id) {
            info!(record = %record_id, previous = %current, "AI forecast re-applied under earlier acknowledgment");
            MethodChange::Reapplied
        } else {
            self.acknowledgments.open_review(record_id);
            info!(record = %record_id, previous = %current, "AI forecast review opened");
            MethodChange::ReviewOpened
        };

        self.persist_previous_methods();
        self.persist_records();
        Ok(change)
    }

    /// Change the weight and recompute with the current method
    pub fn set_weight(&mut self, record_id: &str, weight: Weight) -> Result<()> {
        let record = self.records.get_mut(record_id)?;
        let method = record.method();
        record.set_weight(weight);
        self.recompute(record_id, method)?;
        self.persist_records();
        Ok(())
    }

    /// Change the budget and recompute with the current method
    pub fn set_budget(&mut self, record_id: &str, budget: f64) -> Result<()> {
        let record = self.records.get_mut(record_id)?;
        let method = record.method();
        record.set_budget(budget);
        self.recompute(record_id, method)?;
        self.persist_records();
        Ok(())
    }

    /// Overwrite one month without involving the calculator
    pub fn edit_month(&mut self, record_id: &str, month: MonthKey, amount: f64) -> Result<()> {
        self.records.get_mut(record_id)?.edit_month(month, amount)?;
        debug!(record = %record_id, month = %month, amount, "edited month");
        self.persist_records();
        Ok(())
    }

    /// Update cost-to-complete and estimated-at-completion
    pub fn update_summary(
        &mut self,
        record_id: &str,
        cost_to_complete: f64,
        estimated_at_completion: f64,
    ) -> Result<()> {
        self.records
            .get_mut(record_id)?
            .set_summary(cost_to_complete, estimated_at_completion);
        self.persist_records();
        Ok(())
    }

    /// Replace one record's previous-forecast snapshot with its current distribution
    pub fn commit(&mut self, record_id: &str) -> Result<()> {
        self.records.get_mut(record_id)?.commit();
        info!(record = %record_id, "committed forecast snapshot");
        self.persist_records();
        Ok(())
    }

    /// Commit every record
    pub fn commit_all(&mut self) {
        let ids: Vec<String> = self.records.records().iter().map(|r| r.id().to_string()).collect();
        for id in ids {
            if let Ok(record) = self.records.get_mut(&id) {
                record.commit();
            }
        }
        info!(project = %self.project_id, "committed all forecast snapshots");
        self.persist_records();
    }

    /// Insert or replace a record
    ///
    /// A new record is created MANUAL and then moved to its requested method.
    /// For an existing record, a changed method, weight or budget recomputes
    /// the distribution; otherwise the months that differ are applied as raw edits.
    pub fn upsert(&mut self, incoming: ForecastRecord) -> Result<UpsertOutcome> {
        incoming.validate()?;

        let Some(existing) = self.records.get(incoming.id()).cloned() else {
            return self.insert(incoming);
        };

        let method_changed = existing.method() != incoming.method();
        if method_changed && self.acknowledgments.is_pending(existing.id()) {
            return Err(DeskError::ReviewPending(existing.id().to_string()));
        }

        let budget_changed = (existing.budget() - incoming.budget()).abs() > AMOUNT_EPSILON;
        let weight_changed = existing.weight() != incoming.weight();

        let edits: Vec<(MonthKey, f64)> = if method_changed || budget_changed || weight_changed {
            Vec::new()
        } else {
            let edits: Vec<(MonthKey, f64)> = incoming
                .monthly_distribution()
                .iter()
                .filter(|(month, amount)| {
                    existing
                        .monthly_distribution()
                        .get(*month)
                        .map_or(true, |old| (old - **amount).abs() > AMOUNT_EPSILON)
                })
                .map(|(month, amount)| (*month, *amount))
                .collect();
            if let Some((month, _)) = edits
                .iter()
                .find(|(month, _)| !existing.monthly_distribution().contains_key(month))
            {
                return Err(DeskError::ValidationError(format!(
                    "Month {} is outside the forecast window of {}",
                    month,
                    existing.id()
                )));
            }
            edits
        };

        let record_id = existing.id().to_string();
        {
            let record = self.records.get_mut(&record_id)?;
            record.set_labels(
                incoming.forecast_type(),
                incoming.cost_code().to_string(),
                incoming.description().to_string(),
            );
            record.set_summary(incoming.cost_to_complete(), incoming.estimated_at_completion());
            record.set_budget(incoming.budget());
            record.set_weight(incoming.weight());
        }

        let mut outcome = UpsertOutcome::default();
        if method_changed {
            outcome.method_change = Some(self.set_method(&record_id, incoming.method())?);
            outcome.recomputed = true;
        } else if budget_changed || weight_changed {
            self.recompute(&record_id, existing.method())?;
            outcome.recomputed = true;
            self.persist_records();
        } else {
            let record = self.records.get_mut(&record_id)?;
            for (month, amount) in edits {
                record.edit_month(month, amount)?;
                outcome.edited_months.push(month);
            }
            self.persist_records();
        }

        Ok(outcome)
    }

    fn insert(&mut self, incoming: ForecastRecord) -> Result<UpsertOutcome> {
        let draft = RecordDraft::new(
            incoming.id(),
            incoming.forecast_type(),
            incoming.cost_code(),
            incoming.budget(),
        )
        .with_description(incoming.description())
        .with_weight(incoming.weight())
        .with_summary(incoming.cost_to_complete(), incoming.estimated_at_completion());
        self.create_record(draft)?;

        let mut outcome = UpsertOutcome {
            inserted: true,
            recomputed: true,
            ..UpsertOutcome::default()
        };
        if incoming.method() != Method::Manual {
            outcome.method_change = Some(self.set_method(incoming.id(), incoming.method())?);
        }
        Ok(outcome)
    }

    /// Totals over one forecast type, or over all records
    pub fn totals(&self, forecast_type: Option<ForecastType>) -> ForecastTotals {
        self.records.totals(forecast_type)
    }

    /// Current review state of a record
    pub fn review_state(&self, record_id: &str) -> ReviewState {
        self.acknowledgments.state(record_id)
    }

    /// Ask to leave the review; refused while the review is pending
    pub fn request_close(&self, record_id: &str) -> ReviewExit {
        let exit = self.acknowledgments.request_close(record_id);
        if exit.is_blocked() {
            info!(record = %record_id, "close blocked, acknowledge or reject required");
        }
        exit
    }

    /// Explanation for the AI forecast of a record
    pub fn rationale_for(&self, record_id: &str) -> Result<Rationale> {
        Ok(self.rationale.rationale(self.record(record_id)?))
    }

    /// Accept the AI forecast as the configured user
    ///
    /// # Errors
    ///
    /// `RecordNotFound` for an unknown id, `InvalidState` when the record has
    /// no pending review.
    pub fn acknowledge(&mut self, record_id: &str) -> Result<Acknowledgment> {
        let user_id = self.config.user_id.clone();
        self.acknowledge_as(record_id, &user_id)
    }

    /// Accept the AI forecast; the method and distribution stay as they are
    pub fn acknowledge_as(&mut self, record_id: &str, user_id: &str) -> Result<Acknowledgment> {
        let entry = self.decide(record_id, user_id, true)?;
        info!(record = %record_id, user = %user_id, "AI forecast acknowledged");
        self.persist_acknowledgment(&entry);
        Ok(entry)
    }

    /// Reject the AI forecast as the configured user
    ///
    /// # Errors
    ///
    /// Same as [`ForecastEngine::acknowledge`].
    pub fn reject(&mut self, record_id: &str) -> Result<Acknowledgment> {
        let user_id = self.config.user_id.clone();
        self.reject_as(record_id, &user_id)
    }

    /// Reject the AI forecast and revert to the method used before it
    pub fn reject_as(&mut self, record_id: &str, user_id: &str) -> Result<Acknowledgment> {
        let entry = self.decide(record_id, user_id, false)?;
        let reverted = entry.previous_method;
        self.recompute(record_id, reverted)?;
        info!(record = %record_id, user = %user_id, reverted = %reverted, "AI forecast rejected");

        self.persist_acknowledgment(&entry);
        self.persist_records();
        Ok(entry)
    }

    fn decide(&mut self, record_id: &str, user_id: &str, accepted: bool) -> Result<Acknowledgment> {
        let reasoning = self.rationale_for(record_id)?.reasoning;
        self.acknowledgments
            .record_decision(record_id, user_id, accepted, reasoning, Utc::now())
            .ok_or_else(|| DeskError::InvalidState {
                record_id: record_id.to_string(),
                state: self.acknowledgments.state(record_id),
            })
    }

    /// Everything the repository should hold, as currently in memory
    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot {
            project_id: self.project_id.clone(),
            records: self.records.records().to_vec(),
            acknowledgments: self.acknowledgments.log().entries().to_vec(),
            previous_methods: self.acknowledgments.previous_methods().clone(),
        }
    }

    /// Rewrite records and memo and flush acknowledgments whose append failed
    pub fn resync(&mut self) -> Result<()> {
        self.repository
            .save_records(&self.project_id, self.records.records())?;
        self.repository
            .save_previous_methods(&self.project_id, self.acknowledgments.previous_methods())?;

        while let Some(entry) = self.unsynced_acknowledgments.first() {
            self.repository.append_acknowledgment(&self.project_id, entry)?;
            self.unsynced_acknowledgments.remove(0);
        }

        self.out_of_sync = false;
        info!(project = %self.project_id, "repository resynchronized");
        Ok(())
    }

    fn recompute(&mut self, record_id: &str, method: Method) -> Result<()> {
        let (budget, weight) = {
            let record = self.record(record_id)?;
            (record.budget(), record.weight())
        };
        let amounts = self.distribution_for(record_id, budget, method, weight)?;

        let record = self.records.get_mut(record_id)?;
        record.set_distribution(&amounts)?;
        record.set_method(method);
        debug!(record = %record_id, method = %method, weight = %weight, budget, "recomputed distribution");
        Ok(())
    }

    fn persist_records(&mut self) {
        if let Err(e) = self
            .repository
            .save_records(&self.project_id, self.records.records())
        {
            warn!(project = %self.project_id, error = %e, "failed to save forecast records");
            self.out_of_sync = true;
        }
    }

    fn persist_previous_methods(&mut self) {
        if let Err(e) = self
            .repository
            .save_previous_methods(&self.project_id, self.acknowledgments.previous_methods())
        {
            warn!(project = %self.project_id, error = %e, "failed to save previous methods");
            self.out_of_sync = true;
        }
    }

    fn persist_acknowledgment(&mut self, entry: &Acknowledgment) {
        // Keep the log in decision order behind any entry still waiting for resync
        if !self.unsynced_acknowledgments.is_empty() {
            debug!(project = %self.project_id, record = %entry.record_id, "queued acknowledgment behind unsynced entries");
            self.unsynced_acknowledgments.push(entry.clone());
            self.out_of_sync = true;
            return;
        }
        if let Err(e) = self.repository.append_acknowledgment(&self.project_id, entry) {
            warn!(project = %self.project_id, record = %entry.record_id, error = %e, "failed to append acknowledgment");
            self.unsynced_acknowledgments.push(entry.clone());
            self.out_of_sync = true;
        }
    }
}

impl<R: ProjectRepository> std::fmt::Debug for ForecastEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastEngine")
            .field("project_id", &self.project_id)
            .field("records", &self.records.len())
            .field("acknowledgments", &self.acknowledgments.log().len())
            .field("out_of_sync", &self.out_of_sync)
            .finish()
    }
}
