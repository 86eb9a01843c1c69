//! In-memory record collection and portfolio totals

use crate::error::{DeskError, Result};
use crate::record::{ForecastRecord, ForecastType, MonthlyAmounts};
use curve_math::{column_sums, monthly_variance};
use serde::{Deserialize, Serialize};

/// Aggregated footer over a set of records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastTotals {
    /// Number of records included
    pub record_count: usize,
    pub budget: f64,
    pub cost_to_complete: f64,
    pub estimated_at_completion: f64,
    /// Sum of `estimated_at_completion - budget`
    pub variance: f64,
    /// Column sums of the current monthly distribution
    pub monthly: MonthlyAmounts,
    /// Column sums of the previous snapshot
    pub previous_monthly: MonthlyAmounts,
    /// `monthly - previous_monthly` per column
    pub monthly_variance: MonthlyAmounts,
}

impl ForecastTotals {
    /// Aggregate every record yielded by `records`
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ForecastRecord>,
    {
        let records: Vec<&ForecastRecord> = records.into_iter().collect();

        let monthly = column_sums(records.iter().map(|r| r.monthly_distribution()));
        let previous_monthly =
            column_sums(records.iter().map(|r| r.previous_monthly_distribution()));
        let monthly_variance = monthly_variance(&monthly, &previous_monthly);

        Self {
            record_count: records.len(),
            budget: records.iter().map(|r| r.budget()).sum(),
            cost_to_complete: records.iter().map(|r| r.cost_to_complete()).sum(),
            estimated_at_completion: records.iter().map(|r| r.estimated_at_completion()).sum(),
            variance: records.iter().map(|r| r.variance()).sum(),
            monthly,
            previous_monthly,
            monthly_variance,
        }
    }
}

/// Records of the active project, in insertion order
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<ForecastRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from persisted records, rejecting duplicates and malformed rows
    pub fn from_records(records: Vec<ForecastRecord>) -> Result<Self> {
        let mut store = Self::new();
        for record in records {
            record.validate()?;
            if store.contains(record.id()) {
                return Err(DeskError::DataError(format!(
                    "Duplicate record id: {}",
                    record.id()
                )));
            }
            store.records.push(record);
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id() == id)
    }

    pub fn get(&self, id: &str) -> Option<&ForecastRecord> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Result<&mut ForecastRecord> {
        self.records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| DeskError::RecordNotFound(id.to_string()))
    }

    /// Insert a new record or replace the one with the same id
    pub(crate) fn put(&mut self, record: ForecastRecord) {
        match self.records.iter_mut().find(|r| r.id() == record.id()) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn records(&self) -> &[ForecastRecord] {
        &self.records
    }

    /// Records of one forecast type
    pub fn by_type(&self, forecast_type: ForecastType) -> impl Iterator<Item = &ForecastRecord> {
        self.records
            .iter()
            .filter(move |r| r.forecast_type() == forecast_type)
    }

    /// Totals over one forecast type, or over everything when `None`
    pub fn totals(&self, forecast_type: Option<ForecastType>) -> ForecastTotals {
        match forecast_type {
            Some(kind) => ForecastTotals::from_records(self.by_type(kind)),
            None => ForecastTotals::from_records(self.records.iter()),
        }
    }
}
