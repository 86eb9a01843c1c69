//! Forecast line items

use crate::calendar::MonthKey;
use crate::error::{DeskError, Result};
use curve_math::{monthly_variance, sanitize_amount, Method, Weight};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Monthly amounts keyed by month, in calendar order
pub type MonthlyAmounts = BTreeMap<MonthKey, f64>;

/// Budget classification of a forecast line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ForecastType {
    /// General Conditions & General Requirements
    #[serde(rename = "GC_GR")]
    GcGr,
    /// CSI-coded disbursement line
    #[serde(rename = "DRAW")]
    Draw,
}

impl ForecastType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastType::GcGr => "GC_GR",
            ForecastType::Draw => "DRAW",
        }
    }
}

impl fmt::Display for ForecastType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForecastType {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self> {
        let compact: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match compact.as_str() {
            "GCGR" => Ok(ForecastType::GcGr),
            "DRAW" => Ok(ForecastType::Draw),
            _ => Err(DeskError::ValidationError(format!(
                "Unknown forecast type: {}",
                s
            ))),
        }
    }
}

/// Input for creating a new forecast record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub id: String,
    pub forecast_type: ForecastType,
    /// CSI cost code, e.g. `03-3000`
    pub cost_code: String,
    pub description: String,
    pub budget: f64,
    pub cost_to_complete: f64,
    pub estimated_at_completion: f64,
    pub weight: Weight,
}

impl RecordDraft {
    /// Draft with the summary fields defaulted from the budget
    pub fn new(
        id: impl Into<String>,
        forecast_type: ForecastType,
        cost_code: impl Into<String>,
        budget: f64,
    ) -> Self {
        let budget = sanitize_amount(budget);
        Self {
            id: id.into(),
            forecast_type,
            cost_code: cost_code.into(),
            description: String::new(),
            budget,
            cost_to_complete: budget,
            estimated_at_completion: budget,
            weight: Weight::DEFAULT,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_weight(mut self, weight: Weight) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_summary(mut self, cost_to_complete: f64, estimated_at_completion: f64) -> Self {
        self.cost_to_complete = sanitize_amount(cost_to_complete);
        self.estimated_at_completion = sanitize_amount(estimated_at_completion);
        self
    }
}

/// One budget line with its monthly forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    id: String,
    forecast_type: ForecastType,
    cost_code: String,
    #[serde(default)]
    description: String,
    budget: f64,
    cost_to_complete: f64,
    estimated_at_completion: f64,
    method: Method,
    weight: Weight,
    monthly_distribution: MonthlyAmounts,
    previous_monthly_distribution: MonthlyAmounts,
}

impl ForecastRecord {
    /// Build a MANUAL record from a draft and an already computed distribution
    ///
    /// The previous snapshot starts equal to the fresh distribution.
    pub(crate) fn from_draft(draft: RecordDraft, window: &[MonthKey], amounts: &[f64]) -> Result<Self> {
        if draft.id.trim().is_empty() {
            return Err(DeskError::ValidationError(
                "Record id must not be empty".to_string(),
            ));
        }
        let monthly_distribution = zip_window(window, amounts)?;

        Ok(Self {
            id: draft.id,
            forecast_type: draft.forecast_type,
            cost_code: draft.cost_code,
            description: draft.description,
            budget: sanitize_amount(draft.budget),
            cost_to_complete: sanitize_amount(draft.cost_to_complete),
            estimated_at_completion: sanitize_amount(draft.estimated_at_completion),
            method: Method::Manual,
            weight: draft.weight,
            previous_monthly_distribution: monthly_distribution.clone(),
            monthly_distribution,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn forecast_type(&self) -> ForecastType {
        self.forecast_type
    }

    pub fn cost_code(&self) -> &str {
        &self.cost_code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn cost_to_complete(&self) -> f64 {
        self.cost_to_complete
    }

    pub fn estimated_at_completion(&self) -> f64 {
        self.estimated_at_completion
    }

    /// Estimated at completion minus budget
    pub fn variance(&self) -> f64 {
        self.estimated_at_completion - self.budget
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn monthly_distribution(&self) -> &MonthlyAmounts {
        &self.monthly_distribution
    }

    pub fn previous_monthly_distribution(&self) -> &MonthlyAmounts {
        &self.previous_monthly_distribution
    }

    /// Current minus previous forecast, month by month
    pub fn monthly_variance(&self) -> MonthlyAmounts {
        monthly_variance(&self.monthly_distribution, &self.previous_monthly_distribution)
    }

    /// Months of the forecast window, in order
    pub fn months(&self) -> Vec<MonthKey> {
        self.monthly_distribution.keys().copied().collect()
    }

    /// Amounts in window order
    pub fn amounts(&self) -> Vec<f64> {
        self.monthly_distribution.values().copied().collect()
    }

    /// Sum of the current monthly distribution
    pub fn distributed_total(&self) -> f64 {
        self.monthly_distribution.values().sum()
    }

    /// Replace the previous-forecast snapshot with the current distribution
    pub fn commit(&mut self) {
        self.previous_monthly_distribution = self.monthly_distribution.clone();
    }

    /// Overwrite exactly one month, leaving the method untouched
    pub fn edit_month(&mut self, month: MonthKey, amount: f64) -> Result<()> {
        let amount = if amount.is_finite() { amount } else { 0.0 };
        match self.monthly_distribution.get_mut(&month) {
            Some(cell) => {
                *cell = amount;
                Ok(())
            }
            None => Err(DeskError::ValidationError(format!(
                "Month {} is outside the forecast window of {}",
                month, self.id
            ))),
        }
    }

    /// Copy with a different method, for handing back to `ForecastEngine::upsert`
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Copy with a different weight
    pub fn with_weight(mut self, weight: Weight) -> Self {
        self.weight = weight;
        self
    }

    /// Copy with a different (sanitized) budget
    pub fn with_budget(mut self, budget: f64) -> Self {
        self.budget = sanitize_amount(budget);
        self
    }

    /// Copy with one month overwritten
    pub fn with_month(mut self, month: MonthKey, amount: f64) -> Result<Self> {
        self.edit_month(month, amount)?;
        Ok(self)
    }

    /// Check the structural invariants after deserialization
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(DeskError::DataError("Record id must not be empty".to_string()));
        }
        let current: Vec<&MonthKey> = self.monthly_distribution.keys().collect();
        let previous: Vec<&MonthKey> = self.previous_monthly_distribution.keys().collect();
        if current != previous {
            return Err(DeskError::DataError(format!(
                "Record {} has mismatched current and previous month keys",
                self.id
            )));
        }
        Ok(())
    }

    pub(crate) fn set_distribution(&mut self, amounts: &[f64]) -> Result<()> {
        let window = self.months();
        self.monthly_distribution = zip_window(&window, amounts)?;
        Ok(())
    }

    pub(crate) fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub(crate) fn set_weight(&mut self, weight: Weight) {
        self.weight = weight;
    }

    pub(crate) fn set_budget(&mut self, budget: f64) {
        self.budget = sanitize_amount(budget);
    }

    pub(crate) fn set_summary(&mut self, cost_to_complete: f64, estimated_at_completion: f64) {
        self.cost_to_complete = sanitize_amount(cost_to_complete);
        self.estimated_at_completion = sanitize_amount(estimated_at_completion);
    }

    pub(crate) fn set_labels(
        &mut self,
        forecast_type: ForecastType,
        cost_code: String,
        description: String,
    ) {
        self.forecast_type = forecast_type;
        self.cost_code = cost_code;
        self.description = description;
    }
}

fn zip_window(window: &[MonthKey], amounts: &[f64]) -> Result<MonthlyAmounts> {
    if window.len() != amounts.len() {
        return Err(DeskError::ValidationError(format!(
            "Window length ({}) doesn't match amounts length ({})",
            window.len(),
            amounts.len()
        )));
    }
    Ok(window.iter().copied().zip(amounts.iter().copied()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::rolling_window;

    fn sample() -> ForecastRecord {
        let window = rolling_window(MonthKey::new(2025, 1).unwrap(), 3);
        let draft = RecordDraft::new("R-1", ForecastType::Draw, "03-3000", 300.0)
            .with_summary(120.0, 330.0);
        ForecastRecord::from_draft(draft, &window, &[100.0, 100.0, 100.0]).unwrap()
    }

    #[test]
    fn test_new_record_starts_manual_with_matching_snapshot() {
        let record = sample();
        assert_eq!(record.method(), Method::Manual);
        assert_eq!(record.monthly_distribution(), record.previous_monthly_distribution());
        assert_eq!(record.variance(), 30.0);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_edit_month_touches_one_cell() {
        let mut record = sample();
        let february = MonthKey::new(2025, 2).unwrap();
        record.edit_month(february, 175.0).unwrap();

        let variance = record.monthly_variance();
        assert_eq!(variance[&february], 75.0);
        assert_eq!(variance.values().filter(|v| **v != 0.0).count(), 1);

        let outside = MonthKey::new(2026, 2).unwrap();
        assert!(record.edit_month(outside, 1.0).is_err());
    }

    #[test]
    fn test_commit_replaces_snapshot() {
        let mut record = sample();
        record.edit_month(MonthKey::new(2025, 3).unwrap(), 0.0).unwrap();
        record.commit();
        assert!(record.monthly_variance().values().all(|v| *v == 0.0));
    }

    #[test]
    fn test_forecast_type_parsing() {
        assert_eq!("GC_GR".parse::<ForecastType>().unwrap(), ForecastType::GcGr);
        assert_eq!("GC & GR".parse::<ForecastType>().unwrap(), ForecastType::GcGr);
        assert_eq!("draw".parse::<ForecastType>().unwrap(), ForecastType::Draw);
        assert!("labor".parse::<ForecastType>().is_err());
    }
}
