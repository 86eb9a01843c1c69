//! Period-over-period variance between monthly forecasts
//!
//! All functions are pure and total: keys present on only one side are
//! compared against zero rather than reported as errors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `current[k] - previous[k]` for every key of either map
pub fn monthly_variance<K>(
    current: &BTreeMap<K, f64>,
    previous: &BTreeMap<K, f64>,
) -> BTreeMap<K, f64>
where
    K: Ord + Clone,
{
    let mut variance: BTreeMap<K, f64> = current
        .iter()
        .map(|(key, value)| {
            let prior = previous.get(key).copied().unwrap_or(0.0);
            (key.clone(), value - prior)
        })
        .collect();

    for (key, prior) in previous {
        variance.entry(key.clone()).or_insert(-prior);
    }

    variance
}

/// Element-wise sum of monthly columns
pub fn column_sums<'a, K, I>(maps: I) -> BTreeMap<K, f64>
where
    K: Ord + Clone + 'a,
    I: IntoIterator<Item = &'a BTreeMap<K, f64>>,
{
    let mut totals = BTreeMap::new();
    for map in maps {
        for (key, value) in map {
            *totals.entry(key.clone()).or_insert(0.0) += value;
        }
    }
    totals
}

/// Aggregate view of a monthly variance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceSummary<K> {
    /// Sum of the current forecast
    pub total_current: f64,
    /// Sum of the previous forecast
    pub total_previous: f64,
    /// `total_current - total_previous`
    pub total_variance: f64,
    /// Month with the biggest upward move, if any month moved up
    pub largest_increase: Option<(K, f64)>,
    /// Month with the biggest downward move, if any month moved down
    pub largest_decrease: Option<(K, f64)>,
}

/// Summarize the variance between two monthly forecasts
pub fn summarize<K>(current: &BTreeMap<K, f64>, previous: &BTreeMap<K, f64>) -> VarianceSummary<K>
where
    K: Ord + Clone,
{
    let total_current: f64 = current.values().sum();
    let total_previous: f64 = previous.values().sum();

    let mut largest_increase: Option<(K, f64)> = None;
    let mut largest_decrease: Option<(K, f64)> = None;

    for (key, delta) in monthly_variance(current, previous) {
        if delta > 0.0 && largest_increase.as_ref().map_or(true, |(_, best)| delta > *best) {
            largest_increase = Some((key, delta));
        } else if delta < 0.0
            && largest_decrease.as_ref().map_or(true, |(_, worst)| delta < *worst)
        {
            largest_decrease = Some((key, delta));
        }
    }

    VarianceSummary {
        total_current,
        total_previous,
        total_variance: total_current - total_previous,
        largest_increase,
        largest_decrease,
    }
}
