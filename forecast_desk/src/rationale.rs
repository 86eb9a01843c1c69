//! Explanations attached to AI forecast recommendations

use crate::record::{ForecastRecord, ForecastType};
use serde::{Deserialize, Serialize};

/// Text shown to the user and copied into the acknowledgment log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rationale {
    pub reasoning: String,
    pub factors: Vec<String>,
}

/// Source of the AI forecast explanation for a record
pub trait RationaleProvider: Send + Sync {
    fn rationale(&self, record: &ForecastRecord) -> Rationale;
}

/// Static templates keyed by CSI division
#[derive(Debug, Clone, Copy, Default)]
pub struct CsiRationaleProvider;

impl CsiRationaleProvider {
    /// Two-digit CSI division of a cost code such as `03-3000` or `033000`
    pub fn division(cost_code: &str) -> Option<&str> {
        let digits = cost_code.trim();
        let division = digits.get(..2)?;
        division
            .chars()
            .all(|c| c.is_ascii_digit())
            .then_some(division)
    }

    fn division_profile(division: &str) -> Option<(&'static str, &'static [&'static str])> {
        let profile: (&'static str, &'static [&'static str]) = match division {
            "01" => (
                "general requirements",
                &["Time-based staffing and site facilities", "Flat monthly burn across the schedule"],
            ),
            "02" => (
                "existing conditions",
                &["Demolition and abatement happen before new work", "Spend concentrated early"],
            ),
            "03" => (
                "concrete",
                &["Foundations and structure pour in the early-middle phase", "Weather windows limit placement"],
            ),
            "04" | "05" => (
                "masonry and metals",
                &["Structure follows foundations", "Steel deliveries drive a mid-schedule peak"],
            ),
            "06" | "07" | "08" => (
                "envelope and carpentry",
                &["Dry-in precedes interior trades", "Material lead times shift spend toward mid-project"],
            ),
            "09" | "10" | "11" | "12" => (
                "finishes and specialties",
                &["Finishes start once the building is dried in", "Spend ramps toward the end of the window"],
            ),
            "21" | "22" | "23" => (
                "mechanical and plumbing",
                &["Rough-in tracks the structure", "Equipment set and trim-out load the back half"],
            ),
            "26" | "27" | "28" => (
                "electrical and low voltage",
                &["Rough-in follows framing", "Terminations and commissioning land late"],
            ),
            "31" | "32" | "33" => (
                "sitework and utilities",
                &["Earthwork leads the schedule", "Paving and landscaping close it out"],
            ),
            _ => return None,
        };
        Some(profile)
    }
}

impl RationaleProvider for CsiRationaleProvider {
    fn rationale(&self, record: &ForecastRecord) -> Rationale {
        if record.forecast_type() == ForecastType::GcGr {
            return Rationale {
                reasoning: format!(
                    "General conditions for {} track project duration, so the AI forecast keeps \
                     spend close to level with a mild mid-schedule bulge.",
                    label(record)
                ),
                factors: vec![
                    "Supervision and site overhead accrue monthly".to_string(),
                    "Mobilization and closeout taper the ends".to_string(),
                ],
            };
        }

        let profile = Self::division(record.cost_code()).and_then(Self::division_profile);
        match profile {
            Some((scope, factors)) => Rationale {
                reasoning: format!(
                    "Typical {} cash flow for {} peaks mid-window; the AI forecast follows that \
                     pattern and tilts by the selected weight.",
                    scope,
                    label(record)
                ),
                factors: factors.iter().map(|f| f.to_string()).collect(),
            },
            None => Rationale {
                reasoning: format!(
                    "No trade profile is known for {}; the AI forecast applies the default \
                     mid-window curve.",
                    label(record)
                ),
                factors: vec!["Default construction cash-flow curve".to_string()],
            },
        }
    }
}

fn label(record: &ForecastRecord) -> String {
    if record.description().is_empty() {
        format!("cost code {}", record.cost_code())
    } else {
        format!("{} ({})", record.description(), record.cost_code())
    }
}
