//! Distribution methods and the inputs that drive them
//!
//! Contains the selectable curve shapes and the 1–10 weight tilt,
//! plus the clamping rules applied to user-entered numbers.

use crate::MathError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Curve used to spread a budget across the forecast window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Method {
    /// Even split, edited by hand afterwards
    #[serde(rename = "MANUAL")]
    Manual,
    /// Even split
    #[serde(rename = "LINEAR")]
    Linear,
    /// Logistic ramp centered on the middle of the window
    #[serde(rename = "S_CURVE")]
    SCurve,
    /// Gaussian peak in the middle of the window
    #[serde(rename = "BELL_CURVE")]
    BellCurve,
    /// Heuristic sine curve with a small seeded perturbation
    #[serde(rename = "AI_FORECAST")]
    AiForecast,
}

impl Method {
    /// All methods in display order
    pub const ALL: [Method; 5] = [
        Method::Manual,
        Method::Linear,
        Method::SCurve,
        Method::BellCurve,
        Method::AiForecast,
    ];

    /// Wire name of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Manual => "MANUAL",
            Method::Linear => "LINEAR",
            Method::SCurve => "S_CURVE",
            Method::BellCurve => "BELL_CURVE",
            Method::AiForecast => "AI_FORECAST",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Method::Manual => "Manual",
            Method::Linear => "Linear",
            Method::SCurve => "S-Curve",
            Method::BellCurve => "Bell Curve",
            Method::AiForecast => "AI Forecast",
        }
    }

    /// Whether this is the AI-recommended method that needs acknowledgment
    pub fn is_ai(&self) -> bool {
        matches!(self, Method::AiForecast)
    }
}

impl Default for Method {
    fn default() -> Self {
        Method::Manual
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "MANUAL" => Ok(Method::Manual),
            "LINEAR" => Ok(Method::Linear),
            "S_CURVE" | "SCURVE" => Ok(Method::SCurve),
            "BELL_CURVE" | "BELL" => Ok(Method::BellCurve),
            "AI_FORECAST" | "AI" => Ok(Method::AiForecast),
            _ => Err(MathError::InvalidInput(format!(
                "Unknown distribution method: {}",
                s
            ))),
        }
    }
}

/// Front/back-loading tilt, always within 1..=10
///
/// 10 leaves the curve untouched, 1 suppresses the early months the most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct Weight(u8);

impl Weight {
    pub const MIN: Weight = Weight(1);
    pub const MAX: Weight = Weight(10);
    pub const DEFAULT: Weight = Weight(5);

    /// Create a weight, clamping out-of-range values into 1..=10
    pub fn new(value: i64) -> Self {
        Weight(value.clamp(1, 10) as u8)
    }

    /// Parse user input, falling back to 1 when it is not a number
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            return Weight::new(value);
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Weight::new(value.round() as i64),
            _ => Weight::MIN,
        }
    }

    /// Raw 1..=10 value
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Weight scaled into 0.1..=1.0
    pub fn ratio(&self) -> f64 {
        f64::from(self.0) / 10.0
    }
}

impl Default for Weight {
    fn default() -> Self {
        Weight::DEFAULT
    }
}

impl From<i64> for Weight {
    fn from(value: i64) -> Self {
        Weight::new(value)
    }
}

impl From<Weight> for u8 {
    fn from(weight: Weight) -> Self {
        weight.0
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Clamp a user-entered currency amount: negatives and non-numbers become zero
pub fn sanitize_amount(amount: f64) -> f64 {
    if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        0.0
    }
}
