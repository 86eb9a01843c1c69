//! Engine configuration

use crate::calendar::MonthKey;
use crate::error::{DeskError, Result};
use curve_math::distribution::DEFAULT_NOISE_AMPLITUDE;
use curve_math::{DistributionCalculator, DEFAULT_MONTH_COUNT};
use serde::Deserialize;
use std::path::PathBuf;

/// Prefix of every environment variable read by `DeskConfig::from_env`
pub const ENV_PREFIX: &str = "FORECAST_DESK_";

/// Settings for a forecasting session
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    /// Length of the rolling window in months
    pub month_count: usize,
    /// Bound on the AI forecast perturbation
    pub noise_amplitude: f64,
    /// Allowed gap between a distribution's sum and its budget
    pub sum_tolerance: f64,
    /// Root directory of the JSON file repository
    pub data_dir: PathBuf,
    /// User recorded on acknowledgments
    pub user_id: String,
    /// First month of the window; the current month when unset
    pub start_month: Option<MonthKey>,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            month_count: DEFAULT_MONTH_COUNT,
            noise_amplitude: DEFAULT_NOISE_AMPLITUDE,
            sum_tolerance: 0.01,
            data_dir: PathBuf::from(".forecast_desk"),
            user_id: "local-user".to_string(),
            start_month: None,
        }
    }
}

impl DeskConfig {
    /// Load `.env` if present, then overlay `FORECAST_DESK_*` variables on the defaults
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Build a config from `(name, value)` pairs; unrelated names are ignored
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::default();

        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match key {
                "MONTH_COUNT" => config.month_count = parse_var(&name, &value)?,
                "NOISE_AMPLITUDE" => config.noise_amplitude = parse_var(&name, &value)?,
                "SUM_TOLERANCE" => config.sum_tolerance = parse_var(&name, &value)?,
                "DATA_DIR" => config.data_dir = PathBuf::from(value),
                "USER_ID" => config.user_id = value,
                "START_MONTH" => config.start_month = Some(value.parse()?),
                _ => {}
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the calculator cannot work with
    pub fn validate(&self) -> Result<()> {
        self.calculator()?;
        if !(self.sum_tolerance.is_finite() && self.sum_tolerance > 0.0) {
            return Err(DeskError::ConfigError(format!(
                "sum_tolerance must be positive, got {}",
                self.sum_tolerance
            )));
        }
        if self.user_id.trim().is_empty() {
            return Err(DeskError::ConfigError("user_id must not be empty".to_string()));
        }
        Ok(())
    }

    /// Calculator configured for this session
    pub fn calculator(&self) -> Result<DistributionCalculator> {
        let calculator = DistributionCalculator::new(self.month_count)
            .and_then(|c| c.with_noise_amplitude(self.noise_amplitude))
            .map_err(|e| DeskError::ConfigError(e.to_string()))?;
        Ok(calculator)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DeskError::ConfigError(format!("{} has an invalid value: {}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = DeskConfig::default();
        assert_eq!(config.month_count, 12);
        assert_eq!(config.noise_amplitude, 0.1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_from_vars() {
        let config = DeskConfig::from_vars(vars(&[
            ("FORECAST_DESK_MONTH_COUNT", "18"),
            ("FORECAST_DESK_USER_ID", "pm-7"),
            ("FORECAST_DESK_START_MONTH", "2025-04"),
            ("PATH", "/usr/bin"),
        ]))
        .unwrap();

        assert_eq!(config.month_count, 18);
        assert_eq!(config.user_id, "pm-7");
        assert_eq!(config.start_month, Some(MonthKey::new(2025, 4).unwrap()));
    }

    #[test]
    fn test_invalid_values_are_reported() {
        assert!(DeskConfig::from_vars(vars(&[("FORECAST_DESK_MONTH_COUNT", "twelve")])).is_err());
        assert!(DeskConfig::from_vars(vars(&[("FORECAST_DESK_MONTH_COUNT", "0")])).is_err());
        assert!(DeskConfig::from_vars(vars(&[("FORECAST_DESK_NOISE_AMPLITUDE", "0.9")])).is_err());
    }
}
