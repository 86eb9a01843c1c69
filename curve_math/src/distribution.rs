//! Budget distribution across a rolling window of months
//!
//! `distribute` is the calculator: shape factor × weight ramp per month,
//! then normalized so the months add back up to the budget.

use crate::curves::{shape_factor, weight_ramp};
use crate::method::{sanitize_amount, Method, Weight};
use crate::{MathError, Result, DEFAULT_MONTH_COUNT};
use sha2::{Digest, Sha256};

/// Default bound on the AI forecast perturbation
pub const DEFAULT_NOISE_AMPLITUDE: f64 = 0.1;

/// Derive the AI forecast noise seed for a record
///
/// First eight bytes of the SHA-256 of the id, little-endian, so the seed
/// does not depend on the toolchain.
pub fn seed_for(record_id: &str) -> u64 {
    let digest = Sha256::digest(record_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Spread `budget` over `month_count` months using `method` and `weight`
///
/// Uses the default noise amplitude for the AI forecast curve.
pub fn distribute(
    budget: f64,
    method: Method,
    weight: Weight,
    month_count: usize,
    seed: u64,
) -> Result<Vec<f64>> {
    DistributionCalculator::new(month_count)?.calculate(budget, method, weight, seed)
}

/// Calculator carrying the window length and the AI noise bound
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistributionCalculator {
    month_count: usize,
    noise_amplitude: f64,
}

impl DistributionCalculator {
    /// Create a calculator for a window of `month_count` months
    pub fn new(month_count: usize) -> Result<Self> {
        if month_count == 0 {
            return Err(MathError::InvalidInput(
                "Month count must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            month_count,
            noise_amplitude: DEFAULT_NOISE_AMPLITUDE,
        })
    }

    /// Override the AI forecast noise bound
    pub fn with_noise_amplitude(mut self, amplitude: f64) -> Result<Self> {
        // Anything at or above the sine baseline could drive a month negative
        if !amplitude.is_finite() || !(0.0..0.7).contains(&amplitude) {
            return Err(MathError::InvalidInput(format!(
                "Noise amplitude must be within [0, 0.7), got {}",
                amplitude
            )));
        }
        self.noise_amplitude = amplitude;
        Ok(self)
    }

    pub fn month_count(&self) -> usize {
        self.month_count
    }

    pub fn noise_amplitude(&self) -> f64 {
        self.noise_amplitude
    }

    /// Compute the monthly amounts; the result always sums to the (sanitized) budget
    pub fn calculate(
        &self,
        budget: f64,
        method: Method,
        weight: Weight,
        seed: u64,
    ) -> Result<Vec<f64>> {
        let budget = sanitize_amount(budget);
        let n = self.month_count;

        if budget == 0.0 {
            return Ok(vec![0.0; n]);
        }
        if n == 1 {
            return Ok(vec![budget]);
        }

        let base = budget / n as f64;
        let raw: Vec<f64> = (0..n)
            .map(|i| {
                let factor = shape_factor(method, i, n, seed, self.noise_amplitude);
                base * factor * weight_ramp(weight, i, n)
            })
            .collect();

        let raw_sum: f64 = raw.iter().sum();
        let mut amounts = if raw_sum.is_finite() && raw_sum > f64::EPSILON {
            let scale = budget / raw_sum;
            raw.iter().map(|value| value * scale).collect::<Vec<f64>>()
        } else {
            // Degenerate curve: fall back to an even split
            vec![base; n]
        };

        if amounts.iter().any(|value| !value.is_finite()) {
            return Err(MathError::CalculationError(format!(
                "{} distribution produced a non-finite amount",
                method
            )));
        }

        // Fold rounding drift into the largest month
        let drift = budget - amounts.iter().sum::<f64>();
        if drift != 0.0 {
            if let Some(largest) = amounts
                .iter_mut()
                .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            {
                *largest += drift;
            }
        }

        Ok(amounts)
    }
}

impl Default for DistributionCalculator {
    fn default() -> Self {
        Self {
            month_count: DEFAULT_MONTH_COUNT,
            noise_amplitude: DEFAULT_NOISE_AMPLITUDE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    const TOLERANCE: f64 = 0.01;

    fn sum(values: &[f64]) -> f64 {
        values.iter().sum()
    }

    #[rstest]
    #[case(Method::Manual)]
    #[case(Method::Linear)]
    #[case(Method::SCurve)]
    #[case(Method::BellCurve)]
    #[case(Method::AiForecast)]
    fn test_sum_matches_budget_for_every_weight(#[case] method: Method) {
        for budget in [0.0, 1.0, 999.99, 250_000.0, 1_200_000.0, 87_654_321.5] {
            for w in 1..=10 {
                let amounts = distribute(budget, method, Weight::new(w), 12, 7).unwrap();
                assert_eq!(amounts.len(), 12);
                assert!((sum(&amounts) - budget).abs() < TOLERANCE);
            }
        }
    }

    #[rstest]
    #[case(Method::Manual)]
    #[case(Method::Linear)]
    #[case(Method::SCurve)]
    #[case(Method::BellCurve)]
    #[case(Method::AiForecast)]
    fn test_first_month_grows_with_weight(#[case] method: Method) {
        let mut previous = 0.0;
        for w in 1..=10 {
            let amounts = distribute(600_000.0, method, Weight::new(w), 12, 99).unwrap();
            assert!(amounts[0] + 1e-9 >= previous);
            previous = amounts[0];
        }
    }

    #[test]
    fn test_zero_budget_returns_zeros() {
        for method in Method::ALL {
            for w in 1..=10 {
                let amounts = distribute(0.0, method, Weight::new(w), 12, 1).unwrap();
                assert_eq!(amounts, vec![0.0; 12]);
            }
        }
    }

    #[test]
    fn test_negative_budget_is_clamped() {
        let amounts = distribute(-5_000.0, Method::Linear, Weight::DEFAULT, 12, 0).unwrap();
        assert_eq!(amounts, vec![0.0; 12]);
    }

    #[test]
    fn test_single_month_takes_everything() {
        for method in Method::ALL {
            let amounts = distribute(1234.5, method, Weight::MIN, 1, 3).unwrap();
            assert_eq!(amounts, vec![1234.5]);
        }
    }

    #[test]
    fn test_zero_months_is_rejected() {
        assert!(distribute(100.0, Method::Linear, Weight::DEFAULT, 0, 0).is_err());
    }

    #[test]
    fn test_linear_full_weight_is_even() {
        let amounts = distribute(1_200_000.0, Method::Linear, Weight::MAX, 12, 0).unwrap();
        for amount in amounts {
            assert_relative_eq!(amount, 100_000.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_s_curve_scenario() {
        let amounts = distribute(1_200_000.0, Method::SCurve, Weight::new(5), 12, 0).unwrap();
        assert!(amounts[0] < amounts[5]);
        assert!(amounts[0] < amounts[6]);
        assert!((sum(&amounts) - 1_200_000.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_ai_forecast_is_deterministic_per_seed() {
        let seed = seed_for("DRAW-03-3000");
        let first = distribute(480_000.0, Method::AiForecast, Weight::new(6), 12, seed).unwrap();
        let second = distribute(480_000.0, Method::AiForecast, Weight::new(6), 12, seed).unwrap();
        assert_eq!(first, second);

        let other = distribute(480_000.0, Method::AiForecast, Weight::new(6), 12, seed.wrapping_add(1)).unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn test_seed_is_stable_across_builds() {
        assert_eq!(seed_for(""), 1_449_310_910_991_872_227);
        assert_eq!(seed_for("DRAW-03-3000"), 4_152_082_998_373_584_421);
        assert_eq!(seed_for("conc"), 18_010_960_671_189_885_759);
    }

    #[test]
    fn test_noise_amplitude_bounds() {
        let calculator = DistributionCalculator::default();
        assert!(calculator.with_noise_amplitude(0.7).is_err());
        assert!(calculator.with_noise_amplitude(-0.1).is_err());

        let quiet = calculator.with_noise_amplitude(0.0).unwrap();
        let a = quiet.calculate(1000.0, Method::AiForecast, Weight::MAX, 1).unwrap();
        let b = quiet.calculate(1000.0, Method::AiForecast, Weight::MAX, 2).unwrap();
        assert_eq!(a, b);
    }
}
