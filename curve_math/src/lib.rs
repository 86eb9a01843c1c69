//! # Curve Math
//!
//! Mathematical calculations behind monthly budget forecasting.
//! This crate spreads a budget across a rolling horizon using a named
//! curve and compares one monthly forecast against another.

use thiserror::Error;

pub mod curves;
pub mod distribution;
pub mod method;
pub mod variance;

pub use distribution::{distribute, seed_for, DistributionCalculator};
pub use method::{sanitize_amount, Method, Weight};
pub use variance::{column_sums, monthly_variance, summarize, VarianceSummary};

/// Number of months in the standard rolling forecast window
pub const DEFAULT_MONTH_COUNT: usize = 12;

/// Errors that can occur in distribution and variance calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for curve math operations
pub type Result<T> = std::result::Result<T, MathError>;
