//! # Forecast Desk Workspace
//!
//! Umbrella crate for the forecast desk: `curve_math` holds the distribution
//! curves and variance helpers, `forecast_desk` holds records, the
//! acknowledgment workflow and persistence.
//!
//! ## Example
//!
//! ```
//! use forecast_desk_workspace::{preview, Method, MonthKey, Weight};
//!
//! let start = MonthKey::new(2025, 1).unwrap();
//! let months = preview(120_000.0, Method::Linear, Weight::DEFAULT, start, 12).unwrap();
//! assert_eq!(months.len(), 12);
//! assert_eq!(months[0].0, start);
//! ```

pub use curve_math;
pub use forecast_desk;

pub use curve_math::{Method, Weight};
pub use forecast_desk::MonthKey;

/// Distributes a budget over a window starting at `start`, pairing each
/// amount with its calendar month.
///
/// The AI curve is seeded from the start month, so the same inputs always
/// give the same preview.
///
/// # Examples
///
/// ```
/// use forecast_desk_workspace::{preview, Method, MonthKey, Weight};
///
/// let start = MonthKey::new(2025, 11).unwrap();
/// let months = preview(90_000.0, Method::BellCurve, Weight::new(7), start, 6).unwrap();
/// let total: f64 = months.iter().map(|(_, amount)| amount).sum();
/// assert!((total - 90_000.0).abs() < 0.01);
/// assert_eq!(months[2].0.to_string(), "2026-01");
/// ```
pub fn preview(
    budget: f64,
    method: Method,
    weight: Weight,
    start: MonthKey,
    month_count: usize,
) -> curve_math::Result<Vec<(MonthKey, f64)>> {
    let seed = curve_math::seed_for(&start.to_string());
    let amounts = curve_math::distribute(budget, method, weight, month_count, seed)?;
    let window = forecast_desk::calendar::rolling_window(start, month_count);
    Ok(window.into_iter().zip(amounts).collect())
}
