//! Shape factors for each distribution method
//!
//! Every curve is evaluated at a month index `i` in `[0, month_count)` and
//! returns an unnormalized factor. The weight ramp is applied on top.

use crate::method::{Method, Weight};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use statrs::function::logistic::logistic;

/// Steepness of the logistic ramp
const S_CURVE_STEEPNESS: f64 = 0.5;
/// Standard deviation of the bell curve, in months
const BELL_CURVE_SIGMA: f64 = 3.0;
/// Baseline of the AI forecast sine curve
const AI_BASELINE: f64 = 0.8;
/// Amplitude of the AI forecast sine curve
const AI_AMPLITUDE: f64 = 0.4;

/// Logistic ramp centered on the midpoint of the window
pub fn s_curve(i: usize, month_count: usize) -> f64 {
    let midpoint = month_count as f64 / 2.0;
    logistic(S_CURVE_STEEPNESS * (i as f64 - midpoint))
}

/// Gaussian peak at the midpoint of the window
pub fn bell_curve(i: usize, month_count: usize) -> f64 {
    let midpoint = month_count as f64 / 2.0;
    let z = (i as f64 - midpoint) / BELL_CURVE_SIGMA;
    (-0.5 * z * z).exp()
}

/// Sine hump with a deterministic perturbation
pub fn ai_forecast(i: usize, month_count: usize, seed: u64, noise_amplitude: f64) -> f64 {
    let phase = std::f64::consts::PI * i as f64 / month_count as f64;
    AI_BASELINE + AI_AMPLITUDE * phase.sin() + noise(seed, i, noise_amplitude)
}

/// Bounded perturbation in `[-amplitude, amplitude]`, fixed for a given seed and month
pub fn noise(seed: u64, month_index: usize, amplitude: f64) -> f64 {
    if !(amplitude.is_finite() && amplitude > 0.0) {
        return 0.0;
    }

    // Golden-ratio increment keeps neighbouring months on unrelated streams
    let month_seed = seed ^ (month_index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut rng = ChaCha8Rng::seed_from_u64(month_seed);
    rng.gen_range(-amplitude..=amplitude)
}

/// Shape factor for `method` at month `i`
pub fn shape_factor(
    method: Method,
    i: usize,
    month_count: usize,
    seed: u64,
    noise_amplitude: f64,
) -> f64 {
    match method {
        Method::Manual | Method::Linear => 1.0,
        Method::SCurve => s_curve(i, month_count),
        Method::BellCurve => bell_curve(i, month_count),
        Method::AiForecast => ai_forecast(i, month_count, seed, noise_amplitude),
    }
}

/// Linear tilt from `w` at the first month to 1.0 at the last month
pub fn weight_ramp(weight: Weight, i: usize, month_count: usize) -> f64 {
    if month_count <= 1 {
        return 1.0;
    }

    let w = weight.ratio();
    let progress = i as f64 / (month_count - 1) as f64;
    w + (1.0 - w) * progress
}
