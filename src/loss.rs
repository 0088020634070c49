//! Pure loss functions and the small statistics helpers the metrics use.
//!
//! All losses are non-negative and side-effect-free; the learning loop only
//! reads them, it never differentiates through them.

use crate::config::LossWeights;
use crate::state::CompletionEvent;

/// Squared error between the aggregated estimate and the target, plus an L2
/// penalty on the per-bin gains. Zero iff the estimate matches the target
/// and the penalty term vanishes.
pub fn bin_loss(y_hat: &[f32], target: &[f32], gains: &[f32], lambda_gain: f32) -> f32 {
    let fit: f32 = y_hat
        .iter()
        .zip(target)
        .map(|(y, t)| (y - t) * (y - t))
        .sum();
    let reg: f32 = gains.iter().map(|g| g * g).sum();
    fit + lambda_gain * reg
}

pub fn spike_rate_loss(observed_rate: f32, target_rate: f32) -> f32 {
    let d = observed_rate - target_rate;
    d * d
}

/// Mean radial miss beyond the tolerance band: zero when every completion
/// lands within `epsilon` of the boundary, and zero for an empty epoch.
pub fn boundary_loss(completions: &[CompletionEvent], radius: f32, epsilon: f32) -> f32 {
    if completions.is_empty() {
        return 0.0;
    }
    let total: f32 = completions
        .iter()
        .map(|c| ((c.pos.length() - radius).abs() - epsilon).max(0.0))
        .sum();
    total / completions.len() as f32
}

pub fn total_loss(bin: f32, spike: f32, boundary: f32, weights: &LossWeights) -> f32 {
    bin + weights.spike * spike + weights.boundary * boundary
}

/// Mean distance from the boundary over all completions (0 for none).
pub fn mean_radial_miss(completions: &[CompletionEvent], radius: f32) -> f32 {
    if completions.is_empty() {
        return 0.0;
    }
    let total: f32 = completions
        .iter()
        .map(|c| (c.pos.length() - radius).abs())
        .sum();
    total / completions.len() as f32
}

pub fn mean(xs: &[f32]) -> f32 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f32>() / xs.len() as f32
}

/// Population variance (0 for empty input).
pub fn variance(xs: &[f32]) -> f32 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m) * (x - m)).sum::<f32>() / xs.len() as f32
}
