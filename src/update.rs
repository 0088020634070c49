//! Learnable parameters and their heuristic update rules.
//!
//! These are deliberately not an optimizer: each rule is a small pure
//! function that nudges one parameter in a direction justified by the
//! observed statistics, then clamps it to its configured bound. That keeps
//! every rule independently testable and its behavior explainable.

use serde::{Deserialize, Serialize};

use crate::config::{Bound, ControlTargets, FlowConfig};

/// The parameters the learning loop tunes across epochs. Every field stays
/// within its configured bound after every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnableParameters {
    /// Per-bin multiplicative correction, initialized to 1.0.
    pub gains: Vec<f32>,
    pub lif_threshold: f32,
    pub radial_bias: f32,
    pub spike_kick: f32,
}

impl LearnableParameters {
    pub fn from_config(cfg: &FlowConfig) -> Self {
        Self {
            gains: vec![1.0; cfg.bins],
            lif_threshold: cfg.lif.threshold,
            radial_bias: cfg.dynamics.radial_bias,
            spike_kick: cfg.dynamics.spike_kick,
        }
    }

    /// Derive next epoch's config with these parameters baked in.
    pub fn bake_into(&self, cfg: &FlowConfig) -> FlowConfig {
        let mut next = *cfg;
        next.lif.threshold = self.lif_threshold;
        next.dynamics.radial_bias = self.radial_bias;
        next.dynamics.spike_kick = self.spike_kick;
        next
    }
}

/// Gradient-style step on the per-bin gains: move each gain against the
/// signed bin error, then clamp.
pub fn update_gains(gains: &mut [f32], y_hat: &[f32], target: &[f32], lr: f32, bound: Bound) {
    for ((g, y), t) in gains.iter_mut().zip(y_hat).zip(target) {
        *g = bound.clamp(*g - lr * 2.0 * (y - t));
    }
}

/// Bang-bang threshold control: too many spikes raises the threshold, too
/// few lowers it, inside the margin nothing moves.
pub fn update_threshold(
    threshold: f32,
    observed_rate: f32,
    target_rate: f32,
    margin: f32,
    lr: f32,
    bound: Bound,
) -> f32 {
    let next = if observed_rate > target_rate + margin {
        threshold + lr
    } else if observed_rate < target_rate - margin {
        threshold - lr
    } else {
        threshold
    };
    bound.clamp(next)
}

/// Push particles outward when they fail to reach the boundary; ease off
/// slightly when nearly everything lands precisely.
pub fn update_radial_bias(
    bias: f32,
    completion_rate: f32,
    mean_miss: f32,
    targets: &ControlTargets,
    lr: f32,
    bound: Bound,
) -> f32 {
    let next = if completion_rate < targets.completion_target || mean_miss > targets.miss_high {
        bias + lr
    } else if completion_rate > targets.completion_high && mean_miss < targets.miss_low {
        bias - lr * 0.5
    } else {
        bias
    };
    bound.clamp(next)
}

/// Strengthen the spike kick when particles undershoot the boundary; back
/// off at half rate when the bin loss is worsening while landings are
/// already precise (overcorrection).
pub fn update_spike_kick(
    kick: f32,
    mean_miss: f32,
    prev_bin_loss: Option<f32>,
    bin_loss: f32,
    targets: &ControlTargets,
    lr: f32,
    bound: Bound,
) -> f32 {
    let worsening = prev_bin_loss.map(|prev| bin_loss > prev).unwrap_or(false);
    let next = if mean_miss > targets.miss_high {
        kick + lr
    } else if worsening && mean_miss < targets.miss_low {
        kick - lr * 0.5
    } else {
        kick
    };
    bound.clamp(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound() -> Bound {
        Bound::new(0.1, 2.0)
    }

    #[test]
    fn gains_step_against_the_bin_error() {
        let mut gains = vec![1.0, 1.0];
        update_gains(&mut gains, &[5.0, 1.0], &[3.0, 3.0], 0.1, Bound::new(0.0, 4.0));
        assert!(gains[0] < 1.0, "overshooting bin should lose gain");
        assert!(gains[1] > 1.0, "undershooting bin should get gain");
    }

    #[test]
    fn gains_never_escape_their_bound() {
        let b = Bound::new(0.0, 4.0);
        let mut gains = vec![1.0; 4];
        update_gains(&mut gains, &[1e9, -1e9, f32::MAX, 0.0], &[0.0; 4], 10.0, b);
        for g in &gains {
            assert!((b.min..=b.max).contains(g), "gain escaped bound: {g}");
        }
    }

    #[test]
    fn threshold_moves_only_outside_the_margin() {
        let b = bound();
        assert!(update_threshold(0.5, 0.5, 0.1, 0.05, 0.01, b) > 0.5);
        assert!(update_threshold(0.5, 0.0, 0.1, 0.05, 0.01, b) < 0.5);
        assert_eq!(update_threshold(0.5, 0.12, 0.1, 0.05, 0.01, b), 0.5);
    }

    #[test]
    fn threshold_clamps_under_extreme_rates() {
        let b = bound();
        let mut th = 0.5;
        for _ in 0..10_000 {
            th = update_threshold(th, 1.0, 0.0, 0.01, 0.1, b);
        }
        assert_eq!(th, b.max);
        for _ in 0..10_000 {
            th = update_threshold(th, 0.0, 1.0, 0.01, 0.1, b);
        }
        assert_eq!(th, b.min);
    }

    #[test]
    fn radial_bias_rises_when_particles_fall_short() {
        let b = Bound::new(0.0, 1.0);
        let t = ControlTargets::default();
        assert!(update_radial_bias(0.2, 0.3, 0.0, &t, 0.05, b) > 0.2);
        assert!(update_radial_bias(0.2, 1.0, 5.0, &t, 0.05, b) > 0.2);
        // Overshoot correction: everything lands, precisely.
        assert!(update_radial_bias(0.2, 1.0, 0.01, &t, 0.05, b) < 0.2);
        // In between: unchanged.
        assert_eq!(update_radial_bias(0.2, 0.9, 0.5, &t, 0.05, b), 0.2);
    }

    #[test]
    fn spike_kick_follows_miss_and_trend() {
        let b = Bound::new(0.0, 2.0);
        let t = ControlTargets::default();
        assert!(update_spike_kick(0.5, 3.0, None, 1.0, &t, 0.1, b) > 0.5);
        // Worsening loss with precise landings: back off at half rate.
        let backed = update_spike_kick(0.5, 0.01, Some(1.0), 2.0, &t, 0.1, b);
        assert!((backed - 0.45).abs() < 1e-6);
        // First epoch has no trend to react to.
        assert_eq!(update_spike_kick(0.5, 0.01, None, 2.0, &t, 0.1, b), 0.5);
    }

    #[test]
    fn bake_into_overrides_only_learnable_fields() {
        let cfg = FlowConfig::default();
        let mut params = LearnableParameters::from_config(&cfg);
        params.lif_threshold = 0.33;
        params.radial_bias = 0.44;
        params.spike_kick = 0.55;
        let next = params.bake_into(&cfg);
        assert_eq!(next.lif.threshold, 0.33);
        assert_eq!(next.dynamics.radial_bias, 0.44);
        assert_eq!(next.dynamics.spike_kick, 0.55);
        assert_eq!(next.bins, cfg.bins);
        assert_eq!(next.lif.decay, cfg.lif.decay);
    }
}
