//! Completion aggregator: turns a noisy pile of boundary landings into a
//! smoothed per-bin energy estimate.
//!
//! Each completion gets three non-negative weights (landing precision,
//! energy match, angular alignment with its seed bin), combined
//! multiplicatively with configured exponents. Per bin the estimate is the
//! weighted mean of contributed energies, which keeps a handful of stray
//! particles from polluting a bin the way naive summation would.

use std::f32::consts::{PI, TAU};

use crate::config::AggregatorShape;
use crate::state::CompletionEvent;

const EPS: f32 = 1e-6;

/// Shortest arc between two bin centers, in radians.
pub fn angular_bin_distance(a: usize, b: usize, bins: usize) -> f32 {
    let ca = TAU * (a as f32 + 0.5) / bins as f32;
    let cb = TAU * (b as f32 + 0.5) / bins as f32;
    let d = (ca - cb).abs();
    if d > PI {
        TAU - d
    } else {
        d
    }
}

/// Per-bin weighted-mean energy estimate over an epoch's completions.
///
/// Without a `target` (or for a bin the target does not cover) the energy
/// weight falls back to a magnitude proxy against the largest completion
/// energy. Bins with no completions estimate 0.
pub fn aggregate(
    completions: &[CompletionEvent],
    bins: usize,
    radius: f32,
    target: Option<&[f32]>,
    shape: &AggregatorShape,
) -> Vec<f32> {
    let mut weighted = vec![0.0f32; bins];
    let mut weight_sum = vec![0.0f32; bins];

    let max_energy = completions
        .iter()
        .map(|c| c.energy)
        .fold(0.0f32, f32::max);

    for c in completions {
        let b = c.bin;

        let w_dist = (-((c.pos.length() - radius).abs()) / shape.sigma_r).exp();

        let w_energy = match target.and_then(|t| t.get(b).copied()) {
            Some(t) => (-((c.energy - t).abs()) / shape.sigma_e).exp(),
            None => c.energy / (max_energy + EPS),
        };

        let w_align = match c.home_bin {
            Some(home) => (-angular_bin_distance(home, b, bins) / shape.tau).exp(),
            None => 1.0,
        };

        let w = w_dist.powf(shape.alpha) * w_energy.powf(shape.beta) * w_align.powf(shape.gamma);

        weighted[b] += w * c.energy;
        weight_sum[b] += w;
    }

    let mut estimate = vec![0.0f32; bins];
    for b in 0..bins {
        if weight_sum[b] > 0.0 {
            estimate[b] = weighted[b] / weight_sum[b];
        }
    }
    estimate
}
