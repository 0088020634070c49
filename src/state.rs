//! Particle and per-epoch simulation state, plus seeding.

use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::config::{FlowConfig, SeedLayout};
use crate::geom::Vec2;
use crate::prng::Prng;
use crate::router::bin_index;

/// One energy-carrying particle. Owned exclusively by its `FlowState`.
#[derive(Debug, Clone)]
pub struct FlowParticle {
    /// Seeding index; stable for the whole epoch.
    pub id: usize,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Remaining energy; decays monotonically.
    pub energy: f32,
    /// LIF membrane potential.
    pub v: f32,
    /// Bin of the seed angle, used for alignment weighting downstream.
    pub home_bin: Option<usize>,
}

/// Mutable state of one epoch's simulation.
///
/// Born with one particle per input energy, shrinks monotonically as
/// particles project onto the boundary or starve, and is drained by the
/// time the router force-projects at the step limit.
#[derive(Debug, Clone)]
pub struct FlowState {
    pub step: u64,
    pub particles: Vec<FlowParticle>,
    /// Dense angular histogram; entries only ever grow.
    pub outputs: Vec<f32>,
}

impl FlowState {
    pub fn empty(bins: usize) -> Self {
        Self {
            step: 0,
            particles: Vec::new(),
            outputs: vec![0.0; bins],
        }
    }

    /// Place one particle per input energy on the configured layout.
    ///
    /// Particle `i` sits at angle `2π·i/N`, just inside the boundary when the
    /// seed radius is pushed to it, with a small outward nudge so motion has
    /// a defined direction even when seeded at the origin.
    pub fn seeded(cfg: &FlowConfig, energies: &[f32], rng: &mut Prng) -> Self {
        let n = energies.len();
        let r0 = cfg.seed_radius.min(cfg.radius * 0.999);

        let mut particles = Vec::with_capacity(n);
        for (i, &input) in energies.iter().enumerate() {
            let theta = TAU * (i as f32) / (n as f32);
            let radial = Vec2::from_angle(theta);
            let r = match cfg.seed_layout {
                SeedLayout::Ring => r0,
                // Area-uniform placement; one draw per particle, in order.
                SeedLayout::Disk => r0 * rng.next_f32_01().sqrt(),
            };
            particles.push(FlowParticle {
                id: i,
                pos: radial.scaled(r),
                vel: radial.scaled(0.05),
                energy: input.max(0.0),
                v: 0.0,
                home_bin: Some(bin_index(theta, cfg.bins)),
            });
        }

        Self {
            step: 0,
            particles,
            outputs: vec![0.0; cfg.bins],
        }
    }

    pub fn is_drained(&self) -> bool {
        self.particles.is_empty()
    }
}

/// A particle's terminal event: it landed (or was forced) onto a bin.
/// Produced by the stepper, consumed only by the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub particle: usize,
    pub bin: usize,
    /// Final position; distance from the boundary feeds the distance weight.
    pub pos: Vec2,
    /// Energy contributed to the histogram (gain applied).
    pub energy: f32,
    /// Whether the particle spiked on its last step.
    pub spiked: bool,
    pub home_bin: Option<usize>,
}

/// Read-only per-step record for visualization and the learning loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub particle: usize,
    pub pos: Vec2,
    pub vel: Vec2,
    pub energy: f32,
    pub v: f32,
    pub spiked: bool,
    pub projected_bin: Option<usize>,
}
