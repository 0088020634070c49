//! The flow router: advances every particle by one time unit.
//!
//! Per particle, per step, in order: LIF membrane update, spike decision,
//! velocity update (outward drift, spike kick, positional noise, speed
//! clamp), position integration, energy decay with a starvation floor, and
//! boundary projection. The router owns the shared PRNG; draws happen in
//! particle iteration order, which is what makes runs reproducible.

use std::f32::consts::TAU;

use crate::config::FlowConfig;
use crate::error::FlowError;
use crate::prng::Prng;
use crate::state::{CompletionEvent, FlowParticle, FlowState, StepEvent};

/// Map an angle to its histogram bin.
///
/// Total over all finite angles, 2π-periodic, and injective over equal-width
/// angular sectors; the final clamp absorbs the `t == 2π` rounding edge
/// (`rem_euclid` can round up to exactly 2π for tiny negative inputs).
pub fn bin_index(theta: f32, bins: usize) -> usize {
    let t = theta.rem_euclid(TAU);
    let idx = ((t / TAU) * bins as f32).floor() as usize;
    idx.min(bins - 1)
}

/// What one `step` (or the final force-projection) produced.
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    pub completions: Vec<CompletionEvent>,
    /// Spikes fired this step.
    pub spikes: usize,
    /// Particles that were alive at the top of this step.
    pub particle_steps: usize,
    /// Particles removed by the energy floor (no histogram contribution).
    pub deaths: usize,
}

impl StepOutcome {
    fn merge(&mut self, other: StepOutcome) {
        self.completions.extend(other.completions);
        self.spikes += other.spikes;
        self.particle_steps += other.particle_steps;
        self.deaths += other.deaths;
    }
}

#[derive(Debug)]
pub struct FlowRouter {
    cfg: FlowConfig,
    /// Per-bin multiplicative correction applied at projection time.
    gains: Vec<f32>,
    rng: Prng,
}

impl FlowRouter {
    pub fn new(cfg: FlowConfig) -> Result<Self, FlowError> {
        cfg.validate()?;
        let gains = vec![1.0; cfg.bins];
        let rng = Prng::new(cfg.seed.unwrap_or(1));
        Ok(Self { cfg, gains, rng })
    }

    /// Build a router with learned per-bin gains baked in.
    pub fn with_gains(cfg: FlowConfig, gains: Vec<f32>) -> Result<Self, FlowError> {
        cfg.validate()?;
        if gains.len() != cfg.bins {
            return Err(FlowError::Shape {
                what: "gain count",
                expected: cfg.bins,
                actual: gains.len(),
            });
        }
        let rng = Prng::new(cfg.seed.unwrap_or(1));
        Ok(Self { cfg, gains, rng })
    }

    /// Rebuild variant that keeps an existing generator state alive.
    pub(crate) fn with_rng_state(
        cfg: FlowConfig,
        gains: Vec<f32>,
        rng_state: u64,
    ) -> Result<Self, FlowError> {
        let mut router = Self::with_gains(cfg, gains)?;
        router.rng = Prng::from_state(rng_state);
        Ok(router)
    }

    pub fn cfg(&self) -> &FlowConfig {
        &self.cfg
    }

    pub fn gains(&self) -> &[f32] {
        &self.gains
    }

    pub(crate) fn rng_state(&self) -> u64 {
        self.rng.state()
    }

    /// Seed a fresh epoch state from an input energy vector.
    pub fn seed_state(&mut self, energies: &[f32]) -> FlowState {
        FlowState::seeded(&self.cfg, energies, &mut self.rng)
    }

    /// Advance all particles by one time unit.
    pub fn step(&mut self, state: &mut FlowState) -> Result<StepOutcome, FlowError> {
        self.step_inner(state, None)
    }

    /// `step`, additionally recording one `StepEvent` per particle.
    /// Stepping semantics are identical to `step`.
    pub fn step_traced(
        &mut self,
        state: &mut FlowState,
        trace: &mut Vec<StepEvent>,
    ) -> Result<StepOutcome, FlowError> {
        self.step_inner(state, Some(trace))
    }

    fn step_inner(
        &mut self,
        state: &mut FlowState,
        mut trace: Option<&mut Vec<StepEvent>>,
    ) -> Result<StepOutcome, FlowError> {
        let lif = self.cfg.lif;
        let dyn_ = self.cfg.dynamics;
        let bins_f = self.cfg.bins as f32;

        let mut out = StepOutcome {
            particle_steps: state.particles.len(),
            ..StepOutcome::default()
        };

        let mut kept = 0usize;
        for i in 0..state.particles.len() {
            let p = &mut state.particles[i];

            // 1. Membrane update.
            let energy_norm = (p.energy / bins_f).clamp(0.0, 1.0);
            let drive_noise = (self.rng.next_f32_01() - 0.5) * 0.1;
            let v_next = lif.decay * p.v + energy_norm + drive_noise;
            if !v_next.is_finite() {
                return Err(FlowError::Invariant {
                    particle: p.id,
                    step: state.step,
                    message: format!("membrane potential became non-finite ({v_next})"),
                });
            }
            let spiked = v_next >= lif.threshold;
            p.v = if spiked { lif.reset_value } else { v_next.max(0.0) };
            if spiked {
                out.spikes += 1;
            }

            // 2. Direction: outward from the origin, or random at the origin.
            let dir = match p.pos.normalized() {
                Some(d) => d,
                None => self.rng.gen_unit_vec(),
            };

            // 3. Velocity: drift, spike kick, positional noise, speed clamp.
            let mut vel = p.vel + dir.scaled(dyn_.radial_bias);
            if spiked {
                let jitter = self.rng.gen_jitter(dyn_.noise_std_dir);
                vel += dir.rotated(jitter).scaled(dyn_.spike_kick);
            }
            vel += self.rng.gen_unit_vec().scaled(dyn_.noise_std_pos);
            p.vel = vel.clamped_magnitude(dyn_.max_speed);

            // 4. Integrate.
            p.pos += p.vel;
            if !p.pos.is_finite() {
                return Err(FlowError::Invariant {
                    particle: p.id,
                    step: state.step,
                    message: "position became non-finite".to_string(),
                });
            }

            // 5. Energy decay and starvation.
            p.energy *= dyn_.energy_alpha;
            if !p.energy.is_finite() {
                return Err(FlowError::Invariant {
                    particle: p.id,
                    step: state.step,
                    message: "energy became non-finite".to_string(),
                });
            }
            let died = p.energy < dyn_.energy_floor;

            // 6. Projection onto the boundary.
            let mut projected = None;
            if !died && p.pos.length() >= self.cfg.radius {
                let bin = bin_index(p.pos.angle(), self.cfg.bins);
                let contrib = self.gains[bin] * p.energy.max(0.0);
                state.outputs[bin] += contrib;
                out.completions.push(CompletionEvent {
                    particle: p.id,
                    bin,
                    pos: p.pos,
                    energy: contrib,
                    spiked,
                    home_bin: p.home_bin,
                });
                projected = Some(bin);
            }

            if let Some(trace) = trace.as_mut() {
                trace.push(StepEvent {
                    particle: p.id,
                    pos: p.pos,
                    vel: p.vel,
                    energy: p.energy,
                    v: p.v,
                    spiked,
                    projected_bin: projected,
                });
            }

            if died {
                out.deaths += 1;
            } else if projected.is_none() {
                state.particles.swap(kept, i);
                kept += 1;
            }
        }
        state.particles.truncate(kept);
        state.step += 1;

        Ok(out)
    }

    /// Force-project every survivor, regardless of whether it reached the
    /// boundary. Called at the step limit so each epoch terminates with full
    /// energy accounting.
    pub fn finish(&mut self, state: &mut FlowState) -> Result<StepOutcome, FlowError> {
        let mut out = StepOutcome::default();
        for p in state.particles.drain(..) {
            let FlowParticle {
                id,
                pos,
                energy,
                home_bin,
                ..
            } = p;
            if !energy.is_finite() || !pos.is_finite() {
                return Err(FlowError::Invariant {
                    particle: id,
                    step: state.step,
                    message: "non-finite particle at force-projection".to_string(),
                });
            }
            let bin = bin_index(pos.angle(), self.cfg.bins);
            let contrib = self.gains[bin] * energy.max(0.0);
            state.outputs[bin] += contrib;
            out.completions.push(CompletionEvent {
                particle: id,
                bin,
                pos,
                energy: contrib,
                spiked: false,
                home_bin,
            });
        }
        Ok(out)
    }

    /// Drive a state to emptiness: up to `max_steps` ordinary steps, then
    /// force-projection. Returns everything the run produced; the bare
    /// histogram is left in `state.outputs`.
    pub fn run(&mut self, state: &mut FlowState) -> Result<StepOutcome, FlowError> {
        let mut total = StepOutcome::default();
        while state.step < self.cfg.max_steps as u64 && !state.is_drained() {
            total.merge(self.step(state)?);
        }
        total.merge(self.finish(state)?);
        Ok(total)
    }
}
