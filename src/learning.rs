//! The learning loop: one epoch of simulate → aggregate → score → update.
//!
//! The loop owns the `LearnableParameters` and threads nothing else across
//! epochs (besides metrics for logging). Each epoch rebuilds the router
//! with the updated parameters baked into a fresh config; whether the
//! rebuilt router's generator restarts from the configured seed or
//! continues the previous state is governed by `RngMode`.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::aggregate;
use crate::checkpoint::{derive_target, Checkpoint};
use crate::config::{FlowConfig, LearningConfig, RngMode};
use crate::error::FlowError;
use crate::loss;
use crate::router::FlowRouter;
use crate::state::{CompletionEvent, StepEvent};
use crate::update::{
    update_gains, update_radial_bias, update_spike_kick, update_threshold, LearnableParameters,
};

/// Distribution summary of the aggregated per-bin estimate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct YHatStats {
    pub mean: f32,
    pub variance: f32,
    pub min: f32,
    pub max: f32,
}

impl YHatStats {
    fn of(y_hat: &[f32]) -> Self {
        Self {
            mean: loss::mean(y_hat),
            variance: loss::variance(y_hat),
            min: y_hat.iter().copied().fold(f32::INFINITY, f32::min),
            max: y_hat.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        }
    }
}

/// How far each learnable parameter moved this epoch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParamDeltas {
    pub gain_mean: f32,
    pub gain_variance: f32,
    pub lif_threshold: f32,
    pub radial_bias: f32,
    pub spike_kick: f32,
}

/// Write-once per-epoch summary, used for logging and checkpointing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningMetrics {
    pub epoch: u64,
    pub total_loss: f32,
    pub bin_loss: f32,
    pub spike_loss: f32,
    pub boundary_loss: f32,
    pub spike_rate: f32,
    pub completion_rate: f32,
    pub mean_radial_miss: f32,
    pub nonzero_bins: usize,
    pub y_hat_stats: YHatStats,
    pub param_deltas: ParamDeltas,
}

impl LearningMetrics {
    /// One-line headless report.
    pub fn summary(&self) -> String {
        format!(
            "epoch={} total={:.4} bin={:.4} spike={:.4} boundary={:.4} \
             spike_rate={:.3} completion={:.3} miss={:.3} nonzero_bins={}",
            self.epoch,
            self.total_loss,
            self.bin_loss,
            self.spike_loss,
            self.boundary_loss,
            self.spike_rate,
            self.completion_rate,
            self.mean_radial_miss,
            self.nonzero_bins,
        )
    }
}

pub struct LearningLoop {
    base_cfg: FlowConfig,
    learn: LearningConfig,
    params: LearnableParameters,
    router: FlowRouter,
    epoch: u64,
    prev_bin_loss: Option<f32>,
}

impl LearningLoop {
    pub fn new(cfg: FlowConfig, learn: LearningConfig) -> Result<Self, FlowError> {
        cfg.validate()?;
        learn.validate()?;
        let params = LearnableParameters::from_config(&cfg);
        let router = FlowRouter::with_gains(cfg, params.gains.clone())?;
        Ok(Self {
            base_cfg: cfg,
            learn,
            params,
            router,
            epoch: 0,
            prev_bin_loss: None,
        })
    }

    pub fn params(&self) -> &LearnableParameters {
        &self.params
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn router(&self) -> &FlowRouter {
        &self.router
    }

    /// Restore parameters and the epoch counter from a loaded checkpoint.
    pub fn resume(&mut self, checkpoint: &Checkpoint) -> Result<(), FlowError> {
        if checkpoint.params.gains.len() != self.base_cfg.bins {
            return Err(FlowError::Shape {
                what: "checkpoint gain count",
                expected: self.base_cfg.bins,
                actual: checkpoint.params.gains.len(),
            });
        }
        self.params = checkpoint.params.clone();
        self.epoch = checkpoint.epoch + 1;
        self.prev_bin_loss = Some(checkpoint.metrics.bin_loss);
        self.rebuild_router()?;
        Ok(())
    }

    /// Run one epoch and return its metrics.
    pub fn run_epoch(
        &mut self,
        energies: &[f32],
        target: &[f32],
    ) -> Result<LearningMetrics, FlowError> {
        self.run_epoch_inner(energies, target, None)
    }

    /// `run_epoch`, additionally recording every per-step particle event
    /// for visualization. Simulation semantics are unchanged.
    pub fn run_epoch_traced(
        &mut self,
        energies: &[f32],
        target: &[f32],
        trace: &mut Vec<StepEvent>,
    ) -> Result<LearningMetrics, FlowError> {
        self.run_epoch_inner(energies, target, Some(trace))
    }

    fn run_epoch_inner(
        &mut self,
        energies: &[f32],
        target: &[f32],
        mut trace: Option<&mut Vec<StepEvent>>,
    ) -> Result<LearningMetrics, FlowError> {
        let bins = self.base_cfg.bins;
        if target.len() != bins {
            return Err(FlowError::Shape {
                what: "target bin count",
                expected: bins,
                actual: target.len(),
            });
        }

        let seed_count = energies.len();
        let mut state = self.router.seed_state(energies);

        let mut completions: Vec<CompletionEvent> = Vec::with_capacity(seed_count);
        let mut scratch: Vec<StepEvent> = Vec::new();
        let mut spikes = 0usize;
        let mut particle_steps = 0usize;

        for _ in 0..self.learn.steps_per_epoch {
            if state.is_drained() {
                break;
            }
            scratch.clear();
            let out = self.router.step_traced(&mut state, &mut scratch)?;
            spikes += out.spikes;
            particle_steps += out.particle_steps;
            completions.extend(out.completions);
            if let Some(trace) = trace.as_mut() {
                trace.extend(scratch.iter().cloned());
            }
        }
        completions.extend(self.router.finish(&mut state)?.completions);

        let y_hat = aggregate(
            &completions,
            bins,
            self.base_cfg.radius,
            Some(target),
            &self.learn.aggregator,
        );

        let spike_rate = if particle_steps > 0 {
            spikes as f32 / particle_steps as f32
        } else {
            0.0
        };
        let completion_rate = if seed_count > 0 {
            completions.len() as f32 / seed_count as f32
        } else {
            0.0
        };
        let mean_radial_miss = loss::mean_radial_miss(&completions, self.base_cfg.radius);

        let bin_loss = loss::bin_loss(&y_hat, target, &self.params.gains, self.learn.lambda_gain);
        let spike_loss = loss::spike_rate_loss(spike_rate, self.learn.target_spike_rate);
        let boundary_loss = loss::boundary_loss(
            &completions,
            self.base_cfg.radius,
            self.learn.boundary_epsilon,
        );
        let total_loss = loss::total_loss(bin_loss, spike_loss, boundary_loss, &self.learn.loss_weights);

        let old = self.params.clone();
        if self.learn.enabled {
            update_gains(
                &mut self.params.gains,
                &y_hat,
                target,
                self.learn.rates.gain,
                self.learn.bounds.gain,
            );
            self.params.lif_threshold = update_threshold(
                self.params.lif_threshold,
                spike_rate,
                self.learn.target_spike_rate,
                self.learn.targets.spike_margin,
                self.learn.rates.lif,
                self.learn.bounds.threshold,
            );
            self.params.radial_bias = update_radial_bias(
                self.params.radial_bias,
                completion_rate,
                mean_radial_miss,
                &self.learn.targets,
                self.learn.rates.dynamics,
                self.learn.bounds.radial_bias,
            );
            self.params.spike_kick = update_spike_kick(
                self.params.spike_kick,
                mean_radial_miss,
                self.prev_bin_loss,
                bin_loss,
                &self.learn.targets,
                self.learn.rates.dynamics,
                self.learn.bounds.spike_kick,
            );
        }
        self.prev_bin_loss = Some(bin_loss);

        let gain_deltas: Vec<f32> = self
            .params
            .gains
            .iter()
            .zip(&old.gains)
            .map(|(new, old)| new - old)
            .collect();
        let param_deltas = ParamDeltas {
            gain_mean: loss::mean(&gain_deltas),
            gain_variance: loss::variance(&gain_deltas),
            lif_threshold: self.params.lif_threshold - old.lif_threshold,
            radial_bias: self.params.radial_bias - old.radial_bias,
            spike_kick: self.params.spike_kick - old.spike_kick,
        };

        self.rebuild_router()?;

        let metrics = LearningMetrics {
            epoch: self.epoch,
            total_loss,
            bin_loss,
            spike_loss,
            boundary_loss,
            spike_rate,
            completion_rate,
            mean_radial_miss,
            nonzero_bins: y_hat.iter().filter(|&&y| y > 0.0).count(),
            y_hat_stats: YHatStats::of(&y_hat),
            param_deltas,
        };

        info!(
            epoch = metrics.epoch,
            total_loss = metrics.total_loss,
            bin_loss = metrics.bin_loss,
            spike_rate = metrics.spike_rate,
            completion_rate = metrics.completion_rate,
            "epoch complete"
        );
        debug!(
            gain_mean = param_deltas.gain_mean,
            lif_threshold = param_deltas.lif_threshold,
            radial_bias = param_deltas.radial_bias,
            spike_kick = param_deltas.spike_kick,
            "parameter deltas"
        );

        self.epoch += 1;
        Ok(metrics)
    }

    /// Run the configured number of epochs over one energy/target pair.
    /// With no target supplied, one is derived from the energies.
    pub fn run(
        &mut self,
        energies: &[f32],
        target: Option<&[f32]>,
    ) -> Result<Vec<LearningMetrics>, FlowError> {
        let derived;
        let target: &[f32] = match target {
            Some(t) => t,
            None => {
                derived = derive_target(energies, self.base_cfg.bins);
                &derived
            }
        };

        let mut series = Vec::with_capacity(self.learn.epochs as usize);
        for _ in 0..self.learn.epochs {
            series.push(self.run_epoch(energies, target)?);
        }
        Ok(series)
    }

    /// Bake the current parameters into a fresh config and rebuild the
    /// router for the next epoch, honoring the configured RNG continuity.
    fn rebuild_router(&mut self) -> Result<(), FlowError> {
        let next_cfg = self.params.bake_into(&self.base_cfg);
        self.router = match self.learn.rng_mode {
            RngMode::ResetPerEpoch => FlowRouter::with_gains(next_cfg, self.params.gains.clone())?,
            RngMode::Continuous => FlowRouter::with_rng_state(
                next_cfg,
                self.params.gains.clone(),
                self.router.rng_state(),
            )?,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Bound;

    const ENERGIES: [f32; 8] = [10.0, 20.0, 15.0, 8.0, 12.0, 18.0, 22.0, 14.0];

    fn fixed_cfg() -> FlowConfig {
        FlowConfig {
            seed: Some(2024),
            ..FlowConfig::default()
        }
    }

    fn fast_learn() -> LearningConfig {
        LearningConfig {
            epochs: 5,
            steps_per_epoch: 10,
            ..LearningConfig::default()
        }
    }

    #[test]
    fn five_epochs_stay_finite_and_rates_stay_normalized() {
        let mut learner = LearningLoop::new(fixed_cfg(), fast_learn()).unwrap();
        let series = learner.run(&ENERGIES, Some(&ENERGIES)).unwrap();
        assert_eq!(series.len(), 5);
        for m in &series {
            assert!(m.total_loss.is_finite() && m.total_loss >= 0.0);
            assert!((0.0..=1.0).contains(&m.completion_rate), "completion {}", m.completion_rate);
            assert!((0.0..=1.0).contains(&m.spike_rate), "spike {}", m.spike_rate);
        }
    }

    #[test]
    fn epochs_are_numbered_consecutively() {
        let mut learner = LearningLoop::new(fixed_cfg(), fast_learn()).unwrap();
        let series = learner.run(&ENERGIES, Some(&ENERGIES)).unwrap();
        for (i, m) in series.iter().enumerate() {
            assert_eq!(m.epoch, i as u64);
        }
        assert_eq!(learner.epoch(), 5);
    }

    #[test]
    fn parameters_respect_bounds_after_every_epoch() {
        let mut learn = fast_learn();
        // Aggressive rates to slam into the bounds quickly.
        learn.rates.gain = 5.0;
        learn.rates.lif = 1.0;
        learn.rates.dynamics = 2.0;
        learn.bounds.gain = Bound::new(0.5, 1.5);
        let mut learner = LearningLoop::new(fixed_cfg(), learn).unwrap();
        learner.run(&ENERGIES, Some(&ENERGIES)).unwrap();

        let p = learner.params();
        for g in &p.gains {
            assert!((0.5..=1.5).contains(g), "gain out of bound: {g}");
        }
        let b = learn.bounds;
        assert!((b.threshold.min..=b.threshold.max).contains(&p.lif_threshold));
        assert!((b.radial_bias.min..=b.radial_bias.max).contains(&p.radial_bias));
        assert!((b.spike_kick.min..=b.spike_kick.max).contains(&p.spike_kick));
    }

    #[test]
    fn target_length_mismatch_is_rejected_before_simulation() {
        let mut learner = LearningLoop::new(fixed_cfg(), fast_learn()).unwrap();
        let err = learner.run_epoch(&ENERGIES, &[1.0; 5]).unwrap_err();
        assert!(matches!(err, FlowError::Shape { expected: 8, actual: 5, .. }));
    }

    #[test]
    fn disabled_learning_leaves_parameters_untouched() {
        let mut learn = fast_learn();
        learn.enabled = false;
        let mut learner = LearningLoop::new(fixed_cfg(), learn).unwrap();
        let before = learner.params().clone();
        let m = learner.run_epoch(&ENERGIES, &ENERGIES).unwrap();
        assert_eq!(learner.params(), &before);
        assert_eq!(m.param_deltas.lif_threshold, 0.0);
        assert_eq!(m.param_deltas.gain_mean, 0.0);
    }

    #[test]
    fn reset_rng_mode_repeats_identical_epochs_when_learning_is_off() {
        let mut learn = fast_learn();
        learn.enabled = false;
        learn.rng_mode = RngMode::ResetPerEpoch;
        let mut learner = LearningLoop::new(fixed_cfg(), learn).unwrap();
        let a = learner.run_epoch(&ENERGIES, &ENERGIES).unwrap();
        let b = learner.run_epoch(&ENERGIES, &ENERGIES).unwrap();
        assert_eq!(a.total_loss.to_bits(), b.total_loss.to_bits());
        assert_eq!(a.spike_rate.to_bits(), b.spike_rate.to_bits());
    }

    #[test]
    fn continuous_rng_mode_varies_across_epochs() {
        let mut learn = fast_learn();
        learn.enabled = false;
        learn.rng_mode = RngMode::Continuous;
        let mut learner = LearningLoop::new(fixed_cfg(), learn).unwrap();
        let a = learner.run_epoch(&ENERGIES, &ENERGIES).unwrap();
        let b = learner.run_epoch(&ENERGIES, &ENERGIES).unwrap();
        // Same inputs, but the generator stream continued, so the noisy
        // trajectories (and thus the losses) cannot repeat bit for bit.
        assert!(
            a.total_loss.to_bits() != b.total_loss.to_bits()
                || a.mean_radial_miss.to_bits() != b.mean_radial_miss.to_bits()
        );
    }

    #[test]
    fn traced_epoch_records_particle_events() {
        let mut learner = LearningLoop::new(fixed_cfg(), fast_learn()).unwrap();
        let mut trace = Vec::new();
        learner
            .run_epoch_traced(&ENERGIES, &ENERGIES, &mut trace)
            .unwrap();
        assert!(!trace.is_empty());
        assert!(trace.iter().any(|e| e.projected_bin.is_some() || e.energy > 0.0));
    }

    #[test]
    fn resume_restores_parameters_and_continues_the_epoch_count() {
        let mut learner = LearningLoop::new(fixed_cfg(), fast_learn()).unwrap();
        let metrics = learner.run_epoch(&ENERGIES, &ENERGIES).unwrap();
        let record = Checkpoint {
            epoch: metrics.epoch,
            params: learner.params().clone(),
            metrics,
        };

        let mut fresh = LearningLoop::new(fixed_cfg(), fast_learn()).unwrap();
        fresh.resume(&record).unwrap();
        assert_eq!(fresh.epoch(), 1);
        assert_eq!(fresh.params(), learner.params());
    }

    #[test]
    fn resume_rejects_a_checkpoint_with_the_wrong_bin_count() {
        let mut learner = LearningLoop::new(fixed_cfg(), fast_learn()).unwrap();
        let metrics = learner.run_epoch(&ENERGIES, &ENERGIES).unwrap();
        let mut record = Checkpoint {
            epoch: metrics.epoch,
            params: learner.params().clone(),
            metrics,
        };
        record.params.gains.truncate(4);

        let mut fresh = LearningLoop::new(fixed_cfg(), fast_learn()).unwrap();
        let err = fresh.resume(&record).unwrap_err();
        assert!(matches!(err, FlowError::Shape { expected: 8, actual: 4, .. }));
    }

    #[test]
    fn summary_mentions_the_epoch_and_losses() {
        let mut learner = LearningLoop::new(fixed_cfg(), fast_learn()).unwrap();
        let m = learner.run_epoch(&ENERGIES, &ENERGIES).unwrap();
        let s = m.summary();
        assert!(s.contains("epoch=0") && s.contains("total="), "got: {s}");
    }
}
