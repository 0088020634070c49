//! Immutable configuration values for the router and the learning loop.
//!
//! Configs are validated up front (`validate`) and then treated as
//! read-only: constructors take them by value and nothing in the core
//! reaches for shared/global state.

use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// Inclusive clamp range for one learnable parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bound {
    pub min: f32,
    pub max: f32,
}

impl Bound {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn clamp(&self, v: f32) -> f32 {
        v.clamp(self.min, self.max)
    }
}

/// Where seed particles are placed around the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedLayout {
    Ring,
    Disk,
}

/// Spike surrogate shape, resolved once from its config name.
///
/// The heuristic learner never differentiates through the simulator, so the
/// surrogate only tags which shape a config asked for; keeping it a closed
/// enum means an unknown name fails at load time, not per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surrogate {
    FastSigmoid,
    Rectangular,
    Arctan,
}

impl Surrogate {
    pub fn from_name(name: &str) -> Result<Self, FlowError> {
        match name {
            "fast_sigmoid" => Ok(Surrogate::FastSigmoid),
            "rectangular" => Ok(Surrogate::Rectangular),
            "arctan" => Ok(Surrogate::Arctan),
            other => Err(FlowError::Config(format!(
                "unknown surrogate '{other}' (expected fast_sigmoid|rectangular|arctan)"
            ))),
        }
    }
}

/// Leaky-integrate-and-fire membrane parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LifConfig {
    pub decay: f32,
    pub threshold: f32,
    pub reset_value: f32,
    pub surrogate: Surrogate,
}

/// Per-step motion and energy parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DynamicsConfig {
    pub radial_bias: f32,
    pub spike_kick: f32,
    pub noise_std_pos: f32,
    pub noise_std_dir: f32,
    pub max_speed: f32,
    pub energy_alpha: f32,
    pub energy_floor: f32,
}

/// Immutable simulation configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Maximum simulated steps before survivors are force-projected.
    pub max_steps: u32,
    /// Boundary circle radius.
    pub radius: f32,
    /// Angular histogram resolution; must equal the upstream encoder's base.
    pub bins: usize,
    pub seed_layout: SeedLayout,
    /// Seed ring/disk radius; never placed exactly on the boundary.
    pub seed_radius: f32,
    pub lif: LifConfig,
    pub dynamics: DynamicsConfig,
    /// If set, makes runs reproducible.
    pub seed: Option<u64>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            radius: 10.0,
            bins: 8,
            seed_layout: SeedLayout::Ring,
            seed_radius: 2.0,
            lif: LifConfig {
                decay: 0.9,
                threshold: 0.6,
                reset_value: 0.0,
                surrogate: Surrogate::FastSigmoid,
            },
            dynamics: DynamicsConfig {
                radial_bias: 0.15,
                spike_kick: 0.5,
                noise_std_pos: 0.05,
                noise_std_dir: 0.3,
                max_speed: 1.5,
                energy_alpha: 0.995,
                energy_floor: 0.01,
            },
            seed: None,
        }
    }
}

impl FlowConfig {
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.max_steps < 1 {
            return Err(FlowError::Config("max_steps must be >= 1".into()));
        }
        if !(self.radius > 0.0) || !self.radius.is_finite() {
            return Err(FlowError::Config("radius must be positive and finite".into()));
        }
        if self.bins < 1 {
            return Err(FlowError::Config("bins must be >= 1".into()));
        }
        if !(0.0..self.radius).contains(&self.seed_radius) {
            return Err(FlowError::Config(format!(
                "seed_radius must lie in [0, radius): got {} with radius {}",
                self.seed_radius, self.radius
            )));
        }
        if !(self.lif.decay > 0.0 && self.lif.decay < 1.0) {
            return Err(FlowError::Config("lif.decay must lie in (0, 1)".into()));
        }
        if !(self.lif.threshold > 0.0 && self.lif.threshold <= 1.0) {
            return Err(FlowError::Config("lif.threshold must lie in (0, 1]".into()));
        }
        if !(self.dynamics.max_speed > 0.0) {
            return Err(FlowError::Config("dynamics.max_speed must be positive".into()));
        }
        if !(self.dynamics.energy_alpha > 0.0 && self.dynamics.energy_alpha <= 1.0) {
            return Err(FlowError::Config("dynamics.energy_alpha must lie in (0, 1]".into()));
        }
        if self.dynamics.energy_floor < 0.0 {
            return Err(FlowError::Config("dynamics.energy_floor must be >= 0".into()));
        }
        if self.dynamics.noise_std_pos < 0.0 || self.dynamics.noise_std_dir < 0.0 {
            return Err(FlowError::Config("noise magnitudes must be >= 0".into()));
        }
        Ok(())
    }
}

/// Learning-rate block, one rate per parameter family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LearningRates {
    pub gain: f32,
    pub lif: f32,
    pub dynamics: f32,
}

/// Weights of the auxiliary losses in the total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LossWeights {
    pub spike: f32,
    pub boundary: f32,
}

/// Clamp ranges for every learnable parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParamBounds {
    pub threshold: Bound,
    pub radial_bias: Bound,
    pub spike_kick: Bound,
    pub gain: Bound,
}

/// Shape parameters of the completion aggregator's weighting scheme.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AggregatorShape {
    /// Distance-weight scale (radial miss tolerance).
    pub sigma_r: f32,
    /// Energy-weight scale (target-match tolerance).
    pub sigma_e: f32,
    /// Distance exponent.
    pub alpha: f32,
    /// Energy exponent.
    pub beta: f32,
    /// Alignment exponent.
    pub gamma: f32,
    /// Alignment scale in radians of arc.
    pub tau: f32,
}

impl Default for AggregatorShape {
    fn default() -> Self {
        Self {
            sigma_r: 1.0,
            sigma_e: 1.0,
            alpha: 1.0,
            beta: 1.0,
            gamma: 1.0,
            tau: 0.5,
        }
    }
}

/// Observed-statistic thresholds that steer the heuristic update rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ControlTargets {
    /// Completion-rate floor below which radial bias is pushed up.
    pub completion_target: f32,
    /// Completion-rate ceiling above which overshoot correction may apply.
    pub completion_high: f32,
    /// Mean radial miss above this counts as undershooting.
    pub miss_high: f32,
    /// Mean radial miss below this counts as precise.
    pub miss_low: f32,
    /// Dead band around the target spike rate.
    pub spike_margin: f32,
}

impl Default for ControlTargets {
    fn default() -> Self {
        Self {
            completion_target: 0.8,
            completion_high: 0.95,
            miss_high: 1.0,
            miss_low: 0.1,
            spike_margin: 0.05,
        }
    }
}

/// Whether the rebuilt router starts each epoch from the configured seed or
/// continues the previous epoch's generator state.
///
/// The source system reseeded on every rebuild, so cross-epoch randomness
/// was not continuous; that behavior is kept as the default rather than
/// silently changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RngMode {
    ResetPerEpoch,
    Continuous,
}

/// Immutable learning-loop configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LearningConfig {
    pub enabled: bool,
    pub epochs: u32,
    pub steps_per_epoch: u32,
    pub target_spike_rate: f32,
    pub rates: LearningRates,
    pub loss_weights: LossWeights,
    /// L2 weight on the per-bin gains inside the bin loss.
    pub lambda_gain: f32,
    /// Tolerance band for the boundary loss, in radius units.
    pub boundary_epsilon: f32,
    pub bounds: ParamBounds,
    pub aggregator: AggregatorShape,
    pub targets: ControlTargets,
    pub rng_mode: RngMode,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            epochs: 20,
            steps_per_epoch: 50,
            target_spike_rate: 0.1,
            rates: LearningRates {
                gain: 0.05,
                lif: 0.01,
                dynamics: 0.02,
            },
            loss_weights: LossWeights {
                spike: 1.0,
                boundary: 1.0,
            },
            lambda_gain: 0.001,
            boundary_epsilon: 0.25,
            bounds: ParamBounds {
                threshold: Bound::new(0.05, 1.0),
                radial_bias: Bound::new(0.0, 1.0),
                spike_kick: Bound::new(0.0, 2.0),
                gain: Bound::new(0.0, 4.0),
            },
            aggregator: AggregatorShape::default(),
            targets: ControlTargets::default(),
            rng_mode: RngMode::ResetPerEpoch,
        }
    }
}

impl LearningConfig {
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.epochs < 1 {
            return Err(FlowError::Config("epochs must be >= 1".into()));
        }
        if self.steps_per_epoch < 1 {
            return Err(FlowError::Config("steps_per_epoch must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&self.target_spike_rate) {
            return Err(FlowError::Config("target_spike_rate must lie in [0, 1]".into()));
        }
        if self.rates.gain < 0.0 || self.rates.lif < 0.0 || self.rates.dynamics < 0.0 {
            return Err(FlowError::Config("learning rates must be >= 0".into()));
        }
        if self.lambda_gain < 0.0 {
            return Err(FlowError::Config("lambda_gain must be >= 0".into()));
        }
        if self.boundary_epsilon < 0.0 {
            return Err(FlowError::Config("boundary_epsilon must be >= 0".into()));
        }
        if !(self.aggregator.sigma_r > 0.0)
            || !(self.aggregator.sigma_e > 0.0)
            || !(self.aggregator.tau > 0.0)
        {
            return Err(FlowError::Config(
                "aggregator scales sigma_r, sigma_e, tau must be positive".into(),
            ));
        }
        for (name, b) in [
            ("threshold", self.bounds.threshold),
            ("radial_bias", self.bounds.radial_bias),
            ("spike_kick", self.bounds.spike_kick),
            ("gain", self.bounds.gain),
        ] {
            if b.min > b.max {
                return Err(FlowError::Config(format!(
                    "bound for {name} has min {} > max {}",
                    b.min, b.max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configs_validate() {
        FlowConfig::default().validate().unwrap();
        LearningConfig::default().validate().unwrap();
    }

    #[test]
    fn seed_radius_must_stay_inside_boundary() {
        let mut cfg = FlowConfig::default();
        cfg.seed_radius = cfg.radius;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn decay_outside_open_interval_rejected() {
        let mut cfg = FlowConfig::default();
        cfg.lif.decay = 1.0;
        assert!(cfg.validate().is_err());
        cfg.lif.decay = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn nonpositive_radius_rejected() {
        let mut cfg = FlowConfig::default();
        cfg.radius = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_bound_rejected() {
        let mut learn = LearningConfig::default();
        learn.bounds.gain = Bound::new(2.0, 1.0);
        assert!(learn.validate().is_err());
    }

    #[test]
    fn surrogate_names_resolve_once() {
        assert_eq!(
            Surrogate::from_name("fast_sigmoid").unwrap(),
            Surrogate::FastSigmoid
        );
        assert!(Surrogate::from_name("mystery").is_err());
    }
}
