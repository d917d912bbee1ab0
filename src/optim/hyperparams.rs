use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::loss::loss_type::LossType;

/// How a layer's weights are drawn before training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitialWeightDistribution {
    /// Uniform in `±prefactor * sqrt(6 / (fan_in + fan_out))` (Glorot & Bengio).
    #[default]
    UniformAdaptive,
    /// Uniform in `±initial_weight_scale`.
    Uniform,
    /// Zero-mean Gaussian with standard deviation `initial_weight_scale`.
    Normal,
}

/// Per-layer training hyperparameters.
///
/// Copied into a layer at construction and never changed during a run. The
/// learning-rate and momentum schedules are pure functions of the number of
/// examples processed so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparams {
    pub initial_weight_distribution: InitialWeightDistribution,
    /// Uniform: amplitude, Normal: standard deviation.
    pub initial_weight_scale: f64,
    pub rate: f32,
    pub rate_annealing: f32,
    pub l1: f32,
    pub l2: f32,
    pub momentum_start: f32,
    /// Number of examples over which momentum moves from start to stable.
    pub momentum_ramp: u64,
    pub momentum_stable: f32,
    /// Cap on the squared norm of each unit's incoming weights.
    /// Serialized as `null` when unconstrained.
    #[serde(serialize_with = "ser_norm", deserialize_with = "de_norm")]
    pub max_w2: f32,
    pub loss: LossType,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Hyperparams {
            initial_weight_distribution: InitialWeightDistribution::UniformAdaptive,
            initial_weight_scale: 0.01,
            rate: 0.005,
            rate_annealing: 0.0,
            l1: 0.0,
            l2: 0.0,
            momentum_start: 0.0,
            momentum_ramp: 0,
            momentum_stable: 0.0,
            max_w2: f32::INFINITY,
            loss: LossType::CrossEntropy,
        }
    }
}

impl Hyperparams {
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_rate_annealing(mut self, rate_annealing: f32) -> Self {
        self.rate_annealing = rate_annealing;
        self
    }

    pub fn with_regularization(mut self, l1: f32, l2: f32) -> Self {
        self.l1 = l1;
        self.l2 = l2;
        self
    }

    pub fn with_momentum(mut self, start: f32, ramp: u64, stable: f32) -> Self {
        self.momentum_start = start;
        self.momentum_ramp = ramp;
        self.momentum_stable = stable;
        self
    }

    pub fn with_max_w2(mut self, max_w2: f32) -> Self {
        self.max_w2 = max_w2;
        self
    }

    pub fn with_loss(mut self, loss: LossType) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_initial_weights(
        mut self,
        distribution: InitialWeightDistribution,
        scale: f64,
    ) -> Self {
        self.initial_weight_distribution = distribution;
        self.initial_weight_scale = scale;
        self
    }

    /// True when layers need momentum buffers.
    pub fn has_momentum(&self) -> bool {
        self.momentum_start != 0.0 || self.momentum_stable != 0.0
    }

    /// Annealed learning rate after `n` processed examples.
    pub fn rate(&self, n: u64) -> f32 {
        self.rate / (1.0 + self.rate_annealing * n as f32)
    }

    /// Momentum after `n` processed examples: linear ramp from
    /// `momentum_start` to `momentum_stable`, constant once the ramp is over.
    pub fn momentum(&self, n: u64) -> f32 {
        let mut m = self.momentum_start;
        if self.momentum_ramp > 0 {
            if n >= self.momentum_ramp {
                m = self.momentum_stable;
            } else {
                let progress = n as f32 / self.momentum_ramp as f32;
                m += (self.momentum_stable - self.momentum_start) * progress;
            }
        }
        m
    }
}

fn ser_norm<S: Serializer>(value: &f32, s: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        s.serialize_some(value)
    } else {
        s.serialize_none()
    }
}

fn de_norm<'de, D: Deserializer<'de>>(d: D) -> Result<f32, D::Error> {
    Ok(Option::<f32>::deserialize(d)?.unwrap_or(f32::INFINITY))
}
