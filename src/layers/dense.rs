use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{Error, Result};
use crate::layers::kind::LayerKind;
use crate::loss::loss_type::LossType;
use crate::math::buffer::SharedBuffer;
use crate::optim::hyperparams::{Hyperparams, InitialWeightDistribution};
use crate::optim::sgd::{Layout, Sgd, Synapses};

/// What the layers feeding this one expose for a single forward or backward
/// call. The stack builds it by splitting its layer list, so a layer never
/// holds references to its neighbours between calls.
pub struct Upstream<'a> {
    /// The previous layer's activations. Mutable because input dropout
    /// zeroes features in place.
    pub activations: &'a mut [f32],
    /// The previous layer's error array, when it keeps one.
    pub errors: Option<&'a mut [f32]>,
    /// `Some(rate)` when the previous layer is the input layer.
    pub input_dropout: Option<f64>,
    /// Activations two layers up: the reconstruction target of a tied layer.
    pub reconstruction: Option<&'a [f32]>,
}

/// The supervision an output layer trains against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target<'a> {
    /// Hidden and tied layers take their signal from the stack.
    None,
    /// Class index for a Softmax output; `None` when the label is missing,
    /// in which case no unit is the target.
    Label(Option<usize>),
    /// Regression values for a Linear output, one per unit.
    Values(&'a [f32]),
}

/// One layer of a feed-forward stack.
///
/// Weights are row-major `units x prev_units`: `w[u * prev_units + i]` is the
/// weight from previous unit `i` to unit `u`. Tied layers alias the previous
/// layer's weights and read them transposed.
///
/// Cloning a layer aliases its weight, bias and momentum buffers and copies
/// its activations and errors.
#[derive(Debug, Clone)]
pub struct Layer {
    pub units: usize,
    pub kind: LayerKind,
    pub params: Hyperparams,
    index: usize,
    prev_units: usize,
    weights: SharedBuffer,
    biases: SharedBuffer,
    weight_momentum: Option<SharedBuffer>,
    bias_momentum: Option<SharedBuffer>,
    activations: Vec<f32>,
    errors: Option<Vec<f32>>,
    /// Dropout bits from the last training forward pass, one per unit.
    mask: Vec<u8>,
}

impl Layer {
    /// Creates an unbound layer. `init` must run before it is used.
    pub fn new(units: usize, kind: LayerKind, params: Hyperparams) -> Layer {
        Layer {
            units,
            kind,
            params,
            index: 0,
            prev_units: 0,
            weights: SharedBuffer::zeros(0),
            biases: SharedBuffer::zeros(0),
            weight_momentum: None,
            bias_momentum: None,
            activations: Vec::new(),
            errors: None,
            mask: Vec::new(),
        }
    }

    /// Binds the layer to stack position `index` behind a layer of
    /// `prev_units` units and allocates its arrays.
    ///
    /// With `allocate_weights == false` the layer keeps the weight buffers it
    /// already has (typically aliased through `share_weights`), which must
    /// match the new shape.
    pub fn init(&mut self, index: usize, prev_units: usize, allocate_weights: bool) -> Result<()> {
        if self.units == 0 || prev_units == 0 {
            return Err(Error::InvalidStack(format!("layer {index} has no units to connect")));
        }
        self.index = index;
        self.prev_units = prev_units;
        self.activations = vec![0.0; self.units];
        self.errors = (!self.kind.is_output()).then(|| vec![0.0; self.units]);
        self.mask = if self.kind.uses_dropout() {
            vec![0; (self.units + 7) / 8]
        } else {
            Vec::new()
        };

        let bias = self.kind.activation().init_bias();
        if allocate_weights {
            // Tied layers get their weights from `bind_tied`.
            if !self.kind.is_tied() {
                self.weights = SharedBuffer::zeros(self.units * prev_units);
            }
            self.biases = SharedBuffer::filled(self.units, bias);
            if self.params.has_momentum() && !self.kind.is_tied() {
                self.weight_momentum = Some(SharedBuffer::zeros(self.units * prev_units));
                self.bias_momentum = Some(SharedBuffer::zeros(self.units));
            } else {
                self.weight_momentum = None;
                self.bias_momentum = None;
            }
            Ok(())
        } else {
            self.check_shapes()
        }
    }

    /// Points a tied layer at the weights of `encoder`, the layer right
    /// before it. The decoder's width must equal the encoder's input width.
    pub fn bind_tied(&mut self, encoder: &Layer) -> Result<()> {
        if !self.kind.is_tied() {
            return Err(Error::InvalidStack(format!("layer {} is not a tied layer", self.index)));
        }
        if encoder.units != self.prev_units || encoder.prev_units != self.units {
            return Err(Error::InvalidStack(format!(
                "tied layer {} has {} units but its encoder reads {} inputs",
                self.index, self.units, encoder.prev_units
            )));
        }
        self.weights = encoder.weights.clone();
        self.check_shapes()
    }

    fn check_shapes(&self) -> Result<()> {
        let expected = self.units * self.prev_units;
        if self.weights.len() != expected {
            return Err(Error::ShapeMismatch {
                layer: self.index,
                expected,
                actual: self.weights.len(),
            });
        }
        if self.biases.len() != self.units {
            return Err(Error::ShapeMismatch {
                layer: self.index,
                expected: self.units,
                actual: self.biases.len(),
            });
        }
        for m in self.weight_momentum.iter() {
            if m.len() != expected {
                return Err(Error::ShapeMismatch { layer: self.index, expected, actual: m.len() });
            }
        }
        Ok(())
    }

    /// Draws initial weights. Tied layers are skipped: their weights belong
    /// to the encoder.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R, prefactor: f32) -> Result<()> {
        if self.kind.is_tied() || self.weights.is_empty() {
            return Ok(());
        }
        let scale = self.params.initial_weight_scale;
        match self.params.initial_weight_distribution {
            InitialWeightDistribution::UniformAdaptive => {
                // Glorot & Bengio (2010).
                let range = prefactor * (6.0 / (self.prev_units + self.units) as f64).sqrt() as f32;
                let range = range as f64;
                for i in 0..self.weights.len() {
                    self.weights.set(i, uniform(rng, -range, range) as f32);
                }
            }
            InitialWeightDistribution::Uniform | InitialWeightDistribution::Normal
                if !(scale.is_finite() && scale > 0.0) =>
            {
                return Err(Error::InvalidConfig(format!(
                    "initial weight scale must be a positive number, got {scale}"
                )));
            }
            InitialWeightDistribution::Uniform => {
                for i in 0..self.weights.len() {
                    self.weights.set(i, uniform(rng, -scale, scale) as f32);
                }
            }
            InitialWeightDistribution::Normal => {
                let normal = Normal::new(0.0, scale).map_err(|e| {
                    Error::InvalidConfig(format!("normal weight scale {scale}: {e}"))
                })?;
                for i in 0..self.weights.len() {
                    self.weights.set(i, normal.sample(rng) as f32);
                }
            }
        }
        Ok(())
    }

    /// Computes this layer's activations from `up.activations`.
    ///
    /// Dropout-gated kinds draw one bit per unit from `rng` while training
    /// and zero the units whose bit is clear; at inference every unit is
    /// computed with its incoming contribution halved. When the previous
    /// layer is the input, the tanh and rectifier dropout kinds also zero
    /// each input feature with the input dropout probability while training.
    pub fn forward<R: Rng>(&mut self, up: Upstream<'_>, training: bool, rng: &mut R) {
        let dropout = self.kind.uses_dropout();
        if dropout && training {
            rng.fill(&mut self.mask[..]);
        }
        if training && self.kind.uses_input_dropout() {
            if let Some(rate) = up.input_dropout {
                for x in up.activations.iter_mut() {
                    if (rng.gen::<f32>() as f64) < rate {
                        *x = 0.0;
                    }
                }
            }
        }

        let prev: &[f32] = up.activations;
        let layout = self.layout();
        let activation = self.kind.activation();
        for o in 0..self.units {
            if dropout && training && !self.is_active(o) {
                self.activations[o] = 0.0;
                continue;
            }
            let b = self.biases.get(o);
            let x = match self.kind {
                LayerKind::Maxout => {
                    let mut max = f32::NEG_INFINITY;
                    for (i, &p) in prev.iter().enumerate() {
                        let w = self.weights.get(layout.index(o, i, self.units, self.prev_units));
                        max = max.max(w * p);
                    }
                    if !training {
                        max *= 0.5;
                    }
                    max + b
                }
                LayerKind::TanhWithDropout => {
                    let mut sum = self.weighted_sum(o, prev, layout);
                    if !training {
                        sum *= 0.5;
                    }
                    sum + b
                }
                LayerKind::RectifierWithDropout => {
                    let mut x = self.weighted_sum(o, prev, layout) + b;
                    if !training {
                        x *= 0.5;
                    }
                    x
                }
                _ => self.weighted_sum(o, prev, layout) + b,
            };
            self.activations[o] = activation.function(x);
        }
        activation.normalize(&mut self.activations);
    }

    /// Back-propagates into `up.errors` and updates this layer's weights and
    /// biases through the shared update rule, at the schedule point for
    /// `processed` examples.
    ///
    /// This layer's own error array must already hold the signal written by
    /// the layer after it.
    pub fn backward(&mut self, up: Upstream<'_>, target: Target<'_>, processed: u64) -> Result<()> {
        let sgd = Sgd::at(&self.params, processed);
        let tied = self.kind.is_tied();
        let syn = Synapses {
            weights: &self.weights,
            biases: &self.biases,
            weight_momentum: if tied { None } else { self.weight_momentum.as_ref() },
            bias_momentum: if tied { None } else { self.bias_momentum.as_ref() },
            layout: self.layout(),
            units: self.units,
        };
        let prev: &[f32] = up.activations;
        let mut prev_errors = up.errors;
        let activation = self.kind.activation();

        match self.kind {
            LayerKind::Softmax => {
                let label = match target {
                    Target::Label(label) => label,
                    _ => {
                        return Err(Error::InvalidStack("softmax output needs a class label".into()))
                    }
                };
                for u in 0..self.units {
                    let t = if label == Some(u) { 1.0 } else { 0.0 };
                    let a = self.activations[u];
                    let g = t - a;
                    sgd.step(&self.params, &syn, u, g, a, prev, prev_errors.as_deref_mut());
                }
            }
            LayerKind::Linear => {
                let values = match target {
                    Target::Values(values) => values,
                    _ => {
                        return Err(Error::InvalidStack("linear output needs target values".into()))
                    }
                };
                if values.len() != self.units {
                    return Err(Error::ShapeMismatch {
                        layer: self.index,
                        expected: self.units,
                        actual: values.len(),
                    });
                }
                for u in 0..self.units {
                    let a = self.activations[u];
                    let g = values[u] - a;
                    sgd.step(&self.params, &syn, u, g, a, prev, prev_errors.as_deref_mut());
                }
            }
            LayerKind::TanhPrime | LayerKind::RectifierPrime => {
                let original = up.reconstruction.ok_or_else(|| {
                    Error::InvalidStack(format!(
                        "tied layer {} has no reconstruction target",
                        self.index
                    ))
                })?;
                if original.len() != self.units {
                    return Err(Error::ShapeMismatch {
                        layer: self.index,
                        expected: self.units,
                        actual: original.len(),
                    });
                }
                // Reconstruction error is the raw gradient.
                let params = self.tied_params();
                for u in 0..self.units {
                    let a = self.activations[u];
                    let g = original[u] - a;
                    sgd.step(&params, &syn, u, g, a, prev, prev_errors.as_deref_mut());
                }
            }
            _ => {
                let errors = self.errors.as_deref().unwrap_or(&[]);
                // Dropped tanh units still learn (a = 0, so g = e); dropped
                // rectifier units are skipped by their gradient rule.
                let masked = self.kind == LayerKind::Maxout;
                for (u, &e) in errors.iter().enumerate() {
                    if masked && !self.is_active(u) {
                        continue;
                    }
                    let a = self.activations[u];
                    if let Some(g) = activation.gradient(a, e) {
                        sgd.step(&self.params, &syn, u, g, a, prev, prev_errors.as_deref_mut());
                    }
                }
            }
        }
        Ok(())
    }

    /// Update settings for a tied decoder: TanhPrime keeps the loss scaling
    /// but ignores the max-norm cap, RectifierPrime keeps the cap but uses
    /// the reconstruction error unscaled.
    fn tied_params(&self) -> Hyperparams {
        let mut params = self.params.clone();
        match self.kind {
            LayerKind::TanhPrime => params.max_w2 = f32::INFINITY,
            LayerKind::RectifierPrime => params.loss = LossType::CrossEntropy,
            _ => {}
        }
        params
    }

    /// Learning rate after `n` processed examples.
    pub fn rate(&self, n: u64) -> f32 {
        self.params.rate(n)
    }

    /// Momentum after `n` processed examples.
    pub fn momentum(&self, n: u64) -> f32 {
        self.params.momentum(n)
    }

    /// Aliases `src`'s weight, bias and momentum buffers onto `dst`.
    pub fn share_weights(src: &Layer, dst: &mut Layer) -> Result<()> {
        if src.kind != dst.kind
            || src.units != dst.units
            || src.weights.len() != dst.weights.len()
        {
            return Err(Error::ShapeMismatch {
                layer: dst.index,
                expected: src.weights.len(),
                actual: dst.weights.len(),
            });
        }
        dst.weights = src.weights.clone();
        dst.biases = src.biases.clone();
        dst.weight_momentum = src.weight_momentum.clone();
        dst.bias_momentum = src.bias_momentum.clone();
        Ok(())
    }

    /// Zeroes the error array before a backward pass.
    pub fn clear_errors(&mut self) {
        if let Some(errors) = self.errors.as_mut() {
            errors.fill(0.0);
        }
    }

    /// Activations and error array together, as the next layer's backward
    /// pass needs them.
    pub(crate) fn upstream_mut(&mut self) -> (&mut [f32], Option<&mut [f32]>) {
        (&mut self.activations, self.errors.as_deref_mut())
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn prev_units(&self) -> usize {
        self.prev_units
    }

    pub fn activations(&self) -> &[f32] {
        &self.activations
    }

    pub(crate) fn activations_mut(&mut self) -> &mut [f32] {
        &mut self.activations
    }

    pub fn errors(&self) -> Option<&[f32]> {
        self.errors.as_deref()
    }

    /// Weight buffer as stored. For tied layers this is the encoder's matrix.
    pub fn weights(&self) -> &SharedBuffer {
        &self.weights
    }

    pub fn biases(&self) -> &SharedBuffer {
        &self.biases
    }

    pub fn weight_momentum(&self) -> Option<&SharedBuffer> {
        self.weight_momentum.as_ref()
    }

    pub fn bias_momentum(&self) -> Option<&SharedBuffer> {
        self.bias_momentum.as_ref()
    }

    /// The weight from previous unit `i` to unit `u`, whatever the layout.
    pub fn weight(&self, u: usize, i: usize) -> f32 {
        self.weights.get(self.layout().index(u, i, self.units, self.prev_units))
    }

    fn layout(&self) -> Layout {
        if self.kind.is_tied() { Layout::Transposed } else { Layout::RowMajor }
    }

    #[inline]
    fn is_active(&self, o: usize) -> bool {
        self.mask[o / 8] & (1 << (o % 8)) != 0
    }

    #[inline]
    fn weighted_sum(&self, o: usize, prev: &[f32], layout: Layout) -> f32 {
        let mut sum = 0.0f32;
        for (i, &p) in prev.iter().enumerate() {
            sum += self.weights.get(layout.index(o, i, self.units, self.prev_units)) * p;
        }
        sum
    }
}

fn uniform<R: Rng>(rng: &mut R, min: f64, max: f64) -> f64 {
    min + rng.gen::<f32>() as f64 * (max - min)
}
