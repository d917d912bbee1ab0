use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::error::{Error, Result};
use crate::input::{Input, InputLayer};
use crate::layers::dense::{Layer, Target, Upstream};
use crate::layers::kind::LayerKind;
use crate::network::spec::NetworkSpec;

/// Number of examples processed so far, shared by every worker clone of a
/// stack. The rate and momentum schedules read it.
#[derive(Debug, Default)]
pub struct Training {
    processed: AtomicU64,
}

impl Training {
    pub fn new(start: u64) -> Training {
        Training { processed: AtomicU64::new(start) }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Counts one more example and returns the new total.
    pub fn record(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// An ordered layer stack: the input layer at index 0, then hidden layers,
/// then the output (or, for autoencoders, a tied decoder).
///
/// The stack owns every layer. Layers never point at each other; forward and
/// backward calls receive an `Upstream` view carved out of the stack.
///
/// A stack also owns the random generator used for dropout masks. Worker
/// clones made with `fork` alias the weights but get their own generator,
/// activations, errors and input cursor.
pub struct Network {
    input: InputLayer,
    layers: Vec<Layer>,
    training: Arc<Training>,
    seed: u64,
    worker: usize,
    rng: StdRng,
    /// Scratch space for regression targets.
    values: Vec<f32>,
}

impl Network {
    /// Builds, binds and randomizes a stack over `input`.
    pub fn new(input: Box<dyn Input>, layers: Vec<Layer>, seed: u64) -> Result<Network> {
        Network::with_step(input, layers, seed, 0)
    }

    /// Like `new`, with the processed-example counter starting at `step`,
    /// e.g. to resume a schedule.
    pub fn with_step(
        input: Box<dyn Input>,
        layers: Vec<Layer>,
        seed: u64,
        step: u64,
    ) -> Result<Network> {
        validate(&layers)?;
        let out_units = layers.last().map(|l| l.units).unwrap_or(0);
        let mut network = Network {
            input: InputLayer::new(input),
            layers,
            training: Arc::new(Training::new(step)),
            seed,
            worker: 0,
            rng: StdRng::seed_from_u64(worker_seed(seed, 0)),
            values: vec![0.0; out_units],
        };
        network.init(true)?;

        let mut rng = StdRng::seed_from_u64(seed);
        for layer in network.layers.iter_mut() {
            let prefactor = layer.kind.activation().init_prefactor();
            layer.randomize(&mut rng, prefactor)?;
        }
        let weights: usize = network.layers.iter()
            .filter(|l| !l.kind.is_tied())
            .map(|l| l.weights().len())
            .sum();
        debug!(
            depth = network.depth(),
            weights,
            seed,
            "layer stack initialized"
        );
        Ok(network)
    }

    /// Builds the stack described by `spec` over `input`.
    pub fn from_spec(spec: &NetworkSpec, input: Box<dyn Input>) -> Result<Network> {
        Network::new(input, spec.build_layers(), spec.seed)
    }

    /// Binds every layer to its predecessor. Without allocation the layers
    /// keep (and shape-check) the buffers they already reference.
    fn init(&mut self, allocate_weights: bool) -> Result<()> {
        let mut prev_units = self.input.units();
        for k in 0..self.layers.len() {
            let (before, rest) = self.layers.split_at_mut(k);
            let layer = &mut rest[0];
            layer.init(k + 1, prev_units, allocate_weights)?;
            if layer.kind.is_tied() {
                let encoder = before.last().ok_or_else(|| {
                    Error::InvalidStack(format!("tied layer {} has no encoder", k + 1))
                })?;
                layer.bind_tied(encoder)?;
            }
            prev_units = layer.units;
        }
        Ok(())
    }

    /// A worker clone sharing this stack's weights, biases, momentum and
    /// processed counter. The clone has its own input cursor (at the same
    /// position), activations, errors and a dropout generator seeded from
    /// `(seed, worker)`.
    pub fn fork(&self, worker: usize) -> Result<Network> {
        let mut network = Network {
            input: self.input.fork(),
            layers: self.layers.clone(),
            training: Arc::clone(&self.training),
            seed: self.seed,
            worker,
            rng: StdRng::seed_from_u64(worker_seed(self.seed, worker)),
            values: vec![0.0; self.values.len()],
        };
        network.init(false)?;
        Ok(network)
    }

    /// Aliases every layer's buffers from `src` onto `dst`.
    pub fn share_weights(src: &Network, dst: &mut Network) -> Result<()> {
        if src.layers.len() != dst.layers.len() {
            return Err(Error::InvalidStack(format!(
                "cannot share weights between stacks of depth {} and {}",
                src.depth(),
                dst.depth()
            )));
        }
        for (s, d) in src.layers.iter().zip(dst.layers.iter_mut()) {
            Layer::share_weights(s, d)?;
        }
        dst.init(false)
    }

    /// Forward pass over the current example, input to output.
    pub fn forward(&mut self, training: bool) {
        self.input.forward();
        let rate = self.input.adapter().dropout_rate();
        let input_dropout = (rate > 0.0).then_some(rate);
        for k in 0..self.layers.len() {
            let (before, rest) = self.layers.split_at_mut(k);
            let up = match before.last_mut() {
                Some(prev) => Upstream {
                    activations: prev.activations_mut(),
                    errors: None,
                    input_dropout: None,
                    reconstruction: None,
                },
                None => Upstream {
                    activations: self.input.activations_mut(),
                    errors: None,
                    input_dropout,
                    reconstruction: None,
                },
            };
            rest[0].forward(up, training, &mut self.rng);
        }
    }

    /// Backward pass through the layer at stack `index`.
    ///
    /// Index 0 is the input layer, which cannot be trained:
    /// `Error::InputBackward`.
    pub fn backward_layer(&mut self, index: usize) -> Result<()> {
        if index == 0 {
            return Err(Error::InputBackward);
        }
        if index > self.layers.len() {
            return Err(Error::InvalidStack(format!("no layer at index {index}")));
        }
        let k = index - 1;
        let processed = self.training.processed();

        let kind = self.layers[k].kind;
        if kind == LayerKind::Linear {
            self.input.adapter().values(&mut self.values);
            for v in self.values.iter_mut() {
                if v.is_nan() {
                    *v = 0.0;
                }
            }
        }
        let target = match kind {
            LayerKind::Softmax => Target::Label(self.input.adapter().label()),
            LayerKind::Linear => Target::Values(&self.values),
            _ => Target::None,
        };

        let (before, rest) = self.layers.split_at_mut(k);
        let up = match before.split_last_mut() {
            Some((prev, earlier)) => {
                let reconstruction = match earlier.last() {
                    Some(layer) => layer.activations(),
                    None => self.input.activations(),
                };
                let (activations, errors) = prev.upstream_mut();
                Upstream {
                    activations,
                    errors,
                    input_dropout: None,
                    reconstruction: Some(reconstruction),
                }
            }
            None => Upstream {
                activations: self.input.activations_mut(),
                errors: None,
                input_dropout: None,
                reconstruction: None,
            },
        };
        rest[0].backward(up, target, processed)
    }

    /// Backward pass over the whole stack, output to first hidden layer.
    /// Error arrays are cleared first.
    pub fn backward(&mut self) -> Result<()> {
        for layer in self.layers.iter_mut() {
            layer.clear_errors();
        }
        for index in (1..=self.layers.len()).rev() {
            self.backward_layer(index)?;
        }
        Ok(())
    }

    /// Trains on the current example, moves the input cursor and counts the
    /// example. Returns the new processed count.
    pub fn step(&mut self) -> Result<u64> {
        self.forward(true);
        self.backward()?;
        self.input.adapter_mut().advance();
        Ok(self.training.record())
    }

    /// Inference on the current example.
    pub fn predict(&mut self) -> &[f32] {
        self.forward(false);
        self.output()
    }

    pub fn output(&self) -> &[f32] {
        self.layers.last().map(|l| l.activations()).unwrap_or(&[])
    }

    /// Number of layers including the input layer.
    pub fn depth(&self) -> usize {
        self.layers.len() + 1
    }

    /// The layer at stack `index` (1-based; index 0 is the input layer).
    pub fn layer(&self, index: usize) -> Option<&Layer> {
        index.checked_sub(1).and_then(|k| self.layers.get(k))
    }

    /// Layers after the input, in stack order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn output_layer(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }

    pub fn input(&self) -> &InputLayer {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputLayer {
        &mut self.input
    }

    pub fn processed(&self) -> u64 {
        self.training.processed()
    }

    pub fn training(&self) -> &Arc<Training> {
        &self.training
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn worker(&self) -> usize {
        self.worker
    }
}

fn validate(layers: &[Layer]) -> Result<()> {
    if layers.is_empty() {
        return Err(Error::InvalidStack(
            "a stack needs at least one layer after the input".into(),
        ));
    }
    let last = layers.len() - 1;
    let final_kind = layers[last].kind;
    if !final_kind.is_output() && !final_kind.is_tied() {
        return Err(Error::InvalidStack(format!(
            "the last layer must be an output or tied layer, got {final_kind:?}"
        )));
    }
    for (k, layer) in layers.iter().enumerate() {
        if layer.kind.is_output() && k != last {
            return Err(Error::InvalidStack(format!(
                "output layer {} must be the last layer",
                k + 1
            )));
        }
        if layer.kind.is_tied() {
            let encoder = k.checked_sub(1).map(|p| layers[p].kind);
            match encoder {
                Some(kind) if !kind.is_output() && !kind.is_tied() => {}
                _ => {
                    return Err(Error::InvalidStack(format!(
                        "tied layer {} needs an encoder layer right before it",
                        k + 1
                    )))
                }
            }
        }
    }
    Ok(())
}

/// Per-worker generator seed: a fixed mix of the run seed and worker index.
fn worker_seed(seed: u64, worker: usize) -> u64 {
    seed ^ (worker as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
