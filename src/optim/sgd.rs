use crate::math::buffer::SharedBuffer;
use crate::optim::hyperparams::Hyperparams;

/// How a unit's incoming weights are laid out in the weight buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `w[u * prev_units + i]`: the layer's own matrix.
    RowMajor,
    /// `w[i * units + u]`: the transpose of the paired encoder's matrix.
    Transposed,
}

impl Layout {
    #[inline]
    pub fn index(self, u: usize, i: usize, units: usize, prev_units: usize) -> usize {
        match self {
            Layout::RowMajor => u * prev_units + i,
            Layout::Transposed => i * units + u,
        }
    }
}

/// The trainable state a unit update touches.
pub struct Synapses<'a> {
    pub weights: &'a SharedBuffer,
    pub biases: &'a SharedBuffer,
    pub weight_momentum: Option<&'a SharedBuffer>,
    pub bias_momentum: Option<&'a SharedBuffer>,
    pub layout: Layout,
    pub units: usize,
}

/// Stochastic gradient descent at one point of the rate/momentum schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    /// Effective step size, already multiplied by `1 - momentum`.
    pub learning_rate: f32,
    pub momentum: f32,
}

impl Sgd {
    pub fn new(learning_rate: f32, momentum: f32) -> Sgd {
        Sgd { learning_rate, momentum }
    }

    /// Schedule point after `processed` examples. The `1 - m` factor keeps
    /// the step magnitude comparable once momentum accumulates.
    pub fn at(params: &Hyperparams, processed: u64) -> Sgd {
        let m = params.momentum(processed);
        Sgd::new(params.rate(processed) * (1.0 - m), m)
    }

    /// Applies gradient `g` to unit `u` whose activation is `a`.
    ///
    /// Back-propagates into `prev_errors` (when the previous layer keeps
    /// errors) using the weights *before* this update, then applies L1/L2,
    /// momentum and the max-norm constraint to the unit's incoming weights,
    /// and finally moves the bias.
    #[allow(clippy::too_many_arguments)]
    pub fn step(
        &self,
        params: &Hyperparams,
        syn: &Synapses<'_>,
        u: usize,
        g: f32,
        a: f32,
        prev_activations: &[f32],
        mut prev_errors: Option<&mut [f32]>,
    ) {
        let g = params.loss.scale_gradient(g, a);
        let r = self.learning_rate;
        let m = self.momentum;
        let prev_units = prev_activations.len();

        let mut r2 = 0.0f32;
        for (i, &x) in prev_activations.iter().enumerate() {
            let w = syn.layout.index(u, i, syn.units, prev_units);
            let weight = syn.weights.get(w);
            if let Some(errors) = prev_errors.as_deref_mut() {
                errors[i] += g * weight;
            }
            let mut d = g * x - weight * params.l2 - signum(weight) * params.l1;
            if let Some(wm) = syn.weight_momentum {
                d = wm.get(w) * m + d;
                wm.set(w, d);
            }
            let updated = weight + r * d;
            syn.weights.set(w, updated);
            r2 += updated * updated;
        }
        if r2 > params.max_w2 {
            // Srivastava et al., max-norm constraint on incoming weights.
            let scale = (params.max_w2 / r2).sqrt();
            for i in 0..prev_units {
                syn.weights.scale(syn.layout.index(u, i, syn.units, prev_units), scale);
            }
        }

        let mut d = g;
        if let Some(bm) = syn.bias_momentum {
            d = bm.get(u) * m + d;
            bm.set(u, d);
        }
        syn.biases.add(u, r * d);
    }
}

/// Sign with `signum(0) == 0`, unlike `f32::signum`.
#[inline]
fn signum(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::loss_type::LossType;
    use approx::assert_abs_diff_eq;

    struct Fixture {
        weights: SharedBuffer,
        biases: SharedBuffer,
        wm: Option<SharedBuffer>,
        bm: Option<SharedBuffer>,
    }

    impl Fixture {
        fn new(weights: &[f32], units: usize, momentum: bool) -> Fixture {
            Fixture {
                weights: SharedBuffer::from_slice(weights),
                biases: SharedBuffer::zeros(units),
                wm: momentum.then(|| SharedBuffer::zeros(weights.len())),
                bm: momentum.then(|| SharedBuffer::zeros(units)),
            }
        }

        fn synapses(&self, layout: Layout, units: usize) -> Synapses<'_> {
            Synapses {
                weights: &self.weights,
                biases: &self.biases,
                weight_momentum: self.wm.as_ref(),
                bias_momentum: self.bm.as_ref(),
                layout,
                units,
            }
        }
    }

    #[test]
    fn plain_step_moves_along_gradient() {
        let f = Fixture::new(&[0.5, -0.5], 1, false);
        let params = Hyperparams::default();
        let mut errors = vec![0.0; 2];
        let syn = f.synapses(Layout::RowMajor, 1);
        Sgd::new(0.1, 0.0).step(&params, &syn, 0, 2.0, 0.3, &[1.0, 3.0], Some(&mut errors));

        assert_eq!(errors, vec![1.0, -1.0]);
        assert_abs_diff_eq!(f.weights.get(0), 0.5 + 0.1 * 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(f.weights.get(1), -0.5 + 0.1 * 6.0, epsilon = 1e-6);
        assert_abs_diff_eq!(f.biases.get(0), 0.2, epsilon = 1e-6);
    }

    #[test]
    fn mean_square_loss_scales_gradient() {
        let f = Fixture::new(&[0.0], 1, false);
        let params = Hyperparams::default().with_loss(LossType::MeanSquare);
        let syn = f.synapses(Layout::RowMajor, 1);
        Sgd::new(1.0, 0.0).step(&params, &syn, 0, 1.0, 0.5, &[1.0], None);
        assert_abs_diff_eq!(f.weights.get(0), 0.25, epsilon = 1e-7);
        assert_abs_diff_eq!(f.biases.get(0), 0.25, epsilon = 1e-7);
    }

    #[test]
    fn regularization_pulls_towards_zero() {
        let f = Fixture::new(&[1.0, -1.0, 0.0], 1, false);
        let params = Hyperparams::default().with_regularization(0.1, 0.5);
        let syn = f.synapses(Layout::RowMajor, 1);
        Sgd::new(1.0, 0.0).step(&params, &syn, 0, 0.0, 0.0, &[0.0; 3], None);
        assert_abs_diff_eq!(f.weights.get(0), 1.0 - 0.5 - 0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(f.weights.get(1), -1.0 + 0.5 + 0.1, epsilon = 1e-6);
        // No L1 push on an exactly-zero weight.
        assert_eq!(f.weights.get(2), 0.0);
    }

    #[test]
    fn momentum_accumulates_across_steps() {
        let f = Fixture::new(&[0.0], 1, true);
        let params = Hyperparams::default();
        let sgd = Sgd::new(1.0, 0.5);
        let syn = f.synapses(Layout::RowMajor, 1);
        sgd.step(&params, &syn, 0, 1.0, 0.0, &[1.0], None);
        assert_eq!(f.weights.get(0), 1.0);
        sgd.step(&params, &syn, 0, 1.0, 0.0, &[1.0], None);
        // d = 1 * 0.5 + 1
        assert_eq!(f.wm.as_ref().unwrap().get(0), 1.5);
        assert_eq!(f.weights.get(0), 2.5);
        assert_eq!(f.bm.as_ref().unwrap().get(0), 1.5);
        assert_eq!(f.biases.get(0), 2.5);
    }

    #[test]
    fn max_norm_caps_each_unit() {
        let f = Fixture::new(&[0.0; 6], 2, false);
        let params = Hyperparams::default().with_max_w2(0.01);
        let syn = f.synapses(Layout::RowMajor, 2);
        let sgd = Sgd::new(100.0, 0.0);
        sgd.step(&params, &syn, 0, 5.0, 0.0, &[1.0, -2.0, 3.0], None);
        sgd.step(&params, &syn, 1, -7.0, 0.0, &[1.0, -2.0, 3.0], None);
        for u in 0..2 {
            let sum: f32 = (0..3).map(|i| f.weights.get(u * 3 + i).powi(2)).sum();
            assert!(sum <= 0.01 + 1e-6, "unit {u}: {sum}");
        }
    }

    #[test]
    fn transposed_layout_reads_columns() {
        // Encoder weights 2x3 row-major; decoder unit 1 reads column 1.
        let f = Fixture::new(&[0.0, 1.0, 0.0, 0.0, 2.0, 0.0], 3, false);
        let params = Hyperparams::default();
        let mut errors = vec![0.0; 2];
        let syn = f.synapses(Layout::Transposed, 3);
        Sgd::new(0.0, 0.0).step(&params, &syn, 1, 1.0, 0.0, &[1.0, 1.0], Some(&mut errors));
        assert_eq!(errors, vec![1.0, 2.0]);
    }

    #[test]
    fn schedule_point_folds_momentum_into_rate() {
        let params = Hyperparams::default().with_rate(0.1).with_momentum(0.5, 0, 0.5);
        let sgd = Sgd::at(&params, 10);
        assert_eq!(sgd.momentum, 0.5);
        assert_abs_diff_eq!(sgd.learning_rate, 0.05, epsilon = 1e-8);
    }
}
