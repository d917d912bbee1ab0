use serde::{Serialize, Deserialize};

/// The activation formulas a layer can use.
///
/// Each variant provides an element-wise forward function, a vector-level
/// normalization step and the gradient rule used by `backward`. Dropout and
/// tied weights are properties of the layer, not of the formula, see
/// `LayerKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Tanh,
    Rectifier,
    /// Max over the unit's weighted inputs rather than over their sum; see
    /// `Layer::forward`.
    Maxout,
    /// Vector-valued; `function()` is the identity and `normalize()` turns the
    /// pre-activations into a distribution.
    Softmax,
    Linear,
}

impl Activation {
    /// Element-wise activation of pre-activation `x`.
    #[inline]
    pub fn function(&self, x: f32) -> f32 {
        match self {
            // Computed in double precision, then rounded.
            Activation::Tanh => (x as f64).tanh() as f32,
            Activation::Rectifier | Activation::Maxout => if x < 0.0 { 0.0 } else { x },
            Activation::Softmax | Activation::Linear => x,
        }
    }

    /// Layer-wide step applied after every unit went through `function()`.
    pub fn normalize(&self, a: &mut [f32]) {
        match self {
            Activation::Softmax => softmax(a),
            Activation::Maxout => {
                let max = a.iter().fold(0.0f32, |m, &x| if m < x { x } else { m });
                if max > 1.0 {
                    for x in a.iter_mut() {
                        *x /= max;
                    }
                }
            }
            Activation::Tanh | Activation::Rectifier | Activation::Linear => {}
        }
    }

    /// Gradient w.r.t. the weighted sum, given activation `a` and the error
    /// signal `e` flowing into the unit. `None` means the unit takes no
    /// update at all for this example.
    ///
    /// Output layers pass `target - a` as `e`; their gradient is `e` itself.
    #[inline]
    pub fn gradient(&self, a: f32, e: f32) -> Option<f32> {
        match self {
            // (1 - a)(1 + a) is the numerically stable form of 1 - a².
            Activation::Tanh => Some(e * (1.0 - a) * (1.0 + a)),
            // Strict: a unit sitting exactly at 0 is inactive.
            Activation::Rectifier => (a > 0.0).then_some(e),
            Activation::Maxout | Activation::Softmax | Activation::Linear => Some(e),
        }
    }

    /// Prefactor for adaptive uniform initialization.
    pub fn init_prefactor(&self) -> f32 {
        match self {
            Activation::Softmax | Activation::Maxout => 4.0,
            Activation::Tanh | Activation::Rectifier | Activation::Linear => 1.0,
        }
    }

    /// Initial bias: rectifying units start active.
    pub fn init_bias(&self) -> f32 {
        match self {
            Activation::Rectifier | Activation::Maxout => 1.0,
            Activation::Tanh | Activation::Softmax | Activation::Linear => 0.0,
        }
    }
}

/// In-place softmax with the per-example max subtracted for stability.
pub fn softmax(a: &mut [f32]) {
    let max = a.iter().fold(f32::NEG_INFINITY, |m, &x| if m < x { x } else { m });
    let mut scale = 0.0f32;
    for x in a.iter_mut() {
        *x = ((*x - max) as f64).exp() as f32;
        scale += *x;
    }
    for x in a.iter_mut() {
        *x /= scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn tanh_stays_in_range() {
        for x in [-50.0, -1.0, 0.0, 0.3, 50.0] {
            let a = Activation::Tanh.function(x);
            assert!((-1.0..=1.0).contains(&a));
        }
        assert_abs_diff_eq!(Activation::Tanh.function(0.5), 0.5f32.tanh(), epsilon = 1e-7);
    }

    #[test]
    fn tanh_gradient_uses_activation() {
        let g = Activation::Tanh.gradient(0.5, 2.0).unwrap();
        assert_abs_diff_eq!(g, 2.0 * 0.75, epsilon = 1e-7);
    }

    #[test]
    fn rectifier_clamps_and_masks_gradient() {
        assert_eq!(Activation::Rectifier.function(-3.0), 0.0);
        assert_eq!(Activation::Rectifier.function(2.0), 2.0);
        assert_eq!(Activation::Rectifier.gradient(0.0, 1.0), None);
        assert_eq!(Activation::Rectifier.gradient(0.1, 1.0), Some(1.0));
    }

    #[test]
    fn softmax_is_a_distribution() {
        let mut a = vec![1000.0, 999.0, -5.0, 0.0];
        softmax(&mut a);
        let sum: f32 = a.iter().sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-6);
        assert!(a.iter().all(|&x| x >= 0.0));
        assert!(a[0] > a[1]);
    }

    #[test]
    fn maxout_normalizes_by_layer_max() {
        let mut a = vec![0.5, 4.0, 0.0];
        Activation::Maxout.normalize(&mut a);
        assert_eq!(a, vec![0.125, 1.0, 0.0]);

        let mut small = vec![0.5, 0.25];
        Activation::Maxout.normalize(&mut small);
        assert_eq!(small, vec![0.5, 0.25]);
    }

    #[test]
    fn output_gradients_pass_error_through() {
        assert_eq!(Activation::Softmax.gradient(0.3, 0.7), Some(0.7));
        assert_eq!(Activation::Linear.gradient(5.0, -1.5), Some(-1.5));
    }
}
