use serde::{Serialize, Deserialize};

/// Selects how the weight update rule scales a unit's raw gradient.
///
/// - `MeanSquare`  : the gradient is multiplied by `(1 - a) * a` before the
///   update (sigmoid-style squashing of the error signal).
/// - `CrossEntropy`: the gradient is used unchanged. Paired with a Softmax
///   output this gives the usual `target - predicted` update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    MeanSquare,
    #[default]
    CrossEntropy,
}

impl LossType {
    /// Applies the loss-specific factor to gradient `g` of a unit whose
    /// activation is `a`.
    #[inline]
    pub fn scale_gradient(self, g: f32, a: f32) -> f32 {
        match self {
            LossType::CrossEntropy => g,
            LossType::MeanSquare => g * ((1.0 - a) * a),
        }
    }
}
