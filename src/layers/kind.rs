use serde::{Serialize, Deserialize};

use crate::activation::activation::Activation;

/// Every layer variant the engine knows, as one closed set.
///
/// A kind combines an `Activation` formula with two layer-level behaviours:
/// dropout gating (a random per-unit mask during training, 0.5 scaling at
/// inference) and tied weights (reading the previous layer's matrix
/// transposed, for autoencoder reconstruction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Tanh,
    TanhWithDropout,
    Rectifier,
    RectifierWithDropout,
    /// Always dropout-gated.
    Maxout,
    /// Classification output.
    Softmax,
    /// Regression output.
    Linear,
    /// Tanh decoder tied to the previous layer's weights.
    TanhPrime,
    /// Rectifier decoder tied to the previous layer's weights.
    RectifierPrime,
}

impl LayerKind {
    pub fn activation(self) -> Activation {
        match self {
            LayerKind::Tanh | LayerKind::TanhWithDropout | LayerKind::TanhPrime => Activation::Tanh,
            LayerKind::Rectifier | LayerKind::RectifierWithDropout | LayerKind::RectifierPrime => {
                Activation::Rectifier
            }
            LayerKind::Maxout => Activation::Maxout,
            LayerKind::Softmax => Activation::Softmax,
            LayerKind::Linear => Activation::Linear,
        }
    }

    /// Output layers produce the loss and have no error array.
    pub fn is_output(self) -> bool {
        matches!(self, LayerKind::Softmax | LayerKind::Linear)
    }

    /// Draws a per-unit mask while training and scales at inference.
    pub fn uses_dropout(self) -> bool {
        matches!(
            self,
            LayerKind::TanhWithDropout | LayerKind::RectifierWithDropout | LayerKind::Maxout
        )
    }

    /// Zeroes input features with the adapter's dropout rate when placed
    /// right after the input. Maxout leaves its input alone.
    pub fn uses_input_dropout(self) -> bool {
        matches!(self, LayerKind::TanhWithDropout | LayerKind::RectifierWithDropout)
    }

    pub fn is_tied(self) -> bool {
        matches!(self, LayerKind::TanhPrime | LayerKind::RectifierPrime)
    }
}
