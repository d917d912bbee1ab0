use serde::{Serialize, Deserialize};

use crate::layers::kind::LayerKind;
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::loss::mse::MseLoss;
use crate::network::network::Network;

/// Mean errors of a stack over its whole input.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Errors {
    pub examples: u64,
    /// Mean squared error against the one-hot label, the regression values
    /// or, for autoencoders, the input features.
    pub mse: f64,
    /// Mean cross-entropy; Softmax outputs only.
    pub cross_entropy: Option<f64>,
    /// Fraction of labelled examples whose arg-max is wrong; Softmax
    /// outputs only.
    pub classification: Option<f64>,
}

/// Runs inference over every example of the stack's input and reports the
/// mean errors. The input cursor is left where it was.
pub fn evaluate(network: &mut Network) -> Errors {
    let start = network.input().adapter().position();
    let len = network.input().adapter().len();
    let kind = network.output_layer().kind;
    let mut expected = vec![0.0f32; network.output_layer().units];

    let mut squared = 0.0;
    let mut entropy = 0.0;
    let mut labelled = 0u64;
    let mut wrong = 0u64;

    network.input_mut().adapter_mut().seek(0);
    for _ in 0..len {
        network.forward(false);
        let output = network.output();
        match kind {
            LayerKind::Softmax => {
                let label = network.input().adapter().label();
                expected.fill(0.0);
                if let Some(slot) = label.and_then(|l| expected.get_mut(l)) {
                    *slot = 1.0;
                }
                entropy += CrossEntropyLoss::loss(output, label);
                if let Some(label) = label {
                    labelled += 1;
                    if argmax(output) != label {
                        wrong += 1;
                    }
                }
            }
            LayerKind::Linear => {
                network.input().adapter().values(&mut expected);
                for v in expected.iter_mut() {
                    if v.is_nan() {
                        *v = 0.0;
                    }
                }
            }
            _ => {
                let features = network.input().activations();
                expected.clear();
                expected.extend_from_slice(&features[..output.len().min(features.len())]);
                expected.resize(output.len(), 0.0);
            }
        }
        squared += MseLoss::loss(output, &expected);
        network.input_mut().adapter_mut().advance();
    }
    network.input_mut().adapter_mut().seek(start);

    let n = len.max(1) as f64;
    let softmax = kind == LayerKind::Softmax;
    Errors {
        examples: len,
        mse: squared / n,
        cross_entropy: softmax.then(|| entropy / n),
        classification: softmax.then(|| wrong as f64 / labelled.max(1) as f64),
    }
}

/// Index of the maximum element in a slice.
fn argmax(v: &[f32]) -> usize {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
