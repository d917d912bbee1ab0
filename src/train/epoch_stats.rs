use serde::{Serialize, Deserialize};

use crate::train::eval::Errors;

/// Per-epoch training statistics emitted by `train_loop`.
///
/// When a `progress_tx` channel is configured in `TrainConfig`, the training
/// loop sends one `EpochStats` value at the end of every completed epoch
/// (and after a final partial one). `train_parallel` sends a single value
/// once all workers have joined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Examples processed by the stack so far, across all workers.
    pub processed: u64,
    /// Inference-mode errors over the whole input at the end of the epoch.
    pub errors: Errors,
    /// Wall-clock duration of this epoch in milliseconds.
    pub elapsed_ms: u64,
}
