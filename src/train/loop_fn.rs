use std::time::Instant;

use tracing::{debug, info};

use crate::error::Result;
use crate::network::network::Network;
use crate::train::epoch_stats::EpochStats;
use crate::train::eval::{evaluate, Errors};
use crate::train::train_config::TrainConfig;

/// Trains `network` one example at a time and returns the errors of the
/// **last completed epoch** (or a fresh evaluation when no epoch completed).
///
/// Each example runs forward in training mode, clears the error arrays,
/// runs backward from the output down to the first hidden layer, advances
/// the input cursor and counts the example. An epoch ends every `len`
/// examples and after the final, possibly partial, pass; at that point the
/// whole input is evaluated in inference mode.
///
/// # Early termination
/// The loop breaks early if:
/// - the `progress_tx` receiver has been dropped, **or**
/// - `config.stop_flag` is set to `true` (checked before every example).
pub fn train_loop(network: &mut Network, config: &TrainConfig) -> Result<Errors> {
    let len = network.input().adapter().len();
    let total = config.total_examples(len)?;
    info!(examples = total, input = len, start = network.processed(), "training started");

    let mut done = 0u64;
    let mut epoch = 0usize;
    let mut last = None;
    let mut t_start = Instant::now();

    while done < total {
        if config.should_stop() {
            info!(done, "stop requested");
            break;
        }
        network.step()?;
        done += 1;

        if done % len.max(1) == 0 || done == total {
            epoch += 1;
            let elapsed_ms = t_start.elapsed().as_millis() as u64;
            let errors = evaluate(network);
            debug!(
                epoch,
                processed = network.processed(),
                mse = errors.mse,
                classification = ?errors.classification,
                elapsed_ms,
                "epoch finished"
            );
            last = Some(errors);

            let stats = EpochStats { epoch, processed: network.processed(), errors, elapsed_ms };
            if let Some(ref tx) = config.progress_tx {
                // If the receiver has been dropped, stop training.
                if tx.send(stats).is_err() {
                    info!(epoch, "progress receiver dropped");
                    break;
                }
            }
            t_start = Instant::now();
        }
    }

    let errors = match last {
        Some(errors) => errors,
        None => evaluate(network),
    };
    info!(processed = network.processed(), mse = errors.mse, "training finished");
    Ok(errors)
}
