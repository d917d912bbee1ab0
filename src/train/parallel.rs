use std::thread;
use std::time::Instant;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::network::network::Network;
use crate::train::epoch_stats::EpochStats;
use crate::train::eval::{evaluate, Errors};
use crate::train::train_config::{stop_requested, TrainConfig};

/// Hogwild training: `workers` forks of `network` train concurrently on the
/// same weight, bias and momentum buffers without locking.
///
/// Worker `w` starts at input offset `w * len / workers` and takes an equal
/// share of the example budget. Updates from different workers may race
/// and overwrite each other; runs with more than one worker are therefore
/// not reproducible. The stop flag is checked by every worker before each
/// example.
///
/// Once all workers have joined, the whole input is evaluated through
/// `network` and one `EpochStats` is sent on the progress channel.
pub fn train_parallel(
    network: &mut Network,
    workers: usize,
    config: &TrainConfig,
) -> Result<Errors> {
    if workers == 0 {
        return Err(Error::InvalidConfig("at least one worker is required".into()));
    }
    let len = network.input().adapter().len();
    let total = config.total_examples(len)?;
    let n = workers as u64;

    let mut forks = (0..workers)
        .map(|w| {
            let mut fork = network.fork(w)?;
            fork.input_mut().adapter_mut().seek(w as u64 * len / n);
            Ok(fork)
        })
        .collect::<Result<Vec<Network>>>()?;
    info!(workers, examples = total, "parallel training started");

    let t_start = Instant::now();
    let stop_flag = config.stop_flag.as_ref();
    let results: Vec<Result<u64>> = thread::scope(|s| {
        let handles: Vec<_> = forks
            .iter_mut()
            .enumerate()
            .map(|(w, fork)| {
                let share = total / n + u64::from((w as u64) < total % n);
                s.spawn(move || -> Result<u64> {
                    let mut done = 0;
                    while done < share && !stop_requested(stop_flag) {
                        fork.step()?;
                        done += 1;
                    }
                    debug!(worker = w, done, "worker finished");
                    Ok(done)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join().unwrap_or_else(|_| {
                    Err(Error::InvalidConfig("training worker panicked".into()))
                })
            })
            .collect()
    });
    let mut done = 0;
    for result in results {
        done += result?;
    }
    let elapsed_ms = t_start.elapsed().as_millis() as u64;

    let errors = evaluate(network);
    info!(
        done,
        processed = network.processed(),
        mse = errors.mse,
        elapsed_ms,
        "parallel training finished"
    );
    if let Some(ref tx) = config.progress_tx {
        let epoch = if len == 0 { 0 } else { done.div_ceil(len) as usize };
        // A dropped receiver has nothing left to stop here.
        let _ = tx.send(EpochStats { epoch, processed: network.processed(), errors, elapsed_ms });
    }
    Ok(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use crate::input::MemoryInput;
    use crate::layers::dense::Layer;
    use crate::layers::kind::LayerKind;
    use crate::optim::hyperparams::Hyperparams;

    fn network() -> Network {
        let rows = (0..10).map(|i| vec![i as f32 / 10.0]).collect();
        let labels = (0..10).map(|i| Some(usize::from(i >= 5))).collect();
        let input = MemoryInput::classification(rows, labels).unwrap();
        let params = Hyperparams::default().with_rate(0.05);
        let layers = vec![
            Layer::new(4, LayerKind::Tanh, params.clone()),
            Layer::new(2, LayerKind::Softmax, params),
        ];
        Network::new(Box::new(input), layers, 5).unwrap()
    }

    #[test]
    fn workers_split_the_budget() {
        let mut network = network();
        train_parallel(&mut network, 3, &TrainConfig::new(1.0)).unwrap();
        assert_eq!(network.processed(), 10);
        assert_eq!(network.input().adapter().position(), 0);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut network = network();
        let result = train_parallel(&mut network, 0, &TrainConfig::new(1.0));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn stop_flag_reaches_workers() {
        let mut network = network();
        let flag = Arc::new(AtomicBool::new(true));
        train_parallel(&mut network, 2, &TrainConfig::new(3.0).with_stop_flag(flag)).unwrap();
        assert_eq!(network.processed(), 0);
    }
}
