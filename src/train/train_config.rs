use std::sync::mpsc;
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};

use crate::error::{Error, Result};
use crate::train::epoch_stats::EpochStats;

/// Configuration for a `train_loop` or `train_parallel` run.
///
/// # Fields
/// - `epochs`     : passes over the input; fractional values train on a
///                   prefix of the last pass
/// - `examples`   : explicit number of examples; overrides `epochs`
/// - `progress_tx`: optional channel sender; one `EpochStats` is sent per
///                   completed epoch.  If the receiver is dropped the loop
///                   terminates early (clean shutdown).
/// - `stop_flag`  : optional atomic flag; when set to `true` from another
///                   thread training stops before the next example.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: f64,
    pub examples: Option<u64>,
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl TrainConfig {
    /// Creates a minimal `TrainConfig` with no progress channel and no stop flag.
    pub fn new(epochs: f64) -> Self {
        TrainConfig {
            epochs,
            examples: None,
            progress_tx: None,
            stop_flag: None,
        }
    }

    pub fn with_examples(mut self, examples: u64) -> Self {
        self.examples = Some(examples);
        self
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<EpochStats>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    /// Number of examples to train on for an input of `len` examples.
    pub fn total_examples(&self, len: u64) -> Result<u64> {
        if let Some(n) = self.examples {
            return Ok(n);
        }
        if !self.epochs.is_finite() || self.epochs < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "epochs must be a non-negative number, got {}",
                self.epochs
            )));
        }
        Ok((self.epochs * len as f64).ceil() as u64)
    }

    pub fn should_stop(&self) -> bool {
        stop_requested(self.stop_flag.as_ref())
    }
}

pub(crate) fn stop_requested(flag: Option<&Arc<AtomicBool>>) -> bool {
    flag.map_or(false, |f| f.load(Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractional_epochs_round_up() {
        assert_eq!(TrainConfig::new(1.5).total_examples(4).unwrap(), 6);
        assert_eq!(TrainConfig::new(0.1).total_examples(4).unwrap(), 1);
        assert_eq!(TrainConfig::new(0.0).total_examples(4).unwrap(), 0);
    }

    #[test]
    fn explicit_examples_win() {
        assert_eq!(TrainConfig::new(10.0).with_examples(3).total_examples(100).unwrap(), 3);
    }

    #[test]
    fn rejects_negative_epochs() {
        assert!(TrainConfig::new(-1.0).total_examples(4).is_err());
        assert!(TrainConfig::new(f64::NAN).total_examples(4).is_err());
    }

    #[test]
    fn stop_flag_is_observed() {
        let flag = Arc::new(AtomicBool::new(false));
        let config = TrainConfig::new(1.0).with_stop_flag(flag.clone());
        assert!(!config.should_stop());
        flag.store(true, Ordering::Relaxed);
        assert!(config.should_stop());
        assert!(!TrainConfig::new(1.0).should_stop());
    }
}
