//! ferrite-layers demo trainer
//!
//! Trains a layer stack on the XOR problem and logs per-epoch statistics.
//!
//! Run with:
//!   cargo run --release -- [spec.json]
//!
//! Without an argument the default 2-8-2 tanh/softmax stack is used. Set
//! `RUST_LOG=debug` to see every epoch.
use std::sync::mpsc;
use std::thread;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ferrite_layers::{train_loop, Error, MemoryInput, Network, NetworkSpec, Result, TrainConfig};

const EPOCHS: f64 = 2000.0;
const REPORT_EVERY: usize = 250;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run() {
        error!(error = %e, "training failed");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let spec = match std::env::args().nth(1) {
        Some(path) => NetworkSpec::load_json(&path)?,
        None => NetworkSpec::xor_default(),
    };
    let rows = vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]];
    let input = MemoryInput::classification(rows, vec![Some(0), Some(1), Some(1), Some(0)])?;
    let mut network = Network::from_spec(&spec, Box::new(input))?;
    info!(
        name = spec.name.as_deref().unwrap_or("unnamed"),
        depth = network.depth(),
        seed = spec.seed,
        "stack ready"
    );

    // Training runs on its own thread; this one consumes progress, the same
    // way a UI would.
    let (tx, rx) = mpsc::channel();
    let config = TrainConfig::new(EPOCHS).with_progress(tx);
    let trainer = thread::spawn(move || {
        train_loop(&mut network, &config).map(|errors| (network, errors))
    });
    for stats in rx {
        if stats.epoch % REPORT_EVERY == 0 {
            info!(
                epoch = stats.epoch,
                processed = stats.processed,
                mse = stats.errors.mse,
                classification = ?stats.errors.classification,
                "progress"
            );
        }
    }
    let (mut network, errors) = trainer
        .join()
        .map_err(|_| Error::InvalidConfig("training thread panicked".into()))??;
    info!(
        mse = errors.mse,
        cross_entropy = ?errors.cross_entropy,
        classification = ?errors.classification,
        "done"
    );

    for _ in 0..network.input().adapter().len() {
        let example = network.input().adapter().position();
        let output = network.predict().to_vec();
        info!(example, input = ?network.input().activations(), output = ?output, "prediction");
        network.input_mut().adapter_mut().advance();
    }
    Ok(())
}
