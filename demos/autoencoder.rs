use ferrite_layers::{
    evaluate, train_loop, Hyperparams, Layer, LayerKind, MemoryInput, Network, TrainConfig,
};

/// Compresses 6-wide one-hot rows through 3 tanh units and a tied decoder.
fn main() -> ferrite_layers::Result<()> {
    let rows: Vec<Vec<f32>> = (0..6)
        .map(|i| (0..6).map(|j| if i == j { 0.9 } else { -0.1 }).collect())
        .collect();
    let input = MemoryInput::unlabeled(rows)?;

    let params = Hyperparams::default().with_rate(0.02).with_max_w2(10.0);
    let mut network = Network::new(
        Box::new(input),
        vec![
            Layer::new(3, LayerKind::Tanh, params.clone().with_momentum(0.2, 5_000, 0.8)),
            Layer::new(6, LayerKind::TanhPrime, params),
        ],
        3,
    )?;

    println!("reconstruction mse before: {:.5}", evaluate(&mut network).mse);
    let errors = train_loop(&mut network, &TrainConfig::new(3_000.0))?;
    println!("reconstruction mse after:  {:.5}", errors.mse);

    let encoder = network.layer(1).map(|l| l.weights().to_vec()).unwrap_or_default();
    println!("encoder weights (shared with the decoder): {encoder:.3?}");
    Ok(())
}
