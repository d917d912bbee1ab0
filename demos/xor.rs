use ferrite_layers::{
    evaluate, train_parallel, Hyperparams, Layer, LayerKind, MemoryInput, Network, TrainConfig,
};

fn main() -> ferrite_layers::Result<()> {
    let inputs = vec![
        vec![1.0, 0.0],
        vec![1.0, 1.0],
        vec![0.0, 1.0],
        vec![0.0, 0.0],
    ];
    let labels = vec![Some(1), Some(0), Some(1), Some(0)];
    let input = MemoryInput::classification(inputs, labels)?;

    let params = Hyperparams::default()
        .with_rate(0.05)
        .with_momentum(0.5, 1_000, 0.9)
        .with_max_w2(15.0);
    let mut network = Network::new(
        Box::new(input),
        vec![
            Layer::new(8, LayerKind::Tanh, params.clone()),
            Layer::new(2, LayerKind::Softmax, params),
        ],
        7,
    )?;

    println!("before: {:?}", evaluate(&mut network));
    // Two Hogwild workers sharing one set of weights.
    let errors = train_parallel(&mut network, 2, &TrainConfig::new(2_000.0))?;
    println!("after:  {errors:?}");

    for _ in 0..4 {
        let output = network.predict().to_vec();
        println!("Input: {:?} -> Output: {:.4?}", network.input().activations(), output);
        network.input_mut().adapter_mut().advance();
    }
    Ok(())
}
