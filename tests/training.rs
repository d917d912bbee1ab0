use std::sync::mpsc;

use ferrite_layers::{
    evaluate, train_loop, train_parallel, Hyperparams, Layer, LayerKind, MemoryInput, Network,
    TrainConfig,
};

fn xor(seed: u64) -> Network {
    let input = MemoryInput::classification(
        vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
        vec![Some(0), Some(1), Some(1), Some(0)],
    )
    .unwrap();
    let params = Hyperparams::default().with_rate(0.1);
    Network::new(
        Box::new(input),
        vec![
            Layer::new(16, LayerKind::Tanh, params.clone()),
            Layer::new(2, LayerKind::Softmax, params),
        ],
        seed,
    )
    .unwrap()
}

#[test]
fn hogwild_workers_learn_xor() {
    let mut network = xor(21);
    let before = evaluate(&mut network);

    let (tx, rx) = mpsc::channel();
    let config = TrainConfig::new(5_000.0).with_progress(tx);
    let errors = train_parallel(&mut network, 4, &config).unwrap();

    assert_eq!(network.processed(), 20_000);
    assert!(errors.mse < before.mse);
    assert_eq!(errors.classification, Some(0.0));
    let stats = rx.recv().unwrap();
    assert_eq!(stats.epoch, 5_000);
    assert_eq!(stats.errors, errors);
}

#[test]
fn single_thread_learns_xor() {
    let mut network = xor(3);
    let errors = train_loop(&mut network, &TrainConfig::new(5_000.0)).unwrap();
    assert_eq!(errors.classification, Some(0.0));
    assert!(errors.cross_entropy.unwrap() < 0.2);
}

#[test]
fn cursor_ends_where_training_stopped() {
    let mut network = xor(1);
    train_loop(&mut network, &TrainConfig::new(2.5)).unwrap();
    assert_eq!(network.processed(), 10);
    assert_eq!(network.input().adapter().position(), 2);

    evaluate(&mut network);
    assert_eq!(network.input().adapter().position(), 2);
}

#[test]
fn explicit_example_budget_and_step_offset() {
    let input =
        MemoryInput::regression(vec![vec![1.0], vec![2.0]], vec![vec![0.5], vec![1.0]]).unwrap();
    let params = Hyperparams::default().with_rate(0.1).with_rate_annealing(0.01);
    let layers = vec![Layer::new(1, LayerKind::Linear, params)];
    let mut network = Network::with_step(Box::new(input), layers, 0, 1_000).unwrap();
    assert_eq!(network.layers()[0].rate(network.processed()), 0.1 / 11.0);

    train_loop(&mut network, &TrainConfig::new(100.0).with_examples(7)).unwrap();
    assert_eq!(network.processed(), 1_007);
}

#[test]
fn unlabelled_examples_give_no_class_signal() {
    let rows = vec![vec![1.0, -1.0], vec![0.5, 0.5]];
    let input = MemoryInput::classification(rows, vec![None, None]).unwrap();
    let params = Hyperparams::default().with_rate(0.1);
    let layers = vec![Layer::new(2, LayerKind::Softmax, params)];
    let mut network = Network::new(Box::new(input), layers, 5).unwrap();

    let errors = train_loop(&mut network, &TrainConfig::new(500.0)).unwrap();
    assert_eq!(errors.classification, Some(0.0));
    assert_eq!(errors.cross_entropy, Some(0.0));
    // Every output is pushed towards zero: the softmax can only even out.
    let out = network.predict();
    assert!((out[0] - out[1]).abs() < 0.05, "{out:?}");
}
