pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod input;
pub mod network;
pub mod loss;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use error::{Error, Result};
pub use math::buffer::SharedBuffer;
pub use activation::activation::Activation;
pub use layers::dense::{Layer, Target, Upstream};
pub use layers::kind::LayerKind;
pub use input::{Input, InputLayer, MemoryInput};
pub use network::network::Network;
pub use network::spec::{LayerSpec, NetworkSpec};
pub use loss::loss_type::LossType;
pub use optim::hyperparams::{Hyperparams, InitialWeightDistribution};
pub use optim::sgd::Sgd;
pub use train::{evaluate, train_loop, train_parallel, EpochStats, Errors, TrainConfig};
