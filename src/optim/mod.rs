pub mod hyperparams;
pub mod sgd;

pub use hyperparams::{Hyperparams, InitialWeightDistribution};
pub use sgd::{Layout, Sgd, Synapses};
