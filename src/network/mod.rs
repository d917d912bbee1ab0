pub mod network;
pub mod spec;

pub use network::{Network, Training};
pub use spec::{NetworkSpec, LayerSpec};
