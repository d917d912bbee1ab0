pub mod dense;
pub mod kind;

pub use dense::{Layer, Target, Upstream};
pub use kind::LayerKind;
