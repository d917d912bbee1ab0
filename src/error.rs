use thiserror::Error;

/// Errors raised while building, binding or driving a layer stack.
///
/// Everything here is a configuration error: the engine never retries, and
/// numeric problems (NaN, overflow) inside a pass are not reported.
#[derive(Error, Debug)]
pub enum Error {
    /// `backward` was requested for stack index 0.
    #[error("the input layer does not support backward propagation")]
    InputBackward,

    #[error("layer {layer}: expected {expected} values, found {actual}")]
    ShapeMismatch {
        layer: usize,
        expected: usize,
        actual: usize,
    },

    #[error("invalid layer stack: {0}")]
    InvalidStack(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
