pub mod memory;

pub use memory::MemoryInput;

/// The data source at index 0 of every layer stack.
///
/// An adapter owns a cursor over its examples and produces, for the
/// example under the cursor, a dense feature vector of width `units()` and
/// the target the output layer trains against. Reading, normalizing and
/// sharding the underlying data is the adapter's business.
///
/// Adapters are cloned per worker with `box_clone`; clones must have their
/// own cursor.
pub trait Input: Send {
    /// Width of the feature vector.
    fn units(&self) -> usize;

    /// Number of examples.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn position(&self) -> u64;

    fn seek(&mut self, pos: u64);

    /// Writes the features of the current example into `out`. Missing
    /// values may be written as NaN; the input layer replaces them with 0.
    fn features(&self, out: &mut [f32]);

    /// Class of the current example, `None` when it is missing or the
    /// adapter carries no labels.
    fn label(&self) -> Option<usize> {
        None
    }

    /// Regression targets of the current example. NaN marks a missing
    /// value and is trained as 0.
    fn values(&self, out: &mut [f32]) {
        out.fill(f32::NAN);
    }

    /// Probability of zeroing each feature during training.
    fn dropout_rate(&self) -> f64 {
        0.0
    }

    fn box_clone(&self) -> Box<dyn Input>;

    /// Moves to the next example, wrapping to the first after the last.
    fn advance(&mut self) -> u64 {
        let len = self.len();
        let next = if len == 0 || self.position() + 1 >= len { 0 } else { self.position() + 1 };
        self.seek(next);
        next
    }
}

/// Stack index 0: the adapter plus the activation array the first hidden
/// layer reads.
pub struct InputLayer {
    adapter: Box<dyn Input>,
    activations: Vec<f32>,
}

impl InputLayer {
    pub fn new(adapter: Box<dyn Input>) -> InputLayer {
        let units = adapter.units();
        InputLayer { adapter, activations: vec![0.0; units] }
    }

    pub fn units(&self) -> usize {
        self.activations.len()
    }

    /// Loads the current example's features. Missing values become 0.
    pub fn forward(&mut self) {
        self.adapter.features(&mut self.activations);
        for x in self.activations.iter_mut() {
            if x.is_nan() {
                *x = 0.0;
            }
        }
    }

    pub fn activations(&self) -> &[f32] {
        &self.activations
    }

    pub(crate) fn activations_mut(&mut self) -> &mut [f32] {
        &mut self.activations
    }

    pub fn adapter(&self) -> &dyn Input {
        self.adapter.as_ref()
    }

    pub fn adapter_mut(&mut self) -> &mut dyn Input {
        self.adapter.as_mut()
    }

    /// Same adapter data with its own cursor and zeroed activations.
    pub(crate) fn fork(&self) -> InputLayer {
        InputLayer::new(self.adapter.box_clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_features_become_zero() {
        let input = MemoryInput::unlabeled(vec![vec![1.0, f32::NAN, 3.0]]).unwrap();
        let mut layer = InputLayer::new(Box::new(input));
        layer.forward();
        assert_eq!(layer.activations(), &[1.0, 0.0, 3.0]);
    }

    #[test]
    fn advance_wraps_around() {
        let mut input = MemoryInput::unlabeled(vec![vec![0.0], vec![1.0], vec![2.0]]).unwrap();
        assert_eq!(input.advance(), 1);
        assert_eq!(input.advance(), 2);
        assert_eq!(input.advance(), 0);
    }

    #[test]
    fn forked_layers_have_independent_cursors() {
        let input = MemoryInput::unlabeled(vec![vec![0.0], vec![1.0]]).unwrap();
        let mut layer = InputLayer::new(Box::new(input));
        let mut fork = layer.fork();
        fork.adapter_mut().advance();
        layer.forward();
        fork.forward();
        assert_eq!(layer.activations(), &[0.0]);
        assert_eq!(fork.activations(), &[1.0]);
    }
}
