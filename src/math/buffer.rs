use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A fixed-length `f32` array that several layer stacks can alias.
///
/// Cloning a `SharedBuffer` does not copy the values: both handles read and
/// write the same storage. This is how worker clones share weights, biases
/// and momentum while keeping their own activations.
///
/// Values are stored as `f32` bits in `AtomicU32`s and accessed with relaxed
/// ordering. Individual loads and stores never tear, but `add` is a separate
/// load and store, so concurrent updates to the same element may be lost.
/// Training tolerates this (asynchronous "Hogwild" SGD); single-threaded use
/// is fully deterministic.
#[derive(Clone)]
pub struct SharedBuffer {
    data: Arc<[AtomicU32]>,
}

impl SharedBuffer {
    pub fn zeros(len: usize) -> SharedBuffer {
        SharedBuffer::filled(len, 0.0)
    }

    pub fn filled(len: usize, value: f32) -> SharedBuffer {
        let bits = value.to_bits();
        SharedBuffer {
            data: (0..len).map(|_| AtomicU32::new(bits)).collect(),
        }
    }

    pub fn from_slice(values: &[f32]) -> SharedBuffer {
        SharedBuffer {
            data: values.iter().map(|v| AtomicU32::new(v.to_bits())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> f32 {
        f32::from_bits(self.data[i].load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, i: usize, value: f32) {
        self.data[i].store(value.to_bits(), Ordering::Relaxed);
    }

    /// Not atomic as a whole; see the type-level docs.
    #[inline]
    pub fn add(&self, i: usize, delta: f32) {
        self.set(i, self.get(i) + delta);
    }

    #[inline]
    pub fn scale(&self, i: usize, factor: f32) {
        self.set(i, self.get(i) * factor);
    }

    pub fn fill(&self, value: f32) {
        for i in 0..self.len() {
            self.set(i, value);
        }
    }

    pub fn to_vec(&self) -> Vec<f32> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// True when both handles alias the same storage.
    pub fn ptr_eq(a: &SharedBuffer, b: &SharedBuffer) -> bool {
        Arc::ptr_eq(&a.data, &b.data)
    }
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_alias_the_same_storage() {
        let a = SharedBuffer::zeros(3);
        let b = a.clone();
        b.set(1, 2.5);
        a.add(1, 0.5);
        assert_eq!(b.get(1), 3.0);
        assert!(SharedBuffer::ptr_eq(&a, &b));
    }

    #[test]
    fn independent_buffers_do_not_alias() {
        let a = SharedBuffer::from_slice(&[1.0, -2.0]);
        let b = SharedBuffer::from_slice(&[1.0, -2.0]);
        assert!(!SharedBuffer::ptr_eq(&a, &b));
        a.scale(1, 0.5);
        assert_eq!(a.to_vec(), vec![1.0, -1.0]);
        assert_eq!(b.to_vec(), vec![1.0, -2.0]);
    }

    #[test]
    fn filled_and_fill() {
        let a = SharedBuffer::filled(4, 1.0);
        assert_eq!(a.to_vec(), vec![1.0; 4]);
        a.fill(0.0);
        assert_eq!(a.to_vec(), vec![0.0; 4]);
        assert!(!a.is_empty());
        assert_eq!(a.len(), 4);
    }
}
