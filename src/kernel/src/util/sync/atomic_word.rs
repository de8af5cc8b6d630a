use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A word-sized counter whose updates are indivisible across CPUs.
#[derive(Default)]
pub struct AtomicWord(AtomicUsize);

impl AtomicWord {
    pub const fn new(val: usize) -> Self {
        Self(AtomicUsize::new(val))
    }

    pub fn load(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    pub fn store(&self, val: usize) {
        self.0.store(val, Ordering::Release)
    }

    /// Increment and return the new value.
    pub fn inc(&self) -> usize {
        self.0.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// Decrement and return the new value.
    ///
    /// Decrementing a zero counter is a bug.
    pub fn dec(&self) -> usize {
        let old = self.0.fetch_sub(1, Ordering::AcqRel);
        assert!(old != 0, "atomic counter underflow");
        old - 1
    }

    /// Compare-and-swap. Returns the previous value; the swap happened iff it
    /// equals `current`.
    pub fn cas(&self, current: usize, new: usize) -> usize {
        match self
            .0
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(old) | Err(old) => old,
        }
    }

    /// Set bits and return the previous value.
    pub fn fetch_or(&self, bits: usize) -> usize {
        self.0.fetch_or(bits, Ordering::AcqRel)
    }
}

impl fmt::Debug for AtomicWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.load())
    }
}
