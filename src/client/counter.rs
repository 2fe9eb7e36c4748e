//! Interaction counter.

/// Non-negative counter, starting at zero. It only ever goes up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter {
    value: u64,
}

impl Counter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one and return the new value. Saturates at `u64::MAX`.
    pub fn increment(&mut self) -> u64 {
        self.value = self.value.saturating_add(1);
        self.value
    }

    /// Current value.
    pub fn value(&self) -> u64 {
        self.value
    }
}
