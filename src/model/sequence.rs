//! Index name sequence
//!
//! Owned by the caller's run context and passed into the configuration
//! parser, so every index parsed during a run gets a unique name.

/// Monotonically increasing suffix generator for index names
#[derive(Debug, Clone, Default)]
pub struct IndexNameSequence {
    next: u64,
}

impl IndexNameSequence {
    /// Sequence starting at 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence starting at `first`
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    /// Take the next value
    pub fn next_value(&mut self) -> u64 {
        let value = self.next;
        self.next += 1;
        value
    }

    /// `<base>_<n>` with a fresh `n`
    pub fn fresh_name(&mut self, base: &str) -> String {
        format!("{}_{}", base, self.next_value())
    }

    /// Value the next call will return
    pub fn peek(&self) -> u64 {
        self.next
    }
}
