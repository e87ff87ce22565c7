use std::collections::VecDeque;

/// Bounded FIFO with a programmable-empty flag.
///
/// Pushing into a full FIFO silently drops the entry. The drop is counted (and logged) but never
/// reported to the producer; upstream flow control via [`BoundedFifo::prog_empty`] is the only
/// overflow defence.
#[derive(Debug, Clone)]
pub struct BoundedFifo<T> {
    name: &'static str,
    entries: VecDeque<T>,
    depth: usize,
    prog_empty_threshold: usize,
    dropped: u64,
}

impl<T> BoundedFifo<T> {
    pub fn new(name: &'static str, depth: usize, prog_empty_threshold: usize) -> Self {
        Self {
            name,
            entries: VecDeque::with_capacity(depth),
            depth,
            prog_empty_threshold,
            dropped: 0,
        }
    }

    /// Returns `false` if the entry was dropped.
    pub fn push(&mut self, entry: T) -> bool {
        if self.is_full() {
            self.dropped += 1;
            tracing::warn!(fifo = self.name, depth = self.depth, "FIFO overflow, entry dropped");
            return false;
        }
        self.entries.push_back(entry);
        true
    }

    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_front()
    }

    pub fn peek(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.depth
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Occupancy is at or below the programmed threshold.
    pub fn prog_empty(&self) -> bool {
        self.entries.len() <= self.prog_empty_threshold
    }

    /// Entries lost to overflow since construction or the last [`BoundedFifo::clear`].
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }
}
