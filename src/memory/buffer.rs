//! Bounded FIFO buffer for short-term memory

use std::collections::VecDeque;

use super::MemoryEntry;

/// Fixed-capacity, oldest-first-evicted sequence of entries
///
/// Never persisted. `len() <= capacity()` holds at all times; a capacity of
/// zero keeps nothing.
#[derive(Debug, Clone)]
pub struct ShortTermBuffer {
    entries: VecDeque<MemoryEntry>,
    capacity: usize,
}

impl ShortTermBuffer {
    /// Create an empty buffer holding at most `capacity` entries
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest first when full
    ///
    /// Returns the evicted entry, if any. With zero capacity the pushed entry
    /// itself is returned.
    pub fn push(&mut self, entry: MemoryEntry) -> Option<MemoryEntry> {
        if self.capacity == 0 {
            return Some(entry);
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Entries from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entry(n: usize) -> MemoryEntry {
        MemoryEntry::now(json!(n))
    }

    fn contents(buffer: &ShortTermBuffer) -> Vec<serde_json::Value> {
        buffer.iter().map(|e| e.content.clone()).collect()
    }

    #[test]
    fn test_fills_in_order() {
        let mut buffer = ShortTermBuffer::new(3);
        for n in 0..3 {
            assert!(buffer.push(entry(n)).is_none());
        }
        assert_eq!(contents(&buffer), vec![json!(0), json!(1), json!(2)]);
    }

    #[test]
    fn test_evicts_oldest() {
        let mut buffer = ShortTermBuffer::new(3);
        for n in 0..3 {
            buffer.push(entry(n));
        }

        let evicted = buffer.push(entry(3)).unwrap();
        assert_eq!(evicted.content, json!(0));
        assert_eq!(contents(&buffer), vec![json!(1), json!(2), json!(3)]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut buffer = ShortTermBuffer::new(0);
        let evicted = buffer.push(entry(7)).unwrap();
        assert_eq!(evicted.content, json!(7));
        assert!(buffer.is_empty());
    }
}
