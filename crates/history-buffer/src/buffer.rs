//! Bounded History Buffer Implementation

use sensor_model::HistoryEntry;
use serde::Serialize;
use std::collections::VecDeque;

/// Default buffer capacity (50 entries = 100 s at the default 2 s period)
pub const DEFAULT_CAPACITY: usize = 50;

/// Bounded FIFO of history entries, oldest first.
///
/// Once full, every append evicts exactly the oldest entry, so the newest
/// entry is always present and the length never exceeds the capacity.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryBuffer {
    /// Entries, oldest at the front
    entries: VecDeque<HistoryEntry>,
    /// Maximum number of retained entries
    capacity: usize,
    /// Total entries appended since the last clear (for statistics)
    total_appended: usize,
}

impl HistoryBuffer {
    /// Create a new buffer with the given capacity
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "History buffer capacity must be > 0");
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            total_appended: 0,
        }
    }

    /// Create a buffer with the default capacity (50 entries)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Append an entry, evicting the oldest one if the buffer is full
    pub fn append(&mut self, entry: HistoryEntry) -> Option<HistoryEntry> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        self.total_appended += 1;
        evicted
    }

    /// Ordered copy of the current contents (oldest first)
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().copied().collect()
    }

    /// Copy of the newest `count` entries, oldest first
    pub fn read_last(&self, count: usize) -> Vec<HistoryEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).copied().collect()
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total entries appended since the last clear
    pub fn total_appended(&self) -> usize {
        self.total_appended
    }

    /// Empty the buffer
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_appended = 0;
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sensor_model::Vector3;

    fn entry(ts: u64) -> HistoryEntry {
        HistoryEntry::new(ts, Vector3::new(0.0, ts as f64, 9.8), Vector3::default())
    }

    #[test]
    fn test_append_and_read() {
        let mut buffer = HistoryBuffer::new(10);

        for i in 0..5 {
            buffer.append(entry(i * 1000));
        }

        assert_eq!(buffer.len(), 5);

        let entries = buffer.read_last(3);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].timestamp_ms, 2000);
        assert_eq!(entries[2].timestamp_ms, 4000); // Most recent

        assert_eq!(buffer.read_last(100), buffer.snapshot());
        assert!(buffer.read_last(0).is_empty());
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut buffer = HistoryBuffer::new(5);

        for i in 0..5 {
            assert!(buffer.append(entry(i)).is_none());
        }
        assert_eq!(buffer.len(), buffer.capacity());

        let evicted = buffer.append(entry(5));
        assert_eq!(evicted.map(|e| e.timestamp_ms), Some(0));
        assert_eq!(buffer.len(), 5);

        let timestamps: Vec<u64> = buffer.snapshot().iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(timestamps, vec![1, 2, 3, 4, 5]);
        assert_eq!(buffer.read_last(1)[0].timestamp_ms, 5);
    }

    #[test]
    fn test_default_capacity_is_fifty() {
        let mut buffer = HistoryBuffer::default();
        for i in 0..120 {
            buffer.append(entry(i));
        }
        assert_eq!(buffer.capacity(), 50);
        assert_eq!(buffer.len(), 50);
        assert_eq!(buffer.snapshot()[0].timestamp_ms, 70);
        assert_eq!(buffer.total_appended(), 120);
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let mut buffer = HistoryBuffer::new(3);
        buffer.append(entry(1));
        let snapshot = buffer.snapshot();
        buffer.append(entry(2));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut buffer = HistoryBuffer::new(4);
        for i in 0..4 {
            buffer.append(entry(i));
        }
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.total_appended(), 0);
    }

    proptest! {
        #[test]
        fn prop_length_bounded_and_fifo(count in 0usize..200) {
            let mut buffer = HistoryBuffer::with_default_capacity();
            for i in 0..count {
                let before = buffer.snapshot();
                let evicted = buffer.append(entry(i as u64));

                prop_assert!(buffer.len() <= DEFAULT_CAPACITY);
                if before.len() == DEFAULT_CAPACITY {
                    prop_assert_eq!(evicted, Some(before[0]));
                    let mut expected = before[1..].to_vec();
                    expected.push(entry(i as u64));
                    prop_assert_eq!(buffer.snapshot(), expected);
                } else {
                    prop_assert!(evicted.is_none());
                }
            }
            prop_assert_eq!(buffer.len(), count.min(DEFAULT_CAPACITY));
            let timestamps: Vec<u64> = buffer.snapshot().iter().map(|e| e.timestamp_ms).collect();
            let expected: Vec<u64> = (count.saturating_sub(DEFAULT_CAPACITY)..count).map(|i| i as u64).collect();
            prop_assert_eq!(timestamps, expected);
        }
    }
}
