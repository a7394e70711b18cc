//! Bounded least-recently-used cache for the classifier fast path.

use std::collections::HashMap;

use super::tier::SecurityTier;

/// Fixed-capacity LRU map from a normalised command to its tier.
///
/// Recency is tracked with a monotonically increasing tick; eviction scans
/// for the oldest entry, which is cheap at the capacities used here.
#[derive(Debug)]
pub struct RecencyCache {
    capacity: usize,
    tick: u64,
    entries: HashMap<String, (SecurityTier, u64)>,
}

impl RecencyCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            tick: 0,
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Look up `command`, marking it as most recently used on a hit.
    pub fn get(&mut self, command: &str) -> Option<SecurityTier> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(command)?;
        entry.1 = tick;
        Some(entry.0)
    }

    /// Insert or refresh `command`, evicting the least recently used entry
    /// when full.
    pub fn insert(&mut self, command: &str, tier: SecurityTier) {
        let tick = self.next_tick();
        if let Some(entry) = self.entries.get_mut(command) {
            *entry = (tier, tick);
            return;
        }
        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(command.to_owned(), (tier, tick));
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn next_tick(&mut self) -> u64 {
        self.tick = self.tick.wrapping_add(1);
        self.tick
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, (_, tick))| *tick)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}
