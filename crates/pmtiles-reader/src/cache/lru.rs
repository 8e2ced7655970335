//! Least-recently-used bookkeeping shared by both cache strategies

use std::collections::HashMap;

use super::key::CacheKey;

struct Slot<V> {
    last_used: u64,
    value: V,
}

/// Map with a monotonic use counter per entry
pub(crate) struct Lru<V> {
    entries: HashMap<CacheKey, Slot<V>>,
    counter: u64,
    capacity: usize,
}

impl<V> Lru<V> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            counter: 0,
            capacity: capacity.max(1),
        }
    }

    fn tick(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    /// Look up `key`, marking it as most recently used
    pub(crate) fn get(&mut self, key: &CacheKey) -> Option<&V> {
        let now = self.tick();
        let slot = self.entries.get_mut(key)?;
        slot.last_used = now;
        Some(&slot.value)
    }

    /// Insert `value`, returning how many entries were evicted to make room
    pub(crate) fn insert(&mut self, key: CacheKey, value: V) -> usize {
        let now = self.tick();
        self.entries.insert(
            key,
            Slot {
                last_used: now,
                value,
            },
        );

        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            self.entries.remove(&oldest);
            evicted += 1;
        }
        evicted
    }

    pub(crate) fn remove(&mut self, key: &CacheKey) -> Option<V> {
        self.entries.remove(key).map(|slot| slot.value)
    }

    /// Remove `key` only if `matches` accepts its current value
    pub(crate) fn remove_if(&mut self, key: &CacheKey, matches: impl FnOnce(&V) -> bool) -> bool {
        if self.entries.get(key).is_some_and(|slot| matches(&slot.value)) {
            self.entries.remove(key);
            true
        } else {
            false
        }
    }

    pub(crate) fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
