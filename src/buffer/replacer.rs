use std::collections::VecDeque;

use ahash::AHashSet;
use lru::LruCache;

use super::PageKey;

/// Pluggable eviction-candidate tracker.
///
/// The buffer pool drives a replacer only from inside its own lock and
/// never pushes a pinned key, so implementations need no internal
/// synchronization. `push` registers a key as evictable (refreshing it if
/// already tracked), `delete` removes it from candidacy (used on pin and
/// on removal from the cache), and `pick_victim` surrenders the next
/// candidate, or `None` when everything has been pinned away.
pub trait Replacer: Send {
    fn push(&mut self, key: PageKey);

    fn delete(&mut self, key: &PageKey);

    fn pick_victim(&mut self) -> Option<PageKey>;
}

/// Least-recently-used policy: victim is the least recently pushed key;
/// re-pushing a tracked key refreshes its recency
pub struct LruReplacer {
    lru: LruCache<PageKey, ()>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self {
            lru: LruCache::unbounded(),
        }
    }
}

impl Default for LruReplacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Replacer for LruReplacer {
    fn push(&mut self, key: PageKey) {
        self.lru.put(key, ());
    }

    fn delete(&mut self, key: &PageKey) {
        self.lru.pop(key);
    }

    fn pick_victim(&mut self) -> Option<PageKey> {
        self.lru.pop_lru().map(|(key, ())| key)
    }
}

/// Clock (second-chance) policy: a ring of candidates with a reference
/// bit. `push` sets the bit; `pick_victim` sweeps the ring clearing bits
/// and re-queuing referenced entries, returning the first unreferenced one.
pub struct ClockReplacer {
    ring: VecDeque<PageKey>,
    in_ring: AHashSet<PageKey>,
    referenced: AHashSet<PageKey>,
}

impl ClockReplacer {
    pub fn new() -> Self {
        Self {
            ring: VecDeque::new(),
            in_ring: AHashSet::new(),
            referenced: AHashSet::new(),
        }
    }
}

impl Default for ClockReplacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Replacer for ClockReplacer {
    fn push(&mut self, key: PageKey) {
        if self.in_ring.insert(key.clone()) {
            self.ring.push_back(key.clone());
        }
        self.referenced.insert(key);
    }

    fn delete(&mut self, key: &PageKey) {
        if !self.in_ring.remove(key) {
            return;
        }
        self.referenced.remove(key);
        if let Some(pos) = self.ring.iter().position(|k| k == key) {
            self.ring.remove(pos);
        }
    }

    fn pick_victim(&mut self) -> Option<PageKey> {
        while let Some(key) = self.ring.pop_front() {
            if self.referenced.remove(&key) {
                self.ring.push_back(key);
                continue;
            }
            self.in_ring.remove(&key);
            return Some(key);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(page_id: u32) -> PageKey {
        PageKey::new("t.dat", page_id)
    }

    #[test]
    fn test_lru_victim_order() {
        let mut replacer = LruReplacer::new();
        replacer.push(key(0));
        replacer.push(key(1));
        replacer.push(key(2));

        assert_eq!(replacer.pick_victim(), Some(key(0)));
        assert_eq!(replacer.pick_victim(), Some(key(1)));
        assert_eq!(replacer.pick_victim(), Some(key(2)));
        assert_eq!(replacer.pick_victim(), None);
    }

    #[test]
    fn test_lru_push_refreshes_recency() {
        let mut replacer = LruReplacer::new();
        replacer.push(key(0));
        replacer.push(key(1));
        replacer.push(key(0));

        assert_eq!(replacer.pick_victim(), Some(key(1)));
        assert_eq!(replacer.pick_victim(), Some(key(0)));
    }

    #[test]
    fn test_lru_delete_removes_candidate() {
        let mut replacer = LruReplacer::new();
        replacer.push(key(0));
        replacer.push(key(1));
        replacer.delete(&key(0));

        assert_eq!(replacer.pick_victim(), Some(key(1)));
        assert_eq!(replacer.pick_victim(), None);
    }

    #[test]
    fn test_clock_second_chance() {
        let mut replacer = ClockReplacer::new();
        replacer.push(key(0));
        replacer.push(key(1));

        // Both have their reference bit set, so the sweep clears 0 and 1
        // first, then returns 0 on its second pass
        assert_eq!(replacer.pick_victim(), Some(key(0)));

        // 1 had its bit cleared by that sweep; 2 arrives referenced, so
        // the unreferenced 1 goes first even though 2 is newer
        replacer.push(key(2));
        assert_eq!(replacer.pick_victim(), Some(key(1)));
        assert_eq!(replacer.pick_victim(), Some(key(2)));
    }

    #[test]
    fn test_clock_delete_and_empty_ring() {
        let mut replacer = ClockReplacer::new();
        replacer.push(key(0));
        replacer.delete(&key(0));
        assert_eq!(replacer.pick_victim(), None);
    }
}
