use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::Order;

// ============================================================================
// LRU Order Cache
// ============================================================================
//
// Fixed-capacity key/value store in front of the durable store. Entries live
// in a slot arena; the recency list links slots by index (most recent at the
// head, eviction victim at the tail) and a key->slot map gives O(1) lookup.
// One mutex covers both structures, so every operation is a single critical
// section and the map and list never disagree.
//
// ============================================================================

struct Slot {
    key: String,
    order: Order,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Default)]
struct CacheInner {
    map: HashMap<String, usize>,
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

pub struct OrderCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl OrderCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner {
                map: HashMap::with_capacity(capacity),
                slots: Vec::with_capacity(capacity),
                ..CacheInner::default()
            }),
        }
    }

    /// Looks up an order and promotes it to most-recently-used on a hit.
    /// A miss is a normal outcome, never an error.
    pub fn get(&self, key: &str) -> Option<Order> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let idx = *inner.map.get(key)?;
        inner.detach(idx);
        inner.push_front(idx);
        Some(inner.slot(idx).order.clone())
    }

    /// Inserts or replaces the entry for `order.order_uid`. The key becomes
    /// most-recently-used either way; at capacity, the least-recently-used
    /// entry is evicted first in the same critical section.
    pub fn insert(&self, order: Order) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        if let Some(&idx) = inner.map.get(&order.order_uid) {
            inner.slot_mut(idx).order = order;
            inner.detach(idx);
            inner.push_front(idx);
            return;
        }
        if inner.map.len() >= self.capacity {
            inner.evict_tail();
        }
        let idx = inner.alloc(order);
        inner.push_front(idx);
    }

    /// Warm-start bulk load. The input is ordered most-recent-first and that
    /// relative order is preserved; loading stops at capacity and never
    /// evicts, so it is only meaningful on an empty cache.
    pub fn load_bulk(&self, orders: Vec<Order>) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        for order in orders {
            if inner.map.len() >= self.capacity {
                break;
            }
            if inner.map.contains_key(&order.order_uid) {
                continue;
            }
            let idx = inner.alloc(order);
            inner.push_back(idx);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn keys_mru_first(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut keys = Vec::with_capacity(inner.map.len());
        let mut cursor = inner.head;
        while let Some(idx) = cursor {
            let slot = inner.slot(idx);
            keys.push(slot.key.clone());
            cursor = slot.next;
        }
        keys
    }
}

impl CacheInner {
    fn slot(&self, idx: usize) -> &Slot {
        self.slots[idx].as_ref().expect("dangling slot index")
    }

    fn slot_mut(&mut self, idx: usize) -> &mut Slot {
        self.slots[idx].as_mut().expect("dangling slot index")
    }

    fn alloc(&mut self, order: Order) -> usize {
        let key = order.order_uid.clone();
        let slot = Slot {
            key: key.clone(),
            order,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(slot);
                idx
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.map.insert(key, idx);
        idx
    }

    /// Unlinks a slot from the recency list without touching the map.
    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let slot = self.slot(idx);
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slot_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slot_mut(n).prev = prev,
            None => self.tail = prev,
        }
        let slot = self.slot_mut(idx);
        slot.prev = None;
        slot.next = None;
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let slot = self.slot_mut(idx);
            slot.prev = None;
            slot.next = old_head;
        }
        if let Some(h) = old_head {
            self.slot_mut(h).prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn push_back(&mut self, idx: usize) {
        let old_tail = self.tail;
        {
            let slot = self.slot_mut(idx);
            slot.next = None;
            slot.prev = old_tail;
        }
        if let Some(t) = old_tail {
            self.slot_mut(t).next = Some(idx);
        }
        self.tail = Some(idx);
        if self.head.is_none() {
            self.head = Some(idx);
        }
    }

    fn evict_tail(&mut self) {
        let Some(idx) = self.tail else { return };
        self.detach(idx);
        let slot = self.slots[idx].take().expect("dangling tail index");
        self.map.remove(&slot.key);
        self.free.push(idx);
        tracing::debug!(key = %slot.key, "evicted least-recently-used order");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::valid_order;

    fn fill(cache: &OrderCache, keys: &[&str]) {
        for key in keys {
            cache.insert(valid_order(key));
        }
    }

    #[test]
    fn get_returns_inserted_order() {
        let cache = OrderCache::new(3);
        let order = valid_order("a");
        cache.insert(order.clone());

        assert_eq!(cache.get("a"), Some(order));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn eviction_removes_least_recently_used() {
        let cache = OrderCache::new(3);
        fill(&cache, &["a", "b", "c", "d"]);

        assert_eq!(cache.len(), 3);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.keys_mru_first(), vec!["d", "c", "b"]);
    }

    #[test]
    fn get_promotes_entry_and_changes_eviction_victim() {
        // Capacity 3: set a, b, c, get(a), set d -> b is the victim.
        let cache = OrderCache::new(3);
        fill(&cache, &["a", "b", "c"]);

        assert!(cache.get("a").is_some());
        cache.insert(valid_order("d"));

        let mut keys = cache.keys_mru_first();
        keys.sort();
        assert_eq!(keys, vec!["a", "c", "d"]);
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn get_never_changes_the_retained_set() {
        let cache = OrderCache::new(2);
        fill(&cache, &["a", "b"]);

        for _ in 0..10 {
            cache.get("a");
            cache.get("b");
            cache.get("nope");
        }
        let mut keys = cache.keys_mru_first();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn reinserting_existing_key_replaces_value_in_place() {
        let cache = OrderCache::new(2);
        fill(&cache, &["a", "b"]);

        let mut updated = valid_order("a");
        updated.track_number = "REPLACED".into();
        cache.insert(updated);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").unwrap().track_number, "REPLACED");
        assert_eq!(cache.keys_mru_first(), vec!["a", "b"]);
    }

    #[test]
    fn promoting_the_most_recent_entry_is_a_noop() {
        let cache = OrderCache::new(3);
        fill(&cache, &["a", "b"]);

        assert!(cache.get("b").is_some());
        assert_eq!(cache.keys_mru_first(), vec!["b", "a"]);
    }

    #[test]
    fn zero_capacity_cache_accepts_nothing() {
        let cache = OrderCache::new(0);
        cache.insert(valid_order("a"));
        cache.load_bulk(vec![valid_order("b")]);

        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn load_bulk_preserves_most_recent_first_order() {
        // Warm load with [z, y] (newest first) into capacity 2: z stays the
        // most recent, so a later insert evicts y.
        let cache = OrderCache::new(2);
        cache.load_bulk(vec![valid_order("z"), valid_order("y"), valid_order("x")]);

        assert_eq!(cache.keys_mru_first(), vec!["z", "y"]);
        cache.insert(valid_order("w"));
        assert!(cache.get("z").is_some());
        assert!(cache.get("y").is_none());
    }

    #[test]
    fn load_bulk_stops_at_capacity_without_evicting() {
        let cache = OrderCache::new(2);
        cache.insert(valid_order("existing"));
        cache.load_bulk(vec![valid_order("a"), valid_order("b"), valid_order("c")]);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("existing").is_some());
    }

    #[test]
    fn evicted_slots_are_reused() {
        let cache = OrderCache::new(2);
        for i in 0..100 {
            cache.insert(valid_order(&format!("key-{i}")));
        }
        assert_eq!(cache.len(), 2);
        let inner = cache.inner.lock().unwrap();
        assert!(inner.slots.len() <= 3);
    }

    #[test]
    fn retained_set_is_always_the_most_recently_touched_keys() {
        // Reference model: a plain vec ordered most-recent-first. Any mix of
        // gets and sets must leave the cache holding exactly the capacity
        // most-recently-touched keys.
        let capacity = 5;
        let cache = OrderCache::new(capacity);
        let mut model: Vec<String> = Vec::new();

        for step in 0..500usize {
            let key = format!("k{}", (step * 7 + step / 3) % 13);
            if step % 3 == 0 {
                if cache.get(&key).is_some() {
                    let pos = model.iter().position(|k| *k == key).unwrap();
                    let k = model.remove(pos);
                    model.insert(0, k);
                }
            } else {
                cache.insert(valid_order(&key));
                if let Some(pos) = model.iter().position(|k| *k == key) {
                    model.remove(pos);
                }
                model.insert(0, key);
                model.truncate(capacity);
            }
            assert_eq!(cache.keys_mru_first(), model);
        }
    }

    #[test]
    fn concurrent_readers_and_writers_keep_the_cache_consistent() {
        use std::sync::Arc;

        let cache = Arc::new(OrderCache::new(8));
        let mut handles = Vec::new();
        for t in 0..4 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..200 {
                    let key = format!("k{}", (t * 7 + i) % 16);
                    cache.insert(valid_order(&key));
                    cache.get(&key);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 8);
        let keys = cache.keys_mru_first();
        assert_eq!(keys.len(), cache.len());
    }
}
