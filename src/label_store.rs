use crate::email::{truncate_bytes, OWNER_MAX_BYTES};
use crate::host::ObjectId;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

pub const DEFAULT_CAPACITY: usize = 65_536;

const EMPTY_KEY: usize = 0;

/// One entry of the open-addressed table.
///
/// `key` is claimed with a compare-and-swap and never released, so probe
/// chains stay intact after `clear`. `owner` is last-writer-wins.
#[derive(Debug, Default)]
pub struct Slot {
    key: AtomicUsize,
    tag: AtomicBool,
    owner: Mutex<String>,
}

impl Slot {
    pub fn is_tagged(&self) -> bool {
        self.tag.load(Ordering::Acquire)
    }

    /// The owner when the slot is tagged with a non-empty owner.
    pub fn owner(&self) -> Option<String> {
        if !self.is_tagged() {
            return None;
        }
        let owner = self.owner.lock().ok()?;
        if owner.is_empty() {
            None
        } else {
            Some(owner.clone())
        }
    }

    pub(crate) fn set(&self, owner: &str) {
        if let Ok(mut slot_owner) = self.owner.lock() {
            slot_owner.clear();
            slot_owner.push_str(truncate_bytes(owner, OWNER_MAX_BYTES));
        }
        self.tag.store(true, Ordering::Release);
    }

    fn reset(&self) {
        self.tag.store(false, Ordering::Release);
        if let Ok(mut owner) = self.owner.lock() {
            owner.clear();
        }
    }
}

/// Fixed-capacity label table keyed by object address.
///
/// Lossy under saturation: when every slot is claimed by another key, lookups
/// return `None` and the caller drops the label.
#[derive(Debug)]
pub struct LabelStore {
    slots: Box<[Slot]>,
    mask: usize,
    saturation_misses: AtomicU64,
}

/// 64-bit finalizer-style mix of an address.
pub fn hash_addr(addr: usize) -> u64 {
    let mut x = addr as u64;
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x
}

impl Default for LabelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Capacity is rounded up to a power of two (at least 2).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let slots: Vec<Slot> = (0..capacity).map(|_| Slot::default()).collect();
        Self {
            slots: slots.into_boxed_slice(),
            mask: capacity - 1,
            saturation_misses: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Lookups that found neither the key nor a free slot.
    pub fn saturation_misses(&self) -> u64 {
        self.saturation_misses.load(Ordering::Relaxed)
    }

    pub fn lookup(&self, id: ObjectId, create: bool) -> Option<&Slot> {
        let key = id.addr();
        let start = (hash_addr(key) as usize) & self.mask;

        for i in 0..self.slots.len() {
            let slot = &self.slots[(start + i) & self.mask];
            let current = slot.key.load(Ordering::Acquire);
            if current == key {
                return Some(slot);
            }
            if current != EMPTY_KEY {
                continue;
            }
            if !create {
                return None;
            }
            match slot
                .key
                .compare_exchange(EMPTY_KEY, key, Ordering::AcqRel, Ordering::Acquire)
            {
                // Unclaimed slots have never been written, so they are clean.
                Ok(_) => return Some(slot),
                // Another thread placed the same key first.
                Err(winner) if winner == key => return Some(slot),
                Err(_) => continue,
            }
        }

        self.saturation_misses.fetch_add(1, Ordering::Relaxed);
        log::debug!("label store saturated, dropping lookup for {:#x}", key);
        None
    }

    /// Reset the label for `id`, keeping its key so the probe chain survives.
    pub fn clear(&self, id: ObjectId) {
        if let Some(slot) = self.lookup(id, false) {
            slot.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn id(addr: usize) -> ObjectId {
        ObjectId::from_addr(addr).unwrap()
    }

    #[test]
    fn test_hash_matches_reference_mix() {
        assert_eq!(hash_addr(0), 0);
        // Small addresses skip the first fold.
        let x = 0x1000u64.wrapping_mul(0xff51afd7ed558ccd);
        assert_eq!(hash_addr(0x1000), x ^ (x >> 33));
    }

    #[test]
    fn test_lookup_without_create_misses() {
        let store = LabelStore::with_capacity(16);
        assert!(store.lookup(id(0x10), false).is_none());
        assert_eq!(store.saturation_misses(), 0);
    }

    #[test]
    fn test_create_then_find() {
        let store = LabelStore::with_capacity(16);
        let slot = store.lookup(id(0x10), true).unwrap();
        assert!(!slot.is_tagged());
        slot.set("alice@example.com");

        let again = store.lookup(id(0x10), false).unwrap();
        assert!(again.is_tagged());
        assert_eq!(again.owner().as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_capacity_rounds_to_power_of_two() {
        assert_eq!(LabelStore::with_capacity(10).capacity(), 16);
        assert_eq!(LabelStore::with_capacity(0).capacity(), 2);
        assert_eq!(LabelStore::new().capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_saturation_is_silent() {
        let store = LabelStore::with_capacity(4);
        for addr in 1..=4 {
            store.lookup(id(addr * 8), true).unwrap().set("a@b.co");
        }
        assert!(store.lookup(id(0x999), true).is_none());
        assert!(store.lookup(id(0x999), false).is_none());
        assert_eq!(store.saturation_misses(), 2);

        // Existing keys are still reachable in a full table.
        assert!(store.lookup(id(16), false).unwrap().is_tagged());
    }

    #[test]
    fn test_clear_keeps_probe_chain() {
        let store = LabelStore::with_capacity(4);
        let addrs: Vec<usize> = (1..=4).map(|a| a * 8).collect();
        for &addr in &addrs {
            store.lookup(id(addr), true).unwrap().set("a@b.co");
        }

        for &addr in &addrs {
            store.clear(id(addr));
        }
        // Every key is still in place, so every lookup still resolves.
        for &addr in &addrs {
            let slot = store.lookup(id(addr), false).unwrap();
            assert!(!slot.is_tagged());
            assert!(slot.owner().is_none());
        }

        // Address reuse reads as clean and can be tagged again.
        let reused = store.lookup(id(addrs[3]), true).unwrap();
        assert!(!reused.is_tagged());
        reused.set("b@c.co");
        assert_eq!(
            store.lookup(id(addrs[3]), false).unwrap().owner().as_deref(),
            Some("b@c.co")
        );
    }

    #[test]
    fn test_owner_is_truncated() {
        let store = LabelStore::with_capacity(8);
        let long = format!("{}@example.com", "x".repeat(200));
        let slot = store.lookup(id(0x40), true).unwrap();
        slot.set(&long);
        assert_eq!(slot.owner().unwrap().len(), OWNER_MAX_BYTES);
    }

    #[test]
    fn test_concurrent_inserts_claim_distinct_slots() {
        let store = Arc::new(LabelStore::with_capacity(1024));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..100 {
                        let addr = (t * 1000 + i + 1) * 16;
                        store.lookup(id(addr), true).unwrap().set("a@b.co");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for t in 0..4 {
            for i in 0..100 {
                let addr = (t * 1000 + i + 1) * 16;
                assert!(store.lookup(id(addr), false).unwrap().is_tagged());
            }
        }
        assert_eq!(store.saturation_misses(), 0);
    }
}
