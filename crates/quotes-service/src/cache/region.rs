//! Named cache regions with generation-guarded read-through fills.
//!
//! A region is a bounded [`moka`] cache plus a generation counter. Every
//! mutation (`put`, `invalidate`, `invalidate_all`) advances the generation.
//! Read-through callers take a [`FillTicket`] before going to the store and
//! hand it back with the value they read; if any mutation happened in between
//! the fill is dropped and the key removed. A lost fill costs one extra miss;
//! it never leaves a value that a completed write has already superseded.
//!
//! ```text
//! reader: begin_fill ──► store read ──────────────► fill(ticket)   (dropped)
//! writer:          begin_fill ──► store write ──► put / invalidate (gen + 1)
//! ```
//!
//! Each region holds at most `max_capacity` entries; past that moka evicts
//! by its TinyLFU policy.

use crate::observability::metrics;
use moka::sync::Cache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default bound on the number of entries per region.
pub const DEFAULT_REGION_CAPACITY: u64 = 10_000;

/// Region generation captured before a store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTicket(u64);

/// Point-in-time statistics for one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionStats {
    pub name: &'static str,
    pub entries: u64,
    pub max_entries: u64,
    pub hits: u64,
    pub misses: u64,
}

impl RegionStats {
    /// Hit rate in percent, `0.0` before the first lookup.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 * 100.0 / total as f64
    }

    /// Miss rate in percent, `0.0` before the first lookup.
    #[allow(clippy::cast_precision_loss)]
    pub fn miss_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.misses as f64 * 100.0 / total as f64
    }
}

/// A named, bounded, thread-safe cache region.
pub struct CacheRegion<K, V> {
    name: &'static str,
    max_capacity: u64,
    entries: Cache<K, V>,
    /// Held across the generation check and the cache write it guards.
    generation: Mutex<u64>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> CacheRegion<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, max_capacity: u64) -> Self {
        Self {
            name,
            max_capacity,
            entries: Cache::builder().name(name).max_capacity(max_capacity).build(),
            generation: Mutex::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Look up `key`, counting a hit or a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let value = self.entries.get(key);
        let hit = value.is_some();
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        metrics::record_cache_lookup(self.name, hit);
        value
    }

    /// Capture the current generation. Call before the store read or write
    /// whose result will be stored with [`fill`](Self::fill) or
    /// [`put`](Self::put).
    pub fn begin_fill(&self) -> FillTicket {
        FillTicket(*self.generation.lock())
    }

    /// Store a value read from the store.
    ///
    /// Inserts only when no mutation happened since `ticket` was taken;
    /// otherwise removes `key`. Returns whether the value was stored.
    pub fn fill(&self, key: K, value: V, ticket: FillTicket) -> bool {
        let generation = self.generation.lock();
        self.store_if_current(*generation, key, value, ticket)
    }

    /// Store the result of a write.
    ///
    /// Like [`fill`](Self::fill) but counts as a mutation, so read-through
    /// fills that started before the write are rejected afterwards.
    pub fn put(&self, key: K, value: V, ticket: FillTicket) -> bool {
        let mut generation = self.generation.lock();
        let stored = self.store_if_current(*generation, key, value, ticket);
        *generation = generation.wrapping_add(1);
        stored
    }

    pub fn invalidate(&self, key: &K) {
        let mut generation = self.generation.lock();
        self.entries.invalidate(key);
        *generation = generation.wrapping_add(1);
    }

    pub fn invalidate_all(&self) {
        let mut generation = self.generation.lock();
        self.entries.invalidate_all();
        *generation = generation.wrapping_add(1);
    }

    /// Returns true when `key` is cached, without counting a lookup.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn stats(&self) -> RegionStats {
        // Apply pending evictions so the entry count is current.
        self.entries.run_pending_tasks();
        RegionStats {
            name: self.name,
            entries: self.entries.entry_count(),
            max_entries: self.max_capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn store_if_current(&self, generation: u64, key: K, value: V, ticket: FillTicket) -> bool {
        if generation == ticket.0 {
            self.entries.insert(key, value);
            true
        } else {
            self.entries.invalidate(&key);
            false
        }
    }
}
