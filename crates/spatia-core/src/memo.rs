#![forbid(unsafe_code)]

//! Dependency-tracked memoization.
//!
//! Two primitives cover the caching needs of the layout engine:
//!
//! - [`Memo<T>`]: a lazily computed value readable through `&self`. It is
//!   filled on first read and cleared with [`Memo::invalidate`]. Used for the
//!   derived quantities of a node state (matrices, projected bounds), where
//!   the inputs live next to the memo and are only mutated through `&mut`.
//! - [`MemoizationCache`] + [`Cached<T>`]: a generation counter shared by any
//!   number of stamped values. [`MemoizationCache::invalidate_all`] bumps the
//!   generation, which marks every stamped value dirty in O(1). A value
//!   recomputes at most once per generation.
//!
//! # Invariants
//!
//! 1. The generation starts at 1 and only grows; a `Cached` stamped with 0
//!    is never fresh.
//! 2. Between two invalidations, [`Cached::get_or_compute`] runs its closure
//!    at most once.
//! 3. Hit/miss counters are advisory and never affect results.

use std::cell::{Cell, OnceCell};
use std::fmt;

// ============================================================================
// Memo
// ============================================================================

/// A lazily computed value.
#[derive(Clone)]
pub struct Memo<T> {
    cell: OnceCell<T>,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Memo<T> {
    /// Create an empty memo.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Return the cached value, computing it with `f` if needed.
    pub fn get_or_init(&self, f: impl FnOnce() -> T) -> &T {
        self.cell.get_or_init(f)
    }

    /// Cached value, if computed.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Drop the cached value.
    pub fn invalidate(&mut self) {
        self.cell.take();
    }

    /// Whether the value has been computed since the last invalidation.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(v) => f.debug_tuple("Memo").field(v).finish(),
            None => f.write_str("Memo(<dirty>)"),
        }
    }
}

// ============================================================================
// MemoizationCache
// ============================================================================

/// Statistics about memoization effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoStats {
    /// Current generation.
    pub generation: u64,
    /// Reads served from a fresh value.
    pub hits: u64,
    /// Reads that required recomputation.
    pub misses: u64,
}

impl MemoStats {
    /// Hit rate as a fraction (0.0 – 1.0).
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Generation source for a set of [`Cached`] values.
#[derive(Debug)]
pub struct MemoizationCache {
    generation: u64,
    hits: Cell<u64>,
    misses: Cell<u64>,
}

impl Default for MemoizationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoizationCache {
    /// Create a cache at generation 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            generation: 1,
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    /// Current generation.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mark every value stamped by this cache as dirty.
    pub fn invalidate_all(&mut self) {
        self.generation = self.generation.wrapping_add(1).max(1);
    }

    /// Snapshot of hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> MemoStats {
        MemoStats {
            generation: self.generation,
            hits: self.hits.get(),
            misses: self.misses.get(),
        }
    }

    /// Reset hit/miss counters.
    pub fn reset_stats(&self) {
        self.hits.set(0);
        self.misses.set(0);
    }

    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.set(counter.get().saturating_add(1));
    }
}

// ============================================================================
// Cached
// ============================================================================

/// A value stamped with the [`MemoizationCache`] generation it was computed in.
#[derive(Debug, Clone)]
pub struct Cached<T> {
    value: Option<T>,
    stamp: u64,
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Cached<T> {
    /// Create a dirty, empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: None,
            stamp: 0,
        }
    }

    /// Whether the value was computed in the cache's current generation.
    #[inline]
    #[must_use]
    pub fn is_fresh(&self, cache: &MemoizationCache) -> bool {
        self.value.is_some() && self.stamp == cache.generation
    }

    /// Fresh value, or `None` if dirty.
    #[must_use]
    pub fn get(&self, cache: &MemoizationCache) -> Option<&T> {
        if self.is_fresh(cache) {
            self.value.as_ref()
        } else {
            None
        }
    }

    /// Last computed value regardless of freshness.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Return the fresh value or recompute it with `f`.
    pub fn get_or_compute(&mut self, cache: &MemoizationCache, f: impl FnOnce() -> T) -> &T {
        let fresh = self.is_fresh(cache);
        cache.record(fresh);
        if !fresh {
            self.value = None;
            self.stamp = cache.generation;
        }
        self.value.get_or_insert_with(f)
    }

    /// Store a value computed elsewhere and stamp it fresh.
    pub fn set(&mut self, cache: &MemoizationCache, value: T) -> &mut T {
        self.stamp = cache.generation;
        self.value.insert(value)
    }

    /// Mark this value dirty without touching the cache.
    pub fn invalidate(&mut self) {
        self.stamp = 0;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memo_computes_once() {
        let memo = Memo::new();
        let mut calls = 0;
        let a = *memo.get_or_init(|| {
            calls += 1;
            7
        });
        let b = *memo.get_or_init(|| 99);
        assert_eq!((a, b), (7, 7));
        assert_eq!(calls, 1);
    }

    #[test]
    fn memo_invalidate_recomputes() {
        let mut memo = Memo::new();
        memo.get_or_init(|| 1);
        memo.invalidate();
        assert!(!memo.is_computed());
        assert_eq!(*memo.get_or_init(|| 2), 2);
    }

    #[test]
    fn cached_recomputes_once_per_generation() {
        let mut cache = MemoizationCache::new();
        let mut slot = Cached::new();
        let mut calls = 0;
        for _ in 0..3 {
            slot.get_or_compute(&cache, || {
                calls += 1;
                calls
            });
        }
        assert_eq!(calls, 1);
        cache.invalidate_all();
        assert!(!slot.is_fresh(&cache));
        assert_eq!(*slot.get_or_compute(&cache, || 42), 42);
        let stats = cache.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 2);
    }

    #[test]
    fn new_slot_is_never_fresh() {
        let cache = MemoizationCache::new();
        let slot: Cached<u8> = Cached::new();
        assert!(slot.get(&cache).is_none());
    }

    #[test]
    fn slot_invalidate_is_local() {
        let cache = MemoizationCache::new();
        let mut a = Cached::new();
        let mut b = Cached::new();
        a.set(&cache, 1);
        b.set(&cache, 2);
        a.invalidate();
        assert!(!a.is_fresh(&cache));
        assert!(b.is_fresh(&cache));
        assert_eq!(a.peek(), Some(&1));
    }
}
