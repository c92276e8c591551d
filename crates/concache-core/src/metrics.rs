//! Accurate hit/miss accounting under concurrency.
//!
//! `Counters` pairs two independent `AtomicU64`s, each incremented at its
//! own call site with `Ordering::Relaxed`, never inside a lock held for
//! anything else. A point-in-time [`Metrics`] snapshot adds the store's
//! current `size` and derives a hit rate.

use std::sync::atomic::{AtomicU64, Ordering};

/// A point-in-time snapshot of cache effectiveness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    /// Number of `get` calls that found a live entry.
    pub hits: u64,
    /// Number of `get` calls that did not find a live entry.
    pub misses: u64,
    /// Current number of entries in the store.
    pub size: usize,
    /// `hits / (hits + misses)`, or `0.0` when both are zero.
    pub hit_rate: f64,
}

/// Monotonic hit/miss counters, reset only by `clear`.
#[derive(Default)]
pub struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    /// Creates a fresh zeroed counter pair.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a hit.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a miss. Every concurrent miss on the same key is counted
    /// independently: misses count request arrivals that did not find a
    /// live entry, not distinct upstream loads.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Resets both counters to zero.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Builds a [`Metrics`] snapshot, combining the counters with the
    /// store's current `size`.
    #[must_use]
    pub fn snapshot(&self, size: usize) -> Metrics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let rate = hits as f64 / total as f64;
            rate
        };
        Metrics {
            hits,
            misses,
            size,
            hit_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_is_zero_when_empty() {
        let counters = Counters::new();
        assert_eq!(counters.snapshot(0).hit_rate, 0.0);
    }

    #[test]
    fn hit_rate_reflects_ratio() {
        let counters = Counters::new();
        counters.record_hit();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        let snapshot = counters.snapshot(1);
        assert_eq!(snapshot.hits, 3);
        assert_eq!(snapshot.misses, 1);
        assert!((snapshot.hit_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn reset_zeroes_both_counters() {
        let counters = Counters::new();
        counters.record_hit();
        counters.record_miss();
        counters.reset();
        let snapshot = counters.snapshot(0);
        assert_eq!(snapshot.hits, 0);
        assert_eq!(snapshot.misses, 0);
    }
}
