//! Verdict cache with a freshness window.
//!
//! Holds the most recent [`Verdict`] and when it was computed. Queries
//! inside the window return the cached verdict without touching any probe;
//! queries outside it recompute and replace the entry.
//!
//! ## Locking
//!
//! - `slot` (`RwLock`): readers take a read guard just long enough to clone
//!   the verdict; writers hold the write guard only to swap the entry.
//! - `refresh` (`Mutex`): serialises recomputation, so a burst of callers
//!   hitting an expired entry runs the probes once. Late arrivals re-check
//!   freshness after acquiring it.
//!
//! Poisoned locks are recovered: a panic during one computation must not
//! disable detection for the rest of the process.
//!
//! ## Lifecycle
//!
//! Empty at construction, populated by the first query, replaced when
//! stale. [`VerdictCache::invalidate`] exists for reconfiguration and tests.

use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::types::Verdict;

/// A verdict with the instant it was stored.
#[derive(Debug, Clone)]
struct CacheEntry {
    verdict: Verdict,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

/// Single-slot, time-bounded verdict cache.
#[derive(Debug)]
pub struct VerdictCache {
    slot: RwLock<Option<CacheEntry>>,
    refresh: Mutex<()>,
    ttl: Duration,
}

impl VerdictCache {
    /// Create an empty cache. A zero `ttl` disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            refresh: Mutex::new(()),
            ttl,
        }
    }

    /// Freshness window.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached verdict if it is still fresh.
    pub fn get(&self) -> Option<Verdict> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.verdict.clone())
    }

    /// The most recent verdict regardless of age.
    pub fn latest(&self) -> Option<Verdict> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|entry| entry.verdict.clone())
    }

    /// Replace the cached verdict.
    pub fn put(&self, verdict: Verdict) {
        let entry = CacheEntry {
            verdict,
            stored_at: Instant::now(),
        };
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(entry);
    }

    /// Drop the cached verdict.
    pub fn invalidate(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("Cache: invalidated");
    }

    /// Return the fresh verdict, or run `compute` and cache its result.
    pub fn get_or_compute<F>(&self, compute: F) -> Verdict
    where
        F: FnOnce() -> Verdict,
    {
        if let Some(verdict) = self.get() {
            trace!("Cache: hit");
            return verdict;
        }

        let _refresh = self.refresh.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have refreshed while we waited
        if let Some(verdict) = self.get() {
            trace!("Cache: hit after wait");
            return verdict;
        }

        trace!(ttl_ms = self.ttl.as_millis() as u64, "Cache: miss");
        let verdict = compute();
        self.put(verdict.clone());
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbeResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn verdict(tampered: bool) -> Verdict {
        Verdict {
            is_tampered: tampered,
            fired: if tampered {
                vec![ProbeResult::tampered("filesystem", "/var/jb")]
            } else {
                Vec::new()
            },
            computed_at: 1_700_000_000,
            probes_run: 1,
            inconclusive: 0,
            confidence: 1.0,
        }
    }

    #[test]
    fn test_empty_cache() {
        let cache = VerdictCache::new(Duration::from_secs(5));
        assert!(cache.get().is_none());
        assert!(cache.latest().is_none());
    }

    #[test]
    fn test_put_get() {
        let cache = VerdictCache::new(Duration::from_secs(5));
        cache.put(verdict(true));
        assert!(cache.get().unwrap().is_tampered);
    }

    #[test]
    fn test_expiration() {
        let cache = VerdictCache::new(Duration::from_millis(1));
        cache.put(verdict(false));

        std::thread::sleep(Duration::from_millis(10));

        assert!(cache.get().is_none());
        assert!(cache.latest().is_some(), "stale verdict stays available for reports");
    }

    #[test]
    fn test_zero_ttl_always_recomputes() {
        let cache = VerdictCache::new(Duration::ZERO);
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            cache.get_or_compute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                verdict(false)
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_get_or_compute_within_window() {
        let cache = VerdictCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let first = cache.get_or_compute(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            verdict(true)
        });
        let second = cache.get_or_compute(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            verdict(false)
        });
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalidate() {
        let cache = VerdictCache::new(Duration::from_secs(60));
        cache.put(verdict(true));
        cache.invalidate();
        assert!(cache.get().is_none());
        assert!(cache.latest().is_none());
    }

    #[test]
    fn test_concurrent_callers_compute_once() {
        let cache = Arc::new(VerdictCache::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    cache.get_or_compute(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        verdict(false)
                    })
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
