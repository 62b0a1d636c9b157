use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use crate::rate_limit::RateLimitEntry;
use crate::store::RateLimitStore;

// Evicts stale entries, piggybacking on request traffic instead of a timer
pub struct CleanupSweeper {
    interval: TimeDelta,
    last_sweep_ms: AtomicI64,
}

impl CleanupSweeper {
    pub fn new(interval: TimeDelta, now: DateTime<Utc>) -> Self {
        Self {
            interval,
            last_sweep_ms: AtomicI64::new(now.timestamp_millis()),
        }
    }

    pub fn last_sweep_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_sweep_ms.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Sweeps if more than `interval` has passed since the last sweep and
    /// returns how many entries went. `None` means this call didn't sweep.
    pub fn maybe_sweep(&self, store: &dyn RateLimitStore, now: DateTime<Utc>) -> Option<usize> {
        let now_ms = now.timestamp_millis();
        let last = self.last_sweep_ms.load(Ordering::Acquire);
        if now_ms - last <= self.interval.num_milliseconds() {
            return None;
        }

        // only the caller that moves the marker does the work
        self.last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        let evicted = store
            .keys()
            .iter()
            .filter(|key| store.delete_if(key, &|entry: &RateLimitEntry| entry.is_evictable(now)))
            .count();

        tracing::debug!(evicted, remaining = store.len(), "Rate limit store swept");
        Some(evicted)
    }
}
