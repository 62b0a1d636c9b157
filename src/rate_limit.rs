use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use crate::client::ClientKey;
use crate::config::RateLimitConfig;
use crate::metrics::{CLIENTS_BLOCKED, STORE_EVICTIONS, TRACKED_CLIENTS};
use crate::store::RateLimitStore;
use crate::sweeper::CleanupSweeper;

// Rate limit entry - tracks requests per client key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_reset_at: DateTime<Utc>,
    pub blocked: bool,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl RateLimitEntry {
    pub fn fresh(now: DateTime<Utc>, window: TimeDelta) -> Self {
        Self {
            count: 0,
            window_reset_at: now + window,
            blocked: false,
            blocked_until: None,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    // Blocked and the block hasn't run out yet
    pub fn is_actively_blocked(&self, now: DateTime<Utc>) -> bool {
        self.blocked && self.blocked_until.is_some_and(|until| now < until)
    }

    pub fn window_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.window_reset_at < now
    }

    /// An entry the next request should overwrite rather than count against.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.window_lapsed(now) || (self.blocked && !self.is_actively_blocked(now))
    }

    /// Safe to drop from the store: window over and no block in force.
    pub fn is_evictable(&self, now: DateTime<Utc>) -> bool {
        self.window_lapsed(now)
            && (!self.blocked || self.blocked_until.is_none_or(|until| until < now))
    }
}

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub blocked: bool,
}

impl Decision {
    fn deny_blocked(until: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_at: until,
            blocked: true,
        }
    }

    // Whole seconds until reset, rounded up, never negative
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000)
    }
}

/// Fixed-window limiter with a punitive block on the first overflow.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    sweeper: CleanupSweeper,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitConfig, now: DateTime<Utc>) -> Self {
        Self {
            store,
            sweeper: CleanupSweeper::new(config.cleanup_interval, now),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RateLimitStore> {
        &self.store
    }

    pub fn evaluate(&self, key: &ClientKey, now: DateTime<Utc>) -> Decision {
        if let Some(evicted) = self.sweeper.maybe_sweep(self.store.as_ref(), now) {
            STORE_EVICTIONS.inc_by(evicted as f64);
        }

        let max = self.config.max_requests;
        let mut decision = Decision::deny_blocked(now);

        self.store.update(key, &mut |slot: &mut Option<RateLimitEntry>| {
            if let Some(entry) = slot.as_ref().filter(|e| e.is_actively_blocked(now)) {
                decision = Decision::deny_blocked(entry.blocked_until.unwrap_or(now));
                return;
            }

            // lapsed window or served block: start over
            if slot.as_ref().is_some_and(|e| e.is_stale(now)) {
                *slot = None;
            }
            let entry = slot.get_or_insert_with(|| RateLimitEntry::fresh(now, self.config.window));

            entry.count = entry.count.saturating_add(1);

            if entry.count > max {
                let until = now + self.config.block_duration;
                entry.blocked = true;
                entry.blocked_until = Some(until);
                decision = Decision::deny_blocked(until);
                CLIENTS_BLOCKED.inc();
                tracing::warn!(
                    client = %key,
                    count = entry.count,
                    blocked_until = %until,
                    "Client blocked: exceeded rate limit"
                );
                return;
            }

            decision = Decision {
                allowed: true,
                remaining: max - entry.count,
                reset_at: entry.window_reset_at,
                blocked: false,
            };
        });

        TRACKED_CLIENTS.set(self.store.len() as f64);
        decision
    }
}
