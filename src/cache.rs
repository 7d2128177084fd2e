//! # Review cache
//! Single process-wide slot holding the last good payload.
//!
//! The slot is replaced wholesale on each successful refresh and never
//! partially mutated. A separate refresh gate serializes upstream fetches
//! so concurrent misses coalesce into one request. Each finished attempt,
//! successful or not, is recorded on the gate; requests that queued behind
//! it reuse that outcome instead of fetching again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::ingest::types::Review;

/// Advisory cache outcome, surfaced as a response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Stale,
    Error,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Stale => "STALE",
            CacheStatus::Error => "ERROR",
        }
    }
}

/// Last successful fetch.
#[derive(Debug, Clone)]
pub struct CachedPayload {
    pub reviews: Vec<Review>,
    /// Wall-clock time of the fetch (reported to callers).
    pub updated_at: DateTime<Utc>,
    /// Monotonic time of the fetch (used for TTL checks).
    pub fetched_at: Instant,
}

impl CachedPayload {
    pub fn new(reviews: Vec<Review>, updated_at: DateTime<Utc>, fetched_at: Instant) -> Self {
        Self {
            reviews,
            updated_at,
            fetched_at,
        }
    }

    /// Fresh while strictly younger than `ttl`.
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < ttl
    }
}

/// Result of the most recent upstream refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    Failed,
}

#[derive(Debug, Default)]
pub struct ReviewCache {
    slot: RwLock<Option<CachedPayload>>,
    refresh_gate: Mutex<Option<RefreshOutcome>>,
    attempts: AtomicU64,
}

/// Exclusive right to refresh; see [`ReviewCache::refresh_gate`].
pub struct RefreshGuard<'a> {
    last: MutexGuard<'a, Option<RefreshOutcome>>,
    attempts: &'a AtomicU64,
}

impl RefreshGuard<'_> {
    pub fn last_outcome(&self) -> Option<RefreshOutcome> {
        *self.last
    }

    /// Publish the outcome of a finished attempt to queued requests.
    pub fn record(&mut self, outcome: RefreshOutcome) {
        *self.last = Some(outcome);
        self.attempts.fetch_add(1, Ordering::AcqRel);
    }
}

impl ReviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Option<CachedPayload> {
        self.slot.read().await.clone()
    }

    /// Cached payload if still fresh at `now`.
    pub async fn fresh(&self, ttl: Duration, now: Instant) -> Option<CachedPayload> {
        self.slot
            .read()
            .await
            .as_ref()
            .filter(|p| p.is_fresh(ttl, now))
            .cloned()
    }

    pub async fn replace(&self, payload: CachedPayload) {
        *self.slot.write().await = Some(payload);
    }

    pub async fn clear(&self) {
        *self.slot.write().await = None;
    }

    /// Number of finished refresh attempts. Read it before queueing on the
    /// gate; a different value afterwards means another request refreshed.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Held for the duration of one upstream refresh.
    pub async fn refresh_gate(&self) -> RefreshGuard<'_> {
        RefreshGuard {
            last: self.refresh_gate.lock().await,
            attempts: &self.attempts,
        }
    }
}
