// src/service.rs
//! Fetch & cache controller: TTL policy plus the degradation ladder
//! (fresh cache -> upstream refresh -> stale cache -> cold-start body).
//! Never fails towards the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{CacheStatus, CachedPayload, RefreshOutcome, ReviewCache};
use crate::config::{ReviewsConfig, SourceMode};
use crate::ingest::providers::{build_source, fallback};
use crate::ingest::types::{IngestError, Review, TableSource};
use crate::ingest::{ensure_metrics_described, fetch_reviews};

/// Response body: `{ reviews, updatedAt?, error? }`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReviewsPayload {
    pub reviews: Vec<Review>,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Client-facing note for a cold-start failure; details go to the log only.
pub const UNAVAILABLE_MESSAGE: &str = "Reviews are temporarily unavailable. Please try again later.";

impl ReviewsPayload {
    fn from_cached(p: &CachedPayload) -> Self {
        Self {
            reviews: p.reviews.clone(),
            updated_at: Some(p.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReviewsResponse {
    pub status: CacheStatus,
    pub payload: ReviewsPayload,
}

pub struct ReviewService {
    source: Arc<dyn TableSource>,
    cache: ReviewCache,
    ttl: Duration,
    /// Served on a cold-start failure instead of an empty list.
    cold_fallback: Option<Vec<Review>>,
}

impl ReviewService {
    pub fn new(source: Arc<dyn TableSource>, ttl: Duration) -> Self {
        ensure_metrics_described();
        gauge!("reviews_cache_ttl_ms").set(ttl.as_millis() as f64);
        Self {
            source,
            cache: ReviewCache::new(),
            ttl,
            cold_fallback: None,
        }
    }

    pub fn with_cold_fallback(mut self, reviews: Vec<Review>) -> Self {
        self.cold_fallback = Some(reviews);
        self
    }

    /// The values API variant falls back to the built-in reviews when it has nothing cached.
    pub fn from_config(cfg: &ReviewsConfig) -> Result<Self, IngestError> {
        let svc = Self::new(build_source(cfg)?, cfg.cache_ttl());
        Ok(match cfg.source {
            SourceMode::Api => svc.with_cold_fallback(fallback::builtin_reviews()),
            SourceMode::Export => svc,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn cache(&self) -> &ReviewCache {
        &self.cache
    }

    pub async fn get(&self, force_refresh: bool) -> ReviewsResponse {
        self.get_at(force_refresh, Instant::now()).await
    }

    /// Serve reviews as of `now`.
    pub async fn get_at(&self, force_refresh: bool, now: Instant) -> ReviewsResponse {
        // Read before the freshness check so a refresh finishing in between is noticed.
        let seen = self.cache.attempts();

        if !force_refresh {
            if let Some(hit) = self.cache.fresh(self.ttl, now).await {
                counter!("reviews_cache_hits_total").increment(1);
                return respond(CacheStatus::Hit, ReviewsPayload::from_cached(&hit));
            }
        }

        let mut gate = self.cache.refresh_gate().await;

        // Another request finished an attempt while we waited; share its outcome.
        if !force_refresh && self.cache.attempts() != seen {
            debug!(target: "reviews", "refresh coalesced with in-flight request");
            return match (gate.last_outcome(), self.cache.snapshot().await) {
                (Some(RefreshOutcome::Refreshed), Some(p)) => {
                    counter!("reviews_cache_hits_total").increment(1);
                    respond(CacheStatus::Hit, ReviewsPayload::from_cached(&p))
                }
                (_, Some(stale)) => {
                    counter!("reviews_cache_stale_total").increment(1);
                    respond(CacheStatus::Stale, ReviewsPayload::from_cached(&stale))
                }
                (_, None) => {
                    counter!("reviews_cache_errors_total").increment(1);
                    respond(CacheStatus::Error, self.unavailable())
                }
            };
        }

        match fetch_reviews(self.source.as_ref()).await {
            Ok(reviews) => {
                let payload = CachedPayload::new(reviews, Utc::now(), now);
                let body = ReviewsPayload::from_cached(&payload);
                gauge!("reviews_last_refresh_ts").set(payload.updated_at.timestamp() as f64);
                self.cache.replace(payload).await;
                gate.record(RefreshOutcome::Refreshed);
                counter!("reviews_cache_misses_total").increment(1);
                respond(CacheStatus::Miss, body)
            }
            Err(e) => {
                gate.record(RefreshOutcome::Failed);
                match self.cache.snapshot().await {
                    Some(stale) => {
                        warn!(
                            target: "reviews",
                            error = %e,
                            source = self.source.name(),
                            age_ms = now.saturating_duration_since(stale.fetched_at).as_millis() as u64,
                            "refresh failed, serving stale reviews"
                        );
                        counter!("reviews_cache_stale_total").increment(1);
                        respond(CacheStatus::Stale, ReviewsPayload::from_cached(&stale))
                    }
                    None => {
                        warn!(
                            target: "reviews",
                            error = %e,
                            source = self.source.name(),
                            fallback = self.cold_fallback.is_some(),
                            "refresh failed with no cached reviews"
                        );
                        counter!("reviews_cache_errors_total").increment(1);
                        respond(CacheStatus::Error, self.unavailable())
                    }
                }
            }
        }
    }

    /// Cold-start body: the built-in list when configured, else an empty list with a note.
    fn unavailable(&self) -> ReviewsPayload {
        match &self.cold_fallback {
            Some(reviews) => ReviewsPayload {
                reviews: reviews.clone(),
                updated_at: None,
                error: None,
            },
            None => ReviewsPayload {
                reviews: Vec::new(),
                updated_at: None,
                error: Some(UNAVAILABLE_MESSAGE.to_string()),
            },
        }
    }
}

fn respond(status: CacheStatus, payload: ReviewsPayload) -> ReviewsResponse {
    ReviewsResponse { status, payload }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{CellValue, RawTable};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Table source with a kill switch and a call counter.
    struct Flaky {
        calls: AtomicUsize,
        failing: AtomicBool,
        label: String,
        delay: Duration,
    }

    impl Flaky {
        fn new(label: &str) -> Arc<Self> {
            Self::slow(label, Duration::ZERO)
        }

        fn slow(label: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                label: label.to_string(),
                delay,
            })
        }
    }

    #[async_trait]
    impl TableSource for Flaky {
        async fn fetch_table(&self) -> Result<RawTable, IngestError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(IngestError::Status {
                    status: 502,
                    url: "https://upstream.test/sheet".into(),
                });
            }
            Ok(RawTable {
                columns: vec!["Name".into(), "Review".into()],
                rows: vec![vec![
                    CellValue::from("Jane"),
                    CellValue::Text(format!("{} #{n}", self.label)),
                ]],
            })
        }
        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    const TTL: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn hit_within_ttl_is_identical_and_skips_upstream() {
        let src = Flaky::new("cake");
        let svc = ReviewService::new(src.clone(), TTL);
        let t0 = Instant::now();

        let first = svc.get_at(false, t0).await;
        assert_eq!(first.status, CacheStatus::Miss);
        let a = svc.get_at(false, t0).await;
        let b = svc.get_at(false, t0).await;
        assert_eq!(a.status, CacheStatus::Hit);
        assert_eq!(
            serde_json::to_vec(&a.payload).unwrap(),
            serde_json::to_vec(&b.payload).unwrap()
        );
        assert_eq!(a.payload, first.payload);
        assert_eq!(src.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ttl_boundary() {
        let src = Flaky::new("cake");
        let svc = ReviewService::new(src.clone(), TTL);
        let t0 = Instant::now();
        svc.get_at(false, t0).await;

        let just_before = svc.get_at(false, t0 + TTL - Duration::from_millis(1)).await;
        assert_eq!(just_before.status, CacheStatus::Hit);
        assert_eq!(src.calls.load(Ordering::SeqCst), 1);

        let just_after = svc.get_at(false, t0 + TTL + Duration::from_millis(1)).await;
        assert_eq!(just_after.status, CacheStatus::Miss);
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_fresh_cache() {
        let src = Flaky::new("cake");
        let svc = ReviewService::new(src.clone(), TTL);
        let t0 = Instant::now();
        svc.get_at(false, t0).await;
        let forced = svc.get_at(true, t0).await;
        assert_eq!(forced.status, CacheStatus::Miss);
        assert_eq!(forced.payload.reviews[0].review_text, "cake #1");
    }

    #[tokio::test]
    async fn failed_refresh_serves_stale_payload() {
        let src = Flaky::new("cake");
        let svc = ReviewService::new(src.clone(), TTL);
        let t0 = Instant::now();
        let original = svc.get_at(false, t0).await.payload;

        src.failing.store(true, Ordering::SeqCst);
        let later = svc.get_at(false, t0 + TTL * 3).await;
        assert_eq!(later.status, CacheStatus::Stale);
        assert_eq!(later.payload, original);
        assert!(later.payload.error.is_none());
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cold_start_failure_is_empty_with_error() {
        let src = Flaky::new("cake");
        src.failing.store(true, Ordering::SeqCst);
        let svc = ReviewService::new(src, TTL);
        let resp = svc.get_at(false, Instant::now()).await;
        assert_eq!(resp.status, CacheStatus::Error);
        assert!(resp.payload.reviews.is_empty());
        assert!(resp.payload.updated_at.is_none());
        assert_eq!(resp.payload.error.as_deref(), Some(UNAVAILABLE_MESSAGE));
        assert!(!serde_json::to_string(&resp.payload).unwrap().contains("upstream.test"));
    }

    #[tokio::test]
    async fn cold_start_failure_serves_configured_fallback() {
        let src = Flaky::new("cake");
        src.failing.store(true, Ordering::SeqCst);
        let builtin = fallback::builtin_reviews();
        let svc = ReviewService::new(src, TTL).with_cold_fallback(builtin.clone());
        let resp = svc.get_at(false, Instant::now()).await;
        assert_eq!(resp.status, CacheStatus::Error);
        assert_eq!(resp.payload.reviews, builtin);
        assert!(resp.payload.error.is_none());
    }

    #[test]
    fn api_mode_gets_builtin_cold_fallback_and_export_does_not() {
        let api = ReviewsConfig {
            source: SourceMode::Api,
            api_key: Some("k".into()),
            ..ReviewsConfig::default()
        };
        assert!(ReviewService::from_config(&api).unwrap().cold_fallback.is_some());
        let export = ReviewsConfig::default();
        assert!(ReviewService::from_config(&export).unwrap().cold_fallback.is_none());
    }

    #[tokio::test]
    async fn queued_requests_share_a_failed_refresh() {
        let src = Flaky::slow("cake", Duration::from_millis(200));
        let svc = Arc::new(ReviewService::new(src.clone(), Duration::ZERO));
        let original = svc.get(false).await.payload;
        src.failing.store(true, Ordering::SeqCst);

        let started = Instant::now();
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.get(false).await })
            })
            .collect();
        for h in handles {
            let resp = h.await.unwrap();
            assert_eq!(resp.status, CacheStatus::Stale);
            assert_eq!(resp.payload, original);
        }
        // one refresh for the warm-up, one shared by every waiter
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() < Duration::from_millis(600), "{:?}", started.elapsed());
    }

    #[tokio::test]
    async fn concurrent_misses_coalesce_into_one_fetch() {
        let src = Flaky::new("cake");
        let svc = Arc::new(ReviewService::new(src.clone(), TTL));
        let now = Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.get_at(false, now).await.status })
            })
            .collect();
        let mut misses = 0;
        for h in handles {
            if h.await.unwrap() == CacheStatus::Miss {
                misses += 1;
            }
        }
        assert_eq!(misses, 1);
        assert_eq!(src.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn payload_serializes_with_camel_case_and_omits_absent_fields() {
        let p = ReviewsPayload {
            reviews: vec![Review {
                name: "Jane".into(),
                review_text: "Great cake!".into(),
                rating: None,
            }],
            updated_at: None,
            error: None,
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(
            v,
            serde_json::json!({ "reviews": [{ "name": "Jane", "reviewText": "Great cake!" }] })
        );
    }
}
