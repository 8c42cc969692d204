//! Outcome routing: closes the loop between dispatch and selection.
//!
//! ```text
//! review() ──ok──────────────▶ tracker.record_result(true)
//!          ├─429─────────────▶ rate_limiter (short cooldown), probe released
//!          ├─402─────────────▶ rate_limiter (long cooldown), probe released
//!          └─timeout / other─▶ tracker.record_result(false) ─▶ circuit breaker
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::error::{ProviderError, StoreResult};
use crate::health::ReliabilityTracker;
use crate::providers::{ProviderHandle, ReviewResult};
use crate::resilience::{classify, FailureClass, RateLimiter};

/// Routes provider outcomes to the tracker or the rate limiter.
#[derive(Debug, Clone)]
pub struct FeedbackRouter {
    tracker: Arc<ReliabilityTracker>,
    rate_limiter: RateLimiter,
    config: RateLimitConfig,
}

impl FeedbackRouter {
    pub fn new(tracker: Arc<ReliabilityTracker>, rate_limiter: RateLimiter, config: RateLimitConfig) -> Self {
        Self {
            tracker,
            rate_limiter,
            config,
        }
    }

    pub async fn report_success(&self, id: &str, duration_ms: Option<u64>) -> StoreResult<()> {
        self.tracker.record_result(id, true, duration_ms, None).await
    }

    /// Account a failed call. Rate signals only start a cooldown; they are
    /// not health failures, but they do give back a held half-open probe.
    pub async fn report_failure(
        &self,
        id: &str,
        duration_ms: Option<u64>,
        error: &ProviderError,
    ) -> StoreResult<FailureClass> {
        let class = classify(error);
        match class {
            FailureClass::RateLimited => {
                self.rate_limiter
                    .mark_rate_limited(id, self.config.rate_limited_minutes, &error.to_string())
                    .await?;
                self.tracker.release_probe(id).await?;
            }
            FailureClass::PaymentRequired => {
                self.rate_limiter
                    .mark_rate_limited(id, self.config.payment_required_minutes, &error.to_string())
                    .await?;
                self.tracker.release_probe(id).await?;
            }
            FailureClass::Transient => {
                let message = match error {
                    ProviderError::Timeout(_) => "timeout".to_string(),
                    other => other.to_string(),
                };
                self.tracker
                    .record_result(id, false, duration_ms, Some(&message))
                    .await?;
            }
        }
        Ok(class)
    }

    pub async fn record_false_positive(&self, id: &str, finding: Option<&str>) -> StoreResult<()> {
        self.tracker.record_false_positive(id, finding).await
    }

    /// Run one review against `handle` under `timeout` and report the outcome.
    ///
    /// Store failures while reporting are logged; the review result is
    /// returned either way.
    pub async fn review(
        &self,
        handle: &ProviderHandle,
        prompt: &str,
        timeout: Duration,
    ) -> Result<ReviewResult, ProviderError> {
        let id = handle.id().as_str();
        let started = Instant::now();

        let outcome = match tokio::time::timeout(timeout, handle.provider().review(prompt, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout.as_millis() as u64)),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let reported = match &outcome {
            Ok(_) => self.report_success(id, Some(elapsed_ms)).await,
            Err(e) => {
                tracing::warn!(provider = %id, error = %e, elapsed_ms, "Review failed");
                self.report_failure(id, Some(elapsed_ms), e).await.map(|_| ())
            }
        };
        if let Err(e) = reported {
            tracing::error!(provider = %id, error = %e, "Failed to persist review outcome");
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{CircuitBreakerConfig, ReliabilityConfig};
    use crate::storage::MemoryStore;

    fn router() -> (FeedbackRouter, Arc<ReliabilityTracker>, RateLimiter) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let tracker = Arc::new(ReliabilityTracker::new(
            store.clone(),
            clock.clone(),
            ReliabilityConfig::default(),
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
        ));
        let limiter = RateLimiter::new(store, clock);
        let router = FeedbackRouter::new(tracker.clone(), limiter.clone(), RateLimitConfig::default());
        (router, tracker, limiter)
    }

    #[tokio::test]
    async fn test_rate_signal_does_not_trip_breaker() {
        let (router, tracker, limiter) = router();

        let class = router
            .report_failure("openrouter/a", None, &ProviderError::Failed("HTTP 429".into()))
            .await
            .unwrap();

        assert_eq!(class, FailureClass::RateLimited);
        assert!(limiter.is_rate_limited("openrouter/a").await.unwrap());
        assert!(!tracker.is_circuit_open("openrouter/a").await.unwrap());
    }

    #[tokio::test]
    async fn test_rate_signal_releases_held_probe() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let tracker = Arc::new(ReliabilityTracker::new(
            store.clone(),
            clock.clone(),
            ReliabilityConfig::default(),
            CircuitBreakerConfig {
                failure_threshold: 1,
                open_duration_ms: 1_000,
                ..Default::default()
            },
        ));
        let limiter = RateLimiter::new(store, clock.clone());
        let router = FeedbackRouter::new(tracker.clone(), limiter.clone(), RateLimitConfig::default());
        let id = "openrouter/p";

        tracker.record_result(id, false, None, Some("exit 1")).await.unwrap();
        clock.advance_ms(2_000);
        assert!(!tracker.is_circuit_open(id).await.unwrap());

        router
            .report_failure(id, None, &ProviderError::PaymentRequired("402".into()))
            .await
            .unwrap();
        assert!(!tracker.breaker().state(id).await.unwrap().probe_in_flight);

        clock.advance_ms(24 * 60 * 60_000);
        assert!(!limiter.is_rate_limited(id).await.unwrap());
        assert!(!tracker.is_circuit_open(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_transient_failure_trips_breaker() {
        let (router, tracker, limiter) = router();

        let class = router
            .report_failure("opencode/b", Some(40), &ProviderError::Timeout(40))
            .await
            .unwrap();

        assert_eq!(class, FailureClass::Transient);
        assert!(!limiter.is_rate_limited("opencode/b").await.unwrap());
        assert!(tracker.is_circuit_open("opencode/b").await.unwrap());
    }
}
