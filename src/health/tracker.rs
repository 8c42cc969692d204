//! Provider reliability tracking.
//!
//! # Responsibilities
//! - Append every reported outcome to the persisted log
//! - Forward success/failure to the owned circuit breaker
//! - Periodically fold the log into per-provider stats
//! - Answer score, ranking and recommendation queries

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::config::{CircuitBreakerConfig, ReliabilityConfig};
use crate::error::StoreResult;
use crate::health::score::{self, NEUTRAL_SCORE};
use crate::health::types::{FalsePositiveEvent, OutcomeEvent, ReliabilityData, ReliabilityStats};
use crate::observability::metrics;
use crate::resilience::{Admission, CircuitBreaker};
use crate::storage::{decode_or_default, encode, keys::RELIABILITY_KEY, Store};

/// Outcome log, aggregated stats and circuit isolation in one place.
#[derive(Debug)]
pub struct ReliabilityTracker {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: ReliabilityConfig,
    breaker: CircuitBreaker,
    /// Serializes read-modify-write of the reliability document.
    write_lock: Mutex<()>,
}

impl ReliabilityTracker {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        config: ReliabilityConfig,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        let breaker = CircuitBreaker::new(store.clone(), clock.clone(), breaker_config);
        Self {
            store,
            clock,
            config,
            breaker,
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ReliabilityConfig {
        &self.config
    }

    /// The circuit breaker fed by [`record_result`](Self::record_result).
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Record one call outcome.
    pub async fn record_result(
        &self,
        id: &str,
        success: bool,
        duration_ms: Option<u64>,
        error: Option<&str>,
    ) -> StoreResult<()> {
        {
            let _guard = self.write_lock.lock().await;
            let mut data = self.load().await?;
            let now = self.clock.now_ms();

            data.results.push(OutcomeEvent {
                provider_id: id.to_string(),
                success,
                timestamp: now,
                duration_ms,
                error: error.map(str::to_string),
            });

            let interval = self.config.aggregation_interval_ms as i64;
            let never = data.last_aggregation == 0;
            if never || now.saturating_sub(data.last_aggregation) > interval {
                self.fold(&mut data, now);
            }
            self.save(&data).await?;
        }

        metrics::record_outcome(id, success, duration_ms);
        tracing::debug!(provider = %id, success, duration_ms = ?duration_ms, error = ?error, "Recorded provider outcome");

        if success {
            self.breaker.record_success(id).await
        } else {
            self.breaker.record_failure(id).await
        }
    }

    /// Record that a finding from `id` turned out to be a false positive.
    pub async fn record_false_positive(&self, id: &str, finding: Option<&str>) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load().await?;
        data.false_positives.push(FalsePositiveEvent {
            provider_id: id.to_string(),
            timestamp: self.clock.now_ms(),
            finding: finding.map(str::to_string),
        });
        tracing::debug!(provider = %id, "Recorded false positive");
        self.save(&data).await
    }

    /// Recompute stats for every provider from the full log.
    pub async fn aggregate_stats(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load().await?;
        self.fold(&mut data, self.clock.now_ms());
        self.save(&data).await
    }

    /// Current score for `id`, neutral until enough attempts exist.
    pub async fn reliability_score(&self, id: &str) -> StoreResult<f64> {
        let data = self.load().await?;
        Ok(self.score_in(&data, id))
    }

    pub async fn stats(&self, id: &str) -> StoreResult<Option<ReliabilityStats>> {
        Ok(self.load().await?.stats.remove(id))
    }

    pub async fn all_stats(&self) -> StoreResult<BTreeMap<String, ReliabilityStats>> {
        Ok(self.load().await?.stats)
    }

    /// Scores for `ids`, best first. Equal scores keep input order.
    pub async fn rank_providers<S: AsRef<str>>(&self, ids: &[S]) -> StoreResult<Vec<(String, f64)>> {
        let data = self.load().await?;
        let mut ranked: Vec<(String, f64)> = ids
            .iter()
            .map(|id| (id.as_ref().to_string(), self.score_in(&data, id.as_ref())))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked)
    }

    /// Providers with enough history and a score of at least `min_score`.
    pub async fn recommendations(&self, min_score: f64) -> StoreResult<Vec<String>> {
        let data = self.load().await?;
        let mut eligible: Vec<(&String, f64)> = data
            .stats
            .iter()
            .filter(|(_, s)| s.total_attempts >= self.config.min_attempts)
            .filter(|(_, s)| s.reliability_score >= min_score)
            .map(|(id, s)| (id, s.reliability_score))
            .collect();
        eligible.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(eligible.into_iter().map(|(id, _)| id.clone()).collect())
    }

    pub async fn is_circuit_open(&self, id: &str) -> StoreResult<bool> {
        self.breaker.is_open(id).await
    }

    /// Admission check that reports a granted half-open probe.
    pub async fn admit(&self, id: &str) -> StoreResult<Admission> {
        self.breaker.admit(id).await
    }

    pub async fn release_probe(&self, id: &str) -> StoreResult<()> {
        self.breaker.release_probe(id).await
    }

    /// Drop all outcomes, false-positive reports and stats.
    pub async fn clear(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        tracing::info!("Clearing reliability data");
        self.save(&ReliabilityData::default()).await
    }

    fn score_in(&self, data: &ReliabilityData, id: &str) -> f64 {
        match data.stats.get(id) {
            Some(stats) if stats.total_attempts >= self.config.min_attempts => stats.reliability_score,
            _ => NEUTRAL_SCORE,
        }
    }

    fn fold(&self, data: &mut ReliabilityData, now: i64) {
        data.stats = score::aggregate(data, &self.config, now);
        data.last_aggregation = now;
        for (id, stats) in &data.stats {
            metrics::record_reliability_score(id, stats.reliability_score);
        }
        tracing::info!(providers = data.stats.len(), events = data.results.len(), "Aggregated reliability stats");
    }

    async fn load(&self) -> StoreResult<ReliabilityData> {
        let raw = self.store.read(RELIABILITY_KEY).await?;
        Ok(decode_or_default(RELIABILITY_KEY, raw).unwrap_or_default())
    }

    async fn save(&self, data: &ReliabilityData) -> StoreResult<()> {
        let encoded = encode(RELIABILITY_KEY, data)?;
        self.store.write(RELIABILITY_KEY, &encoded).await
    }
}
