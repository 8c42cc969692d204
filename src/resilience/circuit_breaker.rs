//! Circuit breaker for provider isolation.
//!
//! # States
//! - Closed: normal operation, provider is eligible for selection
//! - Open: provider assumed down, excluded until the cooldown elapses
//! - Half-Open: exactly one probe is allowed through to test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures >= failure_threshold (consecutive)
//! Open → Half-Open: open_duration_ms elapsed since opened_at
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails (cooldown restarts)
//! ```
//!
//! # Design Decisions
//! - Per-provider circuit, persisted in the shared store (survives restarts)
//! - Every read-modify-write for an id runs under that id's KeyedLock
//! - Single probe in Half-Open via the `probe_in_flight` flag
//! - Corrupt persisted records reset to Closed instead of failing the caller

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::CircuitBreakerConfig;
use crate::error::StoreResult;
use crate::observability::metrics;
use crate::resilience::lock::KeyedLock;
use crate::storage::{decode_or_default, encode, keys, Store};

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed, dispatch freely.
    Closed,
    /// This caller holds the single half-open probe.
    Probe,
    /// Open, or another caller holds the probe.
    Blocked,
}

/// Persisted per-provider circuit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitRecord {
    #[serde(default)]
    pub state: CircuitState,
    #[serde(default)]
    pub failures: u32,
    /// Epoch ms of the last transition into Open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<i64>,
    #[serde(default)]
    pub probe_in_flight: bool,
}

impl CircuitRecord {
    fn closed() -> Self {
        Self::default()
    }

    fn open(failures: u32, now: i64) -> Self {
        Self {
            state: CircuitState::Open,
            failures,
            opened_at: Some(now),
            probe_in_flight: false,
        }
    }
}

/// Store-backed circuit breaker shared by all providers.
#[derive(Debug)]
pub struct CircuitBreaker {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: CircuitBreakerConfig,
    locks: KeyedLock,
}

impl CircuitBreaker {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: CircuitBreakerConfig) -> Self {
        let locks = KeyedLock::new(Duration::from_millis(config.lock_failsafe_ms));
        Self {
            store,
            clock,
            config,
            locks,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Check whether `id` should be skipped.
    ///
    /// Side-effecting: an expired Open circuit moves to Half-Open and the
    /// first caller to observe Half-Open without a probe claims the probe
    /// slot (and gets `false`). Later callers get `true` until an outcome is
    /// recorded or the probe is released.
    pub async fn is_open(&self, id: &str) -> StoreResult<bool> {
        Ok(self.admit(id).await? == Admission::Blocked)
    }

    /// Like [`is_open`](Self::is_open), but tells a granted probe apart from
    /// a closed circuit. A caller holding [`Admission::Probe`] must either
    /// dispatch and record the outcome, or call
    /// [`release_probe`](Self::release_probe).
    pub async fn admit(&self, id: &str) -> StoreResult<Admission> {
        let key = keys::circuit_key(id);
        let _guard = self.locks.acquire(&key).await;

        let mut record = self.load(&key).await?;
        let now = self.clock.now_ms();

        if record.state == CircuitState::Closed {
            return Ok(Admission::Closed);
        }

        if record.state == CircuitState::Open {
            let expired = match record.opened_at {
                Some(opened_at) => now.saturating_sub(opened_at) >= self.config.open_duration_ms as i64,
                None => true,
            };
            if !expired {
                return Ok(Admission::Blocked);
            }
            tracing::info!(provider = %id, "Circuit cooldown elapsed, moving to half-open");
            metrics::record_circuit_transition(id, CircuitState::HalfOpen);
            record = CircuitRecord {
                state: CircuitState::HalfOpen,
                failures: 0,
                opened_at: record.opened_at,
                probe_in_flight: false,
            };
        }

        // Half-open from here on.
        if record.probe_in_flight {
            return Ok(Admission::Blocked);
        }

        record.probe_in_flight = true;
        self.save(&key, &record).await?;
        tracing::debug!(provider = %id, "Granted half-open probe");
        Ok(Admission::Probe)
    }

    /// Give back an unused half-open probe so a later check can claim it.
    /// No-op unless `id` is Half-Open with a probe in flight.
    pub async fn release_probe(&self, id: &str) -> StoreResult<()> {
        let key = keys::circuit_key(id);
        let _guard = self.locks.acquire(&key).await;

        let mut record = self.load(&key).await?;
        if record.state != CircuitState::HalfOpen || !record.probe_in_flight {
            return Ok(());
        }
        record.probe_in_flight = false;
        self.save(&key, &record).await?;
        tracing::debug!(provider = %id, "Released half-open probe");
        Ok(())
    }

    /// Close the circuit for `id` regardless of its current state.
    pub async fn record_success(&self, id: &str) -> StoreResult<()> {
        let key = keys::circuit_key(id);
        let _guard = self.locks.acquire(&key).await;

        let previous = self.load(&key).await?.state;
        self.save(&key, &CircuitRecord::closed()).await?;

        if previous != CircuitState::Closed {
            tracing::info!(provider = %id, from = %previous, "Circuit closed after success");
            metrics::record_circuit_transition(id, CircuitState::Closed);
        }
        Ok(())
    }

    /// Count a failure for `id`, opening the circuit when warranted.
    pub async fn record_failure(&self, id: &str) -> StoreResult<()> {
        let key = keys::circuit_key(id);
        let _guard = self.locks.acquire(&key).await;

        let record = self.load(&key).await?;
        let now = self.clock.now_ms();
        let failures = record.failures.saturating_add(1);

        let next = match record.state {
            CircuitState::HalfOpen => {
                tracing::warn!(provider = %id, "Half-open probe failed, reopening circuit");
                metrics::record_circuit_transition(id, CircuitState::Open);
                CircuitRecord::open(failures, now)
            }
            // A late outcome from a call dispatched before the circuit opened.
            CircuitState::Open => CircuitRecord::open(failures, now),
            CircuitState::Closed if failures >= self.config.failure_threshold => {
                tracing::warn!(
                    provider = %id,
                    failures,
                    threshold = self.config.failure_threshold,
                    "Failure threshold reached, opening circuit"
                );
                metrics::record_circuit_transition(id, CircuitState::Open);
                CircuitRecord::open(failures, now)
            }
            CircuitState::Closed => CircuitRecord {
                state: CircuitState::Closed,
                failures,
                opened_at: None,
                probe_in_flight: false,
            },
        };

        self.save(&key, &next).await
    }

    /// Current record for `id` without side effects.
    pub async fn state(&self, id: &str) -> StoreResult<CircuitRecord> {
        self.load(&keys::circuit_key(id)).await
    }

    /// Forget all circuit state for `id`.
    pub async fn clear(&self, id: &str) -> StoreResult<()> {
        let key = keys::circuit_key(id);
        let _guard = self.locks.acquire(&key).await;
        self.store.delete(&key).await
    }

    async fn load(&self, key: &str) -> StoreResult<CircuitRecord> {
        let raw = self.store.read(key).await?;
        Ok(decode_or_default(key, raw).unwrap_or_default())
    }

    async fn save(&self, key: &str, record: &CircuitRecord) -> StoreResult<()> {
        let encoded = encode(key, record)?;
        self.store.write(key, &encoded).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;

    fn breaker(threshold: u32, open_ms: u64) -> (CircuitBreaker, Arc<ManualClock>, MemoryStore) {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(1_000_000));
        let config = CircuitBreakerConfig {
            failure_threshold: threshold,
            open_duration_ms: open_ms,
            ..Default::default()
        };
        let cb = CircuitBreaker::new(Arc::new(store.clone()), clock.clone(), config);
        (cb, clock, store)
    }

    #[tokio::test]
    async fn test_fresh_id_is_closed() {
        let (cb, _, store) = breaker(3, 1000);
        assert!(!cb.is_open("openrouter/a").await.unwrap());
        assert_eq!(cb.state("openrouter/a").await.unwrap(), CircuitRecord::default());
        // Reads never create records.
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_below_threshold_stays_closed() {
        let (cb, _, _) = breaker(3, 1000);
        cb.record_failure("p").await.unwrap();
        cb.record_failure("p").await.unwrap();
        let record = cb.state("p").await.unwrap();
        assert_eq!(record.state, CircuitState::Closed);
        assert_eq!(record.failures, 2);
        assert!(record.opened_at.is_none());
        assert!(!cb.is_open("p").await.unwrap());
    }

    #[tokio::test]
    async fn test_open_blocks_until_cooldown() {
        let (cb, clock, _) = breaker(1, 1000);
        cb.record_failure("p").await.unwrap();

        let record = cb.state("p").await.unwrap();
        assert_eq!(record.state, CircuitState::Open);
        assert_eq!(record.opened_at, Some(1_000_000));

        clock.advance_ms(999);
        assert!(cb.is_open("p").await.unwrap());
        clock.advance_ms(1);
        assert!(!cb.is_open("p").await.unwrap());

        let record = cb.state("p").await.unwrap();
        assert_eq!(record.state, CircuitState::HalfOpen);
        assert_eq!(record.failures, 0);
        assert!(record.probe_in_flight);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens_immediately() {
        let (cb, clock, _) = breaker(5, 100);
        for _ in 0..5 {
            cb.record_failure("p").await.unwrap();
        }
        clock.advance_ms(150);
        assert!(!cb.is_open("p").await.unwrap());

        // One failure is far below the threshold of 5, but the probe failed.
        cb.record_failure("p").await.unwrap();
        let record = cb.state("p").await.unwrap();
        assert_eq!(record.state, CircuitState::Open);
        assert_eq!(record.opened_at, Some(clock.now_ms()));
        assert!(!record.probe_in_flight);
        assert!(cb.is_open("p").await.unwrap());
    }

    #[tokio::test]
    async fn test_admission_reports_probe() {
        let (cb, clock, _) = breaker(1, 100);
        assert_eq!(cb.admit("p").await.unwrap(), Admission::Closed);

        cb.record_failure("p").await.unwrap();
        assert_eq!(cb.admit("p").await.unwrap(), Admission::Blocked);

        clock.advance_ms(100);
        assert_eq!(cb.admit("p").await.unwrap(), Admission::Probe);
        assert_eq!(cb.admit("p").await.unwrap(), Admission::Blocked);
    }

    #[tokio::test]
    async fn test_released_probe_can_be_claimed_again() {
        let (cb, clock, _) = breaker(1, 100);
        cb.record_failure("p").await.unwrap();
        clock.advance_ms(100);
        assert_eq!(cb.admit("p").await.unwrap(), Admission::Probe);

        cb.release_probe("p").await.unwrap();
        let record = cb.state("p").await.unwrap();
        assert_eq!(record.state, CircuitState::HalfOpen);
        assert!(!record.probe_in_flight);

        assert_eq!(cb.admit("p").await.unwrap(), Admission::Probe);
    }

    #[tokio::test]
    async fn test_release_probe_leaves_other_states_alone() {
        let (cb, _, store) = breaker(1, 60_000);
        cb.release_probe("p").await.unwrap();
        assert!(store.is_empty());

        cb.record_failure("p").await.unwrap();
        cb.release_probe("p").await.unwrap();
        assert_eq!(cb.state("p").await.unwrap().state, CircuitState::Open);
        assert!(cb.is_open("p").await.unwrap());
    }

    #[tokio::test]
    async fn test_failure_while_open_stays_open() {
        let (cb, clock, _) = breaker(3, 100);
        for _ in 0..3 {
            cb.record_failure("p").await.unwrap();
        }
        clock.advance_ms(100);
        assert!(!cb.is_open("p").await.unwrap());
        cb.record_failure("p").await.unwrap();

        // Below the threshold again, but the circuit is already open.
        clock.advance_ms(10);
        cb.record_failure("p").await.unwrap();
        let record = cb.state("p").await.unwrap();
        assert_eq!(record.state, CircuitState::Open);
        assert_eq!(record.failures, 2);
        assert_eq!(record.opened_at, Some(clock.now_ms()));
    }

    #[tokio::test]
    async fn test_success_resets_from_any_state() {
        let (cb, clock, _) = breaker(1, 100);

        cb.record_failure("p").await.unwrap();
        cb.record_success("p").await.unwrap();
        assert!(!cb.is_open("p").await.unwrap());
        assert_eq!(cb.state("p").await.unwrap(), CircuitRecord::default());

        cb.record_failure("p").await.unwrap();
        clock.advance_ms(100);
        assert!(!cb.is_open("p").await.unwrap());
        cb.record_success("p").await.unwrap();
        assert!(!cb.is_open("p").await.unwrap());
        assert!(!cb.is_open("p").await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_record_resets_to_closed() {
        let (cb, _, store) = breaker(3, 1000);
        store
            .write(&keys::circuit_key("p"), "{not json")
            .await
            .unwrap();

        assert!(!cb.is_open("p").await.unwrap());
        cb.record_failure("p").await.unwrap();
        assert_eq!(cb.state("p").await.unwrap().failures, 1);
    }

    #[tokio::test]
    async fn test_persisted_shape() {
        let (cb, _, store) = breaker(1, 1000);
        cb.record_failure("opencode/x").await.unwrap();

        let raw = store.read(&keys::circuit_key("opencode/x")).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["state"], "open");
        assert_eq!(value["failures"], 1);
        assert_eq!(value["openedAt"], 1_000_000);
        assert_eq!(value["probeInFlight"], false);
    }

    #[derive(Debug)]
    struct UnreadableStore;

    #[async_trait::async_trait]
    impl Store for UnreadableStore {
        async fn read(&self, key: &str) -> StoreResult<Option<String>> {
            Err(crate::error::StoreError::Io {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        }

        async fn write(&self, _key: &str, _value: &str) -> StoreResult<()> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_success_surfaces_read_errors() {
        let cb = CircuitBreaker::new(
            Arc::new(UnreadableStore),
            Arc::new(ManualClock::new(0)),
            CircuitBreakerConfig::default(),
        );
        assert!(cb.record_success("p").await.is_err());
    }

    #[tokio::test]
    async fn test_clear_removes_record() {
        let (cb, _, store) = breaker(1, 1000);
        cb.record_failure("p").await.unwrap();
        cb.clear("p").await.unwrap();
        assert!(store.is_empty());
        assert!(!cb.is_open("p").await.unwrap());
        cb.clear("p").await.unwrap();
    }
}
