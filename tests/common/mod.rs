//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use review_router::clock::ManualClock;
use review_router::config::{CircuitBreakerConfig, ReliabilityConfig};
use review_router::error::ProviderError;
use review_router::providers::{
    Credentials, ProviderDirectory, ProviderFactory, ProviderId, ReviewProvider, ReviewResult,
};
use review_router::storage::MemoryStore;
use review_router::{RateLimiter, Registry, ReliabilityTracker};

/// Start time for every manual clock in the suite.
pub const T0: i64 = 1_700_000_000_000;

/// In-memory store, manual clock and the components built on them.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub tracker: Arc<ReliabilityTracker>,
    pub rate_limiter: RateLimiter,
}

impl Harness {
    pub fn new(breaker: CircuitBreakerConfig, reliability: ReliabilityConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(T0));
        let tracker = Arc::new(ReliabilityTracker::new(
            store.clone(),
            clock.clone(),
            reliability,
            breaker,
        ));
        let rate_limiter = RateLimiter::new(store.clone(), clock.clone());
        Self {
            store,
            clock,
            tracker,
            rate_limiter,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default(), ReliabilityConfig::default())
    }

    /// Registry over scripted providers, with a fixed rng seed.
    pub fn registry(&self, credentials: Credentials) -> Registry {
        let directory = ProviderDirectory::new(credentials, Arc::new(ScriptedFactory::default()));
        Registry::new(
            directory,
            self.rate_limiter.clone(),
            self.tracker.clone(),
            self.clock.clone(),
        )
        .with_rng(StdRng::seed_from_u64(7))
    }

    /// Record `attempts` outcomes for `id`, the first `successes` of them
    /// successful, then aggregate.
    pub async fn seed_history(&self, id: &str, attempts: u32, successes: u32, duration_ms: u64) {
        for i in 0..attempts {
            self.tracker
                .record_result(id, i < successes, Some(duration_ms), None)
                .await
                .unwrap();
        }
        // Trailing failures may have opened the circuit.
        self.tracker.breaker().record_success(id).await.unwrap();
        self.tracker.aggregate_stats().await.unwrap();
    }
}

pub fn with_key() -> Credentials {
    Credentials {
        openrouter_api_key: Some("sk-test".into()),
    }
}

pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// What a scripted provider does on each call.
#[derive(Debug, Clone)]
pub enum Script {
    Succeed,
    Fail(ProviderError),
    Hang,
}

/// Provider whose behaviour is fixed up front. Counts calls.
#[derive(Debug)]
pub struct ScriptedProvider {
    name: String,
    script: Script,
    pub calls: AtomicU32,
}

impl ScriptedProvider {
    pub fn new(name: &str, script: Script) -> Self {
        Self {
            name: name.to_string(),
            script,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ReviewProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn review(&self, _prompt: &str, _timeout: Duration) -> Result<ReviewResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Succeed => Ok(ReviewResult {
                content: format!("LGTM from {}", self.name),
                duration_seconds: 0.1,
                findings: None,
            }),
            Script::Fail(err) => Err(err.clone()),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("hang outlives every test timeout")
            }
        }
    }
}

/// Factory handing out always-succeeding scripted providers.
#[derive(Debug, Default)]
pub struct ScriptedFactory;

impl ProviderFactory for ScriptedFactory {
    fn create(&self, id: &ProviderId) -> Arc<dyn ReviewProvider> {
        Arc::new(ScriptedProvider::new(id.as_str(), Script::Succeed))
    }
}
