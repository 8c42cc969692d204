//! Provider registry and selection policy.
//!
//! # Responsibilities
//! - Turn configured id lists into a dispatch list for one review round
//! - Skip providers that are cooling down or have an open circuit
//! - Fall back through fallback providers down to a last-resort provider
//!
//! # Design Decisions
//! - Selection never fails for "nothing available"; only a malformed
//!   config is rejected
//! - Store failures while checking a candidate are logged and the candidate
//!   is kept (fail open)
//! - A half-open probe claimed while building the pool is released again
//!   when that provider is not selected
//! - Randomness is injectable for reproducible tests

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::Clock;
use crate::config::{RateLimitConfig, SelectionConfig, SelectionStrategy};
use crate::error::SelectionError;
use crate::health::{ReliabilityTracker, NEUTRAL_SCORE};
use crate::observability::metrics;
use crate::providers::{ProviderDirectory, ProviderHandle, ProviderId};
use crate::resilience::{Admission, RateLimiter};
use crate::selection::discovery::{DiscoveryCache, ModelDiscovery};
use crate::selection::feedback::FeedbackRouter;
use crate::selection::{filter, strategy};

const DEFAULT_DISCOVERY_TTL: Duration = Duration::from_secs(3600);

/// Chooses which providers handle a review round.
#[derive(Debug)]
pub struct Registry {
    directory: ProviderDirectory,
    rate_limiter: RateLimiter,
    tracker: Arc<ReliabilityTracker>,
    clock: Arc<dyn Clock>,
    discovery: Option<Arc<dyn ModelDiscovery>>,
    discovery_cache: tokio::sync::Mutex<DiscoveryCache>,
    rng: Mutex<StdRng>,
}

impl Registry {
    pub fn new(
        directory: ProviderDirectory,
        rate_limiter: RateLimiter,
        tracker: Arc<ReliabilityTracker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            rate_limiter,
            tracker,
            clock,
            discovery: None,
            discovery_cache: tokio::sync::Mutex::new(DiscoveryCache::new(DEFAULT_DISCOVERY_TTL)),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Enable supplemental discovery with a cache of `ttl`.
    pub fn with_discovery(mut self, discovery: Arc<dyn ModelDiscovery>, ttl: Duration) -> Self {
        self.discovery = Some(discovery);
        self.discovery_cache = tokio::sync::Mutex::new(DiscoveryCache::new(ttl));
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn tracker(&self) -> &Arc<ReliabilityTracker> {
        &self.tracker
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn directory(&self) -> &ProviderDirectory {
        &self.directory
    }

    /// Outcome router sharing this registry's tracker and rate limiter.
    pub fn feedback(&self, config: RateLimitConfig) -> FeedbackRouter {
        FeedbackRouter::new(self.tracker.clone(), self.rate_limiter.clone(), config)
    }

    /// Produce the dispatch list for one round. Never empty.
    pub async fn select(&self, config: &SelectionConfig) -> Result<Vec<ProviderHandle>, SelectionError> {
        let rate = config.provider_exploration_rate;
        if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
            return Err(SelectionError::InvalidConfig(format!(
                "provider_exploration_rate must be within [0, 1], got {}",
                rate
            )));
        }
        let target = (config.provider_limit > 0).then_some(config.provider_limit);

        let mut probes = HashSet::new();
        let mut pool = self
            .build_pool(&config.providers, config, true, &HashSet::new(), &mut probes)
            .await;

        let short = match target {
            Some(t) => pool.len() < t,
            None => pool.is_empty(),
        };
        if short && !config.fallback_providers.is_empty() {
            let known: HashSet<String> = pool.iter().map(|h| h.id().to_string()).collect();
            let fallback = self
                .build_pool(&config.fallback_providers, config, false, &known, &mut probes)
                .await;
            tracing::info!(
                primary = pool.len(),
                fallback = fallback.len(),
                "Topping up pool from fallback providers"
            );
            pool.extend(fallback);
            pool = filter::dedupe(pool);
        }

        let selected = match target {
            Some(t) if pool.len() > t => self.choose(pool, t, config).await,
            _ => pool,
        };

        let selected = if selected.is_empty() {
            self.last_resort(config)
        } else {
            selected
        };
        self.release_unused_probes(probes, &selected).await;

        let strategy_label = match config.provider_selection_strategy {
            SelectionStrategy::Reliability => "reliability",
            SelectionStrategy::Random => "random",
        };
        metrics::record_selection(strategy_label, selected.len());
        tracing::info!(
            strategy = strategy_label,
            providers = ?selected.iter().map(|h| h.id().as_str()).collect::<Vec<_>>(),
            "Selected providers"
        );
        Ok(selected)
    }

    /// Steps 1-5: resolve, discover, dedupe, filter lists, drop unavailable.
    /// Ids granted a half-open probe are added to `probes`.
    async fn build_pool(
        &self,
        ids: &[String],
        config: &SelectionConfig,
        allow_discovery: bool,
        exclude: &HashSet<String>,
        probes: &mut HashSet<String>,
    ) -> Vec<ProviderHandle> {
        let mut handles = self.resolve_all(ids.iter().map(String::as_str));

        if handles.is_empty() && allow_discovery {
            let discovered = self.discovered_ids().await;
            handles.extend(self.resolve_all(discovered.iter().map(String::as_str)));
        }

        let handles = filter::dedupe(handles);
        let handles = filter::apply_lists(handles, &config.provider_allowlist, &config.provider_blocklist);

        let mut available = Vec::with_capacity(handles.len());
        for handle in handles {
            if exclude.contains(handle.id().as_str()) {
                continue;
            }
            match self.admission(&handle).await {
                Some(Admission::Blocked) => {}
                Some(Admission::Probe) => {
                    probes.insert(handle.id().to_string());
                    available.push(handle);
                }
                Some(Admission::Closed) | None => available.push(handle),
            }
        }
        available
    }

    fn resolve_all<'a>(&self, ids: impl Iterator<Item = &'a str>) -> Vec<ProviderHandle> {
        ids.filter(|id| !id.trim().is_empty())
            .filter_map(|id| match self.directory.resolve(id) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(provider = %id, error = %e, "Skipping provider");
                    None
                }
            })
            .collect()
    }

    /// `None` when availability could not be read (the provider is kept).
    async fn admission(&self, handle: &ProviderHandle) -> Option<Admission> {
        let id = handle.id().as_str();

        match self.rate_limiter.is_rate_limited(id).await {
            Ok(true) => {
                tracing::debug!(provider = %id, "Skipping rate-limited provider");
                return Some(Admission::Blocked);
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(provider = %id, error = %e, "Rate-limit check failed, keeping provider"),
        }

        match self.tracker.admit(id).await {
            Ok(Admission::Blocked) => {
                tracing::debug!(provider = %id, "Skipping provider with open circuit");
                Some(Admission::Blocked)
            }
            Ok(admission) => Some(admission),
            Err(e) => {
                tracing::warn!(provider = %id, error = %e, "Circuit check failed, keeping provider");
                None
            }
        }
    }

    /// Hand back probes claimed by providers that did not make the cut, so
    /// their circuits can still recover.
    async fn release_unused_probes(&self, probes: HashSet<String>, selected: &[ProviderHandle]) {
        for id in probes {
            if selected.iter().any(|h| h.id().as_str() == id) {
                continue;
            }
            match self.tracker.release_probe(&id).await {
                Ok(()) => tracing::debug!(provider = %id, "Released probe of unselected provider"),
                Err(e) => tracing::warn!(provider = %id, error = %e, "Failed to release half-open probe"),
            }
        }
    }

    async fn discovered_ids(&self) -> Vec<String> {
        let Some(discovery) = &self.discovery else {
            return Vec::new();
        };
        if !self.directory.has_credentials(discovery.family()) {
            tracing::debug!(family = %discovery.family(), "Discovery skipped, no credentials");
            return Vec::new();
        }

        let mut cache = self.discovery_cache.lock().await;
        let now = self.clock.now_ms();
        if cache.is_fresh(now) {
            return cache.models().to_vec();
        }

        match discovery.discover().await {
            Ok(models) => {
                cache.store(models, now);
                cache.models().to_vec()
            }
            Err(e) => {
                tracing::warn!(error = %e, cached = cache.models().len(), "Model discovery failed");
                cache.models().to_vec()
            }
        }
    }

    async fn choose(&self, pool: Vec<ProviderHandle>, target: usize, config: &SelectionConfig) -> Vec<ProviderHandle> {
        match config.provider_selection_strategy {
            SelectionStrategy::Random => {
                let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
                strategy::sample_random(&pool, target, &mut *rng)
            }
            SelectionStrategy::Reliability => {
                let ranked = match self.tracker.rank_providers(&pool_ids(&pool)).await {
                    Ok(ranked) => ranked,
                    Err(e) => {
                        tracing::warn!(error = %e, "Ranking failed, using neutral scores");
                        pool_ids(&pool).into_iter().map(|id| (id, NEUTRAL_SCORE)).collect()
                    }
                };
                // rank_providers is a stable permutation of the pool ids.
                let mut by_id: HashMap<String, ProviderHandle> =
                    pool.into_iter().map(|h| (h.id().to_string(), h)).collect();
                let ranked: Vec<(ProviderHandle, f64)> = ranked
                    .into_iter()
                    .filter_map(|(id, score)| by_id.remove(&id).map(|h| (h, score)))
                    .collect();

                let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
                strategy::exploit_explore(&ranked, target, config.provider_exploration_rate, &mut *rng)
            }
        }
    }

    fn last_resort(&self, config: &SelectionConfig) -> Vec<ProviderHandle> {
        let id = ProviderId::parse(&config.last_resort_provider).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Configured last-resort provider is invalid, using built-in");
            builtin_last_resort()
        });
        tracing::warn!(provider = %id, "No providers available, using last resort");
        vec![self.directory.instantiate(id)]
    }
}

fn pool_ids(pool: &[ProviderHandle]) -> Vec<String> {
    pool.iter().map(|h| h.id().to_string()).collect()
}

fn builtin_last_resort() -> ProviderId {
    ProviderId::parse(&SelectionConfig::default().last_resort_provider)
        .unwrap_or_else(|_| unreachable!("built-in last-resort id is valid"))
}
