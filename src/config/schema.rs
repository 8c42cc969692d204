//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::providers::Credentials;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Candidate lists and selection policy.
    pub selection: SelectionConfig,

    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Reliability scoring.
    pub reliability: ReliabilityConfig,

    /// Cooldowns applied on rate signals.
    pub rate_limit: RateLimitConfig,

    /// Persisted state location.
    pub storage: StorageConfig,

    /// Dynamic model discovery.
    pub discovery: DiscoveryConfig,

    pub credentials: CredentialsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// How the final providers are picked from an oversized pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStrategy {
    /// Exploit top-scored providers, explore a random slice.
    #[default]
    Reliability,
    /// Uniform random sample.
    Random,
}

/// Provider selection configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Candidate provider ids, in preference order.
    pub providers: Vec<String>,

    /// Consulted when the candidates cannot fill `provider_limit`.
    pub fallback_providers: Vec<String>,

    /// Keep only ids containing one of these substrings (when non-empty).
    pub provider_allowlist: Vec<String>,

    /// Drop ids containing any of these substrings.
    pub provider_blocklist: Vec<String>,

    /// Target number of providers; 0 means no explicit cap.
    pub provider_limit: usize,

    pub provider_selection_strategy: SelectionStrategy,

    /// Share of `provider_limit` drawn at random from outside the top ranks.
    pub provider_exploration_rate: f64,

    /// Returned alone when nothing else is usable. Must need no credentials.
    pub last_resort_provider: String,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            fallback_providers: Vec::new(),
            provider_allowlist: Vec::new(),
            provider_blocklist: Vec::new(),
            provider_limit: 0,
            provider_selection_strategy: SelectionStrategy::Reliability,
            provider_exploration_rate: 0.3,
            last_resort_provider: "opencode/big-pickle".to_string(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Time an open circuit waits before allowing a probe.
    pub open_duration_ms: u64,

    /// Upper bound on waiting for a per-provider lock before force-clearing it.
    pub lock_failsafe_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_duration_ms: 300_000,
            lock_failsafe_ms: 10_000,
        }
    }
}

/// Reliability scoring configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReliabilityConfig {
    /// Outcomes required before a provider leaves the neutral score.
    pub min_attempts: u64,

    /// Minimum time between automatic aggregation passes.
    pub aggregation_interval_ms: u64,

    pub success_weight: f64,
    pub false_positive_weight: f64,
    pub latency_weight: f64,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            min_attempts: 5,
            aggregation_interval_ms: 24 * 60 * 60 * 1000,
            success_weight: 0.5,
            false_positive_weight: 0.3,
            latency_weight: 0.2,
        }
    }
}

/// Cooldowns for rate signals.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Cooldown after HTTP 429.
    pub rate_limited_minutes: u64,

    /// Cooldown after HTTP 402.
    pub payment_required_minutes: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate_limited_minutes: 30,
            payment_required_minutes: 24 * 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

/// Persisted state configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Directory for the file backend.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: ".review-router".to_string(),
        }
    }
}

/// Dynamic model discovery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enabled: bool,

    /// Model listing API root (`models` is appended).
    pub base_url: String,

    /// How long discovered models are reused.
    pub ttl_secs: u64,

    /// Maximum models merged into the pool.
    pub max_models: usize,

    pub timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://openrouter.ai/api/v1/".to_string(),
            ttl_secs: 3600,
            max_models: 5,
            timeout_secs: 10,
        }
    }
}

/// Provider credentials.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub openrouter_api_key: Option<String>,
}

impl CredentialsConfig {
    pub fn to_credentials(&self) -> Credentials {
        Credentials {
            openrouter_api_key: self.openrouter_api_key.clone(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
