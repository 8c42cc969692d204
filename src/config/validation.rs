//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, rates in [0, 1])
//! - Check the last-resort provider id is usable without credentials
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::{RouterConfig, StorageBackend};
use crate::providers::ProviderId;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the whole configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut fail = |field: &'static str, message: String| {
        errors.push(ValidationError { field, message });
    };

    let rate = config.selection.provider_exploration_rate;
    if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
        fail(
            "selection.provider_exploration_rate",
            format!("must be within [0, 1], got {}", rate),
        );
    }

    match ProviderId::parse(&config.selection.last_resort_provider) {
        Ok(id) if id.family().requires_credentials() => fail(
            "selection.last_resort_provider",
            format!("'{}' requires credentials", id),
        ),
        Ok(_) => {}
        Err(e) => fail("selection.last_resort_provider", e.to_string()),
    }

    if config.circuit_breaker.failure_threshold == 0 {
        fail("circuit_breaker.failure_threshold", "must be at least 1".into());
    }
    if config.circuit_breaker.open_duration_ms == 0 {
        fail("circuit_breaker.open_duration_ms", "must be at least 1".into());
    }
    if config.circuit_breaker.lock_failsafe_ms == 0 {
        fail("circuit_breaker.lock_failsafe_ms", "must be at least 1".into());
    }

    let r = &config.reliability;
    if r.min_attempts == 0 {
        fail("reliability.min_attempts", "must be at least 1".into());
    }
    let weights = [
        ("reliability.success_weight", r.success_weight),
        ("reliability.false_positive_weight", r.false_positive_weight),
        ("reliability.latency_weight", r.latency_weight),
    ];
    for (field, weight) in weights {
        if !weight.is_finite() || weight < 0.0 {
            fail(field, format!("must be a non-negative number, got {}", weight));
        }
    }
    if weights.iter().map(|(_, w)| w).sum::<f64>() <= 0.0 {
        fail("reliability", "weights must sum to a positive value".into());
    }

    if config.rate_limit.rate_limited_minutes == 0 {
        fail("rate_limit.rate_limited_minutes", "must be at least 1".into());
    }
    if config.rate_limit.payment_required_minutes == 0 {
        fail("rate_limit.payment_required_minutes", "must be at least 1".into());
    }

    if config.storage.backend == StorageBackend::File && config.storage.path.trim().is_empty() {
        fail("storage.path", "must not be empty for the file backend".into());
    }

    if config.discovery.enabled {
        if config.discovery.ttl_secs == 0 {
            fail("discovery.ttl_secs", "must be at least 1".into());
        }
        if let Err(e) = url::Url::parse(&config.discovery.base_url) {
            fail("discovery.base_url", e.to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
