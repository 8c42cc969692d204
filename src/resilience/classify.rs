//! Failure classification.
//!
//! Rate signals (429, 402) say "reachable, but back off" and go to the
//! rate limiter. Everything else is a health signal for the circuit breaker.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::ProviderError;

/// How a failed call should be accounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Short cooldown (HTTP 429 and friends).
    RateLimited,
    /// Long cooldown (HTTP 402, exhausted credits).
    PaymentRequired,
    /// Counts toward the circuit breaker.
    Transient,
}

// Status codes must stand alone: "request 14021" is not a 402.
static PAYMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b402\b|payment required|insufficient (credits|balance)")
        .expect("payment pattern is valid")
});

static RATE_LIMIT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b429\b|rate[ _]limit|too many requests|resource[ _]exhausted|quota exceeded")
        .expect("rate-limit pattern is valid")
});

/// Classify a typed provider error.
pub fn classify(error: &ProviderError) -> FailureClass {
    match error {
        ProviderError::RateLimited(_) => FailureClass::RateLimited,
        ProviderError::PaymentRequired(_) => FailureClass::PaymentRequired,
        ProviderError::Timeout(_) | ProviderError::Unavailable(_) => FailureClass::Transient,
        ProviderError::Failed(message) => classify_message(message),
    }
}

/// Classify a free-form error message (stderr, HTTP body, ...).
pub fn classify_message(message: &str) -> FailureClass {
    if PAYMENT_PATTERN.is_match(message) {
        FailureClass::PaymentRequired
    } else if RATE_LIMIT_PATTERN.is_match(message) {
        FailureClass::RateLimited
    } else {
        FailureClass::Transient
    }
}
