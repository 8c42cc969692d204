//! Cooldown tracking for externally signaled backoff.
//!
//! A provider that answered 429 or 402 is reachable but should not be asked
//! again for a while. The cooldown is advisory: updates are last-write-wins
//! and no per-id locking is applied.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::StoreResult;
use crate::observability::metrics;
use crate::storage::{decode_or_default, encode, keys, Store};

/// Persisted cooldown for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
    pub provider: String,
    /// Epoch ms; at or before "now" the record is expired.
    pub limited_until: i64,
    pub reason: String,
}

/// Store-backed cooldown tracker.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// True while a cooldown is active. Expired records are deleted.
    pub async fn is_rate_limited(&self, id: &str) -> StoreResult<bool> {
        Ok(self.status(id).await?.is_some())
    }

    /// Active cooldown for `id`, if any.
    pub async fn status(&self, id: &str) -> StoreResult<Option<RateLimitRecord>> {
        let key = keys::rate_limit_key(id);
        let raw = self.store.read(&key).await?;
        let present = raw.is_some();

        match decode_or_default::<RateLimitRecord>(&key, raw) {
            Some(record) if record.limited_until > self.clock.now_ms() => Ok(Some(record)),
            _ => {
                if present {
                    tracing::debug!(provider = %id, "Removing expired rate-limit record");
                    if let Err(e) = self.store.delete(&key).await {
                        tracing::warn!(provider = %id, error = %e, "Failed to remove stale rate-limit record");
                    }
                }
                Ok(None)
            }
        }
    }

    /// Start (or replace) a cooldown of `duration_minutes`.
    pub async fn mark_rate_limited(
        &self,
        id: &str,
        duration_minutes: u64,
        reason: &str,
    ) -> StoreResult<()> {
        let key = keys::rate_limit_key(id);
        let duration_ms = duration_minutes.saturating_mul(60_000) as i64;
        let record = RateLimitRecord {
            provider: id.to_string(),
            limited_until: self.clock.now_ms().saturating_add(duration_ms),
            reason: reason.to_string(),
        };

        tracing::warn!(
            provider = %id,
            minutes = duration_minutes,
            reason = %reason,
            "Provider rate limited"
        );
        metrics::record_rate_limited(id, reason);

        let encoded = encode(&key, &record)?;
        self.store.write(&key, &encoded).await
    }

    /// Drop any cooldown for `id`.
    pub async fn clear(&self, id: &str) -> StoreResult<()> {
        self.store.delete(&keys::rate_limit_key(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;

    fn limiter() -> (RateLimiter, Arc<ManualClock>, MemoryStore) {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(0));
        (
            RateLimiter::new(Arc::new(store.clone()), clock.clone()),
            clock,
            store,
        )
    }

    #[tokio::test]
    async fn test_cooldown_expires() {
        let (limiter, clock, store) = limiter();
        limiter
            .mark_rate_limited("openrouter/a", 60, "HTTP 429")
            .await
            .unwrap();
        assert!(limiter.is_rate_limited("openrouter/a").await.unwrap());

        clock.advance_ms(61 * 60_000);
        assert!(!limiter.is_rate_limited("openrouter/a").await.unwrap());
        // Stale record was removed opportunistically.
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_boundary_is_expired() {
        let (limiter, clock, _) = limiter();
        limiter.mark_rate_limited("p", 1, "HTTP 429").await.unwrap();
        clock.advance_ms(60_000);
        assert!(!limiter.is_rate_limited("p").await.unwrap());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let (limiter, clock, _) = limiter();
        limiter.mark_rate_limited("p", 1440, "HTTP 402").await.unwrap();
        limiter.mark_rate_limited("p", 1, "HTTP 429").await.unwrap();

        let record = limiter.status("p").await.unwrap().unwrap();
        assert_eq!(record.reason, "HTTP 429");
        assert_eq!(record.provider, "p");

        clock.advance_ms(2 * 60_000);
        assert!(!limiter.is_rate_limited("p").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_and_corrupt_records() {
        let (limiter, _, store) = limiter();
        limiter.clear("never-set").await.unwrap();

        limiter.mark_rate_limited("p", 10, "HTTP 429").await.unwrap();
        limiter.clear("p").await.unwrap();
        assert!(!limiter.is_rate_limited("p").await.unwrap());

        store.write(&keys::rate_limit_key("q"), "[]").await.unwrap();
        assert!(!limiter.is_rate_limited("q").await.unwrap());
    }
}
