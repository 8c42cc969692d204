//! Dynamic model discovery.
//!
//! # Responsibilities
//! - Supply extra candidates when the configured list yields none
//! - Cache discovered models for a TTL (owned by the Registry, no globals)
//! - Fetch free OpenRouter models, best context window first

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::providers::{ProviderFamily, ProviderId};

/// Source of additional candidate ids for one family.
#[async_trait]
pub trait ModelDiscovery: Send + Sync + std::fmt::Debug {
    fn family(&self) -> ProviderFamily;

    /// Fully qualified provider ids (`<family>/<model>`).
    async fn discover(&self) -> Result<Vec<String>, DiscoveryError>;
}

/// Last discovery result and when it was fetched.
#[derive(Debug, Clone)]
pub struct DiscoveryCache {
    models: Vec<String>,
    last_fetched: Option<i64>,
    ttl_ms: i64,
}

impl DiscoveryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            models: Vec::new(),
            last_fetched: None,
            ttl_ms: ttl.as_millis() as i64,
        }
    }

    pub fn is_fresh(&self, now: i64) -> bool {
        self.last_fetched
            .is_some_and(|fetched| now.saturating_sub(fetched) < self.ttl_ms)
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn last_fetched(&self) -> Option<i64> {
        self.last_fetched
    }

    pub fn store(&mut self, models: Vec<String>, now: i64) {
        self.models = models;
        self.last_fetched = Some(now);
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    context_length: Option<u64>,
    #[serde(default)]
    pricing: Option<Pricing>,
}

#[derive(Debug, Deserialize)]
struct Pricing {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    completion: Option<String>,
}

impl ModelEntry {
    fn is_free(&self) -> bool {
        if self.id.ends_with(":free") {
            return true;
        }
        let zero = |price: &Option<String>| {
            price
                .as_deref()
                .and_then(|p| p.parse::<f64>().ok())
                .is_some_and(|p| p == 0.0)
        };
        self.pricing
            .as_ref()
            .is_some_and(|p| zero(&p.prompt) && zero(&p.completion))
    }
}

/// Pick up to `max` free models from an OpenRouter `/models` payload.
pub fn parse_free_models(body: &str, max: usize) -> Result<Vec<String>, DiscoveryError> {
    let list: ModelList =
        serde_json::from_str(body).map_err(|e| DiscoveryError::Parse(e.to_string()))?;

    let mut free: Vec<ModelEntry> = list.data.into_iter().filter(ModelEntry::is_free).collect();
    free.sort_by(|a, b| b.context_length.unwrap_or(0).cmp(&a.context_length.unwrap_or(0)));

    Ok(free
        .into_iter()
        .filter_map(|m| ProviderId::parse(&format!("openrouter/{}", m.id)).ok())
        .map(String::from)
        .take(max)
        .collect())
}

/// Discovers free OpenRouter models over HTTP.
#[derive(Debug, Clone)]
pub struct OpenRouterDiscovery {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
    max_models: usize,
}

impl OpenRouterDiscovery {
    pub fn new(config: &DiscoveryConfig, api_key: Option<String>) -> Result<Self, DiscoveryError> {
        let endpoint = Url::parse(&config.base_url)?.join("models")?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            max_models: config.max_models,
        })
    }
}

#[async_trait]
impl ModelDiscovery for OpenRouterDiscovery {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::OpenRouter
    }

    async fn discover(&self) -> Result<Vec<String>, DiscoveryError> {
        let mut request = self.client.get(self.endpoint.clone());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let body = request.send().await?.error_for_status()?.text().await?;
        let models = parse_free_models(&body, self.max_models)?;
        tracing::info!(endpoint = %self.endpoint, count = models.len(), "Discovered free models");
        Ok(models)
    }
}
