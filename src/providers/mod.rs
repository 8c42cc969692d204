//! Provider abstraction.
//!
//! # Data Flow
//! ```text
//! configured id string
//!     → id.rs (syntax + family validation)
//!     → directory.rs (credential policy, ProviderFactory)
//!     → ProviderHandle { id, Arc<dyn ReviewProvider> }
//! ```
//!
//! # Design Decisions
//! - The resilience core only sees the trait and the opaque id; it never
//!   branches on the concrete provider type
//! - Concrete transports (CLI subprocesses, HTTP clients) are supplied by the
//!   embedding application through ProviderFactory

pub mod directory;
pub mod id;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ProviderError;

pub use directory::{Credentials, ProviderDirectory};
pub use id::{DispatchKind, ProviderFamily, ProviderId};

/// Output of one review call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub content: String,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub findings: Option<serde_json::Value>,
}

/// A backend able to review a prompt.
#[async_trait]
pub trait ReviewProvider: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    async fn review(&self, prompt: &str, timeout: Duration) -> Result<ReviewResult, ProviderError>;

    /// Cheap liveness probe. Providers without one report healthy.
    async fn health_check(&self, _timeout: Duration) -> bool {
        true
    }
}

/// Builds the concrete provider for a validated id.
pub trait ProviderFactory: Send + Sync + std::fmt::Debug {
    fn create(&self, id: &ProviderId) -> Arc<dyn ReviewProvider>;
}

/// A selected provider ready for dispatch.
#[derive(Debug, Clone)]
pub struct ProviderHandle {
    id: ProviderId,
    provider: Arc<dyn ReviewProvider>,
}

impl ProviderHandle {
    pub fn new(id: ProviderId, provider: Arc<dyn ReviewProvider>) -> Self {
        Self { id, provider }
    }

    pub fn id(&self) -> &ProviderId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn family(&self) -> ProviderFamily {
        self.id.family()
    }

    pub fn dispatch_kind(&self) -> DispatchKind {
        self.id.family().dispatch_kind()
    }

    pub fn provider(&self) -> &Arc<dyn ReviewProvider> {
        &self.provider
    }
}

/// Provider that never leaves the process. Used for dry-run listings.
#[derive(Debug, Clone)]
pub struct DryRunProvider {
    name: String,
}

impl DryRunProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ReviewProvider for DryRunProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn review(&self, _prompt: &str, _timeout: Duration) -> Result<ReviewResult, ProviderError> {
        Err(ProviderError::Unavailable(format!(
            "{} is a dry-run provider",
            self.name
        )))
    }
}

/// Factory producing [`DryRunProvider`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunFactory;

impl ProviderFactory for DryRunFactory {
    fn create(&self, id: &ProviderId) -> Arc<dyn ReviewProvider> {
        Arc::new(DryRunProvider::new(id.as_str()))
    }
}
