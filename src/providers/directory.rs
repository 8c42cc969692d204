//! Provider directory.
//!
//! # Responsibilities
//! - Validate configured id strings
//! - Enforce per-family credential policy
//! - Instantiate handles through the injected ProviderFactory
//!
//! # Design Decisions
//! - Policy failures are returned, never counted as circuit failures
//! - The last-resort provider bypasses the credential check; it must be a
//!   family that needs none

use std::sync::Arc;

use crate::error::DirectoryError;
use crate::providers::{ProviderFactory, ProviderFamily, ProviderHandle, ProviderId};

/// Secrets required by credentialed families.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openrouter_api_key: Option<String>,
}

impl Credentials {
    pub fn has(&self, family: ProviderFamily) -> bool {
        match family {
            ProviderFamily::OpenCode => true,
            ProviderFamily::OpenRouter => self
                .openrouter_api_key
                .as_deref()
                .is_some_and(|k| !k.trim().is_empty()),
        }
    }
}

/// Resolves id strings into provider handles.
#[derive(Debug, Clone)]
pub struct ProviderDirectory {
    credentials: Credentials,
    factory: Arc<dyn ProviderFactory>,
}

impl ProviderDirectory {
    pub fn new(credentials: Credentials, factory: Arc<dyn ProviderFactory>) -> Self {
        Self {
            credentials,
            factory,
        }
    }

    pub fn has_credentials(&self, family: ProviderFamily) -> bool {
        !family.requires_credentials() || self.credentials.has(family)
    }

    /// Validate `raw` and build its handle.
    pub fn resolve(&self, raw: &str) -> Result<ProviderHandle, DirectoryError> {
        let id = ProviderId::parse(raw)?;
        let family = id.family();
        if !self.has_credentials(family) {
            return Err(DirectoryError::MissingCredentials {
                id: id.to_string(),
                family: family.to_string(),
            });
        }
        Ok(self.instantiate(id))
    }

    /// Build a handle for an already validated id without policy checks.
    pub fn instantiate(&self, id: ProviderId) -> ProviderHandle {
        let provider = self.factory.create(&id);
        ProviderHandle::new(id, provider)
    }
}
