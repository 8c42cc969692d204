//! Error definitions shared across subsystems.

use thiserror::Error;

/// Errors raised by a [`Store`](crate::storage::Store) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem or other backend I/O failure.
    #[error("store I/O error on key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be encoded before writing.
    #[error("failed to encode record '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for store-backed operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by a provider's `review` call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The call did not complete before its deadline.
    #[error("timeout after {0} ms")]
    Timeout(u64),

    /// HTTP 429 or an equivalent "slow down" signal.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// HTTP 402 or an exhausted quota / credit balance.
    #[error("payment required: {0}")]
    PaymentRequired(String),

    /// Connection refused, 5xx, process failed to spawn.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Any other failure.
    #[error("provider failed: {0}")]
    Failed(String),
}

/// Policy errors raised while resolving a provider id.
///
/// These never count against a provider's circuit.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("invalid provider id '{0}'")]
    InvalidId(String),

    #[error("unknown provider family in '{0}'")]
    UnknownFamily(String),

    #[error("missing credentials for {family} provider '{id}'")]
    MissingCredentials { id: String, family: String },
}

/// Contract violations surfaced by selection.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SelectionError {
    #[error("invalid selection config: {0}")]
    InvalidConfig(String),
}

/// Errors from dynamic model discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid discovery URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("unexpected discovery payload: {0}")]
    Parse(String),
}
