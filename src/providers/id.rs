//! Provider identifiers.
//!
//! Ids are namespaced as `<family>/<model>`, e.g. `opencode/big-pickle` or
//! `openrouter/mistralai/devstral-2512:free`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::DirectoryError;

static ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(opencode|openrouter)/[A-Za-z0-9._-]+(/[A-Za-z0-9._-]+)*(:free)?$")
        .expect("provider id pattern is valid")
});

/// How requests reach a provider family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchKind {
    /// A local CLI process.
    Subprocess,
    /// A remote HTTP API.
    HttpApi,
}

/// Known provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderFamily {
    OpenCode,
    OpenRouter,
}

impl ProviderFamily {
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "opencode" => Some(Self::OpenCode),
            "openrouter" => Some(Self::OpenRouter),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenCode => "opencode",
            Self::OpenRouter => "openrouter",
        }
    }

    pub fn dispatch_kind(&self) -> DispatchKind {
        match self {
            Self::OpenCode => DispatchKind::Subprocess,
            Self::OpenRouter => DispatchKind::HttpApi,
        }
    }

    /// Whether an API key must be configured before use.
    pub fn requires_credentials(&self) -> bool {
        matches!(self, Self::OpenRouter)
    }
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated provider id. Immutable; equality is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderId(String);

impl ProviderId {
    /// Validate `raw` (surrounding whitespace ignored).
    pub fn parse(raw: &str) -> Result<Self, DirectoryError> {
        let raw = raw.trim();
        let Some((prefix, _)) = raw.split_once('/') else {
            return Err(DirectoryError::InvalidId(raw.to_string()));
        };
        if ProviderFamily::from_prefix(prefix).is_none() {
            return Err(DirectoryError::UnknownFamily(raw.to_string()));
        }
        if !ID_PATTERN.is_match(raw) {
            return Err(DirectoryError::InvalidId(raw.to_string()));
        }
        // Reject traversal-looking segments like `openrouter/../etc`.
        let model = &raw[prefix.len() + 1..];
        let model = model.strip_suffix(":free").unwrap_or(model);
        if model.split('/').any(|seg| seg == "." || seg == "..") {
            return Err(DirectoryError::InvalidId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn family(&self) -> ProviderFamily {
        let prefix = self.0.split('/').next().unwrap_or_default();
        // Validated at construction.
        ProviderFamily::from_prefix(prefix).unwrap_or(ProviderFamily::OpenCode)
    }

    /// Everything after `<family>/`.
    pub fn model(&self) -> &str {
        self.0.split_once('/').map(|(_, m)| m).unwrap_or_default()
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProviderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProviderId {
    type Error = DirectoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProviderId> for String {
    fn from(id: ProviderId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ids() {
        let id = ProviderId::parse("opencode/big-pickle").unwrap();
        assert_eq!(id.family(), ProviderFamily::OpenCode);
        assert_eq!(id.model(), "big-pickle");

        let id = ProviderId::parse("openrouter/mistralai/devstral-2512:free").unwrap();
        assert_eq!(id.family(), ProviderFamily::OpenRouter);
        assert_eq!(id.model(), "mistralai/devstral-2512:free");
        assert_eq!(id.family().dispatch_kind(), DispatchKind::HttpApi);

        assert_eq!(ProviderId::parse("  opencode/x ").unwrap().as_str(), "opencode/x");
    }

    #[test]
    fn test_invalid_ids() {
        assert!(matches!(
            ProviderId::parse("openrouter/../etc/passwd"),
            Err(DirectoryError::InvalidId(_))
        ));
        assert!(matches!(
            ProviderId::parse("badprefix/model"),
            Err(DirectoryError::UnknownFamily(_))
        ));
        assert!(ProviderId::parse("openrouter/model with space").is_err());
        assert!(ProviderId::parse("openrouter/").is_err());
        assert!(ProviderId::parse("opencode").is_err());
        assert!(ProviderId::parse("openrouter/a//b").is_err());
    }

    #[test]
    fn test_serde_validates() {
        let id: ProviderId = serde_json::from_str("\"opencode/x\"").unwrap();
        assert_eq!(id.as_str(), "opencode/x");
        assert!(serde_json::from_str::<ProviderId>("\"nope\"").is_err());
    }
}
