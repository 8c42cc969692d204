//! Candidate list filters.

use std::collections::HashSet;

use crate::providers::ProviderHandle;

/// Drop repeated ids, keeping the first occurrence.
pub fn dedupe(handles: Vec<ProviderHandle>) -> Vec<ProviderHandle> {
    let mut seen = HashSet::new();
    handles
        .into_iter()
        .filter(|h| seen.insert(h.id().as_str().to_string()))
        .collect()
}

/// Apply the allowlist (if non-empty), then the blocklist. Matching is by
/// substring; blank entries are ignored.
pub fn apply_lists(
    handles: Vec<ProviderHandle>,
    allowlist: &[String],
    blocklist: &[String],
) -> Vec<ProviderHandle> {
    let allow = normalize(allowlist);
    let block = normalize(blocklist);

    handles
        .into_iter()
        .filter(|h| {
            let id = h.id().as_str();
            let allowed = allow.is_empty() || allow.iter().any(|a| id.contains(a));
            if !allowed {
                tracing::debug!(provider = %id, "Dropped by allowlist");
                return false;
            }
            if block.iter().any(|b| id.contains(b)) {
                tracing::debug!(provider = %id, "Dropped by blocklist");
                return false;
            }
            true
        })
        .collect()
}

fn normalize(list: &[String]) -> Vec<&str> {
    list.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}
