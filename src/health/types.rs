//! Reliability data model.
//!
//! Everything here is persisted as one JSON document under
//! [`RELIABILITY_KEY`](crate::storage::keys::RELIABILITY_KEY).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One reported call outcome. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeEvent {
    pub provider_id: String,
    pub success: bool,
    /// Epoch ms.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A finding from this provider that was later judged a false positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FalsePositiveEvent {
    pub provider_id: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finding: Option<String>,
}

/// Aggregated view of one provider. Derived, never edited by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReliabilityStats {
    pub total_attempts: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub false_positive_count: u64,
    /// In [0, 1]; 0.5 until `min_attempts` outcomes exist.
    pub reliability_score: f64,
    pub last_updated: i64,
}

/// Persisted reliability document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReliabilityData {
    pub results: Vec<OutcomeEvent>,
    pub false_positives: Vec<FalsePositiveEvent>,
    pub stats: BTreeMap<String, ReliabilityStats>,
    /// Epoch ms of the last aggregation pass, 0 if never.
    pub last_aggregation: i64,
}
