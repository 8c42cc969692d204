//! Composite reliability scoring.
//!
//! ```text
//! score = w_success * success_rate
//!       + w_false_positive * (1 - false_positive_rate)
//!       + w_latency * latency_score
//!
//! latency_score = clamp(1 - (avg_ms - 500) / 4500, 0, 1)
//! ```
//! 500 ms or faster scores 1.0, 5000 ms or slower scores 0.0. Providers
//! with no duration samples get a neutral latency score.

use std::collections::BTreeMap;

use crate::config::ReliabilityConfig;
use crate::health::types::{ReliabilityData, ReliabilityStats};

/// Score reported for providers without enough history.
pub const NEUTRAL_SCORE: f64 = 0.5;

const EXCELLENT_LATENCY_MS: f64 = 500.0;
const POOR_LATENCY_MS: f64 = 5000.0;

pub fn latency_score(avg_duration_ms: f64) -> f64 {
    let span = POOR_LATENCY_MS - EXCELLENT_LATENCY_MS;
    (1.0 - (avg_duration_ms - EXCELLENT_LATENCY_MS) / span).clamp(0.0, 1.0)
}

/// `avg_duration_ms` is `None` when no outcome carried a duration.
pub fn composite_score(
    success_rate: f64,
    false_positive_rate: f64,
    avg_duration_ms: Option<f64>,
    config: &ReliabilityConfig,
) -> f64 {
    let latency = avg_duration_ms.map_or(NEUTRAL_SCORE, latency_score);
    let score = config.success_weight * success_rate
        + config.false_positive_weight * (1.0 - false_positive_rate)
        + config.latency_weight * latency;
    score.clamp(0.0, 1.0)
}

#[derive(Default)]
struct Tally {
    attempts: u64,
    successes: u64,
    duration_sum: u128,
    duration_samples: u64,
    false_positives: u64,
}

/// Fold every event in `data` into fresh per-provider stats.
pub fn aggregate(
    data: &ReliabilityData,
    config: &ReliabilityConfig,
    now: i64,
) -> BTreeMap<String, ReliabilityStats> {
    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();

    for event in &data.results {
        let tally = tallies.entry(event.provider_id.as_str()).or_default();
        tally.attempts += 1;
        if event.success {
            tally.successes += 1;
        }
        if let Some(ms) = event.duration_ms {
            tally.duration_sum += u128::from(ms);
            tally.duration_samples += 1;
        }
    }
    for report in &data.false_positives {
        tallies
            .entry(report.provider_id.as_str())
            .or_default()
            .false_positives += 1;
    }

    tallies
        .into_iter()
        .map(|(id, t)| {
            let success_rate = ratio(t.successes, t.attempts);
            let false_positive_rate = ratio(t.false_positives, t.attempts).min(1.0);
            let sampled_duration_ms = (t.duration_samples > 0)
                .then(|| t.duration_sum as f64 / t.duration_samples as f64);
            let average_duration_ms = sampled_duration_ms.unwrap_or(0.0);
            let reliability_score = if t.attempts < config.min_attempts {
                NEUTRAL_SCORE
            } else {
                composite_score(success_rate, false_positive_rate, sampled_duration_ms, config)
            };

            let stats = ReliabilityStats {
                total_attempts: t.attempts,
                success_count: t.successes,
                failure_count: t.attempts - t.successes,
                success_rate,
                average_duration_ms,
                false_positive_count: t.false_positives,
                reliability_score,
                last_updated: now,
            };
            (id.to_string(), stats)
        })
        .collect()
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::types::{FalsePositiveEvent, OutcomeEvent};

    fn event(id: &str, success: bool, duration_ms: Option<u64>) -> OutcomeEvent {
        OutcomeEvent {
            provider_id: id.into(),
            success,
            timestamp: 0,
            duration_ms,
            error: None,
        }
    }

    #[test]
    fn test_latency_curve() {
        assert_eq!(latency_score(100.0), 1.0);
        assert_eq!(latency_score(500.0), 1.0);
        assert!((latency_score(2750.0) - 0.5).abs() < 1e-9);
        assert_eq!(latency_score(5000.0), 0.0);
        assert_eq!(latency_score(60_000.0), 0.0);
    }

    #[test]
    fn test_composite_default_weights() {
        let config = ReliabilityConfig::default();
        // Perfect provider.
        assert!((composite_score(1.0, 0.0, Some(400.0), &config) - 1.0).abs() < 1e-9);
        // Always failing, always false positive, very slow.
        assert_eq!(composite_score(0.0, 1.0, Some(10_000.0), &config), 0.0);
        // 0.5*0.8 + 0.3*0.9 + 0.2*0.5
        let s = composite_score(0.8, 0.1, Some(2750.0), &config);
        assert!((s - 0.77).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_groups_by_provider() {
        let config = ReliabilityConfig {
            min_attempts: 2,
            ..Default::default()
        };
        let data = ReliabilityData {
            results: vec![
                event("a", true, Some(1000)),
                event("a", false, Some(3000)),
                event("a", true, None),
                event("b", true, Some(200)),
            ],
            false_positives: vec![FalsePositiveEvent {
                provider_id: "a".into(),
                timestamp: 0,
                finding: None,
            }],
            ..Default::default()
        };

        let stats = aggregate(&data, &config, 42);

        let a = &stats["a"];
        assert_eq!(a.total_attempts, 3);
        assert_eq!(a.success_count, 2);
        assert_eq!(a.failure_count, 1);
        assert_eq!(a.false_positive_count, 1);
        assert!((a.average_duration_ms - 2000.0).abs() < 1e-9);
        assert_eq!(a.last_updated, 42);
        let expected = composite_score(2.0 / 3.0, 1.0 / 3.0, Some(2000.0), &config);
        assert!((a.reliability_score - expected).abs() < 1e-9);

        // Below min_attempts stays neutral.
        assert_eq!(stats["b"].reliability_score, NEUTRAL_SCORE);
    }

    #[test]
    fn test_missing_durations_score_neutral_latency() {
        let config = ReliabilityConfig {
            min_attempts: 1,
            ..Default::default()
        };
        let data = ReliabilityData {
            results: vec![
                event("untimed", true, None),
                event("untimed", true, None),
                event("fast", true, Some(100)),
                event("fast", true, Some(100)),
            ],
            ..Default::default()
        };

        let stats = aggregate(&data, &config, 0);

        // 0.5 * 1.0 + 0.3 * 1.0 + 0.2 * 0.5
        assert!((stats["untimed"].reliability_score - 0.9).abs() < 1e-9);
        assert!((stats["fast"].reliability_score - 1.0).abs() < 1e-9);
        assert!(stats["untimed"].reliability_score < stats["fast"].reliability_score);
    }
}
