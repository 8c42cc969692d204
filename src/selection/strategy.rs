//! Selection strategies over an oversized pool.
//!
//! # Reliability strategy
//! ```text
//! ranked (score desc) ──┬─ top round(target * (1 - rate)) ── exploit
//!                       └─ remainder ── uniform sample ───── explore
//! ```
//! When the exploit slice covers only one dispatch kind and the remainder
//! holds the other, the first explore pick is drawn from the missing kind.
//! This is a soft preference; with no explore slots nothing is swapped.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::providers::{DispatchKind, ProviderHandle};

/// Uniform sample of `count` handles without replacement.
pub fn sample_random<R: Rng + ?Sized>(
    pool: &[ProviderHandle],
    count: usize,
    rng: &mut R,
) -> Vec<ProviderHandle> {
    pool.choose_multiple(rng, count.min(pool.len()))
        .cloned()
        .collect()
}

/// Number of slots reserved for the top-ranked providers.
pub fn exploit_count(target: usize, exploration_rate: f64) -> usize {
    let exploit = (target as f64 * (1.0 - exploration_rate)).round();
    (exploit.max(0.0) as usize).min(target)
}

/// Exploit/explore split over `ranked`, which must be sorted best first.
pub fn exploit_explore<R: Rng + ?Sized>(
    ranked: &[(ProviderHandle, f64)],
    target: usize,
    exploration_rate: f64,
    rng: &mut R,
) -> Vec<ProviderHandle> {
    let target = target.min(ranked.len());
    let exploit = exploit_count(target, exploration_rate);

    let mut chosen: Vec<ProviderHandle> = ranked[..exploit].iter().map(|(h, _)| h.clone()).collect();
    let mut rest: Vec<ProviderHandle> = ranked[exploit..].iter().map(|(h, _)| h.clone()).collect();
    let mut explore = target - exploit;

    if explore > 0 {
        if let Some(index) = diversity_pick(&chosen, &rest, rng) {
            chosen.push(rest.swap_remove(index));
            explore -= 1;
        }
    }

    chosen.extend(sample_random(&rest, explore, rng));
    chosen
}

/// Index into `rest` of a random handle whose dispatch kind is missing
/// from `chosen`, if any.
fn diversity_pick<R: Rng + ?Sized>(
    chosen: &[ProviderHandle],
    rest: &[ProviderHandle],
    rng: &mut R,
) -> Option<usize> {
    if chosen.is_empty() {
        return None;
    }
    let present: HashSet<DispatchKind> = chosen.iter().map(|h| h.dispatch_kind()).collect();
    let missing: Vec<usize> = rest
        .iter()
        .enumerate()
        .filter(|(_, h)| !present.contains(&h.dispatch_kind()))
        .map(|(i, _)| i)
        .collect();
    missing.choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Credentials, DryRunFactory, ProviderDirectory};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn ranked(ids: &[&str]) -> Vec<(ProviderHandle, f64)> {
        let credentials = Credentials {
            openrouter_api_key: Some("key".into()),
        };
        let directory = ProviderDirectory::new(credentials, Arc::new(DryRunFactory));
        let n = ids.len() as f64;
        ids.iter()
            .enumerate()
            .map(|(i, id)| (directory.resolve(id).unwrap(), 1.0 - i as f64 / n))
            .collect()
    }

    #[test]
    fn test_exploit_count_rounding() {
        assert_eq!(exploit_count(5, 0.3), 4);
        assert_eq!(exploit_count(5, 0.0), 5);
        assert_eq!(exploit_count(5, 1.0), 0);
        assert_eq!(exploit_count(2, 0.5), 1);
        assert_eq!(exploit_count(0, 0.3), 0);
    }

    #[test]
    fn test_zero_exploration_takes_top() {
        let pool = ranked(&["opencode/a", "opencode/b", "opencode/c", "openrouter/d", "opencode/e"]);
        let mut rng = StdRng::seed_from_u64(7);
        let out = exploit_explore(&pool, 3, 0.0, &mut rng);
        let ids: Vec<&str> = out.iter().map(|h| h.id().as_str()).collect();
        assert_eq!(ids, vec!["opencode/a", "opencode/b", "opencode/c"]);
    }

    #[test]
    fn test_explore_slot_prefers_missing_kind() {
        let pool = ranked(&[
            "opencode/a",
            "opencode/b",
            "opencode/c",
            "opencode/d",
            "openrouter/e",
        ]);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = exploit_explore(&pool, 3, 0.3, &mut rng);
            assert_eq!(out.len(), 3);
            assert_eq!(out[0].id().as_str(), "opencode/a");
            assert_eq!(out[1].id().as_str(), "opencode/b");
            assert_eq!(out[2].id().as_str(), "openrouter/e");
        }
    }

    #[test]
    fn test_explore_has_no_duplicates() {
        let pool = ranked(&["opencode/a", "opencode/b", "opencode/c", "opencode/d", "opencode/e", "opencode/f"]);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = exploit_explore(&pool, 4, 0.5, &mut rng);
            let unique: HashSet<&str> = out.iter().map(|h| h.id().as_str()).collect();
            assert_eq!(unique.len(), 4);
            assert!(unique.contains("opencode/a") && unique.contains("opencode/b"));
        }
    }

    #[test]
    fn test_sample_random_bounds() {
        let pool: Vec<ProviderHandle> = ranked(&["opencode/a", "opencode/b"]).into_iter().map(|(h, _)| h).collect();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sample_random(&pool, 5, &mut rng).len(), 2);
        assert!(sample_random(&pool, 0, &mut rng).is_empty());
    }
}
