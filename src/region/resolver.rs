use std::collections::BTreeMap;

use crate::config::RegionConfig;
use crate::models::{DetectionMethod, RegionCode, ResolvedRegion, Signal};

/// Resolve a provider's jurisdiction from its region signals.
///
/// 1. Sum weights per region.
/// 2. No evidence → the provider override if listed, else `UNKNOWN` (fallback).
/// 3. A single leader → that region (signal based).
/// 4. Tied leaders → the provider override if listed (known provider), else
///    the lexicographically first tied region (signal based). Either way the
///    result is flagged `multi_region`.
///
/// Non-chosen regions above the presence threshold are kept as secondary
/// regions and never influence the choice.
pub fn resolve(signals: &[Signal], provider: &str, config: &RegionConfig) -> ResolvedRegion {
    let candidate_scores = aggregate(signals);
    let max = candidate_scores.values().copied().max().unwrap_or(0);
    let known = config.known_provider(provider);

    let (region, method, multi_region) = if max == 0 {
        match known {
            Some(region) => (region, DetectionMethod::KnownProvider, false),
            None => (RegionCode::Unknown, DetectionMethod::Fallback, false),
        }
    } else {
        let tied: Vec<RegionCode> = candidate_scores
            .iter()
            .filter(|(_, score)| **score == max || max - **score < config.tie_threshold)
            .map(|(region, _)| *region)
            .collect();

        match (tied.as_slice(), known) {
            ([single], _) => (*single, DetectionMethod::SignalBased, false),
            (_, Some(region)) => (region, DetectionMethod::KnownProvider, true),
            (_, None) => {
                let first = tied
                    .iter()
                    .copied()
                    .min_by_key(|r| r.as_str())
                    .unwrap_or(RegionCode::Unknown);
                (first, DetectionMethod::SignalBased, true)
            }
        }
    };

    let secondary_regions = candidate_scores
        .iter()
        .filter(|(r, score)| **r != region && **score > config.presence_threshold)
        .map(|(r, _)| *r)
        .collect();

    ResolvedRegion {
        region,
        method,
        multi_region,
        candidate_scores,
        secondary_regions,
    }
}

/// Per-region weight totals. `UNKNOWN` is never a candidate.
pub fn aggregate(signals: &[Signal]) -> BTreeMap<RegionCode, u32> {
    let mut scores = BTreeMap::new();
    for signal in signals.iter().filter(|s| s.region != RegionCode::Unknown) {
        let entry = scores.entry(signal.region).or_insert(0u32);
        *entry = entry.saturating_add(signal.weight);
    }
    scores
}
