//! Per-policy selection over an eligible gateway pool.
//!
//! Selection helpers are pure over the pool and an injected RNG so policies
//! stay testable with seeded generators.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use waygate_registry::Gateway;

use crate::score::composite_score;

/// Exponent applied to composite scores in the weighted-onchain pool.
pub const WEIGHTED_ONCHAIN_EXPONENT: f64 = 1.5;

/// Uniform pick.
pub fn select_random<'a>(pool: &'a [Gateway], rng: &mut impl Rng) -> Option<&'a Gateway> {
    if pool.is_empty() {
        return None;
    }
    Some(&pool[rng.random_range(0..pool.len())])
}

/// Pick with probability proportional to total stake. A pool with no stake
/// at all degrades to a uniform pick.
pub fn select_stake_weighted<'a>(pool: &'a [Gateway], rng: &mut impl Rng) -> Option<&'a Gateway> {
    if pool.is_empty() {
        return None;
    }
    let stakes: Vec<f64> = pool
        .iter()
        .map(|gateway| gateway.total_stake() as f64)
        .collect();
    match WeightedIndex::new(&stakes) {
        Ok(distribution) => Some(&pool[distribution.sample(rng)]),
        Err(_) => select_random(pool, rng),
    }
}

/// Highest total stake; ties broken by lexicographic address.
pub fn select_highest_stake(pool: &[Gateway]) -> Option<&Gateway> {
    pool.iter().fold(None, |best: Option<&Gateway>, candidate| {
        match best {
            None => Some(candidate),
            Some(current) => {
                let ordering = candidate
                    .total_stake()
                    .cmp(&current.total_stake())
                    .then_with(|| current.address.cmp(&candidate.address));
                if ordering.is_gt() {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        }
    })
}

/// Uniform pick within the five highest-staked gateways.
pub fn select_top_five_stake<'a>(pool: &'a [Gateway], rng: &mut impl Rng) -> Option<&'a Gateway> {
    if pool.is_empty() {
        return None;
    }
    let mut ranked: Vec<&Gateway> = pool.iter().collect();
    ranked.sort_by(|a, b| {
        b.total_stake()
            .cmp(&a.total_stake())
            .then_with(|| a.address.cmp(&b.address))
    });
    ranked.truncate(5);
    Some(ranked[rng.random_range(0..ranked.len())])
}

/// Weighted pick by `composite_score^1.5`. Non-positive scorers are
/// excluded; when nothing scores positive every eligible gateway gets equal
/// weight.
pub fn select_weighted_onchain<'a>(pool: &'a [Gateway], rng: &mut impl Rng) -> Option<&'a Gateway> {
    if pool.is_empty() {
        return None;
    }
    let scored: Vec<(&Gateway, f64)> = pool
        .iter()
        .map(|gateway| (gateway, composite_score(gateway)))
        .filter(|(_, score)| *score > 0.0)
        .collect();
    if scored.is_empty() {
        return select_random(pool, rng);
    }
    let weights: Vec<f64> = scored
        .iter()
        .map(|(_, score)| score.powf(WEIGHTED_ONCHAIN_EXPONENT))
        .collect();
    match WeightedIndex::new(&weights) {
        Ok(distribution) => Some(scored[distribution.sample(rng)].0),
        Err(_) => select_random(pool, rng),
    }
}

/// The top `k` gateways by composite score, best first, ties by address.
pub fn rank_by_composite(pool: &[Gateway], k: usize) -> Vec<&Gateway> {
    let mut ranked: Vec<(&Gateway, f64)> = pool
        .iter()
        .map(|gateway| (gateway, composite_score(gateway)))
        .collect();
    ranked.sort_by(|(a, score_a), (b, score_b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.address.cmp(&b.address))
    });
    ranked.truncate(k);
    ranked.into_iter().map(|(gateway, _)| gateway).collect()
}
