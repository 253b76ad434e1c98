//! Composite gateway scoring.

use waygate_registry::Gateway;

/// Floor on the consecutive-failure penalty term.
pub const FAILURE_PENALTY_FLOOR: f64 = -0.8;

/// Combines on-chain weights with epoch stability into one ranking score.
///
/// Deterministic: equal inputs always produce equal scores. Gateways can
/// score non-positive; weighted pools exclude those.
pub fn composite_score(gateway: &Gateway) -> f64 {
    let weights = &gateway.weights;
    let stats = &gateway.stats;

    let stability_bonus = 0.15 * (1.0 + stats.passed_consecutive_epochs as f64).ln();
    let failure_penalty =
        (-0.20 * (1.0 + stats.failed_consecutive_epochs as f64).ln()).max(FAILURE_PENALTY_FLOOR);

    0.50 * weights.stake_weight
        + 0.10 * weights.tenure_weight
        + 0.15 * weights.gateway_perf_weight
        + 0.05 * weights.observer_perf_weight
        + stability_bonus
        + failure_penalty
}
