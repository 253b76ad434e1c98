//! Routing strategy tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown routing strategy '{0}'")]
pub struct StrategyParseError(pub String);

/// Selection policies. The active one comes from configuration and is
/// persisted under its string tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Enumerates supported `RoutingStrategy` values.
pub enum RoutingStrategy {
    /// Uniform pick over the eligible pool.
    Random,
    /// Pick proportional to operator plus delegated stake.
    StakeWeightedRandom,
    /// Highest total stake, ties broken by lexicographic address.
    HighestStake,
    /// Uniform pick within the five highest-staked gateways.
    TopFiveStakeRandom,
    /// Weighted by composite score raised to 1.5.
    WeightedOnchain,
    /// Latency-aware hybrid over the composite ranking.
    #[default]
    Optimal,
    /// Always the configured static gateway; bypasses eligibility.
    Static,
    /// Benchmark the top composite candidates, then lowest latency.
    FastestPing,
}

impl RoutingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::StakeWeightedRandom => "stake-weighted-random",
            Self::HighestStake => "highest-stake",
            Self::TopFiveStakeRandom => "top-five-stake-random",
            Self::WeightedOnchain => "weighted-onchain",
            Self::Optimal => "optimal",
            Self::Static => "static",
            Self::FastestPing => "fastest-ping",
        }
    }
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingStrategy {
    type Err = StrategyParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "random" => Ok(Self::Random),
            "stake-weighted-random" => Ok(Self::StakeWeightedRandom),
            "highest-stake" => Ok(Self::HighestStake),
            "top-five-stake-random" => Ok(Self::TopFiveStakeRandom),
            "weighted-onchain" => Ok(Self::WeightedOnchain),
            "optimal" => Ok(Self::Optimal),
            "static" => Ok(Self::Static),
            "fastest-ping" => Ok(Self::FastestPing),
            other => Err(StrategyParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RoutingStrategy;

    #[test]
    fn tags_round_trip() {
        for strategy in [
            RoutingStrategy::Random,
            RoutingStrategy::StakeWeightedRandom,
            RoutingStrategy::HighestStake,
            RoutingStrategy::TopFiveStakeRandom,
            RoutingStrategy::WeightedOnchain,
            RoutingStrategy::Optimal,
            RoutingStrategy::Static,
            RoutingStrategy::FastestPing,
        ] {
            let parsed: RoutingStrategy = strategy.as_str().parse().expect("parse");
            assert_eq!(parsed, strategy);
        }
    }

    #[test]
    fn rejects_unknown_tags() {
        assert!("fastest".parse::<RoutingStrategy>().is_err());
        assert!("".parse::<RoutingStrategy>().is_err());
    }

    #[test]
    fn serde_uses_kebab_tags() {
        let json = serde_json::to_string(&RoutingStrategy::TopFiveStakeRandom).expect("serialize");
        assert_eq!(json, "\"top-five-stake-random\"");
    }
}
