//! Policy-driven gateway selection.
//!
//! Turns the eligible gateway set plus a routing policy into a single
//! gateway URL for one request: composite scoring, the selection strategies,
//! the optimal hybrid rule, and gateway URL construction.

mod router;
mod score;
mod select;
mod strategy;
mod url;

pub use router::{RouteTarget, Router, RoutingError, DEFAULT_GATEWAY_URL, ROUTING_RETRY_LIMIT};
pub use score::{composite_score, FAILURE_PENALTY_FLOOR};
pub use select::{
    rank_by_composite, select_highest_stake, select_random, select_stake_weighted,
    select_top_five_stake, select_weighted_onchain, WEIGHTED_ONCHAIN_EXPONENT,
};
pub use strategy::{RoutingStrategy, StrategyParseError};
pub use url::{build_content_url, split_origin};
