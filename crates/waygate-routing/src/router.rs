//! The router: policy dispatch, fallbacks and re-selection.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use waygate_core::ContentReference;
use waygate_registry::{
    benchmark_gateways, probe_gateway, BenchmarkGate, Gateway, GatewayRegistry, PerformanceCache,
    PENALTY_FAILURE_THRESHOLD, PROBE_TIMEOUT_MS,
};

use crate::select::{
    rank_by_composite, select_highest_stake, select_random, select_stake_weighted,
    select_top_five_stake, select_weighted_onchain,
};
use crate::strategy::RoutingStrategy;
use crate::url::{build_content_url, split_origin};

/// Bootstrap gateway used for the initial registry fetch and as the
/// worst-case fallback when the registry has nothing eligible.
pub const DEFAULT_GATEWAY_URL: &str = "https://arweave.net";

/// How many times one request may re-select after a gateway failure.
pub const ROUTING_RETRY_LIMIT: usize = 3;

/// Pool size for the latency-aware policies.
const COMPOSITE_POOL_SIZE: usize = 25;

/// EMA ceiling for the optimal policy's cached-latency step.
const OPTIMAL_EMA_CEILING_MS: f64 = 5_000.0;

/// How many ranked candidates the optimal policy probes when no cached
/// latency qualifies.
const OPTIMAL_PROBE_CANDIDATES: usize = 3;

#[derive(Debug, Error)]
/// Enumerates supported `RoutingError` values.
pub enum RoutingError {
    #[error("no eligible gateways and no usable fallback")]
    NoEligibleGateways,
    #[error("static routing selected but no static gateway is configured")]
    MissingStaticGateway,
}

/// One selected gateway for one request.
#[derive(Debug, Clone)]
pub struct RouteTarget {
    /// The registry entry behind this target; `None` for static or
    /// bootstrap origins.
    pub gateway: Option<Gateway>,
    pub origin: String,
}

impl RouteTarget {
    pub fn from_gateway(gateway: Gateway) -> Self {
        let origin = gateway.origin();
        Self {
            gateway: Some(gateway),
            origin,
        }
    }

    pub fn external(origin: impl Into<String>) -> Self {
        Self {
            gateway: None,
            origin: origin.into(),
        }
    }

    /// Key under which this target's outcomes land in the performance
    /// cache, and under which a failed attempt is excluded from
    /// re-selection.
    pub fn perf_key(&self) -> String {
        match &self.gateway {
            Some(gateway) => gateway.fqdn.clone(),
            None => split_origin(&self.origin)
                .map(|(_, host, _)| host.to_string())
                .unwrap_or_else(|| self.origin.clone()),
        }
    }

    pub fn exclusion_key(&self) -> String {
        match &self.gateway {
            Some(gateway) => gateway.address.clone(),
            None => self.origin.clone(),
        }
    }

    pub fn url_for(&self, reference: &ContentReference) -> String {
        build_content_url(&self.origin, reference)
    }
}

/// Policy-driven gateway selection over the registry and performance cache.
pub struct Router {
    registry: Arc<GatewayRegistry>,
    perf: Arc<PerformanceCache>,
    http: reqwest::Client,
    benchmark_gate: Arc<BenchmarkGate>,
    bootstrap_url: String,
}

impl Router {
    pub fn new(
        registry: Arc<GatewayRegistry>,
        perf: Arc<PerformanceCache>,
        http: reqwest::Client,
        benchmark_gate: Arc<BenchmarkGate>,
    ) -> Self {
        Self {
            registry,
            perf,
            http,
            benchmark_gate,
            bootstrap_url: DEFAULT_GATEWAY_URL.to_string(),
        }
    }

    /// Overrides the hard-coded bootstrap gateway. Embedders point this at
    /// a private gateway; tests point it at a mock.
    pub fn with_bootstrap(mut self, url: impl Into<String>) -> Self {
        self.bootstrap_url = url.into();
        self
    }

    /// Selects a gateway for one attempt. `exclude` carries the exclusion
    /// keys of targets that already failed this request.
    pub async fn select(
        &self,
        strategy: RoutingStrategy,
        static_gateway: Option<&str>,
        exclude: &BTreeSet<String>,
    ) -> Result<RouteTarget, RoutingError> {
        if let Some(url) = static_gateway {
            return Ok(RouteTarget::external(url.trim_end_matches('/')));
        }
        if strategy == RoutingStrategy::Static {
            return Err(RoutingError::MissingStaticGateway);
        }

        let pool: Vec<Gateway> = self
            .registry
            .eligible_unpenalized(&self.perf)
            .into_iter()
            .filter(|gateway| !exclude.contains(&gateway.address))
            .collect();

        if pool.is_empty() {
            if exclude.contains(&self.bootstrap_url) {
                return Err(RoutingError::NoEligibleGateways);
            }
            tracing::debug!("eligible pool empty, routing to bootstrap gateway");
            return Ok(RouteTarget::external(self.bootstrap_url.clone()));
        }

        // The thread-local RNG must not be held across an await; the
        // latency-aware policies roll their own after their probes settle.
        let picked = match strategy {
            RoutingStrategy::Random => select_random(&pool, &mut rand::rng()).cloned(),
            RoutingStrategy::StakeWeightedRandom => {
                select_stake_weighted(&pool, &mut rand::rng()).cloned()
            }
            RoutingStrategy::HighestStake => select_highest_stake(&pool).cloned(),
            RoutingStrategy::TopFiveStakeRandom => {
                select_top_five_stake(&pool, &mut rand::rng()).cloned()
            }
            RoutingStrategy::WeightedOnchain => {
                select_weighted_onchain(&pool, &mut rand::rng()).cloned()
            }
            RoutingStrategy::Optimal => Some(self.select_optimal(&pool).await),
            RoutingStrategy::FastestPing => Some(self.select_fastest_ping(&pool).await),
            RoutingStrategy::Static => unreachable!("handled above"),
        };
        picked
            .map(RouteTarget::from_gateway)
            .ok_or(RoutingError::NoEligibleGateways)
    }

    /// Latency-aware hybrid: cached EMA first, live probes second, weighted
    /// composite pick as the last resort (with a background benchmark
    /// scheduled to improve the next call).
    async fn select_optimal(&self, pool: &[Gateway]) -> Gateway {
        let ranked: Vec<Gateway> = rank_by_composite(pool, COMPOSITE_POOL_SIZE)
            .into_iter()
            .cloned()
            .collect();

        let mut measured: Vec<(&Gateway, f64)> = ranked
            .iter()
            .filter_map(|gateway| {
                let record = self.perf.get(&gateway.fqdn)?;
                if record.failures >= PENALTY_FAILURE_THRESHOLD {
                    return None;
                }
                let avg = record.avg_response_time_ms?;
                avg.is_finite().then_some((gateway, avg))
            })
            .collect();
        measured.sort_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        if let Some((gateway, avg)) = measured.first() {
            if *avg < OPTIMAL_EMA_CEILING_MS {
                return (*gateway).clone();
            }
        }

        for gateway in ranked.iter().take(OPTIMAL_PROBE_CANDIDATES) {
            match probe_gateway(&self.http, &gateway.origin()).await {
                Some(latency_ms) => {
                    self.perf.record_success(&gateway.fqdn, latency_ms);
                    if latency_ms < PROBE_TIMEOUT_MS {
                        return gateway.clone();
                    }
                }
                None => self.perf.record_failure(&gateway.fqdn),
            }
        }

        self.schedule_background_benchmark(ranked);
        let mut rng = rand::rng();
        select_weighted_onchain(pool, &mut rng)
            .or_else(|| select_random(pool, &mut rng))
            .cloned()
            .expect("non-empty pool")
    }

    /// Benchmarks the composite top candidates (inside the debounce window)
    /// and serves the fastest known responder.
    async fn select_fastest_ping(&self, pool: &[Gateway]) -> Gateway {
        let ranked: Vec<Gateway> = rank_by_composite(pool, COMPOSITE_POOL_SIZE)
            .into_iter()
            .cloned()
            .collect();
        if self.benchmark_gate.try_begin() {
            benchmark_gateways(&self.http, &ranked, &self.perf).await;
        }

        if let Some(fastest_fqdn) = self.perf.fastest() {
            if let Some(gateway) = pool.iter().find(|gateway| gateway.fqdn == fastest_fqdn) {
                return gateway.clone();
            }
        }

        let mut rng = rand::rng();
        select_weighted_onchain(pool, &mut rng)
            .or_else(|| select_random(pool, &mut rng))
            .cloned()
            .expect("non-empty pool")
    }

    fn schedule_background_benchmark(&self, targets: Vec<Gateway>) {
        if !self.benchmark_gate.try_begin() {
            return;
        }
        let http = self.http.clone();
        let perf = Arc::clone(&self.perf);
        tokio::spawn(async move {
            benchmark_gateways(&http, &targets, &perf).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use waygate_core::ContentReference;
    use waygate_registry::{
        BenchmarkGate, Gateway, GatewayProtocol, GatewayRegistry, GatewayStatus, PerformanceCache,
    };

    use super::{RouteTarget, Router, RoutingError, DEFAULT_GATEWAY_URL};
    use crate::strategy::RoutingStrategy;

    fn gateway(address: &str, stake_weight: f64) -> Gateway {
        let mut gateway = Gateway {
            address: address.to_string(),
            fqdn: format!("{address}.example"),
            protocol: GatewayProtocol::Https,
            port: 443,
            status: GatewayStatus::Joined,
            operator_stake: 100,
            total_delegated_stake: 0,
            weights: Default::default(),
            stats: Default::default(),
        };
        gateway.weights.stake_weight = stake_weight;
        gateway
    }

    fn router_with(gateways: Vec<Gateway>) -> (Router, Arc<PerformanceCache>) {
        let registry = Arc::new(GatewayRegistry::new());
        if !gateways.is_empty() {
            registry.refresh(gateways).expect("refresh");
        }
        let perf = Arc::new(PerformanceCache::new());
        let router = Router::new(
            registry,
            Arc::clone(&perf),
            reqwest::Client::new(),
            Arc::new(BenchmarkGate::new(u64::MAX)),
        );
        (router, perf)
    }

    #[tokio::test]
    async fn empty_registry_routes_to_bootstrap() {
        let (router, _perf) = router_with(Vec::new());
        let target = router
            .select(RoutingStrategy::Random, None, &BTreeSet::new())
            .await
            .expect("select");
        assert_eq!(target.origin, DEFAULT_GATEWAY_URL);
        assert!(target.gateway.is_none());
    }

    #[tokio::test]
    async fn exhausted_pool_with_excluded_bootstrap_errors() {
        let (router, _perf) = router_with(Vec::new());
        let exclude = BTreeSet::from([DEFAULT_GATEWAY_URL.to_string()]);
        let error = router
            .select(RoutingStrategy::Random, None, &exclude)
            .await
            .expect_err("no fallback left");
        assert!(matches!(error, RoutingError::NoEligibleGateways));
    }

    #[tokio::test]
    async fn static_gateway_overrides_everything() {
        let (router, _perf) = router_with(Vec::new());
        let target = router
            .select(
                RoutingStrategy::Random,
                Some("https://static.example/"),
                &BTreeSet::new(),
            )
            .await
            .expect("select");
        assert_eq!(target.origin, "https://static.example");
    }

    #[tokio::test]
    async fn static_strategy_without_url_errors() {
        let (router, _perf) = router_with(vec![gateway("a", 0.5)]);
        let error = router
            .select(RoutingStrategy::Static, None, &BTreeSet::new())
            .await
            .expect_err("missing static url");
        assert!(matches!(error, RoutingError::MissingStaticGateway));
    }

    #[tokio::test]
    async fn exclusion_forces_reselection() {
        let (router, _perf) = router_with(vec![gateway("a", 0.9), gateway("b", 0.1)]);
        let exclude = BTreeSet::from(["a".to_string()]);
        let target = router
            .select(RoutingStrategy::HighestStake, None, &exclude)
            .await
            .expect("select");
        assert_eq!(target.gateway.expect("gateway").address, "b");
    }

    #[tokio::test]
    async fn optimal_prefers_lowest_cached_latency_under_ceiling() {
        let (router, perf) = router_with(vec![
            gateway("high-score", 0.7),
            gateway("mid-score", 0.4),
            gateway("low-score", 0.1),
        ]);
        perf.record_success("high-score.example", 4_800);
        perf.record_success("mid-score.example", 600);
        // low-score has no measurements at all.

        let target = router
            .select(RoutingStrategy::Optimal, None, &BTreeSet::new())
            .await
            .expect("select");
        assert_eq!(target.gateway.expect("gateway").address, "mid-score");
    }

    #[test]
    fn route_target_builds_urls_and_keys() {
        let target = RouteTarget::from_gateway(gateway("a", 0.5));
        let reference: ContentReference = "ardrive".parse().expect("parse");
        assert_eq!(target.url_for(&reference), "https://ardrive.a.example");
        assert_eq!(target.perf_key(), "a.example");
        assert_eq!(target.exclusion_key(), "a");

        let external = RouteTarget::external(DEFAULT_GATEWAY_URL);
        assert_eq!(external.perf_key(), "arweave.net");
        assert_eq!(external.exclusion_key(), DEFAULT_GATEWAY_URL);
    }
}
