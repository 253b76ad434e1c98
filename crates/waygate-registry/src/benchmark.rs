//! Parallel HEAD probes against candidate gateways.
//!
//! Probes are best effort: every outcome lands in the performance cache and
//! the round itself never fails. The fastest sub-2s responder is cached for
//! the fastest-ping routing policy.

use std::time::{Duration, Instant};

use futures_util::future::join_all;

use crate::gateway::Gateway;
use crate::perf::PerformanceCache;

/// Per-probe budget. A gateway that cannot answer a HEAD in this window is
/// recorded as a failure.
pub const PROBE_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `ProbeOutcome` used across Waygate components.
pub struct ProbeOutcome {
    pub fqdn: String,
    /// Round-trip time of a successful probe; `None` on failure.
    pub latency_ms: Option<u64>,
}

/// Debounce gate for full benchmark rounds. Concurrent callers race on one
/// timestamp; only the first inside a window runs.
#[derive(Debug)]
pub struct BenchmarkGate {
    interval_ms: u64,
    last_run_ms: std::sync::Mutex<Option<u64>>,
}

impl BenchmarkGate {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_run_ms: std::sync::Mutex::new(None),
        }
    }

    /// Claims the current window. Returns false while a prior round is
    /// still fresh.
    pub fn try_begin(&self) -> bool {
        let now = waygate_core::current_unix_timestamp_ms();
        let mut last = self.last_run_ms.lock().expect("benchmark gate poisoned");
        let deadline = last.map(|previous| previous.saturating_add(self.interval_ms));
        let due = deadline.is_none() || waygate_core::is_expired_unix_ms(deadline, now);
        if due {
            *last = Some(now);
        }
        due
    }
}

/// Issues one HEAD probe against a gateway origin. `Some(latency)` only for
/// a 2xx answer inside the probe budget.
pub async fn probe_gateway(client: &reqwest::Client, origin: &str) -> Option<u64> {
    let started = Instant::now();
    let response = client
        .head(format!("{origin}/"))
        .timeout(Duration::from_millis(PROBE_TIMEOUT_MS))
        .send()
        .await;
    match response {
        Ok(response) if response.status().is_success() => {
            Some(started.elapsed().as_millis().try_into().unwrap_or(u64::MAX))
        }
        Ok(response) => {
            tracing::debug!(origin, status = %response.status(), "probe rejected");
            None
        }
        Err(error) => {
            tracing::debug!(origin, %error, "probe failed");
            None
        }
    }
}

/// Probes `targets` in parallel, records every outcome, and caches the
/// fastest responder under the probe latency ceiling.
pub async fn benchmark_gateways(
    client: &reqwest::Client,
    targets: &[Gateway],
    perf: &PerformanceCache,
) -> Vec<ProbeOutcome> {
    let probes = targets.iter().map(|gateway| {
        let origin = gateway.origin();
        let fqdn = gateway.fqdn.clone();
        async move {
            let latency_ms = probe_gateway(client, &origin).await;
            ProbeOutcome { fqdn, latency_ms }
        }
    });
    let outcomes = join_all(probes).await;

    let mut fastest: Option<(&str, u64)> = None;
    for outcome in &outcomes {
        match outcome.latency_ms {
            Some(latency_ms) => {
                perf.record_success(&outcome.fqdn, latency_ms);
                if latency_ms < PROBE_TIMEOUT_MS
                    && fastest.is_none_or(|(_, best)| latency_ms < best)
                {
                    fastest = Some((&outcome.fqdn, latency_ms));
                }
            }
            None => perf.record_failure(&outcome.fqdn),
        }
    }
    perf.set_fastest(fastest.map(|(fqdn, _)| fqdn.to_string()));
    tracing::debug!(
        probed = outcomes.len(),
        fastest = fastest.map(|(fqdn, _)| fqdn),
        "benchmark round complete"
    );
    outcomes
}
