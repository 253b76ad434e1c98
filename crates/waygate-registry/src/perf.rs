//! Rolling per-fqdn performance records.
//!
//! Every observed request to a gateway lands here: successes carry a
//! latency sample, failures bump a consecutive-failure counter. Updates are
//! single compare-and-update critical sections; reads clone snapshots out.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use waygate_core::current_unix_timestamp_ms;

/// Bounded latency window per gateway.
pub const RESPONSE_TIME_WINDOW: usize = 16;

/// Smoothing factor for the latency moving average.
pub const EMA_ALPHA: f64 = 0.3;

/// Consecutive failures at which a gateway is penalized out of routing.
pub const PENALTY_FAILURE_THRESHOLD: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Public struct `PerformanceRecord` used across Waygate components.
pub struct PerformanceRecord {
    /// Last `RESPONSE_TIME_WINDOW` latencies, oldest first.
    #[serde(default)]
    pub response_times_ms: VecDeque<u64>,
    /// Exponential moving average of observed latency. `None` until the
    /// first success; persisted as null rather than a non-finite float.
    #[serde(default)]
    pub avg_response_time_ms: Option<f64>,
    /// Consecutive failures. Reset to zero by any success.
    #[serde(default)]
    pub failures: u32,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub last_probe_at_ms: u64,
}

impl PerformanceRecord {
    fn observe_success(&mut self, elapsed_ms: u64) {
        if self.response_times_ms.len() == RESPONSE_TIME_WINDOW {
            self.response_times_ms.pop_front();
        }
        self.response_times_ms.push_back(elapsed_ms);
        self.avg_response_time_ms = Some(match self.avg_response_time_ms {
            None => elapsed_ms as f64,
            Some(prev) => EMA_ALPHA * elapsed_ms as f64 + (1.0 - EMA_ALPHA) * prev,
        });
        self.failures = 0;
        self.success_count += 1;
        self.last_probe_at_ms = current_unix_timestamp_ms();
    }

    fn observe_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
        self.last_probe_at_ms = current_unix_timestamp_ms();
    }

    pub fn is_penalized(&self) -> bool {
        self.failures >= PENALTY_FAILURE_THRESHOLD
    }
}

/// Shared performance cache keyed by gateway fqdn.
#[derive(Debug, Default)]
pub struct PerformanceCache {
    records: Mutex<HashMap<String, PerformanceRecord>>,
    fastest_fqdn: Mutex<Option<String>>,
}

impl PerformanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores records persisted by a previous run.
    pub fn restore(&self, records: HashMap<String, PerformanceRecord>) {
        *self.records.lock().expect("performance cache poisoned") = records;
    }

    pub fn record_success(&self, fqdn: &str, elapsed_ms: u64) {
        let mut records = self.records.lock().expect("performance cache poisoned");
        records
            .entry(fqdn.to_string())
            .or_default()
            .observe_success(elapsed_ms);
    }

    pub fn record_failure(&self, fqdn: &str) {
        let mut records = self.records.lock().expect("performance cache poisoned");
        records
            .entry(fqdn.to_string())
            .or_default()
            .observe_failure();
    }

    pub fn get(&self, fqdn: &str) -> Option<PerformanceRecord> {
        self.records
            .lock()
            .expect("performance cache poisoned")
            .get(fqdn)
            .cloned()
    }

    pub fn is_penalized(&self, fqdn: &str) -> bool {
        self.get(fqdn).is_some_and(|record| record.is_penalized())
    }

    pub fn snapshot(&self) -> HashMap<String, PerformanceRecord> {
        self.records
            .lock()
            .expect("performance cache poisoned")
            .clone()
    }

    /// Caches the winner of the latest benchmark round.
    pub fn set_fastest(&self, fqdn: Option<String>) {
        *self.fastest_fqdn.lock().expect("performance cache poisoned") = fqdn;
    }

    pub fn fastest(&self) -> Option<String> {
        self.fastest_fqdn
            .lock()
            .expect("performance cache poisoned")
            .clone()
    }
}
