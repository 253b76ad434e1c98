//! Client configuration.

use std::path::PathBuf;

use waygate_fetch::DEFAULT_FETCH_TIMEOUT_MS;
use waygate_routing::{RoutingStrategy, DEFAULT_GATEWAY_URL};

/// Minimum interval between full benchmark rounds.
pub const DEFAULT_BENCHMARK_INTERVAL_MS: u64 = 10 * 60 * 1000;

#[derive(Debug, Clone)]
/// Public struct `WaygateConfig` used across Waygate components.
pub struct WaygateConfig {
    pub routing_strategy: RoutingStrategy,
    /// When set, every request routes here and `routing_strategy` is
    /// ignored.
    pub static_gateway: Option<String>,
    pub benchmark_interval_ms: u64,
    /// When false, retrieval skips verification and artifacts report
    /// `verified = false` with a skipped reason.
    pub verification_enabled: bool,
    /// When true, an artifact that fails verification fails the request;
    /// otherwise bytes are delivered with a warning.
    pub strict_mode: bool,
    pub fetch_timeout_ms: u64,
    /// State directory for restart recovery. `None` disables persistence.
    pub state_dir: Option<PathBuf>,
    /// Worst-case fallback gateway when the registry has nothing eligible.
    pub bootstrap_gateway: String,
}

impl Default for WaygateConfig {
    fn default() -> Self {
        Self {
            routing_strategy: RoutingStrategy::default(),
            static_gateway: None,
            benchmark_interval_ms: DEFAULT_BENCHMARK_INTERVAL_MS,
            verification_enabled: true,
            strict_mode: false,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            state_dir: None,
            bootstrap_gateway: DEFAULT_GATEWAY_URL.to_string(),
        }
    }
}
