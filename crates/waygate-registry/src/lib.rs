//! Gateway registry and rolling performance records.
//!
//! Holds the set of known gateways from the latest on-chain snapshot, the
//! operator-managed blacklist, per-fqdn latency/failure records, the
//! benchmark probe loop, and the JSON state-directory persistence that
//! carries all of it across restarts.

mod benchmark;
mod gateway;
mod perf;
mod registry;
mod source;
mod store;

pub use benchmark::{
    benchmark_gateways, probe_gateway, BenchmarkGate, ProbeOutcome, PROBE_TIMEOUT_MS,
};
pub use gateway::{Gateway, GatewayProtocol, GatewayStats, GatewayStatus, GatewayWeights};
pub use perf::{
    PerformanceCache, PerformanceRecord, EMA_ALPHA, PENALTY_FAILURE_THRESHOLD,
    RESPONSE_TIME_WINDOW,
};
pub use registry::{GatewayRegistry, RegistryError, RegistrySnapshot};
pub use source::{RegistrySource, StaticRegistrySource};
pub use store::StateStore;
