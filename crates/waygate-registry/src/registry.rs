//! Snapshot-replace registry of known gateways plus the operator blacklist.
//!
//! Reads are wait-free snapshot loads; refresh and blacklist mutation swap
//! whole snapshots. A failed refresh keeps the previous snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;

use waygate_core::current_unix_timestamp_ms;

use crate::gateway::{Gateway, GatewayStatus};
use crate::perf::PerformanceCache;

#[derive(Debug, Error)]
/// Enumerates supported `RegistryError` values.
pub enum RegistryError {
    #[error("registry snapshot rejected: {0}")]
    FetchFailed(String),
}

/// One immutable view of the registry, keyed by gateway address.
#[derive(Debug, Default, Clone)]
pub struct RegistrySnapshot {
    gateways: BTreeMap<String, Gateway>,
    pub refreshed_at_ms: u64,
}

impl RegistrySnapshot {
    pub fn get(&self, address: &str) -> Option<&Gateway> {
        self.gateways.get(address)
    }

    pub fn gateways(&self) -> impl Iterator<Item = &Gateway> {
        self.gateways.values()
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }
}

/// Shared registry handle. Cheap to clone through `Arc`.
#[derive(Debug, Default)]
pub struct GatewayRegistry {
    snapshot: ArcSwap<RegistrySnapshot>,
    blacklist: ArcSwap<BTreeSet<String>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the registry with a fresh snapshot. An empty or duplicate-
    /// addressed snapshot is rejected and the prior snapshot is retained.
    pub fn refresh(&self, gateways: Vec<Gateway>) -> Result<(), RegistryError> {
        if gateways.is_empty() {
            return Err(RegistryError::FetchFailed("snapshot is empty".to_string()));
        }
        let mut keyed = BTreeMap::new();
        for gateway in gateways {
            if gateway.address.is_empty() || gateway.fqdn.is_empty() {
                return Err(RegistryError::FetchFailed(format!(
                    "entry with empty address or fqdn (address='{}')",
                    gateway.address
                )));
            }
            if keyed.insert(gateway.address.clone(), gateway).is_some() {
                return Err(RegistryError::FetchFailed(
                    "snapshot contains duplicate addresses".to_string(),
                ));
            }
        }
        let count = keyed.len();
        self.snapshot.store(Arc::new(RegistrySnapshot {
            gateways: keyed,
            refreshed_at_ms: current_unix_timestamp_ms(),
        }));
        tracing::debug!(gateways = count, "registry snapshot replaced");
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.load_full()
    }

    /// Gateways allowed into routing pools: joined and not blacklisted.
    pub fn eligible(&self) -> Vec<Gateway> {
        let blacklist = self.blacklist.load();
        self.snapshot
            .load()
            .gateways()
            .filter(|gateway| gateway.status == GatewayStatus::Joined)
            .filter(|gateway| !blacklist.contains(&gateway.address))
            .cloned()
            .collect()
    }

    /// Eligible gateways that are not penalized by consecutive failures.
    /// Penalized gateways stay visible to the benchmark loop so a recovery
    /// probe can lift the penalty.
    pub fn eligible_unpenalized(&self, perf: &PerformanceCache) -> Vec<Gateway> {
        self.eligible()
            .into_iter()
            .filter(|gateway| !perf.is_penalized(&gateway.fqdn))
            .collect()
    }

    pub fn blacklist(&self) -> Arc<BTreeSet<String>> {
        self.blacklist.load_full()
    }

    pub fn set_blacklist(&self, addresses: BTreeSet<String>) {
        self.blacklist.store(Arc::new(addresses));
    }

    /// Flips one address in or out of the blacklist; returns whether the
    /// address is blacklisted afterwards.
    pub fn toggle_blacklist(&self, address: &str) -> bool {
        let mut next = BTreeSet::clone(&self.blacklist.load());
        let now_blacklisted = if !next.remove(address) {
            next.insert(address.to_string());
            true
        } else {
            false
        };
        self.blacklist.store(Arc::new(next));
        now_blacklisted
    }
}
