//! State-directory persistence for registry, performance and routing state.
//!
//! One JSON file per key, written atomically. A corrupt or missing file is
//! logged and treated as absent so startup never fails on bad state.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use waygate_core::write_text_atomic;

use crate::gateway::Gateway;
use crate::perf::PerformanceRecord;

const REGISTRY_FILE: &str = "gateway-registry.json";
const PERFORMANCE_FILE: &str = "gateway-performance.json";
const BLACKLIST_FILE: &str = "blacklisted-gateways.json";
const STRATEGY_FILE: &str = "routing-strategy.json";
const STATIC_GATEWAY_FILE: &str = "static-gateway.json";

/// Public struct `StateStore` used across Waygate components.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load_json<T: DeserializeOwned>(&self, file: &str) -> Option<T> {
        let path = self.dir.join(file);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) => {
                if error.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), %error, "unreadable state file");
                }
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "corrupt state file ignored");
                None
            }
        }
    }

    fn save_json<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.dir.join(file);
        let raw = serde_json::to_string_pretty(value)
            .with_context(|| format!("failed to serialize state for {file}"))?;
        write_text_atomic(&path, &raw)
    }

    pub fn load_registry(&self) -> Option<Vec<Gateway>> {
        self.load_json(REGISTRY_FILE)
    }

    pub fn save_registry(&self, gateways: &[Gateway]) -> Result<()> {
        self.save_json(REGISTRY_FILE, &gateways)
    }

    pub fn load_performance(&self) -> Option<HashMap<String, PerformanceRecord>> {
        self.load_json(PERFORMANCE_FILE)
    }

    pub fn save_performance(&self, records: &HashMap<String, PerformanceRecord>) -> Result<()> {
        self.save_json(PERFORMANCE_FILE, records)
    }

    pub fn load_blacklist(&self) -> Option<BTreeSet<String>> {
        self.load_json(BLACKLIST_FILE)
    }

    pub fn save_blacklist(&self, addresses: &BTreeSet<String>) -> Result<()> {
        self.save_json(BLACKLIST_FILE, addresses)
    }

    /// Routing strategy is persisted as its string tag; the routing crate
    /// owns parsing.
    pub fn load_strategy(&self) -> Option<String> {
        self.load_json(STRATEGY_FILE)
    }

    pub fn save_strategy(&self, tag: &str) -> Result<()> {
        self.save_json(STRATEGY_FILE, &tag)
    }

    pub fn load_static_gateway(&self) -> Option<String> {
        self.load_json::<Option<String>>(STATIC_GATEWAY_FILE).flatten()
    }

    pub fn save_static_gateway(&self, url: Option<&str>) -> Result<()> {
        self.save_json(STATIC_GATEWAY_FILE, &url)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use super::StateStore;
    use crate::gateway::{Gateway, GatewayProtocol, GatewayStatus};
    use crate::perf::PerformanceCache;

    fn store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StateStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn missing_files_load_as_none() {
        let (_dir, store) = store();
        assert!(store.load_registry().is_none());
        assert!(store.load_performance().is_none());
        assert!(store.load_blacklist().is_none());
        assert!(store.load_strategy().is_none());
        assert!(store.load_static_gateway().is_none());
    }

    #[test]
    fn corrupt_file_is_ignored() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("routing-strategy.json"), "{not json").expect("write");
        assert!(store.load_strategy().is_none());
    }

    #[test]
    fn registry_round_trip() {
        let (_dir, store) = store();
        let gateways = vec![Gateway {
            address: "a".to_string(),
            fqdn: "a.example".to_string(),
            protocol: GatewayProtocol::Https,
            port: 443,
            status: GatewayStatus::Joined,
            operator_stake: 7,
            total_delegated_stake: 3,
            weights: Default::default(),
            stats: Default::default(),
        }];
        store.save_registry(&gateways).expect("save");
        assert_eq!(store.load_registry().expect("load"), gateways);
    }

    #[test]
    fn performance_round_trip() {
        let (_dir, store) = store();
        let cache = PerformanceCache::new();
        cache.record_success("a.example", 120);
        cache.record_failure("b.example");
        let records = cache.snapshot();
        store.save_performance(&records).expect("save");
        assert_eq!(store.load_performance().expect("load"), records);
    }

    #[test]
    fn blacklist_and_strategy_round_trip() {
        let (_dir, store) = store();
        let blacklist: BTreeSet<String> = ["a".to_string(), "b".to_string()].into();
        store.save_blacklist(&blacklist).expect("save blacklist");
        assert_eq!(store.load_blacklist().expect("load"), blacklist);

        store.save_strategy("fastest-ping").expect("save strategy");
        assert_eq!(store.load_strategy().as_deref(), Some("fastest-ping"));

        store
            .save_static_gateway(Some("https://gw.example"))
            .expect("save static");
        assert_eq!(
            store.load_static_gateway().as_deref(),
            Some("https://gw.example")
        );
        store.save_static_gateway(None).expect("clear static");
        assert!(store.load_static_gateway().is_none());
    }

    #[test]
    fn empty_performance_map_round_trips() {
        let (_dir, store) = store();
        store
            .save_performance(&HashMap::new())
            .expect("save empty");
        assert_eq!(store.load_performance().expect("load"), HashMap::new());
    }
}
