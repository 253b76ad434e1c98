//! Registry snapshot transport seam.
//!
//! The on-chain registry itself is out of scope; callers supply whatever
//! transport reaches it and hand the result to `GatewayRegistry::refresh`.

use async_trait::async_trait;

use crate::gateway::Gateway;

#[async_trait]
/// Trait contract for `RegistrySource` behavior.
pub trait RegistrySource: Send + Sync {
    async fn fetch_gateways(&self) -> anyhow::Result<Vec<Gateway>>;
}

/// A fixed in-memory snapshot source. Used by tests and by the CLI when the
/// operator loads a snapshot file.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistrySource {
    gateways: Vec<Gateway>,
}

impl StaticRegistrySource {
    pub fn new(gateways: Vec<Gateway>) -> Self {
        Self { gateways }
    }
}

#[async_trait]
impl RegistrySource for StaticRegistrySource {
    async fn fetch_gateways(&self) -> anyhow::Result<Vec<Gateway>> {
        Ok(self.gateways.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{RegistrySource, StaticRegistrySource};
    use crate::gateway::{Gateway, GatewayProtocol, GatewayStatus};

    #[tokio::test]
    async fn static_source_returns_its_snapshot() {
        let source = StaticRegistrySource::new(vec![Gateway {
            address: "a".to_string(),
            fqdn: "a.example".to_string(),
            protocol: GatewayProtocol::Https,
            port: 443,
            status: GatewayStatus::Joined,
            operator_stake: 1,
            total_delegated_stake: 2,
            weights: Default::default(),
            stats: Default::default(),
        }]);
        let gateways = source.fetch_gateways().await.expect("fetch");
        assert_eq!(gateways.len(), 1);
        assert_eq!(gateways[0].address, "a");
    }
}
