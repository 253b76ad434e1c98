//! Gateway records as delivered by the on-chain registry snapshot.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `GatewayStatus` values.
pub enum GatewayStatus {
    Joined,
    Leaving,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `GatewayProtocol` values.
pub enum GatewayProtocol {
    Http,
    Https,
}

impl GatewayProtocol {
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// Normalized ranking weights published with each gateway, all in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GatewayWeights {
    #[serde(default)]
    pub stake_weight: f64,
    #[serde(default)]
    pub tenure_weight: f64,
    #[serde(default)]
    pub gateway_perf_weight: f64,
    #[serde(default)]
    pub observer_perf_weight: f64,
    #[serde(default)]
    pub composite_weight: f64,
}

/// Epoch participation counters published with each gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GatewayStats {
    #[serde(default)]
    pub passed_epochs: u64,
    #[serde(default)]
    pub failed_consecutive_epochs: u64,
    #[serde(default)]
    pub passed_consecutive_epochs: u64,
    #[serde(default)]
    pub observed_epochs: u64,
    #[serde(default)]
    pub prescribed_epochs: u64,
}

/// One registry entry. The address is the identity key; `fqdn` is where the
/// gateway actually serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gateway {
    pub address: String,
    pub fqdn: String,
    pub protocol: GatewayProtocol,
    pub port: u16,
    pub status: GatewayStatus,
    /// Stakes are integer amounts in the token's smallest unit.
    #[serde(default)]
    pub operator_stake: u64,
    #[serde(default)]
    pub total_delegated_stake: u64,
    #[serde(default)]
    pub weights: GatewayWeights,
    #[serde(default)]
    pub stats: GatewayStats,
}

impl Gateway {
    pub fn total_stake(&self) -> u64 {
        self.operator_stake
            .saturating_add(self.total_delegated_stake)
    }

    /// `{proto}://{fqdn}[:port]` with the scheme's default port elided.
    pub fn origin(&self) -> String {
        if self.port == self.protocol.default_port() {
            format!("{}://{}", self.protocol.scheme(), self.fqdn)
        } else {
            format!("{}://{}:{}", self.protocol.scheme(), self.fqdn, self.port)
        }
    }
}
