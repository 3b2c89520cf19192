//! Network identity and the static per-chain configuration table.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, B256, U256, address, b256};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

/// Networks backed by a local development node.
///
/// On these networks the VRF coordinator is mocked and the subscription is
/// created by the deployment itself.
pub const DEVELOPMENT_CHAINS: [&str; 2] = ["hardhat", "localhost"];

/// Number of blocks to wait on live networks before a deployment is considered settled.
pub const VERIFICATION_BLOCK_CONFIRMATIONS: u64 = 6;

/// Chain ID used by local development nodes.
pub const LOCAL_CHAIN_ID: u64 = 31337;

/// Chain ID of Sepolia.
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

/// The gas lane (key hash) shared by the built-in networks. 30 gwei.
const DEFAULT_GAS_LANE: B256 =
    b256!("474e34a077df58807dbe9c96d3c009b23b3c6d0cce433e59bbf5b34f823bc56c");

/// 0.01 ETH in wei.
const DEFAULT_ENTRANCE_FEE_WEI: u128 = 10_000_000_000_000_000;

/// 500,000 gas.
const DEFAULT_CALLBACK_GAS_LIMIT: u32 = 500_000;

/// Raffle parameters for a single chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfigItem {
    /// The chain this entry applies to.
    pub chain_id: u64,
    /// Human readable network name.
    pub name: String,
    /// Pre-existing VRF subscription. Only read on live networks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<u64>,
    /// The VRF key hash selecting the maximum gas price for the callback.
    pub gas_lane: B256,
    /// Seconds between two upkeeps.
    pub keepers_update_interval: u64,
    /// Entrance fee in wei.
    pub raffle_entrance_fee: U256,
    /// Gas limit for the `fulfillRandomWords` callback.
    pub callback_gas_limit: u32,
    /// Address of the VRF coordinator. Absent on development chains, where a mock is deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf_coordinator_v2: Option<Address>,
}

/// Mapping from chain ID to its raffle parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    entries: BTreeMap<u64, NetworkConfigItem>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl NetworkConfig {
    /// The built-in table for Sepolia and local development nodes.
    pub fn builtin() -> Self {
        let entries = [
            NetworkConfigItem {
                chain_id: SEPOLIA_CHAIN_ID,
                name: "sepolia".to_string(),
                subscription_id: Some(1141),
                gas_lane: DEFAULT_GAS_LANE,
                keepers_update_interval: 30,
                raffle_entrance_fee: U256::from(DEFAULT_ENTRANCE_FEE_WEI),
                callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
                vrf_coordinator_v2: Some(address!("8103b0a8a00be2ddc778e6e7eaa21791cd364625")),
            },
            NetworkConfigItem {
                chain_id: LOCAL_CHAIN_ID,
                name: "localhost".to_string(),
                subscription_id: Some(588),
                gas_lane: DEFAULT_GAS_LANE,
                keepers_update_interval: 30,
                raffle_entrance_fee: U256::from(DEFAULT_ENTRANCE_FEE_WEI),
                callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
                vrf_coordinator_v2: None,
            },
        ];

        Self {
            entries: entries.into_iter().map(|e| (e.chain_id, e)).collect(),
        }
    }

    /// Replace or add entries. Entries are keyed by their chain ID.
    pub fn merge(mut self, overrides: impl IntoIterator<Item = NetworkConfigItem>) -> Self {
        for item in overrides {
            tracing::debug!(chain_id = item.chain_id, name = %item.name, "Overriding network config entry");
            self.entries.insert(item.chain_id, item);
        }
        self
    }

    /// Get the raffle parameters for a chain.
    pub fn get(&self, chain_id: u64) -> anyhow::Result<&NetworkConfigItem> {
        self.entries
            .get(&chain_id)
            .with_context(|| format!("No network config entry for chain id {}", chain_id))
    }

    /// Iterate over all entries in chain ID order.
    pub fn iter(&self) -> impl Iterator<Item = &NetworkConfigItem> {
        self.entries.values()
    }
}

/// Connection settings for a named network, as stored in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// The expected chain ID. The node is checked against it on connect.
    pub chain_id: u64,
    /// The JSON-RPC endpoint. `None` means an ephemeral dev chain is started for the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Confirmations to wait for after deploying. Ignored on development chains.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_confirmations: Option<u64>,
    /// Hex-encoded key of the deployer. When absent, the node's first unlocked account is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

/// The network a run targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    pub settings: NetworkSettings,
}

impl Network {
    pub fn new(name: impl Into<String>, settings: NetworkSettings) -> Self {
        Self {
            name: name.into(),
            settings,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.settings.chain_id
    }

    /// Whether this is a local development network.
    pub fn is_development(&self) -> bool {
        DEVELOPMENT_CHAINS.contains(&self.name.as_str())
    }

    /// Whether the network only lives for the duration of the run.
    pub fn is_ephemeral(&self) -> bool {
        self.settings.url.is_none()
    }

    /// Confirmations to wait for after a deployment transaction.
    pub fn wait_confirmations(&self) -> u64 {
        if self.is_development() {
            1
        } else {
            self.settings
                .block_confirmations
                .unwrap_or(VERIFICATION_BLOCK_CONFIRMATIONS)
        }
    }

    /// The parsed RPC endpoint, if the network has one.
    pub fn rpc_url(&self) -> anyhow::Result<Option<Url>> {
        self.settings
            .url
            .as_deref()
            .map(|url| {
                Url::parse(url).with_context(|| {
                    format!("Invalid RPC URL for network {}: {}", self.name, url)
                })
            })
            .transpose()
    }
}

/// The networks known without any config file.
pub fn default_networks() -> BTreeMap<String, NetworkSettings> {
    BTreeMap::from([
        (
            "hardhat".to_string(),
            NetworkSettings {
                chain_id: LOCAL_CHAIN_ID,
                url: None,
                block_confirmations: Some(1),
                private_key: None,
            },
        ),
        (
            "localhost".to_string(),
            NetworkSettings {
                chain_id: LOCAL_CHAIN_ID,
                url: Some("http://127.0.0.1:8545".to_string()),
                block_confirmations: Some(1),
                private_key: None,
            },
        ),
        (
            "sepolia".to_string(),
            NetworkSettings {
                chain_id: SEPOLIA_CHAIN_ID,
                url: Some("https://ethereum-sepolia-rpc.publicnode.com".to_string()),
                block_confirmations: Some(VERIFICATION_BLOCK_CONFIRMATIONS),
                private_key: None,
            },
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(name: &str) -> Network {
        let settings = default_networks()
            .remove(name)
            .expect("default network should exist");
        Network::new(name, settings)
    }

    #[test]
    fn test_builtin_sepolia_entry() {
        let config = NetworkConfig::builtin();
        let sepolia = config.get(SEPOLIA_CHAIN_ID).unwrap();

        assert_eq!(sepolia.name, "sepolia");
        assert_eq!(sepolia.subscription_id, Some(1141));
        assert_eq!(sepolia.keepers_update_interval, 30);
        assert_eq!(sepolia.callback_gas_limit, 500_000);
        assert_eq!(
            sepolia.raffle_entrance_fee,
            alloy_core::primitives::utils::parse_ether("0.01").unwrap()
        );
        assert_eq!(
            sepolia.vrf_coordinator_v2,
            Some(address!("8103b0a8a00be2ddc778e6e7eaa21791cd364625"))
        );
    }

    #[test]
    fn test_localhost_entry_has_no_coordinator() {
        let config = NetworkConfig::builtin();
        let local = config.get(LOCAL_CHAIN_ID).unwrap();

        assert_eq!(local.name, "localhost");
        assert!(local.vrf_coordinator_v2.is_none());
        assert_eq!(local.gas_lane, DEFAULT_GAS_LANE);
    }

    #[test]
    fn test_missing_chain_is_an_error() {
        let err = NetworkConfig::builtin().get(1).unwrap_err();
        assert!(err.to_string().contains("chain id 1"));
    }

    #[test]
    fn test_merge_replaces_entry() {
        let mut item = NetworkConfig::builtin().get(SEPOLIA_CHAIN_ID).unwrap().clone();
        item.subscription_id = Some(42);

        let config = NetworkConfig::builtin().merge([item]);

        assert_eq!(config.get(SEPOLIA_CHAIN_ID).unwrap().subscription_id, Some(42));
        assert_eq!(config.iter().count(), 2);
    }

    #[test]
    fn test_development_detection() {
        assert!(network("hardhat").is_development());
        assert!(network("localhost").is_development());
        assert!(!network("sepolia").is_development());
        assert!(network("hardhat").is_ephemeral());
        assert!(!network("localhost").is_ephemeral());
    }

    #[test]
    fn test_wait_confirmations() {
        assert_eq!(network("hardhat").wait_confirmations(), 1);
        assert_eq!(network("sepolia").wait_confirmations(), VERIFICATION_BLOCK_CONFIRMATIONS);

        let live = Network::new(
            "mainnet",
            NetworkSettings {
                chain_id: 1,
                url: Some("http://localhost:8545".to_string()),
                block_confirmations: None,
                private_key: None,
            },
        );
        assert_eq!(live.wait_confirmations(), VERIFICATION_BLOCK_CONFIRMATIONS);

        // Development networks ignore the configured value.
        let mut local = network("localhost");
        local.settings.block_confirmations = Some(12);
        assert_eq!(local.wait_confirmations(), 1);
    }

    #[test]
    fn test_item_parses_from_toml() {
        let item: NetworkConfigItem = toml::from_str(
            r#"
            chain_id = 80002
            name = "amoy"
            subscription_id = 7
            gas_lane = "0x474e34a077df58807dbe9c96d3c009b23b3c6d0cce433e59bbf5b34f823bc56c"
            keepers_update_interval = 60
            raffle_entrance_fee = "0x2386f26fc10000"
            callback_gas_limit = 250000
            vrf_coordinator_v2 = "0x8103b0a8a00be2ddc778e6e7eaa21791cd364625"
            "#,
        )
        .unwrap();

        assert_eq!(item.chain_id, 80002);
        assert_eq!(item.raffle_entrance_fee, U256::from(DEFAULT_ENTRANCE_FEE_WEI));
        assert_eq!(item.callback_gas_limit, 250_000);
    }
}
