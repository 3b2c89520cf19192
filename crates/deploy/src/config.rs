//! Project configuration, read from `Raffle.toml` and `RAFFLE_` environment variables.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{
    dev_chain::DevChainConfig,
    network::{Network, NetworkConfig, NetworkConfigItem, NetworkSettings, default_networks},
    verify::EtherscanConfig,
};

/// The default name of the project configuration file.
pub const RAFFLE_CONF_FILENAME: &str = "Raffle.toml";

/// Prefix of environment variables overriding the configuration file.
///
/// Nested keys are separated by `__`, e.g. `RAFFLE_NETWORKS__SEPOLIA__URL`.
pub const ENV_PREFIX: &str = "RAFFLE_";

/// Paths of the front-end project's contract constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontEndConfig {
    pub abi_file: PathBuf,
    pub addresses_file: PathBuf,
}

impl Default for FrontEndConfig {
    fn default() -> Self {
        Self {
            abi_file: PathBuf::from("../nextjs-smartcontract-lottery-fcc-1/constants/abi.json"),
            addresses_file: PathBuf::from(
                "../nextjs-smartcontract-lottery-fcc-1/constants/contractAddress.json",
            ),
        }
    }
}

/// Configuration of a raffle project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaffleConfig {
    /// Directory holding the compiled contract artifacts.
    pub artifacts: PathBuf,
    /// Directory deployment records are written to, one sub-directory per network.
    pub deployments: PathBuf,
    pub front_end: FrontEndConfig,
    pub etherscan: EtherscanConfig,
    pub dev_chain: DevChainConfig,
    /// Named networks. Entries are merged over the built-in `hardhat`, `localhost` and `sepolia`.
    pub networks: BTreeMap<String, NetworkSettings>,
    /// Raffle parameters replacing or extending the built-in per-chain table.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chains: Vec<NetworkConfigItem>,
}

impl Default for RaffleConfig {
    fn default() -> Self {
        Self {
            artifacts: PathBuf::from("artifacts"),
            deployments: PathBuf::from("deployments"),
            front_end: FrontEndConfig::default(),
            etherscan: EtherscanConfig::default(),
            dev_chain: DevChainConfig::default(),
            networks: default_networks(),
            chains: Vec::new(),
        }
    }
}

impl RaffleConfig {
    /// Load the configuration: defaults, then the TOML file if it exists, then the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let config_path = Self::resolve_path(path);

        if config_path.exists() {
            tracing::debug!(path = %config_path.display(), "Loading configuration");
        } else {
            tracing::debug!(path = %config_path.display(), "No configuration file, using defaults");
        }

        Self::figment(&config_path)
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", config_path.display()))
    }

    /// The configuration file for `path`: the path itself, or the default file inside a directory.
    pub fn resolve_path(path: &Path) -> PathBuf {
        if path.is_dir() {
            path.join(RAFFLE_CONF_FILENAME)
        } else {
            path.to_path_buf()
        }
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Look up a network by name.
    pub fn network(&self, name: &str) -> Result<Network> {
        let settings = self.networks.get(name).with_context(|| {
            format!(
                "Unknown network '{}'. Known networks: {}",
                name,
                self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })?;
        Ok(Network::new(name, settings.clone()))
    }

    /// The built-in chain table with the configured overrides applied.
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig::builtin().merge(self.chains.iter().cloned())
    }
}
